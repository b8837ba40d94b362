//! Client identity and HTTP header names.

/// Version of the agent, reported to HireFire on every request.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client name prefix for the `HireFire-Resource` header.
pub const CLIENT_NAME: &str = "Rust";

pub const HEADER_TOKEN: &str = "HireFire-Token";
pub const HEADER_RESOURCE: &str = "HireFire-Resource";
pub const HEADER_DISPATCHER_INTERVAL: &str = "HireFire-Resource-Dispatcher-Interval";
pub const HEADER_DISPATCHER_TIMEOUT: &str = "HireFire-Resource-Dispatcher-Timeout";
pub const HEADER_BUFFER_TTL: &str = "HireFire-Resource-Buffer-TTL";
pub const HEADER_REQUEST_START: &str = "X-Request-Start";

/// Value of the `HireFire-Resource` header, e.g. `Rust-0.1.0`.
pub fn resource_identity() -> String {
    format!("{CLIENT_NAME}-{VERSION}")
}
