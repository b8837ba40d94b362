//! hirefire-middleware: the request-side half of the HireFire agent.
//!
//! Every inbound request passes through [`process`]:
//!
//! ```text
//! request ─┬─ X-Request-Start + token + web dyno ─→ Web::add_to_buffer(now - start)
//!          ├─ /hirefire (HireFire-Token) ──────────→ 200 [{name, value}, ...]
//!          ├─ /hirefire/<token>/info ──────────────→ 200 [{name, value}, ...]
//!          └─ anything else ───────────────────────→ host application
//! ```
//!
//! [`hirefire_middleware`] adapts this to axum:
//!
//! ```ignore
//! let hirefire = Arc::new(HireFire::from_env().dyno_web());
//! let app = Router::new()
//!     .route("/", get(index))
//!     .layer(axum::middleware::from_fn_with_state(hirefire, hirefire_middleware));
//! ```

pub mod axum_glue;
pub mod error;
pub mod hirefire;
pub mod process;
pub mod request;

pub use axum_glue::hirefire_middleware;
pub use error::MiddlewareError;
pub use hirefire::HireFire;
pub use process::{InfoResponse, WorkerMetric, process};
pub use request::RequestInfo;
