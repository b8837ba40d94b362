//! hirefire-web: request queue time metrics for HireFire web dynos.
//!
//! Request adapters record one queue-time sample per inbound request. A
//! background dispatcher flushes the samples once per interval, posts them
//! to the HireFire collector, and adapts its cadence from the collector's
//! response headers. Failed deliveries are merged back into the live buffer
//! until they age past the retention horizon.
//!
//! # Architecture
//!
//! ```text
//! Web
//!   ├── add_to_buffer() ← called per HTTP request
//!   ├── Buffer (one lock: add / flush / repopulate)
//!   ├── start_dispatcher() → background tick loop
//!   │     flush → Submitter::submit
//!   │       ├── 200 → Tunables::adjust (interval, timeout, ttl)
//!   │       └── error → Buffer::repopulate (bounded by ttl)
//!   └── stop_dispatcher() → cancel future ticks, discard final flush
//! ```
//!
//! The buffer lock is never held across the network call, so sample
//! ingestion never waits on the collector.

pub mod buffer;
pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod submitter;
pub mod transport;
pub mod tunables;

pub use buffer::{Buffer, Repopulated, Snapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{TickOutcome, Web};
pub use error::{DispatchError, DispatchErrorKind};
pub use submitter::Submitter;
pub use transport::{HttpsTransport, MemoryCollector, Reply, Transport, TransportError};
pub use tunables::{Tunables, TunablesSnapshot};
