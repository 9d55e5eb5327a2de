//! Service Layer
//!
//! Async wrapper around the pure core: owns snapshots, persists them with
//! retry and notifies subscribers. This layer is **non-deterministic**; all
//! scoring logic runs through `scoring/`.

pub mod retry;
pub mod session;
pub mod manager;

pub use retry::{RetryPolicy, Transient, retry_transient};
pub use session::{MatchSession, SessionError};
pub use manager::{SessionHandle, SessionManager};
