//! Seat bookkeeping for campus events.
//!
//! [`RegistrationService`] is the only code path that changes an event's
//! seat count. It wraps the atomic storage operations in `campus-db` with a
//! bounded timeout, a bounded retry for transient storage failures, and
//! typed errors the API layer can map to distinct responses.

pub mod error;
pub mod retry;
pub mod service;

pub use error::{BookingError, Conflict, Resource};
pub use retry::RetryPolicy;
pub use service::{Booking, Cancellation, RegistrationService, ServiceConfig};
