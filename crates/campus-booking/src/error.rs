use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Event,
    Registration,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event => f.write_str("Event"),
            Self::Registration => f.write_str("Registration"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    AlreadyRegistered,
    FullyBooked,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered => f.write_str("User already registered for this event"),
            Self::FullyBooked => f.write_str("Event is fully booked"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0} not found")]
    NotFound(Resource),

    #[error("{0}")]
    Conflict(Conflict),

    #[error("Not authorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    /// Storage could not be reached in time (writer deadline or SQLite lock).
    /// The operation did not take effect and may be retried.
    #[error("Storage temporarily unavailable: {0}")]
    Transient(String),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl BookingError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_api_wording() {
        assert_eq!(
            BookingError::Conflict(Conflict::FullyBooked).to_string(),
            "Event is fully booked"
        );
        assert_eq!(
            BookingError::NotFound(Resource::Registration).to_string(),
            "Registration not found"
        );
        assert!(BookingError::Transient("timeout".into()).is_transient());
        assert!(!BookingError::Unauthorized.is_transient());
    }
}
