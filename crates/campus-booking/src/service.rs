use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};
use uuid::Uuid;

use campus_db::models::{EventPatch, NewEvent};
use campus_db::queries::{hydrate_event, insert_event};
use campus_db::seats::{self, CancelOutcome, RegisterOutcome};
use campus_db::{Connection, Database};
use campus_types::models::{Event, Registration};

use crate::error::{BookingError, Conflict, Resource};
use crate::retry::{RetryPolicy, retry_transient};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How long a single attempt may wait for the writer connection before
    /// it gives up without writing.
    pub op_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Booking {
    pub registration: Registration,
    pub reactivated: bool,
}

#[derive(Debug, Clone)]
pub struct Cancellation {
    pub registration: Registration,
    pub seat_released: bool,
}

/// Registration, cancellation and every other change to an event's seat
/// count. The caller's identity is always an explicit argument.
#[derive(Clone)]
pub struct RegistrationService {
    db: Arc<Database>,
    config: ServiceConfig,
}

impl RegistrationService {
    pub fn new(db: Arc<Database>, config: ServiceConfig) -> Self {
        Self { db, config }
    }

    /// Book a seat on `event_id` for `user_id`, reactivating a previously
    /// cancelled registration for the same pair when one exists.
    pub async fn register(&self, user_id: Uuid, event_id: Uuid) -> Result<Booking, BookingError> {
        let (uid, eid) = (user_id.to_string(), event_id.to_string());
        let outcome = self
            .run("register", move |conn| seats::register(conn, &uid, &eid))
            .await?;

        match outcome {
            RegisterOutcome::EventNotFound => Err(BookingError::NotFound(Resource::Event)),
            RegisterOutcome::AlreadyRegistered => {
                Err(BookingError::Conflict(Conflict::AlreadyRegistered))
            }
            RegisterOutcome::FullyBooked => {
                debug!(%event_id, %user_id, "Registration refused: fully booked");
                Err(BookingError::Conflict(Conflict::FullyBooked))
            }
            RegisterOutcome::Registered {
                registration,
                reactivated,
            } => {
                let registration = Registration::try_from(registration)?;
                info!(
                    registration_id = %registration.id,
                    %event_id,
                    %user_id,
                    reactivated,
                    "Registered for event"
                );
                Ok(Booking {
                    registration,
                    reactivated,
                })
            }
        }
    }

    /// Cancel `registration_id` on behalf of `requesting_user`. Cancelling
    /// an already-cancelled registration succeeds without touching seats.
    pub async fn cancel(
        &self,
        registration_id: Uuid,
        requesting_user: Uuid,
    ) -> Result<Cancellation, BookingError> {
        let (rid, uid) = (registration_id.to_string(), requesting_user.to_string());
        let outcome = self
            .run("cancel", move |conn| seats::cancel(conn, &rid, &uid))
            .await?;

        match outcome {
            CancelOutcome::NotFound => Err(BookingError::NotFound(Resource::Registration)),
            CancelOutcome::NotOwner => Err(BookingError::Unauthorized),
            CancelOutcome::Cancelled {
                registration,
                seat_released,
            } => {
                info!(%registration_id, %requesting_user, seat_released, "Registration cancelled");
                Ok(Cancellation {
                    registration: Registration::try_from(registration)?,
                    seat_released,
                })
            }
        }
    }

    pub async fn create_event(&self, new: NewEvent) -> Result<Event, BookingError> {
        if new.capacity < 1 {
            return Err(BookingError::Validation("Capacity must be at least 1".into()));
        }
        let event = self
            .run("create_event", move |conn| {
                let row = insert_event(conn, &new)?;
                hydrate_event(conn, row)
            })
            .await?;
        info!(event_id = %event.id, capacity = event.capacity, "Event created");
        Ok(event)
    }

    /// Remove an event and all of its registrations. Returns how many
    /// registrations went with it.
    pub async fn admin_delete_event(&self, event_id: Uuid) -> Result<usize, BookingError> {
        let eid = event_id.to_string();
        let removed = self
            .run("delete_event", move |conn| seats::delete_event(conn, &eid))
            .await?
            .ok_or(BookingError::NotFound(Resource::Event))?;
        info!(%event_id, registrations = removed, "Event deleted");
        Ok(removed)
    }

    /// Resize an event. Available seats become `max(0, capacity - confirmed)`;
    /// nobody is cancelled when the event shrinks below its headcount.
    pub async fn admin_update_capacity(
        &self,
        event_id: Uuid,
        new_capacity: u32,
    ) -> Result<Event, BookingError> {
        self.admin_update_event(
            event_id,
            EventPatch {
                capacity: Some(new_capacity),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn admin_update_event(
        &self,
        event_id: Uuid,
        patch: EventPatch,
    ) -> Result<Event, BookingError> {
        if patch.capacity.is_some_and(|c| c < 1) {
            return Err(BookingError::Validation("Capacity must be at least 1".into()));
        }
        let eid = event_id.to_string();
        let event = self
            .run("update_event", move |conn| {
                seats::update_event(conn, &eid, &patch)?
                    .map(|row| hydrate_event(conn, row))
                    .transpose()
            })
            .await?
            .ok_or(BookingError::NotFound(Resource::Event))?;
        info!(
            %event_id,
            capacity = event.capacity,
            available_seats = event.available_seats,
            "Event updated"
        );
        Ok(event)
    }

    /// Run a write on the writer connection off the async runtime, retried
    /// on transient failure.
    ///
    /// Each attempt has a deadline for taking the writer. An attempt that
    /// misses it returns `Transient` without having run `f`, and an attempt
    /// that gets the writer is always awaited to completion. The reported
    /// outcome is therefore the one that was committed, and a retry never
    /// sees the effects of an earlier attempt of the same call.
    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T, BookingError>
    where
        T: Send + 'static,
        F: Fn(&Connection) -> anyhow::Result<T> + Clone + Send + 'static,
    {
        let op_timeout = self.config.op_timeout;
        retry_transient(&self.config.retry, op, || {
            let db = self.db.clone();
            let f = f.clone();
            async move {
                let deadline = Instant::now() + op_timeout;
                let task =
                    tokio::task::spawn_blocking(move || db.with_conn_mut_until(deadline, f));
                match task.await {
                    Err(join) => {
                        error!(op, "spawn_blocking join error: {}", join);
                        Err(BookingError::Internal(anyhow::anyhow!(
                            "storage task failed: {}",
                            join
                        )))
                    }
                    Ok(Err(e)) if campus_db::is_busy(&e) => Err(BookingError::Transient(format!(
                        "{} could not reach storage within {:?}: {}",
                        op, op_timeout, e
                    ))),
                    Ok(Err(e)) => {
                        error!(op, "Storage error: {:#}", e);
                        Err(BookingError::Internal(e))
                    }
                    Ok(Ok(value)) => Ok(value),
                }
            }
        })
        .await
    }
}
