//! Seat accounting. Every statement that changes `events.available_seats`
//! lives in this module.
//!
//! Each operation is one transaction on the writer connection. Checks that
//! guard a write are folded into the write itself (`UPDATE ... WHERE
//! available_seats > 0`, `INSERT ... ON CONFLICT DO NOTHING`) and the affected
//! row count decides the outcome, so there is no window between check and
//! mutation. An early return drops the transaction, which rolls it back.
//!
//! The free functions take the connection directly so a caller can run them
//! under [`Database::with_conn_mut_until`]. The `Database` methods of the same
//! purpose wait for the writer without a deadline.

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::Database;
use crate::models::{EventPatch, EventRow, RegistrationRow, format_ts, now_ts};
use crate::queries::{count_confirmed, query_event, query_registration, query_registration_by_pair};

#[derive(Debug)]
pub enum RegisterOutcome {
    EventNotFound,
    AlreadyRegistered,
    FullyBooked,
    Registered {
        registration: RegistrationRow,
        /// True when a cancelled row was flipped back instead of inserting.
        reactivated: bool,
    },
}

#[derive(Debug)]
pub enum CancelOutcome {
    NotFound,
    NotOwner,
    Cancelled {
        registration: RegistrationRow,
        /// False when the row was already cancelled or its event is gone.
        seat_released: bool,
    },
}

/// Book a seat for `user_id` on `event_id`.
///
/// Outcomes are checked in order: event missing, confirmed registration
/// already present, no seat left. Nothing is written unless all pass.
pub fn register(conn: &Connection, user_id: &str, event_id: &str) -> Result<RegisterOutcome> {
    let tx = conn.unchecked_transaction()?;

    if query_event(&tx, event_id)?.is_none() {
        return Ok(RegisterOutcome::EventNotFound);
    }

    let now = now_ts();

    let reactivated = tx.execute(
        "UPDATE registrations SET status = 'confirmed', updated_at = ?3
         WHERE user_id = ?1 AND event_id = ?2 AND status = 'cancelled'",
        rusqlite::params![user_id, event_id, now],
    )? == 1;

    if !reactivated {
        let inserted = tx.execute(
            "INSERT INTO registrations (id, user_id, event_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'confirmed', ?4, ?4)
             ON CONFLICT(user_id, event_id) DO NOTHING",
            rusqlite::params![Uuid::new_v4().to_string(), user_id, event_id, now],
        )?;
        // The only row the pair can conflict with is a confirmed one;
        // a cancelled one would have been reactivated above.
        if inserted == 0 {
            return Ok(RegisterOutcome::AlreadyRegistered);
        }
    }

    let seated = tx.execute(
        "UPDATE events SET available_seats = available_seats - 1, updated_at = ?2
         WHERE id = ?1 AND available_seats > 0",
        rusqlite::params![event_id, now],
    )?;
    if seated == 0 {
        return Ok(RegisterOutcome::FullyBooked);
    }

    tx.execute(
        "INSERT OR IGNORE INTO event_attendees (event_id, user_id) VALUES (?1, ?2)",
        [event_id, user_id],
    )?;

    let registration = query_registration_by_pair(&tx, user_id, event_id)?
        .ok_or_else(|| anyhow!("registration vanished inside its own transaction"))?;

    tx.commit()?;

    debug!(
        registration_id = %registration.id,
        event_id,
        user_id,
        reactivated,
        "Seat booked"
    );
    Ok(RegisterOutcome::Registered {
        registration,
        reactivated,
    })
}

/// Cancel a registration on behalf of `user_id`.
///
/// The seat is only handed back when this call performed the
/// confirmed → cancelled flip, so repeated cancels release it once.
pub fn cancel(conn: &Connection, registration_id: &str, user_id: &str) -> Result<CancelOutcome> {
    let tx = conn.unchecked_transaction()?;

    let Some(existing) = query_registration(&tx, registration_id)? else {
        return Ok(CancelOutcome::NotFound);
    };
    if existing.user_id != user_id {
        return Ok(CancelOutcome::NotOwner);
    }

    let now = now_ts();
    let flipped = tx.execute(
        "UPDATE registrations SET status = 'cancelled', updated_at = ?2
         WHERE id = ?1 AND status = 'confirmed'",
        rusqlite::params![registration_id, now],
    )? == 1;

    let mut seat_released = false;
    if flipped {
        seat_released = tx.execute(
            "UPDATE events
             SET available_seats = MIN(capacity, available_seats + 1), updated_at = ?2
             WHERE id = ?1",
            rusqlite::params![existing.event_id, now],
        )? == 1;
        tx.execute(
            "DELETE FROM event_attendees WHERE event_id = ?1 AND user_id = ?2",
            [&existing.event_id, &existing.user_id],
        )?;
    }

    let registration = query_registration(&tx, registration_id)?
        .ok_or_else(|| anyhow!("registration vanished inside its own transaction"))?;

    tx.commit()?;

    debug!(
        registration_id,
        event_id = %registration.event_id,
        flipped,
        seat_released,
        "Registration cancelled"
    );
    Ok(CancelOutcome::Cancelled {
        registration,
        seat_released,
    })
}

/// Delete an event together with its registrations.
///
/// Ordering: registrations (and the attendee set) go first, then the
/// event. Both steps share one transaction, so a failure in either leaves
/// the event and all of its registrations in place. Returns the number of
/// registrations removed, or `None` if the event does not exist.
pub fn delete_event(conn: &Connection, event_id: &str) -> Result<Option<usize>> {
    let tx = conn.unchecked_transaction()?;

    if query_event(&tx, event_id)?.is_none() {
        return Ok(None);
    }

    let removed = tx.execute("DELETE FROM registrations WHERE event_id = ?1", [event_id])?;
    tx.execute("DELETE FROM event_attendees WHERE event_id = ?1", [event_id])?;
    tx.execute("DELETE FROM events WHERE id = ?1", [event_id])?;

    tx.commit()?;
    Ok(Some(removed))
}

/// Apply a partial update to an event. A new capacity rescales the
/// available seats against the number of confirmed registrations:
/// `max(0, capacity - confirmed)`. Existing registrations are never
/// cancelled by a shrink.
pub fn update_event(conn: &Connection, event_id: &str, patch: &EventPatch) -> Result<Option<EventRow>> {
    let tx = conn.unchecked_transaction()?;

    if query_event(&tx, event_id)?.is_none() {
        return Ok(None);
    }

    let now = now_ts();

    if let Some(capacity) = patch.capacity {
        let taken = count_confirmed(&tx, event_id)?;
        let capacity = i64::from(capacity);
        let available = (capacity - i64::try_from(taken)?).max(0);
        tx.execute(
            "UPDATE events SET capacity = ?2, available_seats = ?3, updated_at = ?4
             WHERE id = ?1",
            rusqlite::params![event_id, capacity, available, now],
        )?;
        debug!(event_id, capacity, taken, available, "Capacity rescaled");
    }

    tx.execute(
        "UPDATE events SET
            name = COALESCE(?2, name),
            description = COALESCE(?3, description),
            location = COALESCE(?4, location),
            date = COALESCE(?5, date),
            category = COALESCE(?6, category),
            updated_at = ?7
         WHERE id = ?1",
        rusqlite::params![
            event_id,
            patch.name,
            patch.description,
            patch.location,
            patch.date.as_ref().map(format_ts),
            patch.category.map(|c| c.as_str()),
            now
        ],
    )?;

    let updated = query_event(&tx, event_id)?;
    tx.commit()?;
    Ok(updated)
}

impl Database {
    pub fn register_seat(&self, user_id: &str, event_id: &str) -> Result<RegisterOutcome> {
        self.with_conn_mut(|conn| register(conn, user_id, event_id))
    }

    pub fn cancel_seat(&self, registration_id: &str, user_id: &str) -> Result<CancelOutcome> {
        self.with_conn_mut(|conn| cancel(conn, registration_id, user_id))
    }

    pub fn delete_event_cascade(&self, event_id: &str) -> Result<Option<usize>> {
        self.with_conn_mut(|conn| delete_event(conn, event_id))
    }

    pub fn update_event(&self, event_id: &str, patch: &EventPatch) -> Result<Option<EventRow>> {
        self.with_conn_mut(|conn| update_event(conn, event_id, patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewEvent, UserRow};
    use campus_types::models::Category;
    use chrono::Utc;

    fn setup(capacity: u32) -> (Database, EventRow, Vec<UserRow>) {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_user("Organizer", "org@pec.edu.in", "hash", true).unwrap();
        let users = ["a", "b", "c"]
            .iter()
            .map(|n| {
                db.create_user(n, &format!("{}@pec.edu.in", n), "hash", false)
                    .unwrap()
            })
            .collect();
        let event = db
            .create_event(&NewEvent {
                name: "Workshop".into(),
                description: "Hands-on session".into(),
                location: "Lab 3".into(),
                date: Utc::now(),
                category: Category::Tech,
                capacity,
                organizer_id: org.id.parse().unwrap(),
            })
            .unwrap();
        (db, event, users)
    }

    fn seats(db: &Database, event_id: &str) -> i64 {
        db.get_event(event_id).unwrap().unwrap().available_seats
    }

    fn assert_consistent(db: &Database, event_id: &str) {
        let event = db.get_event(event_id).unwrap().unwrap();
        let confirmed = db.count_confirmed(event_id).unwrap() as i64;
        assert!(event.available_seats >= 0 && event.available_seats <= event.capacity);
        assert_eq!(event.available_seats, (event.capacity - confirmed).max(0));
    }

    fn registered(outcome: RegisterOutcome) -> (RegistrationRow, bool) {
        match outcome {
            RegisterOutcome::Registered {
                registration,
                reactivated,
            } => (registration, reactivated),
            other => panic!("expected Registered, got {:?}", other),
        }
    }

    #[test]
    fn register_decrements_and_records_attendee() {
        let (db, event, users) = setup(2);
        let (reg, reactivated) = registered(db.register_seat(&users[0].id, &event.id).unwrap());

        assert!(!reactivated);
        assert_eq!(reg.status, "confirmed");
        assert_eq!(seats(&db, &event.id), 1);
        let attendees = db.get_attendees_for_events(&[event.id.clone()]).unwrap();
        assert_eq!(attendees, vec![(event.id.clone(), users[0].id.clone())]);
        assert_consistent(&db, &event.id);
    }

    #[test]
    fn unknown_event_is_reported() {
        let (db, _event, users) = setup(1);
        let outcome = db.register_seat(&users[0].id, &Uuid::new_v4().to_string()).unwrap();
        assert!(matches!(outcome, RegisterOutcome::EventNotFound));
    }

    #[test]
    fn duplicate_registration_leaves_seats_alone() {
        let (db, event, users) = setup(3);
        registered(db.register_seat(&users[0].id, &event.id).unwrap());

        let outcome = db.register_seat(&users[0].id, &event.id).unwrap();
        assert!(matches!(outcome, RegisterOutcome::AlreadyRegistered));
        assert_eq!(seats(&db, &event.id), 2);
        assert_consistent(&db, &event.id);
    }

    #[test]
    fn duplicate_wins_over_fully_booked() {
        let (db, event, users) = setup(1);
        registered(db.register_seat(&users[0].id, &event.id).unwrap());

        let outcome = db.register_seat(&users[0].id, &event.id).unwrap();
        assert!(matches!(outcome, RegisterOutcome::AlreadyRegistered));
    }

    #[test]
    fn fully_booked_rolls_back_the_insert() {
        let (db, event, users) = setup(1);
        registered(db.register_seat(&users[0].id, &event.id).unwrap());

        let outcome = db.register_seat(&users[1].id, &event.id).unwrap();
        assert!(matches!(outcome, RegisterOutcome::FullyBooked));
        assert_eq!(seats(&db, &event.id), 0);
        assert_eq!(db.get_registrations_for_user(&users[1].id).unwrap().len(), 0);
    }

    #[test]
    fn reregistering_reuses_the_cancelled_row() {
        let (db, event, users) = setup(2);
        let (first, _) = registered(db.register_seat(&users[0].id, &event.id).unwrap());
        db.cancel_seat(&first.id, &users[0].id).unwrap();

        let (again, reactivated) = registered(db.register_seat(&users[0].id, &event.id).unwrap());
        assert!(reactivated);
        assert_eq!(again.id, first.id);
        assert_eq!(again.created_at, first.created_at);
        assert_eq!(again.status, "confirmed");
        assert_eq!(db.get_registrations_for_user(&users[0].id).unwrap().len(), 1);
        assert_consistent(&db, &event.id);
    }

    #[test]
    fn reactivation_is_blocked_when_sold_out() {
        let (db, event, users) = setup(1);
        let (first, _) = registered(db.register_seat(&users[0].id, &event.id).unwrap());
        db.cancel_seat(&first.id, &users[0].id).unwrap();
        registered(db.register_seat(&users[1].id, &event.id).unwrap());

        let outcome = db.register_seat(&users[0].id, &event.id).unwrap();
        assert!(matches!(outcome, RegisterOutcome::FullyBooked));
        let row = db.get_registration(&first.id).unwrap().unwrap();
        assert_eq!(row.status, "cancelled");
    }

    #[test]
    fn cancel_releases_exactly_one_seat() {
        let (db, event, users) = setup(2);
        let (reg, _) = registered(db.register_seat(&users[0].id, &event.id).unwrap());

        match db.cancel_seat(&reg.id, &users[0].id).unwrap() {
            CancelOutcome::Cancelled {
                registration,
                seat_released,
            } => {
                assert!(seat_released);
                assert_eq!(registration.status, "cancelled");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(seats(&db, &event.id), 2);

        match db.cancel_seat(&reg.id, &users[0].id).unwrap() {
            CancelOutcome::Cancelled { seat_released, .. } => assert!(!seat_released),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(seats(&db, &event.id), 2);
        assert!(db.get_attendees_for_events(&[event.id.clone()]).unwrap().is_empty());
        assert_consistent(&db, &event.id);
    }

    #[test]
    fn cancel_checks_existence_then_ownership() {
        let (db, event, users) = setup(2);
        let (reg, _) = registered(db.register_seat(&users[0].id, &event.id).unwrap());

        let missing = db.cancel_seat(&Uuid::new_v4().to_string(), &users[0].id).unwrap();
        assert!(matches!(missing, CancelOutcome::NotFound));

        let foreign = db.cancel_seat(&reg.id, &users[1].id).unwrap();
        assert!(matches!(foreign, CancelOutcome::NotOwner));
        assert_eq!(seats(&db, &event.id), 1);
    }

    #[test]
    fn cancel_tolerates_a_missing_event() {
        let (db, event, users) = setup(2);
        let (reg, _) = registered(db.register_seat(&users[0].id, &event.id).unwrap());

        // Drop only the event row, leaving the registration orphaned.
        db.with_conn_mut(|conn| {
            conn.execute("DELETE FROM events WHERE id = ?1", [&event.id])?;
            Ok(())
        })
        .unwrap();

        match db.cancel_seat(&reg.id, &users[0].id).unwrap() {
            CancelOutcome::Cancelled {
                registration,
                seat_released,
            } => {
                assert_eq!(registration.status, "cancelled");
                assert!(!seat_released);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn delete_cascade_removes_registrations() {
        let (db, event, users) = setup(3);
        let (reg, _) = registered(db.register_seat(&users[0].id, &event.id).unwrap());
        registered(db.register_seat(&users[1].id, &event.id).unwrap());

        assert_eq!(db.delete_event_cascade(&event.id).unwrap(), Some(2));
        assert!(db.get_event(&event.id).unwrap().is_none());
        assert!(db.get_registration(&reg.id).unwrap().is_none());
        assert_eq!(db.list_all_registrations().unwrap().len(), 0);

        assert_eq!(db.delete_event_cascade(&event.id).unwrap(), None);
    }

    #[test]
    fn capacity_change_rescales_against_confirmed_count() {
        let (db, event, users) = setup(3);
        for u in &users {
            registered(db.register_seat(&u.id, &event.id).unwrap());
        }
        assert_eq!(seats(&db, &event.id), 0);

        let grown = db
            .update_event(&event.id, &EventPatch { capacity: Some(5), ..Default::default() })
            .unwrap()
            .unwrap();
        assert_eq!((grown.capacity, grown.available_seats), (5, 2));

        let shrunk = db
            .update_event(&event.id, &EventPatch { capacity: Some(2), ..Default::default() })
            .unwrap()
            .unwrap();
        assert_eq!((shrunk.capacity, shrunk.available_seats), (2, 0));
        assert_eq!(db.count_confirmed(&event.id).unwrap(), 3);

        let outcome = db.register_seat(&users[0].id, &event.id).unwrap();
        assert!(matches!(outcome, RegisterOutcome::AlreadyRegistered));
    }

    #[test]
    fn patch_updates_only_given_fields() {
        let (db, event, _users) = setup(3);
        let updated = db
            .update_event(
                &event.id,
                &EventPatch {
                    name: Some("Advanced Workshop".into()),
                    category: Some(Category::Business),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Advanced Workshop");
        assert_eq!(updated.category, "Business");
        assert_eq!(updated.location, event.location);
        assert_eq!(updated.capacity, 3);

        assert!(db
            .update_event(&Uuid::new_v4().to_string(), &EventPatch::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn two_seat_scenario() {
        let (db, event, users) = setup(2);
        let (a, _) = registered(db.register_seat(&users[0].id, &event.id).unwrap());
        assert_eq!(seats(&db, &event.id), 1);
        registered(db.register_seat(&users[1].id, &event.id).unwrap());
        assert_eq!(seats(&db, &event.id), 0);

        let c = db.register_seat(&users[2].id, &event.id).unwrap();
        assert!(matches!(c, RegisterOutcome::FullyBooked));
        assert_eq!(seats(&db, &event.id), 0);

        db.cancel_seat(&a.id, &users[0].id).unwrap();
        assert_eq!(seats(&db, &event.id), 1);

        registered(db.register_seat(&users[2].id, &event.id).unwrap());
        assert_eq!(seats(&db, &event.id), 0);
        assert_consistent(&db, &event.id);
    }
}
