use std::collections::HashMap;

use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::warn;
use uuid::Uuid;

use campus_types::models::Event;

use crate::Database;
use crate::models::{
    EventFilter, EventRow, EventSummaryRow, NewEvent, RegistrationDetailRow, RegistrationRow,
    UserRow, UserSummaryRow, format_ts, now_ts,
};

const USER_COLUMNS: &str = "id, name, email, password, is_admin, created_at";

const EVENT_COLUMNS: &str = "id, name, description, location, date, category, capacity, \
     available_seats, organizer_id, created_at, updated_at";

const REGISTRATION_COLUMNS: &str = "id, user_id, event_id, status, created_at, updated_at";

/// Aggregate counts for the admin dashboard.
#[derive(Debug, Clone, Default)]
pub struct StatsRow {
    pub total_events: i64,
    pub total_users: i64,
    pub total_registrations: i64,
    pub active_registrations: i64,
    /// (category, event count), largest first.
    pub category_counts: Vec<(String, i64)>,
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<UserRow> {
        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password: password_hash.to_string(),
            is_admin,
            created_at: now_ts(),
        };
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    row.id,
                    row.name,
                    row.email,
                    row.password,
                    row.is_admin,
                    row.created_at
                ],
            )?;
            Ok(())
        })?;
        Ok(row)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
            Ok(conn.query_row(&sql, [email], map_user).optional()?)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], map_user).optional()?)
        })
    }

    /// All users, newest first.
    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Events --

    pub fn create_event(&self, new: &NewEvent) -> Result<EventRow> {
        self.with_conn_mut(|conn| insert_event(conn, new))
    }

    pub fn get_event(&self, id: &str) -> Result<Option<EventRow>> {
        self.with_conn(|conn| query_event(conn, id))
    }

    pub fn get_event_with_organizer(
        &self,
        id: &str,
    ) -> Result<Option<(EventRow, Option<UserSummaryRow>)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT e.id, e.name, e.description, e.location, e.date, e.category, e.capacity,
                        e.available_seats, e.organizer_id, e.created_at, e.updated_at,
                        u.id, u.name, u.email
                 FROM events e
                 LEFT JOIN users u ON e.organizer_id = u.id
                 WHERE e.id = ?1",
            )?;
            let row = stmt.query_row([id], map_event_with_organizer).optional()?;
            Ok(row)
        })
    }

    /// One page of events matching `filter`, ordered by date, plus the total
    /// number of matches across all pages.
    pub fn list_events(
        &self,
        filter: &EventFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<EventRow>, u64)> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(search) = &filter.search {
            clauses.push("instr(lower(name), lower(?)) > 0");
            params.push(Box::new(search.clone()));
        }
        if let Some(category) = filter.category {
            clauses.push("category = ?");
            params.push(Box::new(category.as_str()));
        }
        if let Some(location) = &filter.location {
            clauses.push("instr(lower(location), lower(?)) > 0");
            params.push(Box::new(location.clone()));
        }
        if let Some(start) = &filter.start_date {
            clauses.push("date >= ?");
            params.push(Box::new(format_ts(start)));
        }
        if let Some(end) = &filter.end_date {
            clauses.push("date <= ?");
            params.push(Box::new(format_ts(end)));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM events {where_sql}"),
                rusqlite::params_from_iter(params.iter()),
                |r| r.get(0),
            )?;

            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM events {where_sql}
                 ORDER BY date ASC, id ASC
                 LIMIT {} OFFSET {}",
                limit,
                i64::try_from(offset).unwrap_or(i64::MAX)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), map_event)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, u64::try_from(total).unwrap_or_default()))
        })
    }

    /// Every event with its organizer, date ascending.
    pub fn list_all_events(&self) -> Result<Vec<(EventRow, Option<UserSummaryRow>)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT e.id, e.name, e.description, e.location, e.date, e.category, e.capacity,
                        e.available_seats, e.organizer_id, e.created_at, e.updated_at,
                        u.id, u.name, u.email
                 FROM events e
                 LEFT JOIN users u ON e.organizer_id = u.id
                 ORDER BY e.date ASC, e.id ASC",
            )?;
            let rows = stmt
                .query_map([], map_event_with_organizer)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch the registered-user sets for a set of event IDs.
    /// Returns (event_id, user_id) pairs.
    pub fn get_attendees_for_events(&self, event_ids: &[String]) -> Result<Vec<(String, String)>> {
        self.with_conn(|conn| query_attendees(conn, event_ids))
    }

    /// Convert event rows into API models, filling in each event's
    /// registered-user set with a single batched query.
    pub fn hydrate_events(&self, rows: Vec<EventRow>) -> Result<Vec<Event>> {
        self.with_conn(|conn| hydrate_events(conn, rows))
    }

    pub fn hydrate_event(&self, row: EventRow) -> Result<Event> {
        self.with_conn(|conn| hydrate_event(conn, row))
    }

    // -- Registrations --

    pub fn get_registration(&self, id: &str) -> Result<Option<RegistrationRow>> {
        self.with_conn(|conn| query_registration(conn, id))
    }

    /// A user's registrations in both states, newest first, with event
    /// summaries where the event still exists.
    pub fn get_registrations_for_user(&self, user_id: &str) -> Result<Vec<RegistrationDetailRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.user_id, r.event_id, r.status, r.created_at, r.updated_at,
                        NULL, NULL, NULL,
                        e.id, e.name, e.description, e.location, e.date, e.category
                 FROM registrations r
                 LEFT JOIN events e ON r.event_id = e.id
                 WHERE r.user_id = ?1
                 ORDER BY r.created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_registration_detail)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every registration with user and event summaries, newest first.
    pub fn list_all_registrations(&self) -> Result<Vec<RegistrationDetailRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.user_id, r.event_id, r.status, r.created_at, r.updated_at,
                        u.id, u.name, u.email,
                        e.id, e.name, e.description, e.location, e.date, e.category
                 FROM registrations r
                 LEFT JOIN users u ON r.user_id = u.id
                 LEFT JOIN events e ON r.event_id = e.id
                 ORDER BY r.created_at DESC",
            )?;
            let rows = stmt
                .query_map([], map_registration_detail)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_confirmed(&self, event_id: &str) -> Result<u64> {
        self.with_conn(|conn| count_confirmed(conn, event_id))
    }

    // -- Admin --

    pub fn stats(&self) -> Result<StatsRow> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

            let mut stmt = conn.prepare(
                "SELECT category, COUNT(*) AS n FROM events
                 GROUP BY category
                 ORDER BY n DESC, category ASC",
            )?;
            let category_counts = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(StatsRow {
                total_events: count("SELECT COUNT(*) FROM events")?,
                total_users: count("SELECT COUNT(*) FROM users")?,
                total_registrations: count("SELECT COUNT(*) FROM registrations")?,
                active_registrations: count(
                    "SELECT COUNT(*) FROM registrations WHERE status = 'confirmed'",
                )?,
                category_counts,
            })
        })
    }

    /// Wipes every table. Used by the seeder before loading demo data.
    pub fn clear_all(&self) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(
                "DELETE FROM event_attendees;
                 DELETE FROM registrations;
                 DELETE FROM events;
                 DELETE FROM users;",
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}

pub fn insert_event(conn: &Connection, new: &NewEvent) -> Result<EventRow> {
    let now = now_ts();
    let row = EventRow {
        id: Uuid::new_v4().to_string(),
        name: new.name.clone(),
        description: new.description.clone(),
        location: new.location.clone(),
        date: format_ts(&new.date),
        category: new.category.as_str().to_string(),
        capacity: i64::from(new.capacity),
        available_seats: i64::from(new.capacity),
        organizer_id: new.organizer_id.to_string(),
        created_at: now.clone(),
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO events (id, name, description, location, date, category, capacity,
                             available_seats, organizer_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            row.id,
            row.name,
            row.description,
            row.location,
            row.date,
            row.category,
            row.capacity,
            row.available_seats,
            row.organizer_id,
            row.created_at,
            row.updated_at
        ],
    )?;
    Ok(row)
}

pub fn hydrate_events(conn: &Connection, rows: Vec<EventRow>) -> Result<Vec<Event>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut attendees: HashMap<String, Vec<Uuid>> = HashMap::new();
    for (event_id, user_id) in query_attendees(conn, &ids)? {
        match user_id.parse::<Uuid>() {
            Ok(uid) => attendees.entry(event_id).or_default().push(uid),
            Err(e) => warn!("Corrupt attendee '{}' on event '{}': {}", user_id, event_id, e),
        }
    }

    rows.into_iter()
        .map(|row| {
            let users = attendees.remove(&row.id).unwrap_or_default();
            row.into_event(users)
        })
        .collect()
}

pub fn hydrate_event(conn: &Connection, row: EventRow) -> Result<Event> {
    hydrate_events(conn, vec![row])?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("event disappeared during hydration"))
}

fn query_attendees(conn: &Connection, event_ids: &[String]) -> Result<Vec<(String, String)>> {
    if event_ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=event_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT event_id, user_id FROM event_attendees
         WHERE event_id IN ({})
         ORDER BY event_id, user_id",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(event_ids.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn query_event(conn: &Connection, id: &str) -> Result<Option<EventRow>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], map_event).optional()?)
}

pub(crate) fn query_registration(conn: &Connection, id: &str) -> Result<Option<RegistrationRow>> {
    let sql = format!("SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], map_registration).optional()?)
}

pub(crate) fn query_registration_by_pair(
    conn: &Connection,
    user_id: &str,
    event_id: &str,
) -> Result<Option<RegistrationRow>> {
    let sql = format!(
        "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE user_id = ?1 AND event_id = ?2"
    );
    Ok(conn
        .query_row(&sql, [user_id, event_id], map_registration)
        .optional()?)
}

pub(crate) fn count_confirmed(conn: &Connection, event_id: &str) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM registrations WHERE event_id = ?1 AND status = 'confirmed'",
        [event_id],
        |r| r.get(0),
    )?;
    Ok(u64::try_from(n).unwrap_or_default())
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_event(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        date: row.get(4)?,
        category: row.get(5)?,
        capacity: row.get(6)?,
        available_seats: row.get(7)?,
        organizer_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_event_with_organizer(
    row: &Row<'_>,
) -> rusqlite::Result<(EventRow, Option<UserSummaryRow>)> {
    let event = map_event(row)?;
    let organizer = match row.get::<_, Option<String>>(11)? {
        Some(id) => Some(UserSummaryRow {
            id,
            name: row.get(12)?,
            email: row.get(13)?,
        }),
        None => None,
    };
    Ok((event, organizer))
}

fn map_registration(row: &Row<'_>) -> rusqlite::Result<RegistrationRow> {
    Ok(RegistrationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        event_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Columns 0-5 registration, 6-8 user summary, 9-14 event summary. The
/// joined halves are NULL when the referenced row is missing.
fn map_registration_detail(row: &Row<'_>) -> rusqlite::Result<RegistrationDetailRow> {
    let registration = map_registration(row)?;
    let user = match row.get::<_, Option<String>>(6)? {
        Some(id) => Some(UserSummaryRow {
            id,
            name: row.get(7)?,
            email: row.get(8)?,
        }),
        None => None,
    };
    let event = match row.get::<_, Option<String>>(9)? {
        Some(id) => Some(EventSummaryRow {
            id,
            name: row.get(10)?,
            description: row.get(11)?,
            location: row.get(12)?,
            date: row.get(13)?,
            category: row.get(14)?,
        }),
        None => None,
    };
    Ok(RegistrationDetailRow {
        registration,
        user,
        event,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_types::models::Category;
    use chrono::{TimeZone, Utc};

    fn new_event(organizer: &UserRow, name: &str, category: Category, day: u32) -> NewEvent {
        NewEvent {
            name: name.into(),
            description: "desc".into(),
            location: "PEC Campus, Main Auditorium".into(),
            date: Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap(),
            category,
            capacity: 10,
            organizer_id: organizer.id.parse().unwrap(),
        }
    }

    #[test]
    fn create_event_starts_with_full_availability() {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_user("Org", "org@pec.edu.in", "hash", true).unwrap();
        let event = db
            .create_event(&new_event(&org, "Hackathon", Category::Tech, 25))
            .unwrap();

        assert_eq!(event.capacity, 10);
        assert_eq!(event.available_seats, 10);

        let (stored, organizer) = db.get_event_with_organizer(&event.id).unwrap().unwrap();
        assert_eq!(stored.name, "Hackathon");
        assert_eq!(organizer.unwrap().email, "org@pec.edu.in");
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("A", "same@pec.edu.in", "hash", false).unwrap();
        assert!(db.create_user("B", "same@pec.edu.in", "hash", false).is_err());
    }

    #[test]
    fn list_events_filters_and_paginates() {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_user("Org", "org@pec.edu.in", "hash", true).unwrap();
        db.create_event(&new_event(&org, "Sports Fest Day 2", Category::Sports, 24)).unwrap();
        db.create_event(&new_event(&org, "Sports Fest Day 1", Category::Sports, 23)).unwrap();
        db.create_event(&new_event(&org, "Technical Fest", Category::Tech, 25)).unwrap();
        db.create_event(&new_event(&org, "Cultural Night", Category::Music, 27)).unwrap();

        let (all, total) = db.list_events(&EventFilter::default(), 10, 0).unwrap();
        assert_eq!(total, 4);
        let names: Vec<_> = all.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            ["Sports Fest Day 1", "Sports Fest Day 2", "Technical Fest", "Cultural Night"]
        );

        let search = EventFilter {
            search: Some("FEST".into()),
            ..Default::default()
        };
        let (page, total) = db.list_events(&search, 2, 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Technical Fest");

        let sports_in_range = EventFilter {
            category: Some(Category::Sports),
            start_date: Some(Utc.with_ymd_and_hms(2026, 3, 24, 0, 0, 0).unwrap()),
            end_date: Some(Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        let (rows, total) = db.list_events(&sports_in_range, 10, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].name, "Sports Fest Day 2");

        let by_location = EventFilter {
            location: Some("auditorium".into()),
            ..Default::default()
        };
        assert_eq!(db.list_events(&by_location, 10, 0).unwrap().1, 4);
    }

    #[test]
    fn stats_group_events_by_category() {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_user("Org", "org@pec.edu.in", "hash", true).unwrap();
        db.create_event(&new_event(&org, "A", Category::Sports, 23)).unwrap();
        db.create_event(&new_event(&org, "B", Category::Sports, 24)).unwrap();
        db.create_event(&new_event(&org, "C", Category::Tech, 25)).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_registrations, 0);
        assert_eq!(
            stats.category_counts,
            vec![("Sports".to_string(), 2), ("Tech".to_string(), 1)]
        );
    }

    #[test]
    fn clear_all_empties_every_table() {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_user("Org", "org@pec.edu.in", "hash", true).unwrap();
        db.create_event(&new_event(&org, "A", Category::Other, 23)).unwrap();

        db.clear_all().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.total_users, 0);
    }
}
