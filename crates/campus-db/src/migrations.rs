use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                is_admin    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE events (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                description     TEXT NOT NULL,
                location        TEXT NOT NULL,
                date            TEXT NOT NULL,
                category        TEXT NOT NULL
                    CHECK (category IN ('Tech', 'Sports', 'Music', 'Business', 'Other')),
                capacity        INTEGER NOT NULL CHECK (capacity >= 1),
                available_seats INTEGER NOT NULL
                    CHECK (available_seats >= 0 AND available_seats <= capacity),
                organizer_id    TEXT NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_events_category_date ON events(category, date);
            CREATE INDEX idx_events_date ON events(date);
            CREATE INDEX idx_events_location ON events(location);

            -- No foreign key on event_id: cancellation must cope with a
            -- registration whose event row is already gone.
            CREATE TABLE registrations (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                event_id    TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'confirmed'
                    CHECK (status IN ('confirmed', 'cancelled')),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                UNIQUE(user_id, event_id)
            );

            CREATE INDEX idx_registrations_event ON registrations(event_id, status);

            CREATE TABLE event_attendees (
                event_id    TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                PRIMARY KEY (event_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
