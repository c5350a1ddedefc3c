//! Demo data loader. `campus-seed` wipes the database and loads the sample
//! accounts and events; `campus-seed -d` only wipes it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use campus_api::auth::hash_password;
use campus_db::Database;
use campus_db::models::NewEvent;
use campus_types::models::Category;

const DEMO_PASSWORD: &str = "password123";
const CAMPUS: &str = "PEC Campus, Kuntloor, Abdullapurmet";
const FOOTER: &str =
    "All staff members and students are requested to extend their full coordination and support.";

const FACULTY: &[&str] = &[
    "K Dhanunjaya Rao",
    "Y Pavan Kumar Gupta",
    "Dr D Ramya",
    "Dr Sai Hareesh",
    "Dr V Sridhar",
];

struct SeedEvent {
    name: &'static str,
    description: String,
    location: &'static str,
    /// Local campus time (IST).
    date: &'static str,
    category: Category,
    capacity: u32,
    /// Index into [`FACULTY`].
    organizer: usize,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus=info".into()),
        )
        .init();

    let db_path: PathBuf = std::env::var("CAMPUS_DB_PATH")
        .unwrap_or_else(|_| "campus.db".into())
        .into();
    let db = Database::open(&db_path)?;

    db.clear_all()?;
    info!("Data destroyed");

    if std::env::args().nth(1).as_deref() == Some("-d") {
        return Ok(());
    }

    let hash = hash_password(DEMO_PASSWORD)?;

    let mut faculty_ids: Vec<Uuid> = Vec::with_capacity(FACULTY.len());
    for (i, name) in FACULTY.iter().enumerate() {
        // The first convenor doubles as the admin account.
        let row = db.create_user(name, &format!("user{}@pec.edu.in", i + 1), &hash, i == 0)?;
        faculty_ids.push(row.id.parse()?);
    }
    db.create_user("Test Student", "student@pec.edu.in", &hash, false)?;
    info!("Users created");

    let events = demo_events();
    for event in &events {
        db.create_event(&NewEvent {
            name: event.name.to_string(),
            description: event.description.clone(),
            location: event.location.to_string(),
            date: ist(event.date)?,
            category: event.category,
            capacity: event.capacity,
            organizer_id: faculty_ids[event.organizer],
        })?;
    }
    info!(events = events.len(), "Data imported");

    println!("\nTest accounts:");
    println!("  Faculty (admin): user1@pec.edu.in / {}", DEMO_PASSWORD);
    println!("  Student:         student@pec.edu.in / {}", DEMO_PASSWORD);

    Ok(())
}

fn ist(local: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(&format!("{}+05:30", local))
        .with_context(|| format!("bad seed date '{}'", local))?;
    Ok(ts.with_timezone(&Utc))
}

fn fest(summary: &str, convenors: &str) -> String {
    format!("{}\n\n{}\n\n{}", summary, convenors, FOOTER)
}

fn demo_events() -> Vec<SeedEvent> {
    vec![
        SeedEvent {
            name: "PEC Sports Fest 2026 - Day 1",
            description: fest(
                "Annual Sports Fest at Pallavi Engineering College. Day 1 features cricket, volleyball, and athletics events. All departments are encouraged to participate.",
                "Convenor: K Dhanunjaya Rao\nCo-Convenor: Dr V Sridhar",
            ),
            location: CAMPUS,
            date: "2026-03-23T09:00:00",
            category: Category::Sports,
            capacity: 500,
            organizer: 0,
        },
        SeedEvent {
            name: "PEC Sports Fest 2026 - Day 2",
            description: fest(
                "Annual Sports Fest at Pallavi Engineering College. Day 2 features basketball, badminton, kabaddi, and prize distribution ceremony.",
                "Convenor: K Dhanunjaya Rao\nCo-Convenor: Dr V Sridhar",
            ),
            location: CAMPUS,
            date: "2026-03-24T09:00:00",
            category: Category::Sports,
            capacity: 500,
            organizer: 0,
        },
        SeedEvent {
            name: "PEC Technical Fest 2026 - Day 1",
            description: fest(
                "Annual Technical Fest at Pallavi Engineering College. Day 1 features coding competitions, hackathon kickoff, paper presentations, and technical quiz.",
                "Convenor: Y Pavan Kumar Gupta\nCo-Convenors: M Ravi, Dr B Sathish",
            ),
            location: CAMPUS,
            date: "2026-03-25T09:00:00",
            category: Category::Tech,
            capacity: 300,
            organizer: 1,
        },
        SeedEvent {
            name: "PEC Technical Fest 2026 - Day 2",
            description: fest(
                "Annual Technical Fest at Pallavi Engineering College. Day 2 features hackathon finals, robotics showcase, project exhibition, and valedictory ceremony.",
                "Convenor: Y Pavan Kumar Gupta\nCo-Convenors: M Ravi, Dr B Sathish",
            ),
            location: CAMPUS,
            date: "2026-03-27T09:00:00",
            category: Category::Tech,
            capacity: 300,
            organizer: 1,
        },
        SeedEvent {
            name: "PEC Cultural Fest 2026",
            description: fest(
                "Annual Cultural Fest at Pallavi Engineering College. Features dance performances, singing competitions, fashion show, drama, and art exhibitions.",
                "Convenor: Dr D Ramya",
            ),
            location: CAMPUS,
            date: "2026-03-27T14:00:00",
            category: Category::Music,
            capacity: 600,
            organizer: 2,
        },
        SeedEvent {
            name: "PEC Annual Day 2026",
            description: fest(
                "Annual Day celebration at Pallavi Engineering College. Features chief guest address, student achievements recognition, cultural performances, and awards ceremony for AY 2025-2026.",
                "Convenor: Dr Sai Hareesh\nCo-Convenor: D Navya",
            ),
            location: CAMPUS,
            date: "2026-03-28T10:00:00",
            category: Category::Other,
            capacity: 1000,
            organizer: 3,
        },
        SeedEvent {
            name: "AI & ML Workshop",
            description: "Hands-on workshop on Artificial Intelligence and Machine Learning. Learn about neural networks, deep learning, and real-world AI applications.\n\nOrganized by CSE (AIML) Department.".into(),
            location: "PEC Campus, Seminar Hall - Block A",
            date: "2026-04-05T10:00:00",
            category: Category::Tech,
            capacity: 60,
            organizer: 4,
        },
        SeedEvent {
            name: "Web Development Bootcamp",
            description: "Full-stack web development bootcamp. Build a real-world project in one day!\n\nOrganized by CSE Department.".into(),
            location: "PEC Campus, Computer Lab - Block B",
            date: "2026-04-10T09:00:00",
            category: Category::Tech,
            capacity: 40,
            organizer: 1,
        },
        SeedEvent {
            name: "Inter-College Cricket Tournament",
            description: "Inter-college cricket tournament featuring teams from colleges across Telangana. Knockout format with semifinals and finals.".into(),
            location: "PEC Cricket Ground, Kuntloor",
            date: "2026-04-15T08:00:00",
            category: Category::Sports,
            capacity: 200,
            organizer: 0,
        },
        SeedEvent {
            name: "Startup Idea Pitch",
            description: "Present your startup ideas to a panel of industry experts and investors. Top 3 ideas will receive mentorship and incubation support from PEC Entrepreneurship Cell.".into(),
            location: "PEC Campus, Auditorium",
            date: "2026-04-20T10:00:00",
            category: Category::Business,
            capacity: 80,
            organizer: 3,
        },
        SeedEvent {
            name: "Cybersecurity Awareness Seminar",
            description: "Learn about cyber threats, ethical hacking, secure coding practices, and how to protect your digital identity. Guest speaker from the IT industry.".into(),
            location: "PEC Campus, Seminar Hall - Block C",
            date: "2026-04-25T11:00:00",
            category: Category::Tech,
            capacity: 100,
            organizer: 4,
        },
        SeedEvent {
            name: "Music Night",
            description: "An evening of live music performances by PEC students and guest bands. Genres include rock, classical, and Bollywood hits.".into(),
            location: "PEC Campus, Open Air Amphitheatre",
            date: "2026-03-26T18:00:00",
            category: Category::Music,
            capacity: 400,
            organizer: 2,
        },
        // Already in the past, for exercising date filters.
        SeedEvent {
            name: "Orientation Day 2025",
            description: "Orientation day for new batch of engineering students. Welcome address by the Principal, department introductions, and campus tour.".into(),
            location: "PEC Campus, Main Auditorium",
            date: "2025-08-01T10:00:00",
            category: Category::Other,
            capacity: 800,
            organizer: 3,
        },
    ]
}
