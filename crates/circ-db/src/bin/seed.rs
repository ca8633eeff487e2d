//! # Seed Data Generator
//!
//! Populates the database with demo books and members for development.
//!
//! ## Usage
//! ```bash
//! # Seed with defaults
//! cargo run -p circ-db --bin seed
//!
//! # Specify database path and copy count scale
//! cargo run -p circ-db --bin seed -- --db ./data/circulate.db --copies 4
//! ```

use chrono::Utc;
use std::env;
use tracing::info;
use uuid::Uuid;

use circ_core::{Book, Member};
use circ_db::{Database, DbConfig};

/// Demo catalog: (title, author, category)
const CATALOG: &[(&str, &str, &str)] = &[
    ("The Left Hand of Darkness", "Ursula K. Le Guin", "fiction"),
    ("A Wizard of Earthsea", "Ursula K. Le Guin", "fiction"),
    ("The Dispossessed", "Ursula K. Le Guin", "fiction"),
    ("Dune", "Frank Herbert", "fiction"),
    ("Foundation", "Isaac Asimov", "fiction"),
    ("The Caves of Steel", "Isaac Asimov", "fiction"),
    ("Gödel, Escher, Bach", "Douglas Hofstadter", "nonfiction"),
    ("The Design of Everyday Things", "Don Norman", "nonfiction"),
    ("Thinking, Fast and Slow", "Daniel Kahneman", "nonfiction"),
    ("The Pragmatic Programmer", "Hunt & Thomas", "technical"),
    ("Structure and Interpretation of Computer Programs", "Abelson & Sussman", "technical"),
    ("The C Programming Language", "Kernighan & Ritchie", "technical"),
    ("Designing Data-Intensive Applications", "Martin Kleppmann", "technical"),
    ("Refactoring", "Martin Fowler", "technical"),
    ("A Pattern Language", "Christopher Alexander", "reference"),
];

/// Demo members: (name, email)
const MEMBERS: &[(&str, &str)] = &[
    ("Asha Patel", "asha@example.com"),
    ("Jordan Lee", "jordan@example.com"),
    ("Sam Okafor", "sam@example.com"),
    ("Riley Chen", "riley@example.com"),
    ("Noa Cohen", "noa@example.com"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./circulate_dev.db");
    let mut copies: i64 = 3;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--copies" | "-c" => {
                if i + 1 < args.len() {
                    copies = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Circulate Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./circulate_dev.db)");
                println!("  -c, --copies <N>     Copies per title (default: 3)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db_path = %db_path, "seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    // Make sure the settings row exists with defaults
    let settings = db.settings().get_or_create().await?;
    info!(library = %settings.library_name, "settings ready");

    let now = Utc::now();

    for (index, (title, author, category)) in CATALOG.iter().enumerate() {
        // Vary the copy counts a little so availability is interesting
        let total = copies + (index as i64 % 3);
        let book = Book {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            author: author.to_string(),
            category: category.to_string(),
            isbn: None,
            total_copies: total,
            copies_available: total,
            created_at: now,
            updated_at: now,
        };
        db.books().insert(&book).await?;
    }
    info!(count = CATALOG.len(), "books seeded");

    for (name, email) in MEMBERS {
        let member = Member {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            contact: None,
            active: true,
            created_at: now,
        };
        db.members().insert(&member).await?;
    }
    info!(count = MEMBERS.len(), "members seeded");

    db.close().await;
    Ok(())
}
