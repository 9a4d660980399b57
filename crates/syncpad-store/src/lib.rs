//! SQLite persistence for the shared page, project cards, and events
//!
//! A single connection behind `Arc<Mutex<..>>`; every call hops onto the
//! blocking pool so the async handlers never hold the lock across an await.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, info, warn};

use syncpad_core::records::{
    CalendarEvent, EventCreate, EventUpdate, PageData, PageDataUpdate, ProjectCard,
    ProjectCardCreate, ProjectCardUpdate,
};

const PAGE_COLUMNS: &str =
    "id, main_title, main_subtitle, content, modified_by, background_image, partner_logo, \
     created_at, updated_at";

const CARD_COLUMNS: &str =
    "id, title, description, image, formatting, position, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, name, date_time, location, event_type, created_at, updated_at";

/// Which image slot on the page to write
#[derive(Debug, Clone, Copy)]
pub enum PageImage {
    Background,
    PartnerLogo,
}

impl PageImage {
    fn column(self) -> &'static str {
        match self {
            PageImage::Background => "background_image",
            PageImage::PartnerLogo => "partner_logo",
        }
    }
}

/// SQLite database wrapper (thread-safe via Arc<Mutex>)
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| {
        warn!("Database mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Stored JSON columns are parsed leniently: junk becomes an empty object
fn parse_json(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::Object(Default::default()))
}

fn row_to_page(row: &rusqlite::Row<'_>) -> rusqlite::Result<PageData> {
    Ok(PageData {
        id: row.get(0)?,
        main_title: row.get(1)?,
        main_subtitle: row.get(2)?,
        content: parse_json(&row.get::<_, String>(3)?),
        modified_by: row.get(4)?,
        background_image: row.get(5)?,
        partner_logo: row.get(6)?,
        created_at: row.get::<_, String>(7)?.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: row.get::<_, String>(8)?.parse().unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_card(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectCard> {
    Ok(ProjectCard {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        image: row.get(3)?,
        formatting: parse_json(&row.get::<_, String>(4)?),
        position: row.get(5)?,
        created_at: row.get::<_, String>(6)?.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: row.get::<_, String>(7)?.parse().unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        id: row.get(0)?,
        name: row.get(1)?,
        date_time: row.get(2)?,
        location: row.get(3)?,
        event_type: row.get(4)?,
        created_at: row.get::<_, String>(5)?.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: row.get::<_, String>(6)?.parse().unwrap_or_else(|_| Utc::now()),
    })
}

/// The page row is a singleton, created lazily on first access
fn fetch_or_insert_page(conn: &Connection) -> Result<PageData> {
    let existing = conn
        .query_row(
            &format!("SELECT {PAGE_COLUMNS} FROM page_data LIMIT 1"),
            [],
            row_to_page,
        )
        .optional()?;
    if let Some(page) = existing {
        return Ok(page);
    }

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO page_data (main_title, main_subtitle, content, modified_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params!["Syncpad", "Shared notes", "{}", "system", now, now],
    )?;
    debug!("Created singleton page row");

    conn.query_row(
        &format!("SELECT {PAGE_COLUMNS} FROM page_data LIMIT 1"),
        [],
        row_to_page,
    )
    .map_err(Into::into)
}

fn fetch_card(conn: &Connection, id: i64) -> Result<Option<ProjectCard>> {
    conn.query_row(
        &format!("SELECT {CARD_COLUMNS} FROM project_cards WHERE id = ?1"),
        params![id],
        row_to_card,
    )
    .optional()
    .map_err(Into::into)
}

fn fetch_event(conn: &Connection, id: i64) -> Result<Option<CalendarEvent>> {
    conn.query_row(
        &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
        params![id],
        row_to_event,
    )
    .optional()
    .map_err(Into::into)
}

impl Store {
    /// Open (or create) the database at the given path and apply the schema
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create data directory {parent:?}"))?;
            }
        }
        let conn = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        info!("Opening database at {:?}", path.as_ref());
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS page_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                main_title TEXT NOT NULL DEFAULT 'Syncpad',
                main_subtitle TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '{}',
                modified_by TEXT NOT NULL DEFAULT 'system',
                background_image BLOB,
                partner_logo BLOB,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS project_cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                image BLOB,
                formatting TEXT NOT NULL DEFAULT '{}',
                position INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                date_time TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                event_type TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_project_cards_position ON project_cards(position)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type)",
            [],
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Connectivity probe for the health endpoint
    pub async fn ping(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    // ── page data ──────────────────────────────────────────────

    /// Fetch the page document, creating the singleton row on first access
    pub async fn get_or_create_page(&self) -> Result<PageData> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            fetch_or_insert_page(&conn)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Apply a partial update to the page document
    pub async fn update_page(&self, update: PageDataUpdate) -> Result<PageData> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let mut page = fetch_or_insert_page(&conn)?;

            if let Some(title) = update.main_title {
                page.main_title = title;
            }
            if let Some(subtitle) = update.main_subtitle {
                page.main_subtitle = subtitle;
            }
            if let Some(content) = update.content {
                page.content = content;
            }
            if let Some(modified_by) = update.modified_by {
                page.modified_by = modified_by;
            }
            page.updated_at = Utc::now();

            conn.execute(
                "UPDATE page_data
                 SET main_title = ?1, main_subtitle = ?2, content = ?3, modified_by = ?4,
                     updated_at = ?5
                 WHERE id = ?6",
                params![
                    page.main_title,
                    page.main_subtitle,
                    serde_json::to_string(&page.content)?,
                    page.modified_by,
                    page.updated_at.to_rfc3339(),
                    page.id,
                ],
            )?;
            Ok(page)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Replace one of the page's image blobs
    pub async fn set_page_image(&self, image: PageImage, bytes: Vec<u8>) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let page = fetch_or_insert_page(&conn)?;
            conn.execute(
                &format!(
                    "UPDATE page_data SET {} = ?1, updated_at = ?2 WHERE id = ?3",
                    image.column()
                ),
                params![bytes, Utc::now().to_rfc3339(), page.id],
            )?;
            debug!("Stored {} ({} bytes)", image.column(), bytes.len());
            Ok(())
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    // ── project cards ──────────────────────────────────────────

    /// All cards, ordered by position
    pub async fn list_cards(&self) -> Result<Vec<ProjectCard>> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let mut stmt = conn.prepare(&format!(
                "SELECT {CARD_COLUMNS} FROM project_cards ORDER BY position"
            ))?;
            let cards = stmt
                .query_map([], row_to_card)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(cards)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    pub async fn create_card(&self, card: ProjectCardCreate) -> Result<ProjectCard> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO project_cards (title, description, position, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![card.title, card.description, card.position, now, now],
            )?;
            let id = conn.last_insert_rowid();
            debug!("Created card {} ({})", card.title, id);
            fetch_card(&conn, id)?.context("card vanished after insert")
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Partial update; returns None when the card does not exist
    pub async fn update_card(
        &self,
        id: i64,
        update: ProjectCardUpdate,
    ) -> Result<Option<ProjectCard>> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let Some(mut card) = fetch_card(&conn, id)? else {
                return Ok(None);
            };

            if let Some(title) = update.title {
                card.title = title;
            }
            if let Some(description) = update.description {
                card.description = description;
            }
            if let Some(formatting) = update.formatting {
                card.formatting = formatting;
            }
            if let Some(position) = update.position {
                card.position = position;
            }
            card.updated_at = Utc::now();

            conn.execute(
                "UPDATE project_cards
                 SET title = ?1, description = ?2, formatting = ?3, position = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    card.title,
                    card.description,
                    serde_json::to_string(&card.formatting)?,
                    card.position,
                    card.updated_at.to_rfc3339(),
                    id,
                ],
            )?;
            Ok(Some(card))
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Returns false when the card does not exist
    pub async fn delete_card(&self, id: i64) -> Result<bool> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let affected = conn.execute("DELETE FROM project_cards WHERE id = ?1", params![id])?;
            Ok(affected > 0)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Attach an image to a card, creating an empty card under that id if
    /// needed (clients may upload before the card row exists)
    pub async fn set_card_image(&self, id: i64, bytes: Vec<u8>) -> Result<ProjectCard> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let now = Utc::now().to_rfc3339();
            if fetch_card(&conn, id)?.is_none() {
                conn.execute(
                    "INSERT INTO project_cards (id, title, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![id, format!("Project {id}"), now, now],
                )?;
            }
            conn.execute(
                "UPDATE project_cards SET image = ?1, updated_at = ?2 WHERE id = ?3",
                params![bytes, now, id],
            )?;
            fetch_card(&conn, id)?.context("card vanished after image upload")
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Insert placeholder cards on first startup; no-op once any card exists
    pub async fn seed_default_cards(&self) -> Result<usize> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let existing: i64 =
                conn.query_row("SELECT COUNT(*) FROM project_cards", [], |row| row.get(0))?;
            if existing > 0 {
                return Ok(0);
            }
            let now = Utc::now().to_rfc3339();
            for position in 1..=3 {
                conn.execute(
                    "INSERT INTO project_cards (title, description, position, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        format!("Project {position}"),
                        "Add project details",
                        position,
                        now,
                        now
                    ],
                )?;
            }
            info!("Seeded 3 default project cards");
            Ok(3)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    // ── events ─────────────────────────────────────────────────

    /// All events, optionally filtered by type
    pub async fn list_events(&self, event_type: Option<String>) -> Result<Vec<CalendarEvent>> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let events = match event_type {
                Some(kind) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {EVENT_COLUMNS} FROM events WHERE event_type = ?1 ORDER BY id"
                    ))?;
                    stmt.query_map(params![kind], row_to_event)?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let mut stmt = conn
                        .prepare(&format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY id"))?;
                    stmt.query_map([], row_to_event)?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            Ok(events)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    pub async fn create_event(&self, event: EventCreate) -> Result<CalendarEvent> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO events (name, date_time, location, event_type, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.name,
                    event.date_time,
                    event.location,
                    event.event_type,
                    now,
                    now
                ],
            )?;
            let id = conn.last_insert_rowid();
            debug!("Created event {} ({})", event.name, id);
            fetch_event(&conn, id)?.context("event vanished after insert")
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Partial update; returns None when the event does not exist
    pub async fn update_event(
        &self,
        id: i64,
        update: EventUpdate,
    ) -> Result<Option<CalendarEvent>> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let Some(mut event) = fetch_event(&conn, id)? else {
                return Ok(None);
            };

            if let Some(name) = update.name {
                event.name = name;
            }
            if let Some(date_time) = update.date_time {
                event.date_time = date_time;
            }
            if let Some(location) = update.location {
                event.location = location;
            }
            if let Some(event_type) = update.event_type {
                event.event_type = event_type;
            }
            event.updated_at = Utc::now();

            conn.execute(
                "UPDATE events
                 SET name = ?1, date_time = ?2, location = ?3, event_type = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    event.name,
                    event.date_time,
                    event.location,
                    event.event_type,
                    event.updated_at.to_rfc3339(),
                    id,
                ],
            )?;
            Ok(Some(event))
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// Returns false when the event does not exist
    pub async fn delete_event(&self, id: i64) -> Result<bool> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let affected = conn.execute("DELETE FROM events WHERE id = ?1", params![id])?;
            Ok(affected > 0)
        })
        .await
        .context("spawn_blocking task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_page_created_on_first_read() {
        let store = Store::open_in_memory().unwrap();
        let page = store.get_or_create_page().await.unwrap();
        assert_eq!(page.main_title, "Syncpad");
        assert_eq!(page.content, json!({}));

        // Second read returns the same row, not a new one
        let again = store.get_or_create_page().await.unwrap();
        assert_eq!(again.id, page.id);
    }

    #[tokio::test]
    async fn test_page_partial_update() {
        let store = Store::open_in_memory().unwrap();
        let updated = store
            .update_page(PageDataUpdate {
                main_title: Some("Growth plan".to_string()),
                content: Some(json!({"sections": [1, 2]})),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.main_title, "Growth plan");
        assert_eq!(updated.content, json!({"sections": [1, 2]}));
        // Untouched field keeps its default
        assert_eq!(updated.modified_by, "system");
    }

    #[tokio::test]
    async fn test_page_images() {
        let store = Store::open_in_memory().unwrap();
        store
            .set_page_image(PageImage::Background, vec![1, 2, 3])
            .await
            .unwrap();
        store
            .set_page_image(PageImage::PartnerLogo, vec![9])
            .await
            .unwrap();
        let page = store.get_or_create_page().await.unwrap();
        assert_eq!(page.background_image, Some(vec![1, 2, 3]));
        assert_eq!(page.partner_logo, Some(vec![9]));
    }

    #[tokio::test]
    async fn test_card_crud() {
        let store = Store::open_in_memory().unwrap();
        let card = store
            .create_card(ProjectCardCreate {
                title: "Alpha".to_string(),
                description: "First".to_string(),
                position: 2,
            })
            .await
            .unwrap();
        assert_eq!(card.title, "Alpha");

        let updated = store
            .update_card(
                card.id,
                ProjectCardUpdate {
                    description: Some("Revised".to_string()),
                    formatting: Some(json!({"bold": true})),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.description, "Revised");
        assert_eq!(updated.formatting, json!({"bold": true}));
        assert_eq!(updated.title, "Alpha");

        assert!(store.delete_card(card.id).await.unwrap());
        assert!(!store.delete_card(card.id).await.unwrap());
        assert!(store.update_card(card.id, Default::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cards_ordered_by_position() {
        let store = Store::open_in_memory().unwrap();
        for (title, position) in [("Last", 9), ("First", 1), ("Middle", 5)] {
            store
                .create_card(ProjectCardCreate {
                    title: title.to_string(),
                    description: String::new(),
                    position,
                })
                .await
                .unwrap();
        }
        let titles: Vec<String> = store
            .list_cards()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, ["First", "Middle", "Last"]);
    }

    #[tokio::test]
    async fn test_card_image_creates_missing_card() {
        let store = Store::open_in_memory().unwrap();
        let card = store.set_card_image(7, vec![0xde, 0xad]).await.unwrap();
        assert_eq!(card.id, 7);
        assert_eq!(card.image, Some(vec![0xde, 0xad]));
    }

    #[tokio::test]
    async fn test_seed_runs_once() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.seed_default_cards().await.unwrap(), 3);
        assert_eq!(store.seed_default_cards().await.unwrap(), 0);
        assert_eq!(store.list_cards().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_event_crud_and_filter() {
        let store = Store::open_in_memory().unwrap();
        for (name, kind) in [("Meet", "sportsplex"), ("Recital", "school")] {
            store
                .create_event(EventCreate {
                    name: name.to_string(),
                    date_time: "2025-06-01".to_string(),
                    location: "Hall".to_string(),
                    event_type: kind.to_string(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.list_events(None).await.unwrap().len(), 2);
        let school = store
            .list_events(Some("school".to_string()))
            .await
            .unwrap();
        assert_eq!(school.len(), 1);
        assert_eq!(school[0].name, "Recital");

        let updated = store
            .update_event(
                school[0].id,
                EventUpdate {
                    location: Some("Gym".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.location, "Gym");

        assert!(store.delete_event(updated.id).await.unwrap());
        assert!(store.update_event(updated.id, Default::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let store = Store::open_in_memory().unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syncpad.db");
        {
            let store = Store::open(&path).unwrap();
            store.seed_default_cards().await.unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.list_cards().await.unwrap().len(), 3);
    }
}
