//! Domain records: the shared page, project cards, and events
//!
//! Update structs carry `Option` fields so PUT handlers can apply partial
//! updates; `None` leaves the stored value untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The single shared page document
#[derive(Debug, Clone)]
pub struct PageData {
    pub id: i64,
    pub main_title: String,
    pub main_subtitle: String,
    /// Rich content blob, preserved verbatim
    pub content: Value,
    pub modified_by: String,
    pub background_image: Option<Vec<u8>>,
    pub partner_logo: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for the page document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageDataUpdate {
    pub main_title: Option<String>,
    pub main_subtitle: Option<String>,
    pub content: Option<Value>,
    pub modified_by: Option<String>,
}

/// One project card on the page
#[derive(Debug, Clone)]
pub struct ProjectCard {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image: Option<Vec<u8>>,
    /// Per-card text formatting, preserved verbatim
    pub formatting: Value,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a project card
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectCardCreate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "order")]
    pub position: i64,
}

/// Partial update for a project card
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectCardUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub formatting: Option<Value>,
    #[serde(rename = "order")]
    pub position: Option<i64>,
}

/// A scheduled event shown on the page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: i64,
    pub name: String,
    pub date_time: String,
    pub location: String,
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating an event
#[derive(Debug, Clone, Deserialize)]
pub struct EventCreate {
    pub name: String,
    pub date_time: String,
    pub location: String,
    pub event_type: String,
}

/// Partial update for an event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventUpdate {
    pub name: Option<String>,
    pub date_time: Option<String>,
    pub location: Option<String>,
    pub event_type: Option<String>,
}
