//! syncpad-core — configuration and domain records shared across crates

pub mod config;
pub mod records;

pub use config::{Config, DatabaseConfig, ServerConfig};
pub use records::{
    CalendarEvent, EventCreate, EventUpdate, PageData, PageDataUpdate, ProjectCard,
    ProjectCardCreate, ProjectCardUpdate,
};
