//! REST API handlers for page data, project cards, and events

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use syncpad_core::records::{
    CalendarEvent, EventCreate, EventUpdate, PageData, PageDataUpdate, ProjectCard,
    ProjectCardCreate, ProjectCardUpdate,
};
use syncpad_store::PageImage;

use crate::error::GatewayError;
use crate::state::AppState;

/// Page document as served over HTTP; image blobs travel base64-encoded
#[derive(Debug, Serialize, Deserialize)]
pub struct PageDataResponse {
    pub id: i64,
    pub main_title: String,
    pub main_subtitle: String,
    pub content: Value,
    pub modified_by: String,
    pub background_image: Option<String>,
    pub partner_logo: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PageData> for PageDataResponse {
    fn from(page: PageData) -> Self {
        Self {
            id: page.id,
            main_title: page.main_title,
            main_subtitle: page.main_subtitle,
            content: page.content,
            modified_by: page.modified_by,
            background_image: page.background_image.map(|b| BASE64.encode(b)),
            partner_logo: page.partner_logo.map(|b| BASE64.encode(b)),
            created_at: page.created_at.to_rfc3339(),
            updated_at: page.updated_at.to_rfc3339(),
        }
    }
}

/// Project card as served over HTTP
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectCardResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(rename = "order")]
    pub position: i64,
    pub formatting: Value,
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ProjectCard> for ProjectCardResponse {
    fn from(card: ProjectCard) -> Self {
        Self {
            id: card.id,
            title: card.title,
            description: card.description,
            position: card.position,
            formatting: card.formatting,
            image: card.image.map(|b| BASE64.encode(b)),
            created_at: card.created_at.to_rfc3339(),
            updated_at: card.updated_at.to_rfc3339(),
        }
    }
}

/// Status report for monitoring
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub active_connections: usize,
    pub uptime_secs: i64,
    pub debug: bool,
}

/// Liveness probe; succeeds even when the database is down
pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "syncpad API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Health check including database connectivity
pub async fn health(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => Json(json!({"status": "healthy", "database": "connected"})).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unhealthy", "database": format!("connection failed: {e}")})),
        )
            .into_response(),
    }
}

/// Status, uptime, and active realtime connection count
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        active_connections: state.registry.count().await,
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
        debug: state.server.debug,
    })
}

// ── page data ──────────────────────────────────────────────────

pub async fn get_page_data(
    State(state): State<AppState>,
) -> Result<Json<PageDataResponse>, GatewayError> {
    let page = state.store.get_or_create_page().await?;
    Ok(Json(page.into()))
}

pub async fn update_page_data(
    State(state): State<AppState>,
    Json(update): Json<PageDataUpdate>,
) -> Result<Json<PageDataResponse>, GatewayError> {
    let page = state.store.update_page(update).await?;
    Ok(Json(page.into()))
}

pub async fn upload_page_image(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, GatewayError> {
    state
        .store
        .set_page_image(PageImage::Background, body.to_vec())
        .await?;
    Ok(Json(json!({"message": "Image uploaded successfully"})))
}

pub async fn upload_partner_logo(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, GatewayError> {
    state
        .store
        .set_page_image(PageImage::PartnerLogo, body.to_vec())
        .await?;
    Ok(Json(json!({"message": "Partner logo uploaded successfully"})))
}

// ── project cards ──────────────────────────────────────────────

pub async fn list_cards(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectCardResponse>>, GatewayError> {
    let cards = state.store.list_cards().await?;
    Ok(Json(cards.into_iter().map(Into::into).collect()))
}

pub async fn create_card(
    State(state): State<AppState>,
    Json(card): Json<ProjectCardCreate>,
) -> Result<Json<ProjectCardResponse>, GatewayError> {
    let card = state.store.create_card(card).await?;
    Ok(Json(card.into()))
}

pub async fn update_card(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<ProjectCardUpdate>,
) -> Result<Json<ProjectCardResponse>, GatewayError> {
    let card = state
        .store
        .update_card(id, update)
        .await?
        .ok_or(GatewayError::NotFound("card"))?;
    Ok(Json(card.into()))
}

pub async fn delete_card(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, GatewayError> {
    if !state.store.delete_card(id).await? {
        return Err(GatewayError::NotFound("card"));
    }
    Ok(Json(json!({"message": "Card deleted"})))
}

pub async fn upload_card_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<Value>, GatewayError> {
    let card = state.store.set_card_image(id, body.to_vec()).await?;
    Ok(Json(json!({
        "message": "Card image uploaded successfully",
        "card_id": card.id,
        "image": card.image.map(|b| BASE64.encode(b)),
    })))
}

// ── events ─────────────────────────────────────────────────────

/// Optional filter for event listings
#[derive(Debug, Deserialize)]
pub struct EventFilter {
    pub event_type: Option<String>,
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<Vec<CalendarEvent>>, GatewayError> {
    let events = state.store.list_events(filter.event_type).await?;
    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(event): Json<EventCreate>,
) -> Result<Json<CalendarEvent>, GatewayError> {
    let event = state.store.create_event(event).await?;
    Ok(Json(event))
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<EventUpdate>,
) -> Result<Json<CalendarEvent>, GatewayError> {
    let event = state
        .store
        .update_event(id, update)
        .await?
        .ok_or(GatewayError::NotFound("event"))?;
    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, GatewayError> {
    if !state.store.delete_event(id).await? {
        return Err(GatewayError::NotFound("event"));
    }
    Ok(Json(json!({"message": "Event deleted"})))
}
