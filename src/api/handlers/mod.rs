use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::Database;
use crate::models::*;
use crate::targeting::CompileError;

// ============================================================
// Error Handling
// ============================================================

/// Map a storage error to a response.
///
/// Validation failures raised by the database layer are returned as-is.
/// Anything else is logged and replaced with a generic message.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    let msg = e.to_string();

    if msg.contains("not found") {
        tracing::warn!("Lookup failed: {}", msg);
        return (StatusCode::NOT_FOUND, msg);
    }
    if msg.contains("already") {
        tracing::warn!("Conflict: {}", msg);
        return (StatusCode::CONFLICT, msg);
    }
    if msg.contains("must") {
        tracing::warn!("Validation error: {}", msg);
        return (StatusCode::BAD_REQUEST, msg);
    }

    tracing::error!("Internal error: {}", msg);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Criteria that fail to compile come back as 422 with a structured body.
fn targeting_error(e: anyhow::Error) -> Response {
    match e.downcast_ref::<CompileError>() {
        Some(err) => {
            tracing::warn!(code = err.code(), "Criteria rejected: {}", err);
            let body = serde_json::json!({
                "code": err.code(),
                "message": err.to_string(),
                "location": err.location,
                "condition": err.condition,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
        }
        None => internal_error(e).into_response(),
    }
}

fn not_found(what: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{} not found", what))
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Programs
// ============================================================

pub async fn list_programs(
    State(db): State<Database>,
) -> Result<Json<Vec<Program>>, (StatusCode, String)> {
    db.get_all_programs().map(Json).map_err(internal_error)
}

pub async fn get_program(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<Program>, (StatusCode, String)> {
    db.get_program(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Program"))
}

pub async fn create_program(
    State(db): State<Database>,
    Json(input): Json<CreateProgramInput>,
) -> Result<(StatusCode, Json<Program>), (StatusCode, String)> {
    db.create_program(input)
        .map(|p| (StatusCode::CREATED, Json(p)))
        .map_err(internal_error)
}

// ============================================================
// Field catalog
// ============================================================

pub async fn list_program_fields(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FieldDescriptor>>, (StatusCode, String)> {
    db.get_field_descriptors(id)
        .map(Json)
        .map_err(internal_error)
}

pub async fn create_flex_attribute(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Json(input): Json<CreateFlexAttributeInput>,
) -> Result<(StatusCode, Json<FlexAttribute>), (StatusCode, String)> {
    db.create_flex_attribute(id, input)
        .map(|a| (StatusCode::CREATED, Json(a)))
        .map_err(internal_error)
}

pub async fn create_periodic_field(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Json(input): Json<CreatePeriodicFieldInput>,
) -> Result<(StatusCode, Json<PeriodicField>), (StatusCode, String)> {
    db.create_periodic_field(id, input)
        .map(|f| (StatusCode::CREATED, Json(f)))
        .map_err(internal_error)
}

// ============================================================
// Households
// ============================================================

pub async fn list_households(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HouseholdRecord>>, (StatusCode, String)> {
    if db.get_program(id).map_err(internal_error)?.is_none() {
        return Err(not_found("Program"));
    }
    db.get_households(id).map(Json).map_err(internal_error)
}

pub async fn create_household(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Json(input): Json<CreateHouseholdInput>,
) -> Result<(StatusCode, Json<HouseholdRecord>), (StatusCode, String)> {
    db.create_household(id, input)
        .map(|h| (StatusCode::CREATED, Json(h)))
        .map_err(internal_error)
}

pub async fn get_household(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<Json<HouseholdRecord>, (StatusCode, String)> {
    db.get_household(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Household"))
}

pub async fn withdraw_household(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if db.withdraw_household(id).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Household"))
    }
}

pub async fn withdraw_individual(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if db.withdraw_individual(id).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Individual"))
    }
}

pub async fn record_periodic_value(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Json(input): Json<RecordPeriodicValueInput>,
) -> Result<Json<Individual>, (StatusCode, String)> {
    db.record_periodic_value(id, input)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Individual"))
}

// ============================================================
// Targeting
// ============================================================

#[derive(Debug, Deserialize)]
pub struct AsOfQuery {
    /// Reference date for derived fields such as `age`. Defaults to today.
    pub as_of: Option<NaiveDate>,
}

impl AsOfQuery {
    fn date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }
}

pub async fn validate_targeting(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Query(query): Query<AsOfQuery>,
    Json(request): Json<TargetingRequest>,
) -> Result<Json<CriteriaSummary>, Response> {
    db.validate_targeting(id, &request, query.date())
        .map(Json)
        .map_err(targeting_error)
}

pub async fn preview_targeting(
    State(db): State<Database>,
    Path(id): Path<Uuid>,
    Query(query): Query<AsOfQuery>,
    Json(request): Json<TargetingRequest>,
) -> Result<Json<TargetingPreview>, Response> {
    db.preview_targeting(id, &request, query.date())
        .map(Json)
        .map_err(targeting_error)
}
