// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP administrative surface. Routes map 1:1 onto the application
//! services; no business logic lives here. Typed engine errors are
//! translated to status codes with a machine-readable `kind` so operator
//! tooling can branch without parsing messages.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{sse::KeepAlive, IntoResponse, Response, Sse},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::application::migration::NewMigrationPlan;
use crate::domain::errors::ControlError;
use crate::domain::flag::FeatureFlag;
use crate::domain::migration::PlanId;
use crate::domain::module::{ModuleId, ModuleSpec, ModuleType};
use crate::engine::ControlPlane;
use crate::infrastructure::event_bus::EventBusError;

pub struct AppState {
    pub engine: Arc<ControlPlane>,
}

pub fn app(engine: Arc<ControlPlane>) -> Router {
    let state = Arc::new(AppState { engine });

    Router::new()
        .route("/modules", post(register_module).get(list_modules))
        .route("/modules/swap", post(swap_modules))
        .route("/modules/active/{module_type}", get(get_active_module))
        .route("/modules/{id}", get(get_module))
        .route("/modules/{id}/activate", post(activate_module))
        .route("/modules/{id}/deactivate", post(deactivate_module))
        .route("/flags", post(create_flag).get(list_flags))
        .route("/flags/{id}", get(get_flag))
        .route("/flags/{id}/evaluate", get(evaluate_flag))
        .route("/migrations", post(create_migration).get(list_migrations))
        .route("/migrations/{id}", get(get_migration))
        .route("/migrations/{id}/execute", post(execute_migration))
        .route("/migrations/{id}/abort", post(abort_migration))
        .route("/migrations/{id}/rollback", post(rollback_migration))
        .route("/stats", get(stats))
        .route("/events", get(stream_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Typed error envelope for administrative callers.
pub struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        let status = match err.kind() {
            "not_found" => StatusCode::NOT_FOUND,
            "duplicate_module" => StatusCode::CONFLICT,
            "dependency_not_active" | "type_mismatch" | "invalid_strategy"
            | "not_rollbackable" | "plan_not_executable" => StatusCode::UNPROCESSABLE_ENTITY,
            "probe_timeout" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, body: json!({ "error": err.to_string(), "kind": err.kind() }) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn register_module(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<ModuleSpec>,
) -> Result<impl IntoResponse, ApiError> {
    let module = state.engine.registry().register(spec).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

async fn list_modules(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let modules = state.engine.registry().list_all().await?;
    Ok(Json(modules))
}

async fn get_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let module = state.engine.registry().get(&ModuleId::new(id)).await?;
    Ok(Json(module))
}

async fn get_active_module(
    State(state): State<Arc<AppState>>,
    Path(module_type): Path<String>,
) -> Result<Response, ApiError> {
    let module_type: ModuleType = match module_type.parse() {
        Ok(t) => t,
        Err(e) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e, "kind": "invalid_module_type" })),
            )
                .into_response())
        }
    };

    match state.engine.registry().get_active(module_type).await? {
        Some(module) => Ok(Json(module).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("no active module for type {}", module_type),
                "kind": "not_found",
            })),
        )
            .into_response()),
    }
}

async fn activate_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let module = state.engine.lifecycle().activate(&ModuleId::new(id)).await?;
    Ok(Json(module))
}

async fn deactivate_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let module = state.engine.lifecycle().deactivate(&ModuleId::new(id)).await?;
    Ok(Json(module))
}

#[derive(Deserialize)]
struct SwapRequest {
    old: String,
    new: String,
}

async fn swap_modules(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SwapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .engine
        .lifecycle()
        .hot_swap(&ModuleId::new(request.old), &ModuleId::new(request.new))
        .await?;
    Ok(Json(json!({ "status": "swapped" })))
}

#[derive(Deserialize)]
struct CreateFlagRequest {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default = "default_percentage")]
    rollout_percentage: u8,
    #[serde(default)]
    target_subjects: Vec<String>,
    #[serde(default)]
    target_tiers: Vec<String>,
    #[serde(default)]
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_enabled() -> bool {
    true
}

fn default_percentage() -> u8 {
    100
}

async fn create_flag(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateFlagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut flag =
        FeatureFlag::new(request.id, request.name, request.enabled, request.rollout_percentage);
    flag.description = request.description;
    flag.target_subjects = request.target_subjects;
    flag.target_tiers = request.target_tiers;
    flag.expires_at = request.expires_at;

    let flag = state.engine.flags().create(flag).await?;
    Ok((StatusCode::CREATED, Json(flag)))
}

async fn list_flags(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let flags = state.engine.flags().list_all().await?;
    Ok(Json(flags))
}

async fn get_flag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let flag = state.engine.flags().get(&id).await?;
    Ok(Json(flag))
}

#[derive(Deserialize)]
struct EvaluateQuery {
    subject: Option<String>,
    tier: Option<String>,
}

async fn evaluate_flag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<EvaluateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let enabled = state
        .engine
        .flags()
        .evaluate(&id, query.subject.as_deref(), query.tier.as_deref())
        .await?;
    Ok(Json(json!({ "flag": id, "enabled": enabled })))
}

async fn create_migration(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewMigrationPlan>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = state.engine.migrations().create_plan(request).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn list_migrations(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let plans = state.engine.migrations().list_plans().await?;
    Ok(Json(plans))
}

fn parse_plan_id(raw: &str) -> Result<PlanId, ApiError> {
    // an unparsable id can never name a stored plan
    PlanId::from_string(raw).map_err(|_| ApiError {
        status: StatusCode::NOT_FOUND,
        body: json!({
            "error": format!("invalid migration plan id '{}'", raw),
            "kind": "not_found",
        }),
    })
}

async fn get_migration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = state.engine.migrations().get_plan(parse_plan_id(&id)?).await?;
    Ok(Json(plan))
}

async fn execute_migration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // the execution task runs in the background; progress is observable
    // through /events and the plan record
    let _handle = state.engine.migrations().execute(parse_plan_id(&id)?).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "executing" }))))
}

async fn abort_migration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.migrations().abort(parse_plan_id(&id)?).await?;
    Ok(Json(json!({ "status": "aborting" })))
}

async fn rollback_migration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = state.engine.migrations().rollback(parse_plan_id(&id)?).await?;
    Ok(Json(plan))
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.engine.stats().await?;
    Ok(Json(stats))
}

async fn stream_events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let receiver = state.engine.event_bus().subscribe();
    let stream = futures::stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    let sse_event = axum::response::sse::Event::default().data(data);
                    return Some((Ok::<_, axum::Error>(sse_event), receiver));
                }
                // a lagged subscriber picks up from the current position
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
