use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::combat::Forecast;
use crate::error::{CombatError, ErrorKind};
use crate::report::chronicle::Chronicle;
use crate::report::CombatReport;
use crate::session::{
    CombatService, ForecastRequest, RosterOverrides, SideEffectReport, StartCombatRequest,
};

pub type AppState = Arc<CombatService>;

const DEFAULT_PAGE_SIZE: u32 = 20;

/// Transport view of a [CombatError].
#[derive(Debug)]
pub struct ApiError(pub CombatError);

impl From<CombatError> for ApiError {
    fn from(err: CombatError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub kind: ErrorKind,
    pub message: String,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PreconditionFailed => StatusCode::CONFLICT,
        ErrorKind::DependencyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::BestEffortFailure => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let body = ErrorBody {
            status: "error",
            kind,
            message: self.0.to_string(),
        };
        (status_for(kind), Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Bodies are parsed here rather than by the `Json` extractor so malformed
/// input gets the same error body as every other failure.
fn parse_body<T: serde::de::DeserializeOwned>(body: &str, what: &str) -> Result<T, ApiError> {
    serde_json::from_str(body)
        .map_err(|err| ApiError(CombatError::InvalidInput(format!("invalid {what} body: {err}"))))
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "bioclash-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StartCombatResponse {
    pub status: &'static str,
    pub session_id: String,
}

pub async fn start_combat(
    State(service): State<AppState>,
    body: String,
) -> ApiResult<StartCombatResponse> {
    let request: StartCombatRequest = parse_body(&body, "start combat")?;
    let session_id = service.start_combat(request).await?;
    Ok(Json(StartCombatResponse {
        status: "in_progress",
        session_id,
    }))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndCombatRequest {
    #[serde(default)]
    pub overrides: Option<RosterOverrides>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndCombatResponse {
    pub resolved_now: bool,
    pub report: CombatReport,
}

/// The body is optional; an empty body ends the combat with captured health.
pub async fn end_combat(
    State(service): State<AppState>,
    Path(session_id): Path<String>,
    body: String,
) -> ApiResult<EndCombatResponse> {
    let request = if body.trim().is_empty() {
        EndCombatRequest::default()
    } else {
        parse_body(&body, "end combat")?
    };
    let result = service.end_combat(&session_id, request.overrides).await?;
    Ok(Json(EndCombatResponse {
        resolved_now: result.resolved_now,
        report: result.report,
    }))
}

pub async fn report(
    State(service): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<CombatReport> {
    Ok(Json(service.get_report(&session_id).await?))
}

pub async fn chronicle(
    State(service): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Chronicle> {
    Ok(Json(service.generate_chronicle(&session_id).await?))
}

#[derive(Debug, Clone, Serialize)]
pub struct AdviceResponse {
    pub combat_id: String,
    pub advice: Vec<String>,
}

pub async fn advice(
    State(service): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<AdviceResponse> {
    let advice = service.get_tactical_advice(&session_id).await?;
    Ok(Json(AdviceResponse {
        combat_id: session_id,
        advice,
    }))
}

pub async fn log_csv(
    State(service): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let csv = service.export_log_csv(&session_id)?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv).into_response())
}

#[derive(Debug, Clone, Serialize)]
pub struct SideEffectStatus {
    pub combat_id: String,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SideEffectReport>,
}

fn side_effect_status(combat_id: String, report: Option<SideEffectReport>) -> SideEffectStatus {
    let state = match &report {
        None => "pending",
        Some(r) if r.is_complete() => "complete",
        Some(_) => "partial",
    };
    SideEffectStatus {
        combat_id,
        state,
        report,
    }
}

pub async fn side_effects(
    State(service): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SideEffectStatus> {
    let report = service.side_effect_status(&session_id)?;
    Ok(Json(side_effect_status(session_id, report)))
}

pub async fn retry_side_effects(
    State(service): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SideEffectStatus> {
    let report = service.retry_side_effects(&session_id).await?;
    Ok(Json(side_effect_status(session_id, Some(report))))
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub page: u32,
    pub page_size: u32,
    pub reports: Vec<CombatReport>,
}

pub async fn history(
    State(service): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let page = query.page.unwrap_or(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, service.config().history_page_size_max.max(1));
    let reports = service.get_history(&user_id, page, page_size)?;
    Ok(Json(HistoryResponse {
        user_id,
        page,
        page_size,
        reports,
    }))
}

pub async fn forecast(
    State(service): State<AppState>,
    body: String,
) -> ApiResult<Forecast> {
    let request: ForecastRequest = parse_body(&body, "forecast")?;
    Ok(Json(service.forecast(&request).await?))
}

pub async fn not_found() -> ApiError {
    ApiError(CombatError::NotFound {
        what: "route",
        id: "unknown".to_string(),
    })
}
