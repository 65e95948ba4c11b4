use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;

use super::domain::{Actor, ActorRole, EvaluationId};
use super::lifecycle::Transition;
use super::query::EvaluationQuery;
use super::repository::{EvaluationRepository, NotificationPublisher};
use super::service::{CreateEvaluationsRequest, ErrorKind, EvaluationService, EvaluationServiceError};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Router builder exposing the evaluation and dashboard endpoints.
pub fn evaluation_router<R, A>(service: Arc<EvaluationService<R, A>>) -> Router
where
    R: EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/evaluations",
            get(list_handler::<R, A>).post(create_handler::<R, A>),
        )
        .route("/api/evaluations/eligible", get(eligible_handler::<R, A>))
        .route(
            "/api/evaluations/:evaluation_id",
            get(detail_handler::<R, A>)
                .put(transition_handler::<R, A>)
                .delete(delete_handler::<R, A>),
        )
        .route(
            "/api/evaluations/:evaluation_id/acknowledge",
            post(acknowledge_handler::<R, A>),
        )
        .route("/api/dashboard/stats", get(dashboard_handler::<R, A>))
        .with_state(service)
}

/// Calling identity taken from the `x-actor-id` / `x-actor-role` headers. Verifying
/// the identity is the job of whatever sits in front of this service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorHeader(pub Actor);

impl ActorHeader {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ActorRejection> {
        let read = |name: &'static str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or(ActorRejection::Missing(name))
        };

        let id = read(ACTOR_ID_HEADER)?;
        let role = read(ACTOR_ROLE_HEADER)?;
        let role =
            ActorRole::parse(role).ok_or_else(|| ActorRejection::UnknownRole(role.to_string()))?;
        Ok(Self(Actor::new(id, role)))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ActorHeader
where
    S: Send + Sync,
{
    type Rejection = ActorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActorRejection {
    #[error("missing {0} header")]
    Missing(&'static str),
    #[error("unknown actor role {0:?}")]
    UnknownRole(String),
}

impl IntoResponse for ActorRejection {
    fn into_response(self) -> Response {
        let payload = json!({
            "error": self.to_string(),
            "kind": "unauthenticated",
        });
        (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
    }
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for EvaluationServiceError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let mut payload = json!({
            "error": self.to_string(),
            "kind": kind.label(),
        });
        if let Some(status) = self.observed_status() {
            payload["currentStatus"] = json!(status.label());
        }
        (kind.status_code(), Json(payload)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EligibleParams {
    #[serde(default)]
    team_only: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AcknowledgeRequest {
    #[serde(default)]
    notes: String,
    #[serde(default)]
    signature: String,
}

pub(crate) async fn list_handler<R, A>(
    State(service): State<Arc<EvaluationService<R, A>>>,
    ActorHeader(actor): ActorHeader,
    Query(query): Query<EvaluationQuery>,
) -> Result<Response, EvaluationServiceError>
where
    R: EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    let rows = service.list(&actor, &query, Local::now().naive_local())?;
    Ok((StatusCode::OK, Json(rows)).into_response())
}

pub(crate) async fn eligible_handler<R, A>(
    State(service): State<Arc<EvaluationService<R, A>>>,
    ActorHeader(actor): ActorHeader,
    Query(params): Query<EligibleParams>,
) -> Result<Response, EvaluationServiceError>
where
    R: EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    let report = service.eligible(&actor, params.team_only)?;
    Ok((StatusCode::OK, Json(report)).into_response())
}

pub(crate) async fn create_handler<R, A>(
    State(service): State<Arc<EvaluationService<R, A>>>,
    ActorHeader(actor): ActorHeader,
    Json(request): Json<CreateEvaluationsRequest>,
) -> Result<Response, EvaluationServiceError>
where
    R: EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    let batch = service.create_batch(&actor, request)?;
    let status = if batch.created > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(batch)).into_response())
}

pub(crate) async fn detail_handler<R, A>(
    State(service): State<Arc<EvaluationService<R, A>>>,
    Path(evaluation_id): Path<String>,
    ActorHeader(actor): ActorHeader,
) -> Result<Response, EvaluationServiceError>
where
    R: EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    let record = service.get(&EvaluationId(evaluation_id), &actor)?;
    Ok((StatusCode::OK, Json(record)).into_response())
}

pub(crate) async fn transition_handler<R, A>(
    State(service): State<Arc<EvaluationService<R, A>>>,
    Path(evaluation_id): Path<String>,
    ActorHeader(actor): ActorHeader,
    Json(transition): Json<Transition>,
) -> Result<Response, EvaluationServiceError>
where
    R: EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    let today = Local::now().date_naive();
    let record = service.transition(&EvaluationId(evaluation_id), &actor, transition, today)?;
    Ok((StatusCode::OK, Json(record)).into_response())
}

pub(crate) async fn acknowledge_handler<R, A>(
    State(service): State<Arc<EvaluationService<R, A>>>,
    Path(evaluation_id): Path<String>,
    ActorHeader(actor): ActorHeader,
    Json(request): Json<AcknowledgeRequest>,
) -> Result<Response, EvaluationServiceError>
where
    R: EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    let today = Local::now().date_naive();
    let record = service.acknowledge(
        &EvaluationId(evaluation_id),
        &actor,
        request.notes,
        request.signature,
        today,
    )?;
    Ok((StatusCode::OK, Json(record)).into_response())
}

pub(crate) async fn delete_handler<R, A>(
    State(service): State<Arc<EvaluationService<R, A>>>,
    Path(evaluation_id): Path<String>,
    ActorHeader(actor): ActorHeader,
) -> Result<Response, EvaluationServiceError>
where
    R: EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    service.delete(&EvaluationId(evaluation_id), &actor)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn dashboard_handler<R, A>(
    State(service): State<Arc<EvaluationService<R, A>>>,
    ActorHeader(actor): ActorHeader,
) -> Result<Response, EvaluationServiceError>
where
    R: EvaluationRepository + 'static,
    A: NotificationPublisher + 'static,
{
    let stats = service.dashboard(&actor, Local::now().naive_local())?;
    Ok((StatusCode::OK, Json(stats)).into_response())
}
