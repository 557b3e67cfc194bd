//! JSON routes under `/api/v1`.
//!
//! - `POST /complaints`                      submit (bearer optional; none = anonymous)
//! - `GET  /complaints/{id}`                 read one complaint
//! - `POST /complaints/{id}/status`          transition
//! - `POST /complaints/{id}/escalate`        manual escalation
//! - `POST /complaints/{id}/assign`          assignment
//! - `POST /complaints/{id}/notes`           timeline note
//! - `GET  /complaints/{id}/timeline`        visible timeline entries
//! - `GET  /admin/overdue`                   overdue listing (staff)
//! - `POST /admin/auto-escalate`             run one sweep (staff)
//! - `GET  /notifications`                   caller's notifications
//! - `POST /notifications/{id}/read`         mark read (recipient)
//! - `GET  /health`                          database readiness

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use grievance_core::domain::category::CategoryId;
use grievance_core::domain::complaint::{
    AnonymousContact, AttachmentRef, Complaint, ComplaintId, ComplaintStatus, Priority, Submitter,
};
use grievance_core::domain::notification::{Notification, NotificationId};
use grievance_core::domain::timeline::{TimelineEntry, Visibility};
use grievance_core::domain::user::{Actor, UserId};
use grievance_core::errors::ApplicationError;
use grievance_core::escalation::OverdueComplaint;
use grievance_core::lifecycle::policy;
use grievance_core::lifecycle::{NewComplaint, TransitionRequest};
use grievance_db::DbPool;
use grievance_workflow::{Outcome, SubmittedComplaint, SweepCancellation, SweepSummary, WorkflowService};

use crate::error::ApiError;
use crate::health;
use crate::identity::{bearer_token, IdentityResolver};

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<WorkflowService>,
    pub identity: Arc<dyn IdentityResolver>,
    pub cancellation: SweepCancellation,
}

pub fn router(state: ApiState, db_pool: DbPool) -> Router {
    let api = Router::new()
        .route("/complaints", post(submit_complaint))
        .route("/complaints/{id}", get(get_complaint))
        .route("/complaints/{id}/status", post(transition_complaint))
        .route("/complaints/{id}/escalate", post(escalate_complaint))
        .route("/complaints/{id}/assign", post(assign_complaint))
        .route("/complaints/{id}/notes", post(add_note))
        .route("/complaints/{id}/timeline", get(get_timeline))
        .route("/admin/overdue", get(list_overdue))
        .route("/admin/auto-escalate", post(run_auto_escalate))
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}/read", post(mark_notification_read))
        .with_state(state)
        .merge(health::router(db_pool));

    Router::new().nest("/api/v1", api)
}

// ---------------------------------------------------------------------------
// Request context
// ---------------------------------------------------------------------------

/// Correlation id plus the caller, when a bearer token was presented.
pub struct RequestContext {
    pub correlation_id: String,
    pub actor: Option<Actor>,
}

impl RequestContext {
    fn require_actor(&self) -> Result<&Actor, ApiError> {
        self.actor.as_ref().ok_or_else(|| ApiError::unauthenticated(&self.correlation_id))
    }

    fn fail(&self, error: ApplicationError) -> ApiError {
        warn!(
            event_name = "api.request.rejected",
            correlation_id = %self.correlation_id,
            error_kind = error.kind().as_str(),
            error = %error,
            "request failed"
        );
        ApiError::from_application(error, &self.correlation_id)
    }

    fn span(&self, route: &'static str) -> tracing::Span {
        tracing::info_span!("api_request", route, correlation_id = %self.correlation_id)
    }
}

impl FromRequestParts<ApiState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let correlation_id = correlation_id(&parts.headers);
        let token = bearer_token(&parts.headers)
            .map_err(|_| ApiError::unauthenticated(&correlation_id))?;

        let actor = match token {
            Some(token) => {
                let resolved = state
                    .identity
                    .resolve(&token)
                    .await
                    .map_err(|error| ApiError::from_application(error, &correlation_id))?;
                Some(resolved.ok_or_else(|| ApiError::unauthenticated(&correlation_id))?)
            }
            None => None,
        };

        Ok(Self { correlation_id, actor })
    }
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    pub warnings: Vec<String>,
    pub correlation_id: String,
}

impl<T> Envelope<T> {
    fn from_outcome(outcome: Outcome<T>, context: &RequestContext) -> Json<Self> {
        Json(Self {
            data: outcome.value,
            warnings: outcome.warnings,
            correlation_id: context.correlation_id.clone(),
        })
    }

    fn plain(data: T, context: &RequestContext) -> Json<Self> {
        Self::from_outcome(Outcome::clean(data), context)
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub category_id: i64,
    pub subject: String,
    pub description: String,
    pub priority: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    pub contact: Option<AnonymousContact>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    pub comment: Option<String>,
    pub visibility: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    pub escalated_to: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assignee: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub comment: String,
    pub visibility: Option<String>,
}

fn parse_visibility(value: Option<&str>, context: &RequestContext) -> Result<Visibility, ApiError> {
    match value {
        None => Ok(Visibility::Public),
        Some(raw) => Visibility::parse(raw).ok_or_else(|| {
            ApiError::unprocessable(format!("unknown visibility `{raw}`"), &context.correlation_id)
        }),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn submit_complaint(
    State(state): State<ApiState>,
    context: RequestContext,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Envelope<SubmittedComplaint>>), ApiError> {
    let priority = Priority::parse(&request.priority).ok_or_else(|| {
        ApiError::unprocessable(
            format!("unknown priority `{}`", request.priority),
            &context.correlation_id,
        )
    })?;
    let submitter = match &context.actor {
        Some(actor) => Submitter::Registered { user_id: actor.user_id.clone() },
        None => Submitter::Anonymous { contact: request.contact },
    };
    let draft = NewComplaint {
        category_id: CategoryId(request.category_id),
        subject: request.subject,
        description: request.description,
        priority,
        submitter,
        attachments: request.attachments,
    };

    let outcome = state
        .service
        .submit(draft)
        .instrument(context.span("complaints.submit"))
        .await
        .map_err(|error| context.fail(error))?;
    Ok((StatusCode::CREATED, Envelope::from_outcome(outcome, &context)))
}

async fn get_complaint(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    context: RequestContext,
) -> Result<Json<Envelope<Complaint>>, ApiError> {
    let actor = context.require_actor()?;
    let complaint = state
        .service
        .complaint(&ComplaintId(id), actor)
        .instrument(context.span("complaints.get"))
        .await
        .map_err(|error| context.fail(error))?;
    Ok(Envelope::plain(complaint, &context))
}

async fn transition_complaint(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    context: RequestContext,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Envelope<Complaint>>, ApiError> {
    let actor = context.require_actor()?;
    let target = ComplaintStatus::parse(&request.status).ok_or_else(|| {
        ApiError::unprocessable(
            format!("unknown status `{}`", request.status),
            &context.correlation_id,
        )
    })?;
    let visibility = parse_visibility(request.visibility.as_deref(), &context)?;
    let mut transition = TransitionRequest::new(target).with_visibility(visibility);
    if let Some(comment) = request.comment {
        transition = transition.with_comment(comment);
    }

    let outcome = state
        .service
        .transition(&ComplaintId(id), transition, actor)
        .instrument(context.span("complaints.status"))
        .await
        .map_err(|error| context.fail(error))?;
    Ok(Envelope::from_outcome(outcome, &context))
}

async fn escalate_complaint(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    context: RequestContext,
    Json(request): Json<EscalateRequest>,
) -> Result<Json<Envelope<Complaint>>, ApiError> {
    let actor = context.require_actor()?;
    let outcome = state
        .service
        .escalate(&ComplaintId(id), &UserId(request.escalated_to), &request.reason, actor)
        .instrument(context.span("complaints.escalate"))
        .await
        .map_err(|error| context.fail(error))?;
    Ok(Envelope::from_outcome(outcome, &context))
}

async fn assign_complaint(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    context: RequestContext,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Envelope<Complaint>>, ApiError> {
    let actor = context.require_actor()?;
    let outcome = state
        .service
        .assign(&ComplaintId(id), &UserId(request.assignee), actor)
        .instrument(context.span("complaints.assign"))
        .await
        .map_err(|error| context.fail(error))?;
    Ok(Envelope::from_outcome(outcome, &context))
}

async fn add_note(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    context: RequestContext,
    Json(request): Json<NoteRequest>,
) -> Result<(StatusCode, Json<Envelope<TimelineEntry>>), ApiError> {
    let actor = context.require_actor()?;
    let visibility = parse_visibility(request.visibility.as_deref(), &context)?;
    let outcome = state
        .service
        .add_note(&ComplaintId(id), &request.comment, visibility, actor)
        .instrument(context.span("complaints.notes"))
        .await
        .map_err(|error| context.fail(error))?;
    Ok((StatusCode::CREATED, Envelope::from_outcome(outcome, &context)))
}

async fn get_timeline(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    context: RequestContext,
) -> Result<Json<Envelope<Vec<TimelineEntry>>>, ApiError> {
    let actor = context.require_actor()?;
    let entries = state
        .service
        .timeline(&ComplaintId(id), actor)
        .instrument(context.span("complaints.timeline"))
        .await
        .map_err(|error| context.fail(error))?;
    Ok(Envelope::plain(entries, &context))
}

async fn list_overdue(
    State(state): State<ApiState>,
    context: RequestContext,
) -> Result<Json<Envelope<Vec<OverdueComplaint>>>, ApiError> {
    let actor = context.require_actor()?;
    policy::ensure_staff(actor).map_err(|error| context.fail(error.into()))?;
    let overdue = state
        .service
        .list_overdue()
        .instrument(context.span("admin.overdue"))
        .await
        .map_err(|error| context.fail(error))?;
    Ok(Envelope::plain(overdue, &context))
}

async fn run_auto_escalate(
    State(state): State<ApiState>,
    context: RequestContext,
) -> Result<Json<Envelope<SweepSummary>>, ApiError> {
    let actor = context.require_actor()?;
    policy::ensure_staff(actor).map_err(|error| context.fail(error.into()))?;
    let summary = state
        .service
        .auto_escalate(&state.cancellation)
        .instrument(context.span("admin.auto_escalate"))
        .await
        .map_err(|error| context.fail(error))?;

    info!(
        event_name = "api.sweep.triggered",
        correlation_id = %context.correlation_id,
        actor = %actor.user_id,
        escalated_count = summary.escalated_count,
        "manual auto-escalation sweep finished"
    );
    let warnings = summary.warnings.clone();
    Ok(Envelope::from_outcome(Outcome { value: summary, warnings }, &context))
}

async fn list_notifications(
    State(state): State<ApiState>,
    context: RequestContext,
) -> Result<Json<Envelope<Vec<Notification>>>, ApiError> {
    let actor = context.require_actor()?;
    let notifications = state
        .service
        .notifications(actor)
        .instrument(context.span("notifications.list"))
        .await
        .map_err(|error| context.fail(error))?;
    Ok(Envelope::plain(notifications, &context))
}

async fn mark_notification_read(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    context: RequestContext,
) -> Result<Json<Envelope<Notification>>, ApiError> {
    let actor = context.require_actor()?;
    let notification = state
        .service
        .mark_notification_read(NotificationId(id), actor)
        .instrument(context.span("notifications.read"))
        .await
        .map_err(|error| context.fail(error))?;
    Ok(Envelope::plain(notification, &context))
}
