//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Each handler runs at most one pipeline stage and stores the session value
//! that stage hands back. When a stage cannot produce a usable result the
//! stored session is left as it was and the client is told to restart.

use crate::error::ApiError;
use crate::web::protocol::{
    AttachmentView, CourseView, CoursesResponse, CreateSessionResponse, EnrichedTopicView,
    ErrorBody, PageRecordView, PublishResponse, SessionView, SubmissionFailureView, TopicView,
    SESSION_COOKIE,
};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use std::sync::Arc;
use study_path_core::pipeline::parse_study_plan;
use study_path_core::{Attachment, SessionState, UserProfile};
use tracing::{debug, info};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session_handler,
        get_session_handler,
        curate_courses_handler,
        publish_pages_handler,
        health_handler,
    ),
    components(
        schemas(
            CreateSessionResponse, SessionView, CoursesResponse, PublishResponse, ErrorBody,
            TopicView, EnrichedTopicView, CourseView, AttachmentView, PageRecordView,
            SubmissionFailureView
        )
    ),
    tags(
        (name = "Study Path API", description = "Study plan drafting, course curation and Notion page publishing.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Request Helpers
//=========================================================================================

/// Reads the profile form. Unknown fields are ignored.
async fn read_profile(mut multipart: Multipart) -> Result<UserProfile, ApiError> {
    let mut field_of_study = String::new();
    let mut budget = String::new();
    let mut available_time = String::new();
    let mut emphasis_area = None;
    let mut objectives = Vec::new();
    let mut attachment = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "prior_experience" {
            let file_name = field.file_name().unwrap_or("document.pdf").to_string();
            let media_type = field.content_type().map(str::to_string);
            let data: Bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file bytes: {e}")))?;
            if !data.is_empty() {
                attachment = Some(Attachment::new(&file_name, media_type.as_deref(), data.to_vec()));
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read field '{name}': {e}")))?;
        match name.as_str() {
            "field_of_study" => field_of_study = value,
            "budget" => budget = value,
            "available_time" => available_time = value,
            "emphasis_area" => emphasis_area = Some(value),
            "objective" => objectives.push(value),
            other => debug!(field = other, "Ignoring unknown form field."),
        }
    }

    Ok(UserProfile::new(field_of_study, budget, available_time)?
        .with_emphasis_area(emphasis_area)
        .with_objectives(objectives)
        .with_prior_experience(attachment))
}

/// The session named by the caller's cookie, if any.
fn session_from_cookie(headers: &HeaderMap) -> Option<Uuid> {
    let prefix = format!("{SESSION_COOKIE}=");
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|c| c.trim().strip_prefix(prefix.as_str()).map(str::to_string))
        .and_then(|id| Uuid::parse_str(&id).ok())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Submit a profile and draft a study plan.
///
/// Accepts a multipart/form-data request with the fields `field_of_study`,
/// `budget`, `available_time`, optional `emphasis_area`, any number of
/// `objective` fields and an optional `prior_experience` file. Any session
/// named by the `study_session` cookie is cleared first.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body(content_type = "multipart/form-data", description = "The learner profile."),
    responses(
        (status = 201, description = "Plan drafted", body = CreateSessionResponse),
        (status = 400, description = "Incomplete profile or broken form", body = ErrorBody),
        (status = 502, description = "Generation backend failed", body = ErrorBody),
        (status = 504, description = "Generation backend timed out", body = ErrorBody)
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let profile = read_profile(multipart).await?;

    if let Some(previous) = session_from_cookie(&headers) {
        app_state.sessions.remove(previous).await?;
        info!(session_id = %previous, "Cleared previous session.");
    }

    let fresh = SessionState::new(profile);
    let drafted = app_state.pipeline.draft_plan(&fresh).await?;
    let stored = app_state.sessions.put(drafted).await?;
    info!(session_id = %stored.id, "Session created.");

    let raw_plan = stored.raw_plan_text.clone().unwrap_or_default();
    let plan = parse_study_plan(&raw_plan)
        .ok()
        .map(|topics| topics.iter().map(TopicView::from).collect());

    let cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        stored.id
    );
    let response = CreateSessionResponse {
        session_id: stored.id,
        raw_plan,
        plan,
    };
    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// Fetch everything a session holds so far.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "The session to read.")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionView),
        (status = 404, description = "Unknown session", body = ErrorBody)
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let state = app_state.sessions.get(session_id).await?;
    Ok(Json(SessionView::from(state.as_ref())))
}

/// Enrich the drafted plan with course recommendations.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/courses",
    params(("session_id" = Uuid, Path, description = "The session whose plan is curated.")),
    responses(
        (status = 200, description = "Plan enriched with courses", body = CoursesResponse),
        (status = 404, description = "Unknown session", body = ErrorBody),
        (status = 422, description = "No usable result; restart from the profile form", body = ErrorBody),
        (status = 502, description = "Generation backend failed", body = ErrorBody)
    )
)]
pub async fn curate_courses_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CoursesResponse>, ApiError> {
    let state = app_state.sessions.get(session_id).await?;
    let curated = app_state.pipeline.curate_courses(&state).await?;
    // A newer profile may have cleared this session while the stage ran.
    let stored = app_state.sessions.replace(curated).await?;

    let enriched_plan = stored
        .enriched_plan
        .iter()
        .flatten()
        .map(EnrichedTopicView::from)
        .collect();
    Ok(Json(CoursesResponse {
        session_id,
        enriched_plan,
    }))
}

/// Build one Notion page per enriched topic and submit them.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/pages",
    params(("session_id" = Uuid, Path, description = "The session whose plan is published.")),
    responses(
        (status = 200, description = "Pages built and submitted", body = PublishResponse),
        (status = 404, description = "Unknown session", body = ErrorBody),
        (status = 422, description = "No usable result; restart from the profile form", body = ErrorBody),
        (status = 502, description = "Generation backend failed", body = ErrorBody)
    )
)]
pub async fn publish_pages_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PublishResponse>, ApiError> {
    let state = app_state.sessions.get(session_id).await?;
    let outcome = app_state.pipeline.publish(&state).await?;

    Ok(Json(PublishResponse::new(
        app_state.config.notion_parent_page_id.clone(),
        &outcome.attempts,
        outcome.report,
    )))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The server is up"))
)]
pub async fn health_handler() -> &'static str {
    "ok"
}
