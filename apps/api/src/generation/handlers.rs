//! Axum route handlers for the session and generation API.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::export::render_results;
use crate::generation::orchestrator::{
    analyze_job, generate_backstories, generate_projects, generate_resources, submit_job,
    AnalysisReport, JobSubmission,
};
use crate::generation::parser::{BackstoryView, Classification, ProjectSet};
use crate::session::{
    GeneratedFlags, JobContext, SessionEntry, SessionState, Stage, UsageCounters,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Everything a client needs to render one session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stage: Stage,
    pub generated: GeneratedFlags,
    pub job: Option<JobContext>,
    pub classification: Option<Classification>,
    pub projects: Option<ProjectSet>,
    pub backstories: Option<BackstoryView>,
    pub learning_guide: Option<String>,
    pub usage: UsageCounters,
    pub download_available: bool,
}

impl SessionView {
    async fn new(session_id: Uuid, entry: &SessionEntry, state: &SessionState) -> Self {
        let generated = state.flags();
        Self {
            session_id,
            created_at: entry.created_at,
            updated_at: entry.updated_at().await,
            stage: state.stage(),
            generated,
            job: state.job().cloned(),
            classification: state.classification().cloned(),
            projects: state.projects().cloned(),
            backstories: state.backstory_view(),
            learning_guide: state.resources().map(str::to_string),
            usage: state.usage(),
            download_available: generated.projects,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub analysis: AnalysisReport,
    pub session: SessionView,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
//
// Actions hold the session's action lock and work on a snapshot that is
// committed only when the action succeeds. Reads copy the current state and
// return at once, even while a model call is running.
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let (session_id, entry) = state.sessions.create().await;
    info!("Session {session_id} created");
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id,
            created_at: entry.created_at,
        }),
    )
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let entry = find_session(&state, session_id).await?;
    let session = entry.snapshot().await;
    Ok(Json(SessionView::new(session_id, &entry, &session).await))
}

/// DELETE /api/v1/sessions/:id
///
/// Ends the session; all of its state is discarded.
pub async fn handle_end_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.sessions.remove(session_id).await {
        return Err(session_not_found(session_id));
    }
    info!("Session {session_id} ended");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/analyze
///
/// Classifies the job description without generating projects.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(submission): Json<JobSubmission>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let entry = find_session(&state, session_id).await?;
    let _action = entry.begin_action().await;
    let mut session = entry.snapshot().await;

    info!("Session {session_id}: analysis requested");
    let analysis = analyze_job(state.model.as_ref(), &mut session, submission).await?;

    entry.commit(session.clone()).await;
    Ok(Json(AnalysisResponse {
        analysis,
        session: SessionView::new(session_id, &entry, &session).await,
    }))
}

/// POST /api/v1/sessions/:id/projects
///
/// Analysis followed by project generation. Posting again regenerates and
/// discards backstories and resources built on the old projects.
pub async fn handle_generate_projects(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(submission): Json<JobSubmission>,
) -> Result<Json<AnalysisResponse>, AppError> {
    run_submission(&state, session_id, submission).await
}

/// POST /api/v1/sessions/:id/projects/generate
///
/// Project generation alone, from the job and classification already stored
/// by an earlier analysis.
pub async fn handle_generate_from_analysis(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let entry = find_session(&state, session_id).await?;
    let _action = entry.begin_action().await;
    let mut session = entry.snapshot().await;

    info!("Session {session_id}: projects requested from stored analysis");
    generate_projects(state.model.as_ref(), &mut session).await?;

    entry.commit(session.clone()).await;
    Ok(Json(SessionView::new(session_id, &entry, &session).await))
}

/// POST /api/v1/sessions/:id/projects/upload
///
/// Multipart variant: `company_name` text field plus a `.txt` job description `file`.
pub async fn handle_upload_projects(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, AppError> {
    let submission = read_job_upload(multipart).await?;
    run_submission(&state, session_id, submission).await
}

/// POST /api/v1/sessions/:id/backstories
pub async fn handle_generate_backstories(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let entry = find_session(&state, session_id).await?;
    let _action = entry.begin_action().await;
    let mut session = entry.snapshot().await;

    info!("Session {session_id}: backstories requested");
    generate_backstories(state.model.as_ref(), &mut session).await?;

    entry.commit(session.clone()).await;
    Ok(Json(SessionView::new(session_id, &entry, &session).await))
}

/// POST /api/v1/sessions/:id/resources
pub async fn handle_generate_resources(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let entry = find_session(&state, session_id).await?;
    let _action = entry.begin_action().await;
    let mut session = entry.snapshot().await;

    info!("Session {session_id}: learning resources requested");
    generate_resources(state.model.as_ref(), &mut session).await?;

    entry.commit(session.clone()).await;
    Ok(Json(SessionView::new(session_id, &entry, &session).await))
}

/// GET /api/v1/sessions/:id/usage
pub async fn handle_get_usage(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<UsageCounters>, AppError> {
    let entry = find_session(&state, session_id).await?;
    let usage = entry.snapshot().await.usage();
    Ok(Json(usage))
}

/// POST /api/v1/sessions/:id/usage/reset
///
/// Waits for any action in flight, so its token counts are not lost.
pub async fn handle_reset_usage(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<UsageCounters>, AppError> {
    let entry = find_session(&state, session_id).await?;
    let _action = entry.begin_action().await;
    let mut session = entry.snapshot().await;
    session.reset_usage();
    let usage = session.usage();
    entry.commit(session).await;
    info!("Session {session_id}: usage counters reset");
    Ok(Json(usage))
}

/// POST /api/v1/sessions/:id/start-over
pub async fn handle_start_over(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let entry = find_session(&state, session_id).await?;
    let _action = entry.begin_action().await;
    let mut session = entry.snapshot().await;
    session.start_over();
    entry.commit(session.clone()).await;
    info!("Session {session_id}: started over");
    Ok(Json(SessionView::new(session_id, &entry, &session).await))
}

/// GET /api/v1/sessions/:id/download
///
/// Plain-text attachment with the classification and every generated section.
pub async fn handle_download(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let entry = find_session(&state, session_id).await?;
    let document = render_results(&entry.snapshot().await).ok_or_else(|| {
        AppError::Conflict("Generate projects before downloading results".to_string())
    })?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        document.file_name
    ))
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid download file name: {e}")))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.body,
    )
        .into_response())
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn run_submission(
    state: &AppState,
    session_id: Uuid,
    submission: JobSubmission,
) -> Result<Json<AnalysisResponse>, AppError> {
    let entry = find_session(state, session_id).await?;
    let _action = entry.begin_action().await;
    let mut session = entry.snapshot().await;

    info!("Session {session_id}: project generation requested");
    let analysis = submit_job(state.model.as_ref(), &mut session, submission).await?;

    entry.commit(session.clone()).await;
    Ok(Json(AnalysisResponse {
        analysis,
        session: SessionView::new(session_id, &entry, &session).await,
    }))
}

async fn find_session(state: &AppState, session_id: Uuid) -> Result<Arc<SessionEntry>, AppError> {
    state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| session_not_found(session_id))
}

fn session_not_found(session_id: Uuid) -> AppError {
    AppError::NotFound(format!("Session {session_id} not found"))
}

/// Reads `company_name` and a UTF-8 `.txt` `file` from a multipart body.
async fn read_job_upload(mut multipart: Multipart) -> Result<JobSubmission, AppError> {
    let mut submission = JobSubmission::default();
    let mut saw_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("company_name") => {
                submission.company_name = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable company_name: {e}")))?;
            }
            Some("file") => {
                if let Some(file_name) = field.file_name() {
                    if !file_name.to_ascii_lowercase().ends_with(".txt") {
                        return Err(AppError::Validation(format!(
                            "Only .txt job descriptions are accepted, got '{file_name}'"
                        )));
                    }
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable file: {e}")))?;
                submission.job_description = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    AppError::Validation("Job description file must be UTF-8 text".to_string())
                })?;
                saw_file = true;
            }
            _ => {}
        }
    }

    if !saw_file {
        return Err(AppError::Validation(
            "Multipart body must include a 'file' field".to_string(),
        ));
    }
    Ok(submission)
}
