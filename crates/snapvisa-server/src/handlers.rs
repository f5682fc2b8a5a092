//! HTTP Handlers

use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use serde::{Deserialize, Serialize};
use snapvisa_core::{download, CoreError, SessionId, SessionState, SessionStore};
use snapvisa_feedback::{FeedbackRecord, FeedbackSubmission};
use snapvisa_payments::WebhookHandler;
use snapvisa_pipeline::{extension_of, CompressionOutcome, PipelineError};

use crate::error::ApiError;
use crate::pages;
use crate::session::secrets_match;
use crate::state::AppState;

/// Anti-forgery token header for JSON endpoints
pub const CSRF_HEADER: &str = "x-csrf-token";

const ADMIN_HEADER: &str = "x-admin-password";
const UPLOAD_FIELD: &str = "photo";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub payments_configured: bool,
    pub feedback_sink: &'static str,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub csrf_token: String,
    pub entitled: bool,
    pub free_downloads_remaining: u32,
    pub has_image: bool,
    pub price: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub preview_base64: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: usize,
    pub quality: u8,
    pub outcome: CompressionOutcome,
    pub notice: Option<String>,
    pub warning: Option<String>,
    pub csrf_token: String,
    pub entitled: bool,
    pub free_downloads_remaining: u32,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct CheckoutReturn {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub nonce: String,
}

#[derive(Deserialize)]
pub struct FeedbackForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Serialize)]
pub struct FeedbackResponse {
    pub message: &'static str,
    pub csrf_token: String,
}

#[derive(Serialize)]
pub struct FeedbackListResponse {
    pub count: usize,
    pub records: Vec<FeedbackRecord>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        payments_configured: state.gate.is_some(),
        feedback_sink: state.feedback.name(),
    })
}

/// Current session summary and token
pub async fn session_info(
    State(state): State<AppState>,
    Extension(id): Extension<SessionId>,
) -> Result<Json<SessionResponse>, ApiError> {
    let free = state.config.free_downloads;
    let price = state.price.display();

    let response = state.sessions.update(&id, |session| {
        Ok(SessionResponse {
            csrf_token: session.token().as_str().to_string(),
            entitled: session.entitled,
            free_downloads_remaining: session.free_downloads_remaining(free),
            has_image: session.has_image(),
            price,
        })
    })?;

    Ok(Json(response))
}

/// Process an uploaded photo and stage it in the session
pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(id): Extension<SessionId>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(CoreError::Validation("Choose a JPG or PNG photo to upload.".into()).into());
    };
    if bytes.is_empty() {
        return Err(CoreError::Validation("The uploaded file is empty.".into()).into());
    }

    let extension = extension_of(&filename).unwrap_or_default().to_string();
    let upload_bytes = bytes.len();
    let spec = state.photo_spec.clone();

    let (processed, preview) = tokio::task::spawn_blocking(move || {
        let processed = snapvisa_pipeline::process(&bytes, &extension, &spec)?;
        let preview = snapvisa_pipeline::preview(&processed, spec.preview_size)?;
        Ok::<_, PipelineError>((processed, preview))
    })
    .await
    .map_err(|e| CoreError::Internal(format!("image task failed: {e}")))?
    .map_err(|e| {
        tracing::info!(session = %id, error = %e, "Upload rejected");
        CoreError::from(e)
    })?;

    tracing::info!(
        session = %id,
        upload_bytes,
        size_bytes = processed.size_bytes(),
        quality = processed.quality,
        outcome = ?processed.outcome,
        "Photo processed"
    );

    let notice = processed.notice();
    let (notice, warning) = if processed.is_over_budget() {
        (None, notice)
    } else {
        (notice, None)
    };
    let width = processed.width;
    let height = processed.height;
    let size_bytes = processed.size_bytes();
    let quality = processed.quality;
    let outcome = processed.outcome;

    let free = state.config.free_downloads;
    let (csrf_token, entitled, free_downloads_remaining) = state.sessions.update(&id, |session| {
        session.stage_image(processed);
        Ok((
            session.token().as_str().to_string(),
            session.entitled,
            session.free_downloads_remaining(free),
        ))
    })?;

    Ok(Json(UploadResponse {
        preview_base64: preview.jpeg_base64,
        width,
        height,
        size_bytes,
        quality,
        outcome,
        notice,
        warning,
        csrf_token,
        entitled,
        free_downloads_remaining,
    }))
}

/// Create Stripe checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(id): Extension<SessionId>,
    headers: HeaderMap,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let gate = state.gate.as_ref().ok_or_else(ApiError::payments_disabled)?;

    let started = gate
        .begin_checkout(state.sessions.as_ref(), &id, header_str(&headers, CSRF_HEADER))
        .await?;

    Ok(Json(CheckoutResponse {
        checkout_url: started.checkout_url,
        csrf_token: started.csrf_token,
    }))
}

/// Stripe success redirect
pub async fn checkout_success(
    State(state): State<AppState>,
    Extension(id): Extension<SessionId>,
    Query(params): Query<CheckoutReturn>,
) -> Response {
    let Some(gate) = state.gate.as_ref() else {
        return pages::payments_unavailable();
    };

    match gate
        .complete_checkout(state.sessions.as_ref(), &id, &params.session_id, &params.nonce)
        .await
    {
        Ok(outcome) => pages::checkout_result(outcome),
        Err(e) => {
            tracing::warn!(session = %id, error = %e, "Checkout confirmation failed");
            pages::checkout_failed(&e)
        }
    }
}

/// Stripe cancel redirect
pub async fn checkout_cancel(
    State(state): State<AppState>,
    Extension(id): Extension<SessionId>,
) -> Response {
    if let Some(gate) = state.gate.as_ref() {
        if let Ok(Some(session)) = state.sessions.load(&id) {
            gate.cancel_checkout(&session);
        }
    }
    pages::checkout_cancelled()
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    let secret = state
        .webhook_secret
        .as_deref()
        .ok_or_else(ApiError::payments_disabled)?;

    let signature = header_str(&headers, "stripe-signature").ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "MISSING_SIGNATURE",
            "Missing Stripe signature",
        )
    })?;

    let handler = WebhookHandler::new(state.sessions.clone());

    let event = handler.parse_event(&body, signature, secret).map_err(|e| {
        tracing::warn!("Webhook signature failed: {}", e);
        ApiError::new(StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", "Invalid signature")
    })?;

    let parsed = handler.handle(&event)?;
    tracing::debug!(event = ?parsed, "Webhook processed");

    Ok(StatusCode::OK)
}

/// Hand out the staged photo when the session is allowed to have it
pub async fn download_photo(
    State(state): State<AppState>,
    Extension(id): Extension<SessionId>,
) -> Result<Response, ApiError> {
    let free = state.config.free_downloads;
    let file = state.sessions.update(&id, |session| download(session, free))?;

    tracing::info!(
        session = %id,
        basis = ?file.basis,
        size_bytes = file.bytes.len(),
        "Photo downloaded"
    );

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        file.bytes,
    )
        .into_response())
}

/// Store user feedback
pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(id): Extension<SessionId>,
    headers: HeaderMap,
    Form(form): Form<FeedbackForm>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let presented = form
        .csrf_token
        .as_deref()
        .or_else(|| header_str(&headers, CSRF_HEADER));
    let submission = FeedbackSubmission::new(form.name, form.message, form.email);

    // Spend the token before the append so it cannot be replayed meanwhile
    let (record, spent, csrf_token) = state.sessions.update(&id, |session| {
        session.verify_token(presented)?;
        let record = submission.into_record()?;
        let spent = session.consume_token(presented)?;
        Ok((record, spent, session.token().as_str().to_string()))
    })?;

    if let Err(e) = snapvisa_feedback::deliver(state.feedback.as_ref(), &record).await {
        state
            .sessions
            .update(&id, |session| Ok(session.restore_token(spent, &csrf_token)))?;
        return Err(e.into());
    }

    Ok(Json(FeedbackResponse {
        message: "Thanks for your feedback!",
        csrf_token,
    }))
}

/// Discard the photo, payment state and download history of this session
pub async fn reset_session(
    State(state): State<AppState>,
    Extension(id): Extension<SessionId>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let presented = header_str(&headers, CSRF_HEADER);
    state.sessions.update(&id, |session| {
        session.verify_token(presented)?;
        *session = SessionState::with_id(session.id.clone());
        Ok(())
    })?;

    tracing::info!(session = %id, "Session reset");
    Ok(StatusCode::NO_CONTENT)
}

/// List stored feedback
pub async fn list_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<FeedbackListResponse>, ApiError> {
    let Some(expected) = state.config.admin_password.as_deref() else {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Not found"));
    };

    let presented = header_str(&headers, ADMIN_HEADER).unwrap_or_default();
    if !secrets_match(expected, presented) {
        tracing::warn!("Rejected admin feedback request");
        return Err(ApiError::unauthorized());
    }

    let records = state.feedback.list().await?;
    Ok(Json(FeedbackListResponse {
        count: records.len(),
        records,
    }))
}
