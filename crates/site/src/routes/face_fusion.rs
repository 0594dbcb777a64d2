//! Face Fusion route handlers.
//!
//! The generator panel is one HTMX fragment (`#generator`). Every action
//! re-renders it from the visitor's state; while a run is in flight or
//! validation feedback is showing, the fragment schedules its own refresh.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Query, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::{CspNonce, KnownVisitor, Visitor};
use crate::services::generation::{
    GenerateOutcome, GenerationState, GeneratorView, ImageUpload, UploadError,
};
use crate::services::session::HeaderView;
use crate::state::AppState;

use super::{Nav, Shell, is_htmx};

/// Event that makes the toast region fetch queued notifications.
const NOTIFY_TRIGGER: (&str, &str) = ("HX-Trigger", "notify");

/// Face Fusion page template.
#[derive(Template, WebTemplate)]
#[template(path = "face_fusion.html")]
pub struct FaceFusionTemplate {
    pub shell: Shell,
    pub view: GeneratorView,
}

/// Generator panel fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/generator.html")]
pub struct GeneratorTemplate {
    pub view: GeneratorView,
}

/// Query string of the product page.
#[derive(Debug, Default, Deserialize)]
pub struct ShowQuery {
    /// Set by the sign-in callback when a generation was waiting.
    #[serde(default)]
    pub resume: Option<u8>,
}

/// Prompt form data.
#[derive(Debug, Deserialize)]
pub struct PromptForm {
    #[serde(default)]
    pub prompt: String,
}

/// Fields read from a generator multipart body.
#[derive(Debug, Default)]
struct GeneratorForm {
    image: Option<ImageUpload>,
    prompt: Option<String>,
}

fn malformed(err: MultipartError) -> UploadError {
    UploadError::Malformed(err.body_text())
}

/// Read the `image` and `prompt` fields. A file input left empty by the
/// browser arrives with no bytes and no file name and is treated as absent.
async fn read_generator_form(mut multipart: Multipart) -> std::result::Result<GeneratorForm, UploadError> {
    let mut form = GeneratorForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => {
                let content_type = field
                    .content_type()
                    .map_or_else(|| "application/octet-stream".to_owned(), str::to_owned);
                let file_name = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned);
                let bytes = field.bytes().await.map_err(malformed)?;
                if bytes.is_empty() && file_name.is_none() {
                    continue;
                }
                form.image = Some(ImageUpload {
                    content_type,
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            Some("prompt") => {
                form.prompt = Some(field.text().await.map_err(malformed)?);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Generator fragment with the notify trigger, or a redirect back to the
/// page for plain form posts.
fn generator_response(headers: &HeaderMap, view: GeneratorView) -> Response {
    if !is_htmx(headers) {
        return Redirect::to("/face-fusion").into_response();
    }
    (AppendHeaders([NOTIFY_TRIGGER]), GeneratorTemplate { view }).into_response()
}

/// Display the Face Fusion page.
///
/// With `?resume=1`, a generation that was waiting for sign-in is started.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    visitor: KnownVisitor,
    nonce: CspNonce,
    Query(query): Query<ShowQuery>,
) -> impl IntoResponse {
    let Some(visitor) = visitor.0 else {
        return FaceFusionTemplate {
            shell: Shell::new(&state, nonce, Nav::FaceFusion, HeaderView::signed_out()),
            view: GenerationState::default().view(Instant::now()),
        };
    };
    let mut guard = visitor.context.lock().await;

    if query.resume.is_some_and(|flag| flag != 0) {
        match state.generation().resume(&visitor.context, &mut guard) {
            Some(outcome) => tracing::info!(?outcome, "generation resumed after sign-in"),
            None => tracing::debug!("nothing to resume"),
        }
    }

    let view = guard.generation.view(Instant::now());
    let header = guard.header();
    drop(guard);

    FaceFusionTemplate {
        shell: Shell::new(&state, nonce, Nav::FaceFusion, header),
        view,
    }
}

/// Current generator fragment (HTMX polling).
#[instrument(skip_all)]
pub async fn status(visitor: KnownVisitor) -> impl IntoResponse {
    let view = match &visitor.0 {
        Some(visitor) => visitor.context.lock().await.generation.view(Instant::now()),
        None => GenerationState::default().view(Instant::now()),
    };
    (AppendHeaders([NOTIFY_TRIGGER]), GeneratorTemplate { view })
}

/// Upload an image (HTMX).
///
/// Replaces any previous image and clears the image error.
#[instrument(skip(state, visitor, headers, multipart), fields(visitor = %visitor.id))]
pub async fn upload(
    State(state): State<AppState>,
    visitor: Visitor,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response> {
    let form = read_generator_form(multipart).await?;
    let image = form.image.ok_or(UploadError::Empty)?;

    let mut guard = visitor.context.lock().await;
    if let Err(e) = state.generation().upload(&mut guard, image) {
        tracing::info!(error = %e, "upload rejected");
        return Err(e.into());
    }
    let view = guard.generation.view(Instant::now());
    drop(guard);

    Ok(generator_response(&headers, view))
}

/// Update the prompt text (HTMX, no swap).
#[instrument(skip(state, visitor, form), fields(visitor = %visitor.id))]
pub async fn prompt(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<PromptForm>,
) -> StatusCode {
    let mut guard = visitor.context.lock().await;
    state.generation().set_prompt(&mut guard, form.prompt);
    StatusCode::NO_CONTENT
}

/// Generate an image (HTMX).
///
/// The body may carry a new image and the current prompt; both are applied
/// before the request is validated.
#[instrument(skip(state, visitor, headers, multipart), fields(visitor = %visitor.id))]
pub async fn generate(
    State(state): State<AppState>,
    visitor: Visitor,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response> {
    let form = read_generator_form(multipart).await?;
    let workflow = state.generation();

    let mut guard = visitor.context.lock().await;
    if let Some(image) = form.image {
        workflow.upload(&mut guard, image)?;
    }
    if let Some(prompt) = form.prompt {
        workflow.set_prompt(&mut guard, prompt);
    }

    match workflow.generate(&visitor.context, &mut guard) {
        GenerateOutcome::Rejected(report) => tracing::info!(
            image_missing = report.image_missing,
            prompt_missing = report.prompt_missing,
            "generation rejected"
        ),
        GenerateOutcome::SignInRequired => tracing::info!("sign-in required to generate"),
        GenerateOutcome::Started { run } => tracing::debug!(run, "generation accepted"),
        GenerateOutcome::AlreadyRunning => tracing::debug!("generation already running"),
    }

    let view = guard.generation.view(Instant::now());
    drop(guard);

    Ok(generator_response(&headers, view))
}

/// Dismiss the sign-in dialog (HTMX).
///
/// The waiting generation is forgotten.
#[instrument(skip(state, visitor, headers), fields(visitor = %visitor.id))]
pub async fn close_dialog(
    State(state): State<AppState>,
    visitor: Visitor,
    headers: HeaderMap,
) -> Response {
    let mut guard = visitor.context.lock().await;
    state.generation().close_dialog(&mut guard);
    let view = guard.generation.view(Instant::now());
    drop(guard);

    generator_response(&headers, view)
}
