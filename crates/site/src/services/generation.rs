//! Face Fusion generation workflow.
//!
//! Generation is simulated: a started run completes after a fixed delay and
//! produces no image. What is real is the gating in front of it. Both inputs
//! are validated independently, signed-out visitors are routed through
//! sign-in with the request remembered, and a run that is already in flight
//! cannot be started twice.

use std::sync::{Arc, Weak};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dpicon_core::{GenerationInput, GenerationPhase, ValidationReport};
use thiserror::Error;
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::FaceFusionConfig;
use crate::error::add_breadcrumb;
use crate::models::Notification;
use crate::services::session::{SessionContext, VisitorState};

/// Problems with an uploaded file.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("uploaded file is not an image ({0})")]
    NotAnImage(String),

    #[error("uploaded file is empty")]
    Empty,

    #[error("image exceeds the {max} byte upload limit")]
    TooLarge { max: usize },

    #[error("malformed upload: {0}")]
    Malformed(String),
}

/// An image accepted by [`GenerationWorkflow::upload`].
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub data_url: String,
    pub content_type: String,
    pub size: usize,
    pub file_name: Option<String>,
}

/// Raw upload as read from the multipart body.
#[derive(Debug)]
pub struct ImageUpload {
    pub content_type: String,
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Generator inputs and progress for one visitor.
#[derive(Debug, Default)]
pub struct GenerationState {
    image: Option<UploadedImage>,
    prompt: String,
    image_error: bool,
    prompt_error: bool,
    shake_image: bool,
    shake_prompt: bool,
    /// Set by the first failed attempt; later failures inside the window
    /// do not extend it.
    feedback_expires: Option<Instant>,
    phase: GenerationPhase,
    run: u64,
    sign_in_dialog: bool,
    resume_pending: bool,
}

impl GenerationState {
    fn input(&self) -> GenerationInput<'_> {
        GenerationInput {
            image: self.image.as_ref().map(|image| image.data_url.as_str()),
            prompt: &self.prompt,
        }
    }

    fn expire_feedback(&mut self, now: Instant) {
        if self.feedback_expires.is_some_and(|at| at <= now) {
            self.image_error = false;
            self.prompt_error = false;
            self.shake_image = false;
            self.shake_prompt = false;
            self.feedback_expires = None;
        }
    }

    /// Complete run `run` if it is still the one in flight.
    fn finish(&mut self, run: u64) -> bool {
        if self.phase.is_in_flight() && self.run == run {
            self.phase = GenerationPhase::Idle;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub const fn phase(&self) -> GenerationPhase {
        self.phase
    }

    #[must_use]
    pub const fn image(&self) -> Option<&UploadedImage> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub const fn sign_in_dialog(&self) -> bool {
        self.sign_in_dialog
    }

    #[must_use]
    pub const fn resume_pending(&self) -> bool {
        self.resume_pending
    }

    /// Render-ready view. Shake flags are one-shot and cleared here.
    pub fn view(&mut self, now: Instant) -> GeneratorView {
        self.expire_feedback(now);
        let in_flight = self.phase.is_in_flight();
        let refresh_after_ms = if in_flight {
            Some(STATUS_POLL_MS)
        } else {
            self.feedback_expires.map(|at| {
                let remaining = at.saturating_duration_since(now).as_millis();
                u64::try_from(remaining).unwrap_or(u64::MAX).max(1)
            })
        };

        GeneratorView {
            image_data_url: self.image.as_ref().map(|image| image.data_url.clone()),
            prompt: self.prompt.clone(),
            image_error: self.image_error,
            prompt_error: self.prompt_error,
            shake_image: std::mem::take(&mut self.shake_image),
            shake_prompt: std::mem::take(&mut self.shake_prompt),
            in_flight,
            sign_in_dialog: self.sign_in_dialog,
            refresh_after_ms,
        }
    }
}

const STATUS_POLL_MS: u64 = 1000;

/// What the generator panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorView {
    pub image_data_url: Option<String>,
    pub prompt: String,
    pub image_error: bool,
    pub prompt_error: bool,
    pub shake_image: bool,
    pub shake_prompt: bool,
    pub in_flight: bool,
    pub sign_in_dialog: bool,
    /// When set, the panel re-fetches itself after this many milliseconds.
    pub refresh_after_ms: Option<u64>,
}

/// Result of asking to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// One or both inputs are missing; feedback has been queued.
    Rejected(ValidationReport),
    /// The visitor must sign in first. The request is remembered.
    SignInRequired,
    /// A run has started.
    Started { run: u64 },
    /// A run is already in flight; nothing changed.
    AlreadyRunning,
}

/// Validates, gates and runs generation requests.
#[derive(Debug, Clone)]
pub struct GenerationWorkflow {
    delay: Duration,
    feedback_clear: Duration,
    max_upload_bytes: usize,
}

impl GenerationWorkflow {
    #[must_use]
    pub const fn new(config: &FaceFusionConfig) -> Self {
        Self {
            delay: config.generation_delay,
            feedback_clear: config.feedback_clear,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    #[must_use]
    pub const fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Accept an image, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is empty, too large or not an image.
    /// The previous image is kept in that case.
    pub fn upload(&self, state: &mut VisitorState, upload: ImageUpload) -> Result<(), UploadError> {
        if !upload.content_type.starts_with("image/") {
            return Err(UploadError::NotAnImage(upload.content_type));
        }
        if upload.bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(UploadError::TooLarge {
                max: self.max_upload_bytes,
            });
        }

        let size = upload.bytes.len();
        let data_url = format!(
            "data:{};base64,{}",
            upload.content_type,
            STANDARD.encode(&upload.bytes)
        );
        tracing::debug!(size, content_type = %upload.content_type, "image uploaded");

        let generation = &mut state.generation;
        generation.image = Some(UploadedImage {
            data_url,
            content_type: upload.content_type,
            size,
            file_name: upload.file_name,
        });
        generation.image_error = false;
        generation.shake_image = false;
        Ok(())
    }

    /// Replace the prompt text.
    pub fn set_prompt(&self, state: &mut VisitorState, prompt: String) {
        let generation = &mut state.generation;
        generation.prompt = prompt;
        generation.prompt_error = false;
        generation.shake_prompt = false;
    }

    /// Handle a click on "Generate Image".
    pub fn generate(&self, ctx: &Arc<SessionContext>, state: &mut VisitorState) -> GenerateOutcome {
        let now = Instant::now();
        state.generation.expire_feedback(now);

        if state.generation.phase.is_in_flight() {
            tracing::debug!(visitor = %ctx.visitor(), "generation already in flight");
            return GenerateOutcome::AlreadyRunning;
        }

        let report = state.generation.input().validate();
        if !report.is_valid() {
            if report.image_missing {
                state.generation.image_error = true;
                state.generation.shake_image = true;
                state.notifications.push(Notification::error(
                    "Image Required",
                    "Please upload an image to continue.",
                ));
            }
            if report.prompt_missing {
                state.generation.prompt_error = true;
                state.generation.shake_prompt = true;
                state.notifications.push(Notification::error(
                    "Prompt Required",
                    "Please describe your vision to continue.",
                ));
            }
            if state.generation.feedback_expires.is_none() {
                state.generation.feedback_expires = Some(now + self.feedback_clear);
            }
            return GenerateOutcome::Rejected(report);
        }

        if !state.session().is_signed_in() {
            let generation = &mut state.generation;
            generation.phase = GenerationPhase::AwaitingSignIn;
            generation.sign_in_dialog = true;
            generation.resume_pending = true;
            tracing::info!(visitor = %ctx.visitor(), "generation waiting for sign-in");
            return GenerateOutcome::SignInRequired;
        }

        self.start(ctx, state)
    }

    /// Continue a generation that was interrupted by sign-in.
    ///
    /// Does nothing unless a request is remembered, the visitor is now
    /// signed in and both inputs are still present.
    pub fn resume(&self, ctx: &Arc<SessionContext>, state: &mut VisitorState) -> Option<GenerateOutcome> {
        if !state.generation.resume_pending {
            return None;
        }
        self.close_dialog(state);

        if !state.session().is_signed_in() {
            tracing::debug!(visitor = %ctx.visitor(), "resume skipped, visitor still signed out");
            return None;
        }
        if !state.generation.input().validate().is_valid() {
            tracing::debug!(visitor = %ctx.visitor(), "resume skipped, inputs changed");
            return None;
        }

        Some(self.generate(ctx, state))
    }

    /// Dismiss the sign-in dialog and forget the remembered request.
    pub fn close_dialog(&self, state: &mut VisitorState) {
        let generation = &mut state.generation;
        generation.sign_in_dialog = false;
        generation.resume_pending = false;
        if generation.phase == GenerationPhase::AwaitingSignIn {
            generation.phase = GenerationPhase::Idle;
        }
    }

    fn start(&self, ctx: &Arc<SessionContext>, state: &mut VisitorState) -> GenerateOutcome {
        let generation = &mut state.generation;
        generation.run += 1;
        generation.phase = GenerationPhase::InFlight;
        generation.sign_in_dialog = false;
        generation.resume_pending = false;
        let run = generation.run;

        tracing::info!(visitor = %ctx.visitor(), run, "generation started");
        add_breadcrumb("generation", "Generation started", None);

        let span = tracing::info_span!("generation", visitor = %ctx.visitor(), run);
        tokio::spawn(complete_after(Arc::downgrade(ctx), run, self.delay).instrument(span));

        GenerateOutcome::Started { run }
    }
}

async fn complete_after(ctx: Weak<SessionContext>, run: u64, delay: Duration) {
    tokio::time::sleep(delay).await;

    let Some(ctx) = ctx.upgrade() else {
        tracing::debug!("session ended before generation completed");
        return;
    };
    let mut state = ctx.lock().await;
    if state.generation.finish(run) {
        state.notifications.push(Notification::success(
            "Image Generated!",
            "Your AI masterpiece is ready.",
        ));
        tracing::info!("generation completed");
    } else {
        tracing::debug!("stale generation run ignored");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::identity::IdentityHub;
    use dpicon_core::{IdentitySnapshot, SubjectId, UserIdentity, VisitorId};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    struct Fixture {
        hub: IdentityHub,
        ctx: Arc<SessionContext>,
        workflow: GenerationWorkflow,
    }

    impl Fixture {
        fn new() -> Self {
            let hub = IdentityHub::new(Duration::from_secs(3600), 100);
            let visitor = VisitorId::new("visitor-1");
            let ctx = Arc::new(SessionContext::new(visitor.clone(), hub.subscribe(&visitor)));
            Self {
                hub,
                ctx,
                workflow: GenerationWorkflow::new(&FaceFusionConfig::default()),
            }
        }

        fn sign_in(&self) {
            self.hub.publish(
                self.ctx.visitor(),
                IdentitySnapshot::SignedIn(UserIdentity {
                    subject: SubjectId::new("google-1"),
                    display_name: Some("Ada Lovelace".to_owned()),
                    email: None,
                    avatar_url: None,
                }),
            );
        }

        async fn fill_inputs(&self) {
            let mut state = self.ctx.lock().await;
            self.workflow
                .upload(
                    &mut state,
                    ImageUpload {
                        content_type: "image/png".to_owned(),
                        file_name: Some("face.png".to_owned()),
                        bytes: PNG.to_vec(),
                    },
                )
                .unwrap();
            self.workflow
                .set_prompt(&mut state, "A cyberpunk samurai in a neon city".to_owned());
        }

        async fn generate(&self) -> GenerateOutcome {
            let mut state = self.ctx.lock().await;
            self.workflow.generate(&self.ctx, &mut state)
        }

        async fn phase(&self) -> GenerationPhase {
            self.ctx.lock().await.generation.phase()
        }

        async fn titles(&self) -> Vec<String> {
            self.ctx
                .lock()
                .await
                .notifications
                .drain()
                .into_iter()
                .map(|n| n.title)
                .collect()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_inputs_missing_reports_both() {
        let fx = Fixture::new();
        fx.sign_in();

        let outcome = fx.generate().await;
        assert_eq!(
            outcome,
            GenerateOutcome::Rejected(ValidationReport {
                image_missing: true,
                prompt_missing: true,
            })
        );
        assert_eq!(fx.titles().await, ["Image Required", "Prompt Required"]);
        assert_eq!(fx.phase().await, GenerationPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_whitespace_prompt_is_missing() {
        let fx = Fixture::new();
        fx.sign_in();
        fx.fill_inputs().await;
        {
            let mut state = fx.ctx.lock().await;
            fx.workflow.set_prompt(&mut state, "   \n\t".to_owned());
        }

        let outcome = fx.generate().await;
        assert_eq!(
            outcome,
            GenerateOutcome::Rejected(ValidationReport {
                image_missing: false,
                prompt_missing: true,
            })
        );
        assert_eq!(fx.titles().await, ["Prompt Required"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_clears_after_deadline() {
        let fx = Fixture::new();
        fx.generate().await;

        let view = fx.ctx.lock().await.generation.view(Instant::now());
        assert!(view.image_error && view.prompt_error);
        assert!(view.shake_image && view.shake_prompt);
        assert_eq!(view.refresh_after_ms, Some(3000));

        // shakes are one-shot
        let view = fx.ctx.lock().await.generation.view(Instant::now());
        assert!(!view.shake_image);
        assert!(view.image_error);

        tokio::time::advance(Duration::from_secs(3)).await;
        let view = fx.ctx.lock().await.generation.view(Instant::now());
        assert!(!view.image_error && !view.prompt_error);
        assert_eq!(view.refresh_after_ms, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_failure_keeps_first_deadline() {
        let fx = Fixture::new();
        fx.generate().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        fx.generate().await;

        let view = fx.ctx.lock().await.generation.view(Instant::now());
        assert!(view.image_error);
        assert_eq!(view.refresh_after_ms, Some(1000));

        tokio::time::advance(Duration::from_secs(1)).await;
        let view = fx.ctx.lock().await.generation.view(Instant::now());
        assert!(!view.image_error && !view.prompt_error);

        // a failure after the window closed opens a new one
        fx.generate().await;
        let view = fx.ctx.lock().await.generation.view(Instant::now());
        assert!(view.image_error);
        assert_eq!(view.refresh_after_ms, Some(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_editing_clears_matching_error() {
        let fx = Fixture::new();
        fx.generate().await;
        {
            let mut state = fx.ctx.lock().await;
            fx.workflow.set_prompt(&mut state, "neon".to_owned());
        }
        let view = fx.ctx.lock().await.generation.view(Instant::now());
        assert!(view.image_error);
        assert!(!view.prompt_error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signed_out_opens_dialog_and_remembers() {
        let fx = Fixture::new();
        fx.fill_inputs().await;

        assert_eq!(fx.generate().await, GenerateOutcome::SignInRequired);
        let state = fx.ctx.lock().await;
        assert!(state.generation.sign_in_dialog());
        assert!(state.generation.resume_pending());
        assert_eq!(state.generation.phase(), GenerationPhase::AwaitingSignIn);
        assert!(state.notifications.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_after_sign_in_starts_run() {
        let fx = Fixture::new();
        fx.fill_inputs().await;
        fx.generate().await;

        fx.sign_in();
        let outcome = {
            let mut state = fx.ctx.lock().await;
            fx.workflow.resume(&fx.ctx, &mut state)
        };
        assert_eq!(outcome, Some(GenerateOutcome::Started { run: 1 }));
        assert!(!fx.ctx.lock().await.generation.sign_in_dialog());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_dialog_forgets_request() {
        let fx = Fixture::new();
        fx.fill_inputs().await;
        fx.generate().await;
        {
            let mut state = fx.ctx.lock().await;
            fx.workflow.close_dialog(&mut state);
        }
        assert_eq!(fx.phase().await, GenerationPhase::Idle);

        fx.sign_in();
        let mut state = fx.ctx.lock().await;
        assert_eq!(fx.workflow.resume(&fx.ctx, &mut state), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_after_delay() {
        let fx = Fixture::new();
        fx.sign_in();
        fx.fill_inputs().await;

        assert_eq!(fx.generate().await, GenerateOutcome::Started { run: 1 });
        assert_eq!(fx.phase().await, GenerationPhase::InFlight);
        assert_eq!(fx.generate().await, GenerateOutcome::AlreadyRunning);

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert_eq!(fx.phase().await, GenerationPhase::InFlight);
        assert!(fx.titles().await.is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fx.phase().await, GenerationPhase::Idle);
        assert_eq!(fx.titles().await, ["Image Generated!"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_view_polls() {
        let fx = Fixture::new();
        fx.sign_in();
        fx.fill_inputs().await;
        fx.generate().await;

        let view = fx.ctx.lock().await.generation.view(Instant::now());
        assert!(view.in_flight);
        assert_eq!(view.refresh_after_ms, Some(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_context_cancels_completion() {
        let fx = Fixture::new();
        fx.sign_in();
        fx.fill_inputs().await;
        fx.generate().await;

        let Fixture { hub, ctx, .. } = fx;
        drop(ctx);
        assert_eq!(hub.active_subscriptions(), 0);
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_upload_rejects_non_images() {
        let hub = IdentityHub::new(Duration::from_secs(60), 100);
        let visitor = VisitorId::new("v");
        let ctx = SessionContext::new(visitor.clone(), hub.subscribe(&visitor));
        let workflow = GenerationWorkflow::new(&FaceFusionConfig::default());
        let mut state = ctx.lock().await;

        let err = workflow
            .upload(
                &mut state,
                ImageUpload {
                    content_type: "application/pdf".to_owned(),
                    file_name: None,
                    bytes: b"%PDF".to_vec(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, UploadError::NotAnImage(_)));
        assert!(state.generation.image().is_none());
    }

    #[tokio::test]
    async fn test_upload_enforces_size_limit() {
        let hub = IdentityHub::new(Duration::from_secs(60), 100);
        let visitor = VisitorId::new("v");
        let ctx = SessionContext::new(visitor.clone(), hub.subscribe(&visitor));
        let workflow = GenerationWorkflow::new(&FaceFusionConfig {
            max_upload_bytes: 4,
            ..FaceFusionConfig::default()
        });
        let mut state = ctx.lock().await;

        let err = workflow
            .upload(
                &mut state,
                ImageUpload {
                    content_type: "image/png".to_owned(),
                    file_name: None,
                    bytes: PNG.to_vec(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { max: 4 }));
    }

    #[tokio::test]
    async fn test_upload_builds_data_url() {
        let hub = IdentityHub::new(Duration::from_secs(60), 100);
        let visitor = VisitorId::new("v");
        let ctx = SessionContext::new(visitor.clone(), hub.subscribe(&visitor));
        let workflow = GenerationWorkflow::new(&FaceFusionConfig::default());
        let mut state = ctx.lock().await;

        workflow
            .upload(
                &mut state,
                ImageUpload {
                    content_type: "image/png".to_owned(),
                    file_name: Some("face.png".to_owned()),
                    bytes: vec![1, 2, 3],
                },
            )
            .unwrap();
        let image = state.generation.image().unwrap();
        assert_eq!(image.data_url, "data:image/png;base64,AQID");
        assert_eq!(image.size, 3);
    }
}
