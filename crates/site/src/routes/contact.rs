//! Contact page route handlers.
//!
//! The form is validated and acknowledged. Messages are not forwarded
//! anywhere.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use dpicon_core::Email;
use serde::Deserialize;
use tracing::instrument;

use crate::filters;
use crate::middleware::{CspNonce, KnownVisitor, Visitor};
use crate::models::Notification;
use crate::state::AppState;

use super::{Nav, Shell};

/// Longest accepted message body, in characters.
const MAX_MESSAGE_CHARS: usize = 5000;

/// A contact channel card.
#[derive(Clone)]
pub struct ContactCard {
    pub icon: &'static str,
    pub title: &'static str,
    pub content: &'static str,
}

const CONTACT_CARDS: [ContactCard; 3] = [
    ContactCard {
        icon: "mail",
        title: "Email Us",
        content: "hello@techflow.com",
    },
    ContactCard {
        icon: "phone",
        title: "Call Us",
        content: "+1 (555) 123-4567",
    },
    ContactCard {
        icon: "map-pin",
        title: "Visit Us",
        content: "123 Innovation St, Tech City",
    },
];

/// Contact form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

/// Per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactErrors {
    pub name: Option<&'static str>,
    pub email: Option<&'static str>,
    pub subject: Option<&'static str>,
    pub message: Option<&'static str>,
}

impl ContactErrors {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.subject.is_none()
            && self.message.is_none()
    }
}

impl ContactForm {
    /// Check every field.
    #[must_use]
    pub fn validate(&self) -> ContactErrors {
        let required = |value: &str, message| value.trim().is_empty().then_some(message);

        ContactErrors {
            name: required(&self.name, "Please enter your name."),
            email: required(&self.email, "Please enter your email.").or_else(|| {
                Email::parse(self.email.trim())
                    .is_err()
                    .then_some("Please enter a valid email address.")
            }),
            subject: required(&self.subject, "Please enter a subject."),
            message: required(&self.message, "Please enter a message.").or_else(|| {
                (self.message.chars().count() > MAX_MESSAGE_CHARS)
                    .then_some("Your message is too long.")
            }),
        }
    }
}

/// Contact page template.
#[derive(Template, WebTemplate)]
#[template(path = "contact.html")]
pub struct ContactTemplate {
    pub shell: Shell,
    pub cards: Vec<ContactCard>,
    pub form: ContactForm,
    pub errors: ContactErrors,
}

/// Display the contact page.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    visitor: KnownVisitor,
    nonce: CspNonce,
) -> impl IntoResponse {
    let header = visitor.header().await;
    ContactTemplate {
        shell: Shell::new(&state, nonce, Nav::None, header),
        cards: CONTACT_CARDS.to_vec(),
        form: ContactForm::default(),
        errors: ContactErrors::default(),
    }
}

/// Submit the contact form.
///
/// Invalid input re-renders the form with 422. Valid input queues a
/// confirmation toast and redirects back to the page.
#[instrument(skip(state, visitor, nonce, form), fields(visitor = %visitor.id))]
pub async fn submit(
    State(state): State<AppState>,
    visitor: Visitor,
    nonce: CspNonce,
    Form(form): Form<ContactForm>,
) -> Response {
    let errors = form.validate();

    if !errors.is_empty() {
        tracing::debug!(?errors, "contact form rejected");
        let header = visitor.context.header().await;
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            ContactTemplate {
                shell: Shell::new(&state, nonce, Nav::None, header),
                cards: CONTACT_CARDS.to_vec(),
                form,
                errors,
            },
        )
            .into_response();
    }

    tracing::info!(subject = %form.subject.trim(), "contact message received");
    visitor.context.lock().await.notifications.push(Notification::success(
        "Message Sent!",
        "We'll get back to you within 24 hours.",
    ));

    Redirect::to("/contact").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, subject: &str, message: &str) -> ContactForm {
        ContactForm {
            name: name.to_owned(),
            email: email.to_owned(),
            subject: subject.to_owned(),
            message: message.to_owned(),
        }
    }

    #[test]
    fn test_valid_form() {
        let errors = form("Ada", "ada@example.com", "Hello", "A question").validate();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_blank_fields_are_reported_independently() {
        let errors = form(" ", "", "Hello", "\n").validate();
        assert!(errors.name.is_some());
        assert_eq!(errors.email, Some("Please enter your email."));
        assert!(errors.subject.is_none());
        assert!(errors.message.is_some());
    }

    #[test]
    fn test_invalid_email() {
        let errors = form("Ada", "not-an-email", "Hello", "Hi").validate();
        assert_eq!(errors.email, Some("Please enter a valid email address."));
    }

    #[test]
    fn test_overlong_message() {
        let errors = form("Ada", "ada@example.com", "Hello", &"x".repeat(5001)).validate();
        assert_eq!(errors.message, Some("Your message is too long."));
    }
}
