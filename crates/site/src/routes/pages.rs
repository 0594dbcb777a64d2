//! Marketing page route handlers.
//!
//! Services and About are fixed copy. Sponsor is a markdown page from the
//! content directory.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::content::Page;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CspNonce, KnownVisitor};
use crate::state::AppState;

use super::{Nav, Shell};

/// Slug of the sponsor page under `content/pages/`.
const SPONSOR_SLUG: &str = "sponsor";

/// A service offering card.
#[derive(Clone)]
pub struct ServiceCard {
    pub icon: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

/// A headline number on the About page.
#[derive(Clone)]
pub struct Stat {
    pub value: &'static str,
    pub label: &'static str,
}

const SERVICES: [ServiceCard; 6] = [
    ServiceCard {
        icon: "code",
        title: "Web Development",
        description: "Modern, responsive websites and web applications built with cutting-edge technologies.",
    },
    ServiceCard {
        icon: "cloud",
        title: "Cloud Solutions",
        description: "Scalable cloud infrastructure and migration services for enhanced performance.",
    },
    ServiceCard {
        icon: "brain",
        title: "AI & Machine Learning",
        description: "Intelligent automation and data-driven insights to transform your business.",
    },
    ServiceCard {
        icon: "shield",
        title: "Cybersecurity",
        description: "Comprehensive security solutions to protect your digital assets and data.",
    },
    ServiceCard {
        icon: "cpu",
        title: "IoT Solutions",
        description: "Connect and automate your devices with our Internet of Things expertise.",
    },
    ServiceCard {
        icon: "phone",
        title: "Mobile Apps",
        description: "Native and cross-platform mobile applications for iOS and Android.",
    },
];

const STATS: [Stat; 4] = [
    Stat {
        value: "500+",
        label: "Projects Completed",
    },
    Stat {
        value: "50+",
        label: "Happy Clients",
    },
    Stat {
        value: "24/7",
        label: "Support Available",
    },
    Stat {
        value: "99.9%",
        label: "Uptime Guarantee",
    },
];

const TECHNOLOGIES: [&str; 12] = [
    "React",
    "Node.js",
    "Python",
    "AWS",
    "Docker",
    "Kubernetes",
    "TensorFlow",
    "MongoDB",
    "PostgreSQL",
    "GraphQL",
    "TypeScript",
    "Next.js",
];

/// Services page template.
#[derive(Template, WebTemplate)]
#[template(path = "services.html")]
pub struct ServicesTemplate {
    pub shell: Shell,
    pub services: Vec<ServiceCard>,
}

/// About page template.
#[derive(Template, WebTemplate)]
#[template(path = "about.html")]
pub struct AboutTemplate {
    pub shell: Shell,
    pub stats: Vec<Stat>,
    pub technologies: Vec<&'static str>,
}

/// Markdown content page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/content.html")]
pub struct ContentPageTemplate {
    pub shell: Shell,
    pub page: Page,
}

/// Display the services page.
#[instrument(skip_all)]
pub async fn services(
    State(state): State<AppState>,
    visitor: KnownVisitor,
    nonce: CspNonce,
) -> impl IntoResponse {
    let header = visitor.header().await;
    ServicesTemplate {
        shell: Shell::new(&state, nonce, Nav::None, header),
        services: SERVICES.to_vec(),
    }
}

/// Display the about page.
#[instrument(skip_all)]
pub async fn about(
    State(state): State<AppState>,
    visitor: KnownVisitor,
    nonce: CspNonce,
) -> impl IntoResponse {
    let header = visitor.header().await;
    AboutTemplate {
        shell: Shell::new(&state, nonce, Nav::None, header),
        stats: STATS.to_vec(),
        technologies: TECHNOLOGIES.to_vec(),
    }
}

/// Display the sponsor page.
#[instrument(skip_all)]
pub async fn sponsor(
    State(state): State<AppState>,
    visitor: KnownVisitor,
    nonce: CspNonce,
) -> Result<impl IntoResponse> {
    let page = state
        .content()
        .get_page(SPONSOR_SLUG)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("page {SPONSOR_SLUG}")))?;
    let header = visitor.header().await;

    Ok(ContentPageTemplate {
        shell: Shell::new(&state, nonce, Nav::Sponsor, header),
        page,
    })
}
