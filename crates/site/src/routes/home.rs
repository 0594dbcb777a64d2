//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::filters;
use crate::middleware::{CspNonce, KnownVisitor};
use crate::state::AppState;

use super::{Nav, Shell};

/// A point in the "Why DPIcon" list.
#[derive(Clone)]
pub struct Highlight {
    pub title: &'static str,
    pub body: &'static str,
}

/// A titled block of copy below the fold.
#[derive(Clone)]
pub struct ContentSection {
    pub title: &'static str,
    pub body: &'static str,
}

const HIGHLIGHTS: [Highlight; 4] = [
    Highlight {
        title: "AI Alchemy",
        body: "Turn whispers of thought into vivid masterpieces with next-gen tech. No Rules",
    },
    Highlight {
        title: "Just Wonders",
        body: "Easy enough for dreamers, powerful enough for visionaries.",
    },
    Highlight {
        title: "Infinite Realms",
        body: "Text-to-image wizardry or face-swapping adventures\u{2014}your choice.",
    },
    Highlight {
        title: "Blink-and-Done Speed",
        body: "Stellar results faster than a meteor shower.",
    },
];

const SECTIONS: [ContentSection; 3] = [
    ContentSection {
        title: "Transform Your Ideas into Stunning Visuals",
        body: "Step into a world where words weave wonders and faces find new fates. DPIcon is your \
               portal to boundless creativity, powered by cutting-edge AI. From conjuring vivid scenes \
               with a single sentence to reimagining your face in fantastical realms, we turn your \
               wildest whims into breathtaking visuals. Dare to dream \u{2013} DPIcon makes it real.",
    },
    ContentSection {
        title: "The Spark of a New Era",
        body: "At DPIcon, we believe creativity shouldn't be confined. We're pioneers at the \
               crossroads of art and technology, crafting tools that let you sculpt the impossible. \
               Whether you're an artist seeking a muse, a visionary with a story, or a soul craving \
               something new, DPIcon is your playground of endless potential.",
    },
    ContentSection {
        title: "What Sets Us Apart",
        body: "AI Sorcery: Advanced algorithms that turn imagination into masterpieces. No Limits, \
               Just Magic: From text to art, face to fantasy \u{2013} explore it all. Instant Alchemy: \
               Conjure creations faster than a lightning strike. Yours to Command: Simple tools, \
               extraordinary results \u{2013} no wizardry degree required.",
    },
];

/// Hero background video.
const HERO_VIDEO_URL: &str = "https://www.w3schools.com/html/mov_bbb.mp4";

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub shell: Shell,
    pub hero_video_url: &'static str,
    pub highlights: Vec<Highlight>,
    pub sections: Vec<ContentSection>,
}

/// Display the home page.
#[instrument(skip_all)]
pub async fn home(
    State(state): State<AppState>,
    visitor: KnownVisitor,
    nonce: CspNonce,
) -> impl IntoResponse {
    let header = visitor.header().await;

    HomeTemplate {
        shell: Shell::new(&state, nonce, Nav::Home, header),
        hero_video_url: HERO_VIDEO_URL,
        highlights: HIGHLIGHTS.to_vec(),
        sections: SECTIONS.to_vec(),
    }
}
