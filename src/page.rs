//! Topic pages and the template slots they fill.
//!
//! Templates are plain HTML files authored outside this crate. They mark
//! insertion points with fixed tokens:
//!
//! | Slot | Token | Occurrences replaced |
//! |------|-------|----------------------|
//! | [`Slot::Title`] | `__OG_TITLE__` | all |
//! | [`Slot::Description`] | `__OG_DESCRIPTION__` | all |
//! | [`Slot::Image`] | `__OG_IMAGE__` | all |
//! | [`Slot::CanonicalUrl`] | `__OG_URL__` | all |
//! | [`Slot::TopicData`] | `__TOPIC_DATA_JSON__` | first only |
//! | [`Slot::TopicList`] | `<!--TOPIC_LIST_PLACEHOLDER-->` | first only (index) |
//!
//! A template is parsed once into text and slot segments. Loading fails if a
//! required token is absent, so a renamed token is caught at startup instead
//! of silently rendering pages with nothing substituted.
//!
//! ## Escaping
//!
//! Title, description, image and URL values are HTML-escaped (they land in
//! `<title>` and `<meta content="...">`). The topic payload is JSON with `<`
//! written as `\u003c`, so no stored string can close the `<script>` element
//! it is embedded in.

use crate::config::PageDefaults;
use crate::topic::Topic;
use maud::html;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Template {name} is missing the {slot:?} slot (token `{token}`)")]
    MissingSlot {
        name: String,
        slot: Slot,
        token: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Failed to serialize topic data: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A named insertion point in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Title,
    Description,
    Image,
    CanonicalUrl,
    TopicData,
    TopicList,
}

impl Slot {
    /// Slots a topic-page template must contain.
    pub const TOPIC_PAGE: [Slot; 5] = [
        Slot::Title,
        Slot::Description,
        Slot::Image,
        Slot::CanonicalUrl,
        Slot::TopicData,
    ];

    /// Slots an index template must contain.
    pub const INDEX: [Slot; 1] = [Slot::TopicList];

    pub fn token(self) -> &'static str {
        match self {
            Slot::Title => "__OG_TITLE__",
            Slot::Description => "__OG_DESCRIPTION__",
            Slot::Image => "__OG_IMAGE__",
            Slot::CanonicalUrl => "__OG_URL__",
            Slot::TopicData => "__TOPIC_DATA_JSON__",
            Slot::TopicList => "<!--TOPIC_LIST_PLACEHOLDER-->",
        }
    }

    /// Whether every occurrence is a slot, or only the first.
    fn repeats(self) -> bool {
        !matches!(self, Slot::TopicData | Slot::TopicList)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Slot(Slot),
}

/// A parsed template: literal text interleaved with slots.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`, requiring every slot in `required`. `name` only
    /// labels errors.
    pub fn parse(name: &str, source: &str, required: &[Slot]) -> Result<Template, TemplateError> {
        let mut segments = Vec::new();
        let mut seen: Vec<Slot> = Vec::new();
        let mut rest = source;

        loop {
            // Earliest remaining slot token; single-use slots count once.
            let next = required
                .iter()
                .filter(|slot| slot.repeats() || !seen.contains(*slot))
                .filter_map(|slot| rest.find(slot.token()).map(|at| (at, *slot)))
                .min_by_key(|(at, _)| *at);

            let Some((at, slot)) = next else {
                if !rest.is_empty() {
                    segments.push(Segment::Text(rest.to_string()));
                }
                break;
            };
            if at > 0 {
                segments.push(Segment::Text(rest[..at].to_string()));
            }
            segments.push(Segment::Slot(slot));
            if !seen.contains(&slot) {
                seen.push(slot);
            }
            rest = &rest[at + slot.token().len()..];
        }

        if let Some(missing) = required.iter().find(|slot| !seen.contains(*slot)) {
            return Err(TemplateError::MissingSlot {
                name: name.to_string(),
                slot: *missing,
                token: missing.token(),
            });
        }
        Ok(Template { segments })
    }

    /// Read and parse a template file.
    pub fn load(path: &Path, required: &[Slot]) -> Result<Template, TemplateError> {
        let source = fs::read_to_string(path).map_err(|e| TemplateError::Io {
            path: path.to_owned(),
            source: e,
        })?;
        Template::parse(&path.display().to_string(), &source, required)
    }

    /// Fill every slot via `fill`. Slots without a value render empty.
    pub fn render<'a>(&self, fill: impl Fn(Slot) -> Option<&'a str>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(slot) => out.push_str(fill(*slot).unwrap_or_default()),
            }
        }
        out
    }
}

/// Values for one topic page, already escaped for their slots.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    pub title: String,
    pub description: String,
    pub image: String,
    pub canonical_url: String,
    pub topic_data: String,
}

impl PageContext {
    /// Build the context for `topic`, applying `defaults` for missing
    /// fields. Fails only if the topic payload cannot be serialized.
    pub fn new(
        topic: &Topic,
        canonical_url: &Url,
        defaults: &PageDefaults,
    ) -> Result<PageContext, PageError> {
        Ok(PageContext {
            title: escape(topic.title.as_deref().unwrap_or(&defaults.title)),
            description: escape(
                topic
                    .description
                    .as_deref()
                    .unwrap_or(&defaults.description),
            ),
            image: escape(topic.preview_image().unwrap_or(&defaults.image)),
            canonical_url: escape(canonical_url.as_str()),
            topic_data: embed_json(topic)?,
        })
    }

    fn get(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Title => Some(&self.title),
            Slot::Description => Some(&self.description),
            Slot::Image => Some(&self.image),
            Slot::CanonicalUrl => Some(&self.canonical_url),
            Slot::TopicData => Some(&self.topic_data),
            Slot::TopicList => None,
        }
    }
}

/// Render a full topic page from the topic-page template.
pub fn render_page(
    template: &Template,
    topic: &Topic,
    canonical_url: &Url,
    defaults: &PageDefaults,
) -> Result<String, PageError> {
    let context = PageContext::new(topic, canonical_url, defaults)?;
    Ok(template.render(|slot| context.get(slot)))
}

/// Render the index page with pre-rendered card markup in the list slot.
pub fn render_index(template: &Template, cards: &str) -> String {
    template.render(|slot| (slot == Slot::TopicList).then_some(cards))
}

/// Serialize the topic for embedding inside a `<script>` element.
pub fn embed_json(topic: &Topic) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(topic)?.replace('<', "\\u003c"))
}

fn escape(text: &str) -> String {
    html! { (text) }.into_string()
}
