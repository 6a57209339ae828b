//! Topic cards for the index page.
//!
//! The index pre-renders cards for the most recent topics so the first paint
//! shows real content before any client-side script runs. A card is a
//! self-contained `<a>` fragment:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        preview image         │
//! ├──────────────────────────────┤
//! │ [subcategory]                │
//! │ Title                        │
//! │ Description                  │
//! ├──────────────────────────────┤
//! │ ♥ likes   ▥ votes  Explore → │
//! └──────────────────────────────┘
//! ```
//!
//! Rendering never fails: missing fields degrade to defaults. All
//! interpolated text is HTML-escaped by maud.

use crate::slug::{is_unusable, slugify};
use crate::topic::Topic;
use maud::{Markup, PreEscaped, html};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Card heading when a topic has no title.
pub const DEFAULT_CARD_TITLE: &str = "Untitled Topic";

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const PLACEHOLDER_BASE: &str = "https://placehold.co/600x400/e2e8f0/64748b?text=";

const HEART_OUTLINE: &str = r#"<svg class="heart-outline w-5 h-5" fill="none" viewBox="0 0 24 24" stroke-width="2" stroke="currentColor"><path stroke-linecap="round" stroke-linejoin="round" d="M21 8.25c0-2.485-2.099-4.5-4.688-4.5-1.935 0-3.597 1.126-4.312 2.733-.715-1.607-2.377-2.733-4.313-2.733C5.1 3.75 3 5.765 3 8.25c0 7.22 9 12 9 12s9-4.78 9-12z" /></svg>"#;
const HEART_FILLED: &str = r#"<svg class="heart-filled w-5 h-5 text-red-500" viewBox="0 0 20 20" fill="currentColor"><path d="M9.653 16.915l-.005-.003-.019-.01a20.759 20.759 0 01-1.162-.682 22.045 22.045 0 01-2.582-1.9-22.247 22.247 0 01-2.644-2.437 24.362 24.362 0 01-1.644-2.296C1.025 6.42 2.342 4.148 4.793 4.148c1.393 0 2.68.723 3.432 1.855c.753-1.132 2.04-1.855 3.433-1.855c2.45 0 3.768 2.272 3.22 5.263c-.538 2.957-2.956 5.395-5.948 7.532a24.394 24.394 0 01-1.644 1.037z" /></svg>"#;
const CHART_ICON: &str = r#"<svg class="w-5 h-5" xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke-width="2" stroke="currentColor"><path stroke-linecap="round" stroke-linejoin="round" d="M16 8v8m-4-5v5m-4-2v2m-2 4h12a2 2 0 002-2V6a2 2 0 00-2-2H6a2 2 0 00-2 2v12a2 2 0 002 2z" /></svg>"#;

/// Percent-encode a query parameter value. Spaces become `%20`.
pub fn encode_param(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Site-relative link to a topic. The query parameters are the
/// authoritative link back to the stored record; the slug is cosmetic.
///
/// `/topics/<slug>.html?id=<id>&category=<category>&subcategory=<subcategory>`
///
/// Without a page slug the link targets the index, `/?id=...`, since no
/// topic page exists.
pub fn topic_link(topic: &Topic, slug: Option<&str>) -> String {
    let query = format!(
        "id={}&category={}&subcategory={}",
        encode_param(&topic.id),
        encode_param(&topic.category),
        encode_param(&topic.subcategory),
    );
    match slug {
        Some(slug) => format!("/{}/{}.html?{}", crate::TOPICS_DIR, slug, query),
        None => format!("/?{query}"),
    }
}

/// Generated placeholder image labelled with the topic title.
pub fn placeholder_image(title: Option<&str>) -> String {
    format!(
        "{}{}",
        PLACEHOLDER_BASE,
        encode_param(title.unwrap_or(DEFAULT_CARD_TITLE))
    )
}

/// Render a card linking to the topic's title-derived slug.
pub fn render_card(topic: &Topic) -> Markup {
    let slug = slugify(topic.title.as_deref());
    render_card_at(topic, (!is_unusable(&slug)).then_some(slug.as_str()))
}

/// Render a card linking to `slug`, or to the index when the topic has no
/// page. Used when the slug was disambiguated.
pub fn render_card_at(topic: &Topic, slug: Option<&str>) -> Markup {
    let link = topic_link(topic, slug);
    let image_url = topic
        .preview_image()
        .map(str::to_string)
        .unwrap_or_else(|| placeholder_image(topic.title.as_deref()));

    html! {
        a href=(link) class="topic-card rounded-2xl shadow-lg flex flex-col" data-topic-id=(topic.id) {
            div class="relative pt-[56.25%] rounded-t-2xl overflow-hidden" {
                img src=(image_url)
                    alt=(topic.title.as_deref().unwrap_or("Topic"))
                    class="absolute top-0 left-0 w-full h-full object-cover"
                    loading="lazy";
            }
            div class="p-4 flex-grow flex flex-col" {
                div { span.subcategory-tag { (topic.subcategory) } }
                h3 class="font-bold text-lg mt-2" {
                    (topic.title.as_deref().unwrap_or(DEFAULT_CARD_TITLE))
                }
                p class="topic-card-description text-sm text-[var(--color-text-secondary)] mt-2" {
                    (topic.description.as_deref().unwrap_or(""))
                }
            }
            div class="px-4 pb-4 border-t border-[var(--color-border)]/50 flex justify-between items-center mt-auto pt-3" {
                div class="flex items-center gap-4 text-sm text-[var(--color-text-secondary)]" {
                    button class="like-button flex items-center gap-1.5 hover:text-red-500" {
                        (PreEscaped(HEART_OUTLINE))
                        (PreEscaped(HEART_FILLED))
                        span class="like-count font-medium" { (topic.likes()) }
                    }
                    span class="flex items-center gap-1.5" {
                        (PreEscaped(CHART_ICON))
                        span { (topic.total_votes()) }
                    }
                }
                div class="text-sm font-bold text-[var(--color-primary-accent-text)] group" {
                    "Explore Now "
                    span class="inline-block transition-transform group-hover:translate-x-1" {
                        (PreEscaped("&rarr;"))
                    }
                }
            }
        }
    }
}

/// Render cards for `topics` (each paired with its page slug), in order.
pub fn render_cards<'a>(
    topics: impl IntoIterator<Item = (&'a Topic, Option<&'a str>)>,
) -> Markup {
    html! {
        @for (topic, slug) in topics {
            (render_card_at(topic, slug))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use crate::topic::{MediaItem, Perspective};
    use std::collections::BTreeMap;

    #[test]
    fn link_carries_id_and_encoded_origin() {
        let topic = Topic {
            id: "abc123".into(),
            category: "Arts & Culture".into(),
            subcategory: "film/tv".into(),
            ..Topic::default()
        };
        assert_eq!(
            topic_link(&topic, Some("my-topic")),
            "/topics/my-topic.html?id=abc123&category=Arts%20%26%20Culture&subcategory=film%2Ftv"
        );
    }

    #[test]
    fn encoding_matches_uri_component_rules() {
        assert_eq!(encode_param("a b&c=d/é"), "a%20b%26c%3Dd%2F%C3%A9");
        assert_eq!(encode_param("keep-_.!~*'()"), "keep-_.!~*'()");
    }

    #[test]
    fn link_without_page_targets_index() {
        let topic = Topic {
            id: "x 1".into(),
            category: "c".into(),
            subcategory: "s".into(),
            ..Topic::default()
        };
        assert_eq!(topic_link(&topic, None), "/?id=x%201&category=c&subcategory=s");
    }

    #[test]
    fn card_uses_title_slug_by_default() {
        let html = render_card(&titled_topic("t1", "Café & Crème")).into_string();
        assert!(html.contains("/topics/cafe-and-creme.html?id=t1"));
    }

    #[test]
    fn card_shows_total_votes() {
        let mut topic = titled_topic("t1", "Votes");
        topic.perspectives = Some(BTreeMap::from([
            ("A".to_string(), Perspective::with_votes(3)),
            ("B".to_string(), Perspective::with_votes(5)),
        ]));
        let html = render_card(&topic).into_string();
        assert!(html.contains("<span>8</span>"));
    }

    #[test]
    fn card_vote_total_saturates() {
        let mut topic = titled_topic("t1", "Landslide");
        topic.perspectives = Some(BTreeMap::from([
            ("A".to_string(), Perspective::with_votes(i64::MAX)),
            ("B".to_string(), Perspective::with_votes(1)),
        ]));
        let html = render_card(&topic).into_string();
        assert!(html.contains(&format!("<span>{}</span>", i64::MAX)));
    }

    #[test]
    fn card_without_perspectives_shows_zero_votes() {
        let html = render_card(&titled_topic("t1", "Quiet")).into_string();
        assert!(html.contains("<span>0</span>"));
    }

    #[test]
    fn card_shows_likes_defaulting_to_zero() {
        let mut topic = titled_topic("t1", "Liked");
        assert!(render_card(&topic).into_string().contains(r#"<span class="like-count font-medium">0</span>"#));
        topic.likes = Some(42);
        assert!(render_card(&topic).into_string().contains(r#"<span class="like-count font-medium">42</span>"#));
    }

    #[test]
    fn card_prefers_first_image_media() {
        let mut topic = titled_topic("t1", "Pictures");
        topic.media = Some(vec![
            MediaItem {
                kind: Some("video".into()),
                url: Some("https://cdn/v.mp4".into()),
                ..MediaItem::default()
            },
            MediaItem::image("https://cdn/a.png"),
            MediaItem::image("https://cdn/b.png"),
        ]);
        let html = render_card(&topic).into_string();
        assert!(html.contains(r#"src="https://cdn/a.png""#));
        assert!(!html.contains("b.png"));
    }

    #[test]
    fn card_falls_back_to_placeholder_image() {
        let html = render_card(&titled_topic("t1", "No Media")).into_string();
        assert!(html.contains("https://placehold.co/600x400/e2e8f0/64748b?text=No%20Media"));
    }

    #[test]
    fn card_defaults_for_missing_title_and_description() {
        let topic = Topic {
            id: "t9".into(),
            category: "c".into(),
            subcategory: "s".into(),
            ..Topic::default()
        };
        let html = render_card(&topic).into_string();
        assert!(html.contains(DEFAULT_CARD_TITLE));
        assert!(html.contains(r#"alt="Topic""#));
        assert!(html.contains(r#"href="/?id=t9&amp;category=c"#));
        assert!(!html.contains("/topics/"));
    }

    #[test]
    fn card_escapes_text() {
        let mut topic = titled_topic("t1", "<script>alert(1)</script>");
        topic.description = Some("a < b".into());
        let html = render_card(&topic).into_string();
        assert!(!html.contains("<script>"));
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn card_shows_subcategory_tag() {
        let html = render_card(&titled_topic("t1", "Tagged")).into_string();
        assert!(html.contains(r#"<span class="subcategory-tag">sub</span>"#));
    }

    #[test]
    fn cards_render_in_given_order() {
        let a = titled_topic("a", "First");
        let b = titled_topic("b", "Second");
        let html = render_cards([(&b, Some("second")), (&a, Some("first"))]).into_string();
        let second = html.find("Second").unwrap();
        let first = html.find("First").unwrap();
        assert!(second < first);
        assert_eq!(html.matches("topic-card ").count(), 2);
    }
}
