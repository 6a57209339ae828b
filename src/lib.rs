//! # topic-press
//!
//! A static pre-renderer for a discussion-poll site. It reads every topic out
//! of a three-level document store (categories → subcategories → topics) and
//! writes plain HTML: an index whose first screen is already filled with the
//! most recent topics, plus one crawlable page per topic carrying social-share
//! metadata and the full topic record for the client-side app to hydrate.
//!
//! # Architecture
//!
//! ```text
//! store export ──fetch──▶ flat topic list ──┬─ cards ──▶ dist/index.html
//!                                           └─ pages ──▶ dist/topics/<slug>.html
//! ```
//!
//! Everything except [`pipeline`] is pure: slugging, card rendering, and page
//! rendering are functions from data to strings. The pipeline owns the
//! filesystem and decides which failures are fatal and which are isolated to
//! a single topic.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`slug`] | Title → URL-safe slug, deterministic and total |
//! | [`store`] | Store value model, `DataSource` trait, filesystem and in-memory stores |
//! | [`topic`] | Typed topic record and its embedded JSON form |
//! | [`flatten`] | Three-level traversal into one ordered topic list |
//! | [`card`] | Index card fragments rendered with Maud |
//! | [`page`] | Slot-validated templates and topic page rendering |
//! | [`pipeline`] | Build orchestration, slug assignment, failure isolation |
//! | [`config`] | `site.toml` loading, env overrides, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Typed Slots Over String Replacement
//!
//! Templates are parsed once into text and slot segments. A template missing
//! one of its tokens fails to load, so a renamed placeholder is a build error
//! instead of a page that silently ships `__OG_TITLE__`.
//!
//! ## Timestamps Resolved at the Boundary
//!
//! The store's native timestamp shape is recognised once, while decoding a
//! document. Everything downstream sees `chrono::DateTime<Utc>` and the
//! embedded payload only ever carries ISO-8601 strings.
//!
//! ## Fresh Output Every Run
//!
//! The output directory is deleted before anything is fetched. A failed run
//! leaves an empty `topics/` rather than stale pages mixed with new ones.

pub mod card;
pub mod config;
pub mod flatten;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod slug;
pub mod store;
pub mod topic;

/// Directory under the output root holding one page per topic.
pub const TOPICS_DIR: &str = "topics";

#[cfg(test)]
pub(crate) mod test_helpers;
