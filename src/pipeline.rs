//! Build orchestrator.
//!
//! Sequences a whole run and owns every filesystem side effect:
//!
//! ```text
//! Init → AssetsCopied → DataFetched → IndexWritten → TopicsProcessed → Done
//!   └──────────┴─────────────┴──── fatal ──→ Failed
//! ```
//!
//! 1. Delete and recreate the output directory.
//! 2. Copy static files into the output root.
//! 3. Load and validate both templates.
//! 4. Fetch the flattened topic list. Failure aborts the run.
//! 5. Render cards for the most recent topics into `index.html`.
//! 6. Assign a slug to every topic, then render each topic page to
//!    `topics/<slug>.html`.
//!
//! Everything up to and including the index write is fatal on error. Inside
//! step 6 each topic is isolated: an unusable slug is a skip, a render or
//! write failure is logged with the topic's title and id, and the loop moves
//! on. Pages render in parallel on the rayon pool; writes happen afterwards in
//! fetch order so output and logs are deterministic.
//!
//! ## Slug assignment
//!
//! Two titles can transliterate to the same slug. The first topic in fetch
//! order claims the bare slug; later ones get `-<slugified id>` appended, plus
//! a numeric suffix if that is taken too. Cards link to the assigned slug, so
//! the index never points at a page that belongs to another topic. Cards for
//! skipped topics have no page to point at and link back to the index with
//! the topic's query parameters.

use crate::TOPICS_DIR;
use crate::card::render_cards;
use crate::config::{ConfigError, SiteConfig};
use crate::flatten::fetch_all_topics;
use crate::page::{Slot, Template, TemplateError, render_index, render_page};
use crate::slug::{is_unusable, slugify};
use crate::store::{DataSource, StoreError};
use crate::topic::Topic;
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Fatal build failures. Per-topic problems never surface here.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Fetch failed: {0}")]
    Fetch(#[from] StoreError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Cannot reset output directory {path}: {source}")]
    Clean { path: PathBuf, source: io::Error },
    #[error("Cannot copy static file {path}: {source}")]
    StaticAsset { path: PathBuf, source: io::Error },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Where a topic's page goes, decided before anything is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugAssignment {
    /// The title slug, unclaimed so far.
    Page { slug: String },
    /// The title slug was already claimed; `slug` is the disambiguated one.
    Renamed { base: String, slug: String },
    /// Empty or untitled slug. No page is written.
    Skipped { slug: String },
}

impl SlugAssignment {
    /// Slug of the page to write, if any.
    pub fn page_slug(&self) -> Option<&str> {
        match self {
            SlugAssignment::Page { slug } | SlugAssignment::Renamed { slug, .. } => Some(slug),
            SlugAssignment::Skipped { .. } => None,
        }
    }

    /// The assigned slug, or the raw unusable one for skipped topics.
    pub fn slug(&self) -> &str {
        match self {
            SlugAssignment::Page { slug }
            | SlugAssignment::Renamed { slug, .. }
            | SlugAssignment::Skipped { slug } => slug,
        }
    }
}

/// Assign slugs over `topics` in order.
pub fn assign_slugs(topics: &[Topic]) -> Vec<SlugAssignment> {
    let mut taken: HashSet<String> = HashSet::new();

    topics
        .iter()
        .map(|topic| {
            let base = slugify(topic.title.as_deref());
            if is_unusable(&base) {
                return SlugAssignment::Skipped { slug: base };
            }
            if taken.insert(base.clone()) {
                return SlugAssignment::Page { slug: base };
            }

            let id_slug = slugify(Some(&topic.id));
            let first = if is_unusable(&id_slug) {
                format!("{base}-2")
            } else {
                format!("{base}-{id_slug}")
            };
            let mut slug = first.clone();
            let mut n = 2;
            while !taken.insert(slug.clone()) {
                slug = format!("{first}-{n}");
                n += 1;
            }
            SlugAssignment::Renamed { base, slug }
        })
        .collect()
}

/// Result of processing one topic page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicOutcome {
    Generated { path: PathBuf },
    Skipped,
    Failed { error: String },
}

/// Identifies a topic in reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicEntry {
    pub id: String,
    pub title: Option<String>,
    pub slug: String,
}

impl TopicEntry {
    fn new(topic: &Topic, slug: &str) -> Self {
        Self {
            id: topic.id.clone(),
            title: topic.title.clone(),
            slug: slug.to_string(),
        }
    }
}

/// A topic whose page could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTopic {
    pub entry: TopicEntry,
    pub error: String,
}

/// A topic moved off its title slug by a collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedTopic {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// Summary of a completed build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Topics fetched from the store.
    pub fetched: usize,
    /// Cards rendered into the index.
    pub indexed: usize,
    pub generated: Vec<TopicEntry>,
    pub skipped: Vec<TopicEntry>,
    pub failed: Vec<FailedTopic>,
    pub renamed: Vec<RenamedTopic>,
}

/// Slug plan for one topic, as reported by `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTopic {
    pub id: String,
    pub title: Option<String>,
    pub assignment: SlugAssignment,
}

/// What a build would do, without writing anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    pub topics: Vec<PlannedTopic>,
}

/// Both templates, validated.
#[derive(Debug, Clone)]
pub struct Templates {
    pub index: Template,
    pub topic: Template,
}

impl Templates {
    pub fn load(config: &SiteConfig) -> Result<Self, TemplateError> {
        Ok(Self {
            index: Template::load(&config.templates.index, &Slot::INDEX)?,
            topic: Template::load(&config.templates.topic, &Slot::TOPIC_PAGE)?,
        })
    }
}

/// Run the full build against `source`. The config is validated before
/// anything is deleted.
pub fn build(config: &SiteConfig, source: &dyn DataSource) -> Result<BuildReport, BuildError> {
    config.validate()?;
    let origin = config.origin()?;
    let output_dir = &config.output_dir;

    reset_output(output_dir)?;
    copy_static_files(&config.static_files, output_dir)?;
    let templates = Templates::load(config)?;

    tracing::info!("Fetching topics");
    let topics = fetch_all_topics(source)?;
    tracing::info!(count = topics.len(), "Fetched topics");

    let assignments = assign_slugs(&topics);
    let mut report = BuildReport {
        fetched: topics.len(),
        ..BuildReport::default()
    };

    report.indexed = write_index(
        &templates.index,
        &topics,
        &assignments,
        config.recent_topics,
        output_dir,
    )?;
    tracing::info!(cards = report.indexed, "Wrote index.html");

    let rendered: Vec<Option<Result<String, String>>> = topics
        .par_iter()
        .zip(assignments.par_iter())
        .map(|(topic, assignment)| {
            let slug = assignment.page_slug()?;
            Some(
                canonical_url(&origin, slug)
                    .map_err(|e| e.to_string())
                    .and_then(|url| {
                        render_page(&templates.topic, topic, &url, &config.defaults)
                            .map_err(|e| e.to_string())
                    }),
            )
        })
        .collect();

    let topics_dir = output_dir.join(TOPICS_DIR);
    for ((topic, assignment), page) in topics.iter().zip(&assignments).zip(rendered) {
        let entry = TopicEntry::new(topic, assignment.slug());
        if let SlugAssignment::Renamed { base, slug } = assignment {
            tracing::warn!(
                id = %topic.id,
                from = %base,
                to = %slug,
                "Slug already taken, page renamed"
            );
            report.renamed.push(RenamedTopic {
                id: topic.id.clone(),
                from: base.clone(),
                to: slug.clone(),
            });
        }

        match write_topic_page(&topics_dir, assignment, page) {
            TopicOutcome::Generated { path } => {
                tracing::debug!(path = %path.display(), "Wrote topic page");
                report.generated.push(entry);
            }
            TopicOutcome::Skipped => {
                tracing::warn!(
                    id = %topic.id,
                    title = topic.title.as_deref().unwrap_or(""),
                    "Skipping topic with empty or untitled slug"
                );
                report.skipped.push(entry);
            }
            TopicOutcome::Failed { error } => {
                tracing::error!(
                    id = %topic.id,
                    title = topic.title.as_deref().unwrap_or(""),
                    %error,
                    "Failed to generate topic page"
                );
                report.failed.push(FailedTopic { entry, error });
            }
        }
    }

    tracing::info!(
        generated = report.generated.len(),
        fetched = report.fetched,
        "Build complete"
    );
    Ok(report)
}

/// Validate templates, fetch, and assign slugs. Writes nothing.
pub fn plan(config: &SiteConfig, source: &dyn DataSource) -> Result<BuildPlan, BuildError> {
    config.validate()?;
    Templates::load(config)?;
    let topics = fetch_all_topics(source)?;
    let assignments = assign_slugs(&topics);

    Ok(BuildPlan {
        topics: topics
            .into_iter()
            .zip(assignments)
            .map(|(topic, assignment)| PlannedTopic {
                id: topic.id,
                title: topic.title,
                assignment,
            })
            .collect(),
    })
}

/// Absolute URL of a topic page.
pub fn canonical_url(origin: &Url, slug: &str) -> Result<Url, url::ParseError> {
    origin.join(&format!("{TOPICS_DIR}/{slug}.html"))
}

/// Indices of the `limit` most recent topics, newest first. Ties keep fetch
/// order.
pub fn most_recent(topics: &[Topic], limit: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..topics.len()).collect();
    order.sort_by_key(|&i| Reverse(topics[i].recency()));
    order.truncate(limit);
    order
}

fn write_index(
    template: &Template,
    topics: &[Topic],
    assignments: &[SlugAssignment],
    limit: usize,
    output_dir: &Path,
) -> Result<usize, BuildError> {
    let recent = most_recent(topics, limit);
    let cards = render_cards(
        recent
            .iter()
            .map(|&i| (&topics[i], assignments[i].page_slug())),
    );
    fs::write(
        output_dir.join("index.html"),
        render_index(template, &cards.into_string()),
    )?;
    Ok(recent.len())
}

fn write_topic_page(
    topics_dir: &Path,
    assignment: &SlugAssignment,
    page: Option<Result<String, String>>,
) -> TopicOutcome {
    let (Some(slug), Some(page)) = (assignment.page_slug(), page) else {
        return TopicOutcome::Skipped;
    };
    let html = match page {
        Ok(html) => html,
        Err(error) => return TopicOutcome::Failed { error },
    };
    let path = topics_dir.join(format!("{slug}.html"));
    match fs::write(&path, html) {
        Ok(()) => TopicOutcome::Generated { path },
        Err(e) => TopicOutcome::Failed {
            error: format!("{}: {e}", path.display()),
        },
    }
}

/// Delete the output directory and recreate it with an empty `topics/`.
fn reset_output(output_dir: &Path) -> Result<(), BuildError> {
    match fs::remove_dir_all(output_dir) {
        Ok(()) => tracing::debug!(path = %output_dir.display(), "Removed previous output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(BuildError::Clean {
                path: output_dir.to_path_buf(),
                source,
            });
        }
    }
    fs::create_dir_all(output_dir.join(TOPICS_DIR)).map_err(|source| BuildError::Clean {
        path: output_dir.to_path_buf(),
        source,
    })
}

/// Copy each static file (or directory tree) into the output root.
fn copy_static_files(files: &[PathBuf], output_dir: &Path) -> Result<(), BuildError> {
    for src in files {
        let asset_err = |source: io::Error| BuildError::StaticAsset {
            path: src.clone(),
            source,
        };
        let name = src.file_name().ok_or_else(|| {
            asset_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path has no file name",
            ))
        })?;
        let dst = output_dir.join(name);

        if src.is_dir() {
            copy_dir_recursive(src, &dst).map_err(asset_err)?;
        } else {
            fs::copy(src, &dst).map_err(asset_err)?;
        }
        tracing::debug!(from = %src.display(), "Copied static file");
    }
    Ok(())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in walkdir::WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
