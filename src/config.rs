//! Site configuration module.
//!
//! Handles loading, merging, and validating `site.toml`. The file is sparse:
//! stock defaults are overridden by whatever keys the project sets, then
//! environment variables override the file, then CLI flags override both.
//!
//! ## Config File Location
//!
//! ```text
//! project/
//! ├── site.toml              # Site config (optional except `store.root`)
//! ├── .env                   # Optional environment overrides
//! ├── index-template.html
//! ├── topic-template.html
//! └── admin.html             # Static file copied to the output root
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! output_dir = "dist"
//! site_origin = "https://perspp.netlify.app"
//! recent_topics = 12
//! static_files = ["admin.html"]
//! log_level = "info"
//!
//! [templates]
//! index = "index-template.html"
//! topic = "topic-template.html"
//!
//! [store]
//! root = "export"            # Required
//!
//! [defaults]
//! title = "Perspective Poll Topic"
//! description = "Join the discussion on Perspective Poll."
//! image = "https://placehold.co/1200x630/3b82f6/ffffff?text=Perspective%0APoll"
//!
//! [processing]
//! max_processes = 4          # Omit for auto = CPU cores
//! ```
//!
//! ## Environment
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `TOPIC_PRESS_STORE_ROOT` | `store.root` |
//! | `TOPIC_PRESS_SITE_ORIGIN` | `site_origin` |
//! | `TOPIC_PRESS_OUTPUT_DIR` | `output_dir` |
//!
//! Relative paths resolve against the project root. Unknown keys are
//! rejected to catch typos early. A missing `store.root` is a configuration
//! error reported before the build touches the filesystem.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Config file name looked up in the project root.
pub const CONFIG_FILE: &str = "site.toml";

/// Optional environment file in the project root.
pub const ENV_FILE: &str = ".env";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Cannot load .env: {0}")]
    Env(#[from] dotenvy::Error),
}

/// Site configuration loaded from `site.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Output directory. Deleted and recreated on every build.
    pub output_dir: PathBuf,
    /// Absolute origin used for canonical topic URLs.
    pub site_origin: String,
    /// Number of most recent topics pre-rendered on the index page.
    pub recent_topics: usize,
    /// Files or directories copied verbatim into the output root.
    pub static_files: Vec<PathBuf>,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Template file locations.
    pub templates: TemplatesConfig,
    /// Document-store export location.
    pub store: StoreConfig,
    /// Fallback values for topic-page meta slots.
    pub defaults: PageDefaults,
    /// Parallel rendering settings.
    pub processing: ProcessingConfig,
    /// Directory the config was loaded from. Set by [`SiteConfig::resolve_paths`].
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("dist"),
            site_origin: "https://perspp.netlify.app".to_string(),
            recent_topics: 12,
            static_files: vec![PathBuf::from("admin.html")],
            log_level: "info".to_string(),
            templates: TemplatesConfig::default(),
            store: StoreConfig::default(),
            defaults: PageDefaults::default(),
            processing: ProcessingConfig::default(),
            project_root: PathBuf::new(),
        }
    }
}

impl SiteConfig {
    /// Validate required values and formats.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "store.root is required (set it in site.toml or TOPIC_PRESS_STORE_ROOT)".into(),
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output_dir must not be empty".into(),
            ));
        }
        self.check_output_dir()?;
        self.origin()?;
        Ok(())
    }

    /// The output directory is deleted on every build, so it must not be,
    /// or contain, any project input.
    fn check_output_dir(&self) -> Result<(), ConfigError> {
        let output = normalize(&self.output_dir);
        let inputs = [
            &self.project_root,
            &self.templates.index,
            &self.templates.topic,
            &self.store.root,
        ]
        .into_iter()
        .chain(&self.static_files)
        .filter(|p| !p.as_os_str().is_empty());

        for input in inputs {
            if normalize(input).starts_with(&output) {
                return Err(ConfigError::Validation(format!(
                    "output_dir {} would delete project input {}",
                    self.output_dir.display(),
                    input.display()
                )));
            }
        }
        Ok(())
    }

    /// The parsed site origin. Must be an absolute http(s) URL.
    pub fn origin(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.site_origin).map_err(|e| {
            ConfigError::Validation(format!("site_origin {:?}: {e}", self.site_origin))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "site_origin must be http or https, got {:?}",
                self.site_origin
            )));
        }
        Ok(url)
    }

    /// Resolve every relative path against `root`.
    pub fn resolve_paths(mut self, root: &Path) -> Self {
        let resolve = |p: &Path| -> PathBuf {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };
        self.output_dir = resolve(&self.output_dir);
        self.static_files = self.static_files.iter().map(|p| resolve(p)).collect();
        self.templates.index = resolve(&self.templates.index);
        self.templates.topic = resolve(&self.templates.topic);
        if !self.store.root.as_os_str().is_empty() {
            self.store.root = resolve(&self.store.root);
        }
        self.project_root = root.to_path_buf();
        self
    }

    /// Apply `TOPIC_PRESS_*` overrides read through `lookup`.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup("TOPIC_PRESS_STORE_ROOT") {
            self.store.root = PathBuf::from(root);
        }
        if let Some(origin) = lookup("TOPIC_PRESS_SITE_ORIGIN") {
            self.site_origin = origin;
        }
        if let Some(dir) = lookup("TOPIC_PRESS_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        self
    }
}

/// Template file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatesConfig {
    /// Index template, must contain `<!--TOPIC_LIST_PLACEHOLDER-->`.
    pub index: PathBuf,
    /// Topic-page template, must contain the `__OG_*__` and
    /// `__TOPIC_DATA_JSON__` tokens.
    pub topic: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            index: PathBuf::from("index-template.html"),
            topic: PathBuf::from("topic-template.html"),
        }
    }
}

/// Document-store export location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub root: PathBuf,
}

/// Fallbacks for topic pages whose record lacks a value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageDefaults {
    pub title: String,
    pub description: String,
    pub image: String,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self {
            title: "Perspective Poll Topic".to_string(),
            description: "Join the discussion on Perspective Poll.".to_string(),
            image: "https://placehold.co/1200x630/3b82f6/ffffff?text=Perspective%0APoll"
                .to_string(),
        }
    }
}

/// Parallel rendering settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel page renderers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Absolute form of `path` with `.` and `..` folded, symlink-free where the
/// path exists.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(real) = path.canonicalize() {
        return real;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut folded = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other),
        }
    }
    folded.canonicalize().unwrap_or(folded)
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SiteConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `site.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `site.toml` exists in the directory.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load `.env` from `root` into the process environment. A missing file is
/// skipped; an unreadable or malformed one is an error.
pub fn load_dotenv(root: &Path) -> Result<(), ConfigError> {
    match dotenvy::from_path(root.join(ENV_FILE)) {
        Err(e) if e.not_found() => Ok(()),
        result => Ok(result?),
    }
}

/// Load config from `site.toml` in `root` merged over stock defaults, with
/// paths resolved against `root`. Not yet validated: callers apply env and
/// CLI overrides first.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(root)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    Ok(config.resolve_paths(root))
}

/// Returns a fully-commented stock `site.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# topic-press configuration
# =========================
# All settings except store.root are optional. Values shown are the defaults.
# Relative paths resolve against the directory holding this file.
# Unknown keys will cause an error.

# Output directory. Deleted and recreated on every build.
output_dir = "dist"

# Origin for canonical topic URLs (og:url).
site_origin = "https://perspp.netlify.app"

# Most recent topics pre-rendered as cards on the index page.
recent_topics = 12

# Files or directories copied verbatim into the output root.
static_files = ["admin.html"]

# Log filter used when RUST_LOG is unset.
log_level = "info"

# ---------------------------------------------------------------------------
# Templates
# ---------------------------------------------------------------------------
[templates]
# Must contain <!--TOPIC_LIST_PLACEHOLDER-->.
index = "index-template.html"
# Must contain __OG_TITLE__, __OG_DESCRIPTION__, __OG_IMAGE__, __OG_URL__
# and __TOPIC_DATA_JSON__.
topic = "topic-template.html"

# ---------------------------------------------------------------------------
# Document store
# ---------------------------------------------------------------------------
[store]
# Root of the store export: <root>/categories/<c>/subcategories/<s>/topics/<id>.json
# Required. May also come from TOPIC_PRESS_STORE_ROOT.
# root = "export"

# ---------------------------------------------------------------------------
# Topic page fallbacks
# ---------------------------------------------------------------------------
[defaults]
title = "Perspective Poll Topic"
description = "Join the discussion on Perspective Poll."
image = "https://placehold.co/1200x630/3b82f6/ffffff?text=Perspective%0APoll"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel page renderers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = SiteConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("dist"));
        assert_eq!(config.recent_topics, 12);
        assert_eq!(config.static_files, vec![PathBuf::from("admin.html")]);
        assert_eq!(config.templates.index, PathBuf::from("index-template.html"));
        assert_eq!(config.defaults.title, "Perspective Poll Topic");
    }

    #[test]
    fn default_config_requires_store_root() {
        let result = SiteConfig::default().validate();
        assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("store.root")));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
recent_topics = 6

[store]
root = "export"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.recent_topics, 6);
        assert_eq!(config.store.root, PathBuf::from("export"));
        // Defaults preserved
        assert_eq!(config.site_origin, "https://perspp.netlify.app");
        assert_eq!(config.templates.topic, PathBuf::from("topic-template.html"));
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("recent_topic = 3");
        assert!(result.is_err());
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.output_dir, tmp.path().join("dist"));
        assert_eq!(config.templates.index, tmp.path().join("index-template.html"));
        assert!(config.store.root.as_os_str().is_empty());
    }

    #[test]
    fn load_config_reads_and_resolves_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
output_dir = "public"
static_files = ["admin.html", "/abs/robots.txt"]

[store]
root = "export"

[defaults]
title = "Untitled debate"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.output_dir, tmp.path().join("public"));
        assert_eq!(config.store.root, tmp.path().join("export"));
        assert_eq!(
            config.static_files,
            vec![tmp.path().join("admin.html"), PathBuf::from("/abs/robots.txt")]
        );
        assert_eq!(config.defaults.title, "Untitled debate");
        assert_eq!(
            config.defaults.description,
            "Join the discussion on Perspective Poll."
        );
        config.validate().unwrap();
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn missing_dotenv_is_skipped() {
        let tmp = TempDir::new().unwrap();
        load_dotenv(tmp.path()).unwrap();
    }

    #[test]
    fn malformed_dotenv_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(ENV_FILE), "this is not valid\n").unwrap();
        assert!(matches!(load_dotenv(tmp.path()), Err(ConfigError::Env(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TOPIC_PRESS_STORE_ROOT", "/data/export"),
            ("TOPIC_PRESS_SITE_ORIGIN", "https://example.org"),
        ]);
        let config = SiteConfig::default().apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.store.root, PathBuf::from("/data/export"));
        assert_eq!(config.site_origin, "https://example.org");
        assert_eq!(config.output_dir, PathBuf::from("dist"));
        config.validate().unwrap();
    }

    #[test]
    fn invalid_origin_rejected() {
        let mut config = SiteConfig::default();
        config.store.root = PathBuf::from("export");
        config.site_origin = "not a url".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.site_origin = "ftp://example.org".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    fn project(tmp: &TempDir) -> SiteConfig {
        fs::write(tmp.path().join(CONFIG_FILE), "[store]\nroot = \"export\"\n").unwrap();
        fs::write(tmp.path().join("index-template.html"), "").unwrap();
        fs::write(tmp.path().join("admin.html"), "").unwrap();
        load_config(tmp.path()).unwrap()
    }

    #[test]
    fn output_dir_inside_project_is_accepted() {
        let tmp = TempDir::new().unwrap();
        project(&tmp).validate().unwrap();
    }

    #[test]
    fn output_dir_at_project_root_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut config = project(&tmp);
        config.output_dir = tmp.path().to_path_buf();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(msg)) if msg.contains("would delete")));

        // Same directory spelled differently.
        config.output_dir = tmp.path().join("dist").join("..");
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn output_dir_above_project_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut config = project(&tmp);
        config.output_dir = tmp.path().parent().unwrap().to_path_buf();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn output_dir_containing_store_or_static_files_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut config = project(&tmp);
        config.project_root = PathBuf::new();
        config.templates.index = PathBuf::from("/elsewhere/index.html");
        config.templates.topic = PathBuf::from("/elsewhere/topic.html");
        config.static_files = vec![];
        config.output_dir = tmp.path().join("data");
        config.store.root = tmp.path().join("data/export");
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.store.root = tmp.path().join("export");
        config.static_files = vec![tmp.path().join("data")];
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.static_files = vec![tmp.path().join("admin.html")];
        config.validate().unwrap();
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value =
            toml::from_str("[defaults]\ntitle = \"a\"\ndescription = \"b\"").unwrap();
        let overlay: toml::Value = toml::from_str("[defaults]\ntitle = \"z\"").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["defaults"]["title"].as_str(), Some("z"));
        assert_eq!(merged["defaults"]["description"].as_str(), Some("b"));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.output_dir, defaults.output_dir);
        assert_eq!(config.site_origin, defaults.site_origin);
        assert_eq!(config.recent_topics, defaults.recent_topics);
        assert_eq!(config.defaults.image, defaults.defaults.image);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_auto_is_at_least_one() {
        assert!(effective_threads(&ProcessingConfig::default()) >= 1);
    }
}
