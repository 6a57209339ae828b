//! Shared test utilities for the topic-press test suite.
//!
//! Provides topic builders and a throwaway project directory with both
//! templates and a static file, ready for [`crate::pipeline::build`].
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let config = project_config(tmp.path());
//! let report = build(&config, &store).unwrap();
//! ```

use std::fs;
use std::path::Path;

use crate::config::SiteConfig;
use crate::topic::Topic;

// =========================================================================
// Templates
// =========================================================================

pub const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<body>
<main id="topics"><!--TOPIC_LIST_PLACEHOLDER--></main>
</body>
</html>
"#;

pub const TOPIC_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>__OG_TITLE__</title>
<meta property="og:title" content="__OG_TITLE__">
<meta property="og:description" content="__OG_DESCRIPTION__">
<meta property="og:image" content="__OG_IMAGE__">
<meta property="og:url" content="__OG_URL__">
</head>
<body>
<script id="topic-data" type="application/json">__TOPIC_DATA_JSON__</script>
</body>
</html>
"#;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write templates and `admin.html` into `root` and return a validated
/// config pointing at them. Output goes to `root/dist`.
pub fn project_config(root: &Path) -> SiteConfig {
    fs::write(root.join("index-template.html"), INDEX_TEMPLATE).unwrap();
    fs::write(root.join("topic-template.html"), TOPIC_TEMPLATE).unwrap();
    fs::write(root.join("admin.html"), "<html>admin</html>").unwrap();

    let mut config = SiteConfig::default();
    config.store.root = "export".into();
    let config = config.resolve_paths(root);
    config.validate().unwrap();
    config
}

// =========================================================================
// Topic builders
// =========================================================================

/// A topic under `cat/sub` with only an id and title.
pub fn titled_topic(id: &str, title: &str) -> Topic {
    Topic {
        id: id.to_string(),
        title: Some(title.to_string()),
        category: "cat".to_string(),
        subcategory: "sub".to_string(),
        ..Topic::default()
    }
}
