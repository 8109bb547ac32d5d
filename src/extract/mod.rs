//! Media link extraction from landing page HTML.
//!
//! Landing pages list their videos inside dropdown menus:
//!
//! ```html
//! <div class="dropdown-content">
//!   <a onclick="myfunction('https://cdn.example.com/v/clip-1-2.mp4')">Download</a>
//! </div>
//! ```
//!
//! [`DropdownExtractor`] finds every container block of the configured
//! classes and collects the first string argument of each embedded call,
//! keeping only URLs that end in the media extension.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::{debug, info, instrument};

use crate::download::constants::MEDIA_EXTENSION;

/// Container classes recognised by default.
pub const DEFAULT_CONTAINER_CLASSES: [&str; 2] = ["dropdown-content", "dropdown-content1"];

/// Embedded call whose first argument carries the media URL.
pub const DEFAULT_CALL_NAME: &str = "myfunction";

/// Pulls candidate media URLs out of an HTML document.
pub trait LinkExtractor: Send + Sync {
    /// Returns the unique media URLs in `html`, in lexicographic order.
    ///
    /// An empty set is a valid result.
    fn extract(&self, html: &str) -> BTreeSet<String>;
}

/// Settings for [`DropdownExtractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// `class` attribute values that mark a container block.
    pub container_classes: Vec<String>,
    /// Function name of the embedded call.
    pub call_name: String,
    /// Required URL suffix (case-sensitive).
    pub media_extension: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            container_classes: DEFAULT_CONTAINER_CLASSES
                .iter()
                .map(ToString::to_string)
                .collect(),
            call_name: DEFAULT_CALL_NAME.to_string(),
            media_extension: MEDIA_EXTENSION.to_string(),
        }
    }
}

/// One compiled container pattern.
#[derive(Debug)]
struct ContainerPattern {
    class_name: String,
    block: Regex,
}

/// Regex-based extractor for dropdown container blocks.
#[derive(Debug)]
pub struct DropdownExtractor {
    containers: Vec<ContainerPattern>,
    call: Regex,
    media_extension: String,
}

impl DropdownExtractor {
    /// Compiles the patterns described by `config`.
    ///
    /// # Errors
    ///
    /// Returns the regex error if a pattern cannot be compiled (for example
    /// when the compiled size limit is exceeded).
    pub fn new(config: &ExtractorConfig) -> Result<Self, regex::Error> {
        let containers = config
            .container_classes
            .iter()
            .map(|class_name| {
                let pattern = format!(
                    r#"(?is)<div class="{}"[^>]*>(.*?)</div>"#,
                    regex::escape(class_name)
                );
                Ok(ContainerPattern {
                    class_name: class_name.clone(),
                    block: Regex::new(&pattern)?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        let call = Regex::new(&format!(
            r#"(?i){}\(['"]([^'"]+)['"]"#,
            regex::escape(&config.call_name)
        ))?;

        Ok(Self {
            containers,
            call,
            media_extension: config.media_extension.clone(),
        })
    }

    /// Builds the extractor with the default containers and call name.
    ///
    /// # Panics
    ///
    /// Never in practice: the default patterns are static and valid.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_defaults() -> Self {
        Self::new(&ExtractorConfig::default()).expect("default extractor patterns are valid")
    }
}

impl Default for DropdownExtractor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl LinkExtractor for DropdownExtractor {
    #[instrument(level = "debug", skip_all, fields(html_len = html.len()))]
    fn extract(&self, html: &str) -> BTreeSet<String> {
        let mut urls = BTreeSet::new();

        for container in &self.containers {
            let mut blocks = 0_usize;
            for block in container.block.captures_iter(html) {
                blocks += 1;
                let Some(body) = block.get(1) else {
                    continue;
                };
                for call in self.call.captures_iter(body.as_str()) {
                    let Some(url) = call.get(1).map(|m| m.as_str()) else {
                        continue;
                    };
                    if !url.ends_with(&self.media_extension) {
                        debug!(url, "skipping non-media call argument");
                        continue;
                    }
                    if urls.insert(url.to_string()) {
                        debug!(url, "found video URL");
                    }
                }
            }
            info!(class = %container.class_name, blocks, "Found {blocks} {} blocks", container.class_name);
        }

        info!(found = urls.len(), "Total unique video URLs found: {}", urls.len());
        urls
    }
}
