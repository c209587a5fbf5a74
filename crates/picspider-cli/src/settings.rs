use std::fs::File;
use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::Context;
use picspider_crawler::{CategorySeed, CrawlerConfig};
use serde::{Deserialize, Serialize};

/// Everything the settings file holds: the crawler configuration plus gallery options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub crawler: CrawlerConfig,

    #[serde(default = "default_albums_per_page")]
    pub albums_per_page: NonZeroUsize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            albums_per_page: default_albums_per_page(),
        }
    }
}

fn default_albums_per_page() -> NonZeroUsize {
    NonZeroUsize::new(12).unwrap_or(NonZeroUsize::MIN)
}

impl Settings {
    /// Reads a JSON or YAML settings file, missing keys take their defaults.
    ///
    /// A relative `photo_dir` is resolved against the file's directory.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Couldn't open {}", path.display()))?;
        let mut settings: Settings = serde_yaml::from_reader(file)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        if settings.crawler.photo_dir.is_relative() {
            if let Some(parent) = path.parent() {
                settings.crawler.photo_dir = parent.join(&settings.crawler.photo_dir);
            }
        }
        Ok(settings)
    }

    /// Like [`Settings::load`], writing a default file first when none exists.
    pub fn load_or_init(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            Settings::default().save(path)?;
            log::info!("Created default settings file {}", path.display());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file =
            File::create(path).with_context(|| format!("Couldn't create {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

/// Parses `URL=PAGES`.
pub fn parse_category(s: &str) -> Result<CategorySeed, String> {
    let (url, pages) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected URL=PAGES, got {s:?}"))?;
    let max_pages = pages
        .parse()
        .map_err(|e| format!("invalid page count {pages:?}: {e}"))?;
    Ok(CategorySeed::new(url, max_pages))
}
