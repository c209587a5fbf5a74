use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::ensure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_photo_dir")]
    pub photo_dir: PathBuf,

    #[serde(default = "default_max_workers")]
    pub max_workers: NonZeroUsize,

    /// Delay in seconds between two download submissions
    #[serde(default = "default_download_delay")]
    pub download_delay: f32,

    #[serde(default = "default_retry_count")]
    pub retry_count: NonZeroUsize,

    /// Category listing URLs with their maximum number of pages, in crawl order
    #[serde(default = "default_categories", with = "categories_map")]
    pub categories: Vec<CategorySeed>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Delay in seconds between two listing pages of a category
    #[serde(default = "default_page_delay")]
    pub page_delay: f32,

    /// Delay in seconds between two albums of a listing page
    #[serde(default = "default_album_delay")]
    pub album_delay: f32,

    /// Timeout in seconds for category listing pages
    #[serde(default = "default_listing_timeout")]
    pub listing_timeout: u64,

    /// Timeout in seconds for album pages and images
    #[serde(default = "default_download_timeout")]
    pub download_timeout: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            photo_dir: default_photo_dir(),
            max_workers: default_max_workers(),
            download_delay: default_download_delay(),
            retry_count: default_retry_count(),
            categories: default_categories(),
            user_agent: default_user_agent(),
            page_delay: default_page_delay(),
            album_delay: default_album_delay(),
            listing_timeout: default_listing_timeout(),
            download_timeout: default_download_timeout(),
        }
    }
}

impl CrawlerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, delay) in [
            ("download_delay", self.download_delay),
            ("page_delay", self.page_delay),
            ("album_delay", self.album_delay),
        ] {
            ensure!(
                delay.is_finite() && delay >= 0.0,
                "Invalid {name}: expected a non-negative number of seconds, got {delay}"
            );
        }
        ensure!(self.listing_timeout > 0, "Invalid listing_timeout: 0");
        ensure!(self.download_timeout > 0, "Invalid download_timeout: 0");
        Ok(())
    }

    pub fn download_delay(&self) -> Duration {
        seconds(self.download_delay)
    }

    pub fn page_delay(&self) -> Duration {
        seconds(self.page_delay)
    }

    pub fn album_delay(&self) -> Duration {
        seconds(self.album_delay)
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout)
    }
}

fn seconds(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySeed {
    pub url: String,
    pub max_pages: usize,
}

impl CategorySeed {
    pub fn new(url: impl Into<String>, max_pages: usize) -> Self {
        Self {
            url: url.into(),
            max_pages,
        }
    }
}

impl fmt::Display for CategorySeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (max {} pages)", self.url, self.max_pages)
    }
}

fn default_photo_dir() -> PathBuf {
    PathBuf::from("downloaded")
}

fn default_max_workers() -> NonZeroUsize {
    NonZeroUsize::new(5).unwrap_or(NonZeroUsize::MIN)
}

fn default_download_delay() -> f32 {
    0.5
}

fn default_retry_count() -> NonZeroUsize {
    NonZeroUsize::new(3).unwrap_or(NonZeroUsize::MIN)
}

fn default_categories() -> Vec<CategorySeed> {
    vec![
        CategorySeed::new("https://everia.club/category/gravure/", 287),
        CategorySeed::new("https://everia.club/category/japan/", 274),
        CategorySeed::new("https://everia.club/category/korea/", 175),
        CategorySeed::new("https://everia.club/category/chinese/", 256),
        CategorySeed::new("https://everia.club/category/cosplay/", 115),
    ]
}

fn default_user_agent() -> String {
    String::from("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
}

fn default_page_delay() -> f32 {
    2.0
}

fn default_album_delay() -> f32 {
    1.0
}

fn default_listing_timeout() -> u64 {
    10
}

fn default_download_timeout() -> u64 {
    30
}

/// Categories are stored as a `url -> max_pages` map whose entry order is the crawl order.
mod categories_map {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::CategorySeed;

    pub fn serialize<S>(seeds: &[CategorySeed], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(seeds.len()))?;
        for seed in seeds {
            map.serialize_entry(&seed.url, &seed.max_pages)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<CategorySeed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SeedsVisitor;

        impl<'de> Visitor<'de> for SeedsVisitor {
            type Value = Vec<CategorySeed>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category URL to maximum page count")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut seeds = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((url, max_pages)) = access.next_entry::<String, usize>()? {
                    seeds.push(CategorySeed { url, max_pages });
                }
                Ok(seeds)
            }
        }

        deserializer.deserialize_map(SeedsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let conf: CrawlerConfig =
            serde_json::from_str(r#"{"photo_dir": "/data/photos", "max_workers": 2}"#).unwrap();
        assert_eq!(conf.photo_dir, PathBuf::from("/data/photos"));
        assert_eq!(conf.max_workers.get(), 2);
        assert_eq!(conf.retry_count.get(), 3);
        assert_eq!(conf.categories.len(), 5);
        assert_eq!(conf.page_delay(), Duration::from_secs(2));
    }

    #[test]
    fn categories_keep_file_order() {
        let conf: CrawlerConfig = serde_json::from_str(
            r#"{"categories": {"https://b.test/": 3, "https://a.test/": 1, "https://c.test/": 7}}"#,
        )
        .unwrap();
        let urls: Vec<_> = conf.categories.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, ["https://b.test/", "https://a.test/", "https://c.test/"]);
        assert_eq!(conf.categories[2].max_pages, 7);

        let json = serde_json::to_string(&conf).unwrap();
        let b = json.find("https://b.test/").unwrap();
        let a = json.find("https://a.test/").unwrap();
        assert!(b < a);
    }

    #[test]
    fn zero_workers_rejected() {
        let res = serde_json::from_str::<CrawlerConfig>(r#"{"max_workers": 0}"#);
        assert!(res.is_err());
    }

    #[test]
    fn negative_delay_rejected() {
        let conf = CrawlerConfig {
            download_delay: -1.0,
            ..Default::default()
        };
        assert!(conf.validate().is_err());
        assert!(CrawlerConfig::default().validate().is_ok());
    }
}
