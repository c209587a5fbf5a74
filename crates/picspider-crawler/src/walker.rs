use thiserror::Error;
use url::Url;

use crate::album::{process_album, AlbumOutcome};
use crate::config::{CategorySeed, CrawlerConfig};
use crate::extract::ListingPage;
use crate::fetch::{FetchError, FetchRequest, Fetcher};
use crate::report::Reporter;
use crate::stop::StopSignal;

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("invalid category URL {url}: {source}")]
    InvalidSeed {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("couldn't fetch listing page: {0}")]
    Listing(#[from] FetchError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub pages: usize,
    pub albums_downloaded: usize,
    pub albums_skipped: usize,
    pub albums_failed: usize,
    pub images_saved: usize,
    pub images_failed: usize,
}

impl WalkSummary {
    fn record(&mut self, outcome: AlbumOutcome) {
        match outcome {
            AlbumOutcome::AlreadyPresent => self.albums_skipped += 1,
            AlbumOutcome::Cancelled => (),
            AlbumOutcome::Failed => self.albums_failed += 1,
            AlbumOutcome::Completed(pool) => {
                self.albums_downloaded += 1;
                self.images_saved += pool.saved;
                self.images_failed += pool.failed;
            }
        }
    }

    pub(crate) fn merge(&mut self, other: WalkSummary) {
        self.pages += other.pages;
        self.albums_downloaded += other.albums_downloaded;
        self.albums_skipped += other.albums_skipped;
        self.albums_failed += other.albums_failed;
        self.images_saved += other.images_saved;
        self.images_failed += other.images_failed;
    }
}

/// Follows the "next page" links of a category, processing every album found on the way.
pub async fn walk_category<F>(
    fetcher: &F,
    seed: &CategorySeed,
    config: &CrawlerConfig,
    stop: &StopSignal,
    reporter: &Reporter,
) -> Result<WalkSummary, WalkError>
where
    F: Fetcher,
{
    let mut current = Some(Url::parse(&seed.url).map_err(|source| WalkError::InvalidSeed {
        url: seed.url.clone(),
        source,
    })?);
    let mut summary = WalkSummary::default();

    while let Some(page_url) = current.take() {
        if summary.pages >= seed.max_pages {
            reporter.info(format!("Reached {} pages for {}", seed.max_pages, seed.url));
            break;
        }
        if stop.is_stop_requested() {
            reporter.info(format!("Stop requested, leaving category {}", seed.url));
            break;
        }

        reporter.info(format!("Processing page {}: {page_url}", summary.pages + 1));
        let request = FetchRequest::listing(page_url.as_str(), config.listing_timeout());
        let html = fetcher.fetch(request).await?;
        let ListingPage { albums, next_page } =
            ListingPage::parse(&String::from_utf8_lossy(&html), &page_url, reporter);

        if albums.is_empty() {
            reporter.info(format!("No albums found on {page_url}, category done"));
            break;
        }
        reporter.info(format!("Found {} albums on {page_url}", albums.len()));

        for (i, album) in albums.iter().enumerate() {
            if stop.is_stop_requested() {
                reporter.info(format!(
                    "Stop requested, {} albums left on {page_url}",
                    albums.len() - i
                ));
                break;
            }
            if i > 0 {
                tokio::time::sleep(config.album_delay()).await;
            }
            reporter.info(format!("Processing: {} - {}", album.title, album.url));
            let outcome = process_album(fetcher, album, config, stop, reporter).await;
            summary.record(outcome);
        }

        summary.pages += 1;
        current = next_page;
        if current.is_some() && !stop.is_stop_requested() {
            tokio::time::sleep(config.page_delay()).await;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::fetch::scripted::{transport, ScriptedFetcher};

    const SEED: &str = "https://gallery.test/category/japan/";

    fn config(dir: &TempDir) -> CrawlerConfig {
        CrawlerConfig {
            photo_dir: dir.path().to_path_buf(),
            download_delay: 0.0,
            ..Default::default()
        }
    }

    fn listing(albums: &[(&str, &str)], next: Option<&str>) -> String {
        let mut html = String::from("<html><body>");
        for (href, title) in albums {
            html.push_str(&format!(
                r#"<a class="thumbnail-link" href="{href}"><img title="{title}"></a>"#
            ));
        }
        if let Some(next) = next {
            html.push_str(&format!(r#"<a class="next page-numbers" href="{next}">Next</a>"#));
        }
        html.push_str("</body></html>");
        html
    }

    fn album_page(image: &str) -> String {
        format!(r#"<img src="https://gallery.test/wp-content/uploads/{image}">"#)
    }

    fn image(name: &str) -> String {
        format!("https://gallery.test/wp-content/uploads/{name}")
    }

    #[tokio::test(start_paused = true)]
    async fn follows_next_links_until_max_pages() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new();
        fetcher
            .page(SEED, &listing(&[("/a/", "A")], Some("page/2/")))
            .page(
                &format!("{SEED}page/2/"),
                &listing(&[("/b/", "B")], Some("/category/japan/page/3/")),
            )
            .page(&format!("{SEED}page/3/"), &listing(&[("/c/", "C")], None));
        for (album, img) in [("a", "a_1.jpg"), ("b", "b_1.jpg"), ("c", "c_1.jpg")] {
            fetcher
                .page(&format!("https://gallery.test/{album}/"), &album_page(img))
                .reply(&image(img), Ok(b"x".to_vec()));
        }

        let seed = CategorySeed::new(SEED, 2);
        let summary = walk_category(
            &fetcher,
            &seed,
            &config(&dir),
            &StopSignal::new(),
            &Reporter::log_only(),
        )
        .await
        .unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.albums_downloaded, 2);
        assert_eq!(summary.images_saved, 2);
        assert_eq!(fetcher.calls(&format!("{SEED}page/3/")), 0);
        assert!(dir.path().join("A").is_dir());
        assert!(dir.path().join("B").is_dir());
        assert!(!dir.path().join("C").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_page_ends_walk() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new();
        fetcher.page(SEED, &listing(&[], Some("page/2/")));

        let summary = walk_category(
            &fetcher,
            &CategorySeed::new(SEED, 10),
            &config(&dir),
            &StopSignal::new(),
            &Reporter::log_only(),
        )
        .await
        .unwrap();

        assert_eq!(summary, WalkSummary::default());
        assert_eq!(fetcher.calls(&format!("{SEED}page/2/")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_failure_aborts_walk() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new();
        fetcher.reply(SEED, Err(transport(SEED)));

        let res = walk_category(
            &fetcher,
            &CategorySeed::new(SEED, 10),
            &config(&dir),
            &StopSignal::new(),
            &Reporter::log_only(),
        )
        .await;

        assert!(matches!(res, Err(WalkError::Listing(FetchError::Transport { .. }))));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_seed_rejected() {
        let dir = TempDir::new().unwrap();
        let res = walk_category(
            &ScriptedFetcher::new(),
            &CategorySeed::new("not a url", 1),
            &config(&dir),
            &StopSignal::new(),
            &Reporter::log_only(),
        )
        .await;
        assert!(matches!(res, Err(WalkError::InvalidSeed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_between_albums_keeps_finished_album() {
        let dir = TempDir::new().unwrap();
        let stop = StopSignal::new();
        let fetcher = ScriptedFetcher::new();
        fetcher.page(
            SEED,
            &listing(&[("/a/", "A"), ("/b/", "B"), ("/c/", "C")], Some("page/2/")),
        );
        fetcher
            .page("https://gallery.test/a/", &album_page("a_1.jpg"))
            .reply(&image("a_1.jpg"), Ok(b"x".to_vec()))
            .stop_on(&image("a_1.jpg"), &stop);

        let summary = walk_category(
            &fetcher,
            &CategorySeed::new(SEED, 10),
            &config(&dir),
            &stop,
            &Reporter::log_only(),
        )
        .await
        .unwrap();

        assert_eq!(summary.albums_downloaded, 1);
        assert_eq!(summary.images_saved, 1);
        assert!(dir.path().join("A/A_a_1.jpg").is_file());
        assert!(!dir.path().join("B").exists());
        assert_eq!(fetcher.calls("https://gallery.test/b/"), 0);
        assert_eq!(fetcher.calls(&format!("{SEED}page/2/")), 0);
    }
}
