use url::Url;

use crate::config::CrawlerConfig;
use crate::extract::{extract_image_urls, AlbumLink};
use crate::fetch::{FetchRequest, Fetcher};
use crate::pool::{download_all, DownloadJob, PoolSummary};
use crate::report::Reporter;
use crate::sanitize::clean_filename;
use crate::stop::StopSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumOutcome {
    /// The album directory exists from an earlier run.
    AlreadyPresent,
    /// A stop was requested before anything was created.
    Cancelled,
    /// The album page could not be fetched, its directory is left in place.
    Failed,
    Completed(PoolSummary),
}

/// Downloads one album into `photo_dir/<title>` unless that directory already exists.
///
/// An existing directory is never inspected, so an album interrupted midway
/// stays partial for good.
pub async fn process_album<F>(
    fetcher: &F,
    album: &AlbumLink,
    config: &CrawlerConfig,
    stop: &StopSignal,
    reporter: &Reporter,
) -> AlbumOutcome
where
    F: Fetcher,
{
    let folder_name = clean_filename(&album.title);
    let folder_path = config.photo_dir.join(&folder_name);

    if folder_path.is_dir() {
        reporter.info(format!("Folder already exists, skipping: {folder_name}"));
        return AlbumOutcome::AlreadyPresent;
    }
    if stop.is_stop_requested() {
        reporter.info(format!("Stop requested, not starting album: {folder_name}"));
        return AlbumOutcome::Cancelled;
    }
    if let Err(e) = fs_err::create_dir_all(&folder_path) {
        reporter.error(format!("Couldn't create album folder: {e}"));
        return AlbumOutcome::Failed;
    }

    let request = FetchRequest::album_asset(&album.url, &album.url, config.download_timeout());
    let page = match fetcher.fetch(request).await {
        Ok(page) => String::from_utf8_lossy(&page).into_owned(),
        Err(e) => {
            reporter.error(format!("[{folder_name}] Couldn't fetch album page: {e}"));
            return AlbumOutcome::Failed;
        }
    };
    let base = match Url::parse(&album.url) {
        Ok(base) => base,
        Err(e) => {
            reporter.error(format!("[{folder_name}] Invalid album URL {}: {e}", album.url));
            return AlbumOutcome::Failed;
        }
    };

    let urls = extract_image_urls(&page, &base, reporter);
    reporter.info(format!("[{folder_name}] {} images to download", urls.len()));

    let job = DownloadJob {
        folder_name,
        dir: folder_path,
        album_url: album.url.clone(),
        urls,
    };
    AlbumOutcome::Completed(download_all(fetcher, job, config, stop, reporter).await)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::fetch::scripted::{transport, ScriptedFetcher};

    const ALBUM_URL: &str = "https://gallery.test/summer-set/";
    const IMAGE_URL: &str = "https://gallery.test/wp-content/uploads/2024/05/summer_1.jpg";

    fn config(dir: &TempDir) -> CrawlerConfig {
        CrawlerConfig {
            photo_dir: dir.path().to_path_buf(),
            download_delay: 0.0,
            ..Default::default()
        }
    }

    fn album() -> AlbumLink {
        AlbumLink {
            url: ALBUM_URL.into(),
            title: "Summer: Set ".into(),
        }
    }

    fn fetcher() -> ScriptedFetcher {
        let fetcher = ScriptedFetcher::new();
        fetcher
            .page(ALBUM_URL, &format!(r#"<img src="{IMAGE_URL}">"#))
            .reply(IMAGE_URL, Ok(b"img".to_vec()));
        fetcher
    }

    #[tokio::test]
    async fn downloads_into_sanitized_folder() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher();

        let outcome = process_album(
            &fetcher,
            &album(),
            &config(&dir),
            &StopSignal::new(),
            &Reporter::log_only(),
        )
        .await;

        assert_eq!(
            outcome,
            AlbumOutcome::Completed(PoolSummary {
                saved: 1,
                ..Default::default()
            })
        );
        assert!(dir.path().join("Summer_ Set/Summer_ Set_summer_1.jpg").is_file());
        let image_request = fetcher
            .requests()
            .into_iter()
            .find(|r| r.url == IMAGE_URL)
            .unwrap();
        assert_eq!(image_request.referer.as_deref(), Some(ALBUM_URL));
        assert!(!image_request.verify_tls);
    }

    #[tokio::test]
    async fn second_run_never_fetches_the_page() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher();
        let conf = config(&dir);
        let stop = StopSignal::new();
        let reporter = Reporter::log_only();

        process_album(&fetcher, &album(), &conf, &stop, &reporter).await;
        let outcome = process_album(&fetcher, &album(), &conf, &stop, &reporter).await;

        assert_eq!(outcome, AlbumOutcome::AlreadyPresent);
        assert_eq!(fetcher.calls(ALBUM_URL), 1);
        assert_eq!(fetcher.calls(IMAGE_URL), 1);
    }

    #[tokio::test]
    async fn stop_requested_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher();
        let stop = StopSignal::new();
        stop.request_stop();

        let outcome =
            process_album(&fetcher, &album(), &config(&dir), &stop, &Reporter::log_only()).await;

        assert_eq!(outcome, AlbumOutcome::Cancelled);
        assert!(!dir.path().join("Summer_ Set").exists());
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn page_failure_leaves_empty_folder_behind() {
        let dir = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::new();
        fetcher.reply(ALBUM_URL, Err(transport(ALBUM_URL)));
        let conf = config(&dir);
        let reporter = Reporter::log_only();

        let outcome = process_album(&fetcher, &album(), &conf, &StopSignal::new(), &reporter).await;
        assert_eq!(outcome, AlbumOutcome::Failed);
        assert!(dir.path().join("Summer_ Set").is_dir());

        let outcome = process_album(&fetcher, &album(), &conf, &StopSignal::new(), &reporter).await;
        assert_eq!(outcome, AlbumOutcome::AlreadyPresent);
        assert_eq!(fetcher.calls(ALBUM_URL), 1);
    }
}
