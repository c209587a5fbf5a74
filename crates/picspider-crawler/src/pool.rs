use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::config::CrawlerConfig;
use crate::fetch::{FetchError, FetchRequest, Fetcher};
use crate::report::Reporter;
use crate::stop::StopSignal;

/// The images of one album and where they go.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub folder_name: String,
    pub dir: PathBuf,
    /// Album page URL, sent as referer.
    pub album_url: String,
    pub urls: HashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved { attempts: usize },
    Failed { attempts: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub saved: usize,
    pub failed: usize,
    /// URLs left out because a stop was requested.
    pub not_submitted: usize,
}

impl PoolSummary {
    fn record(&mut self, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Saved { .. } => self.saved += 1,
            DownloadOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Settings every download task needs, detached from the config borrow.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    attempts: usize,
    timeout: Duration,
}

/// Downloads every URL of `job`, at most `max_workers` at a time.
///
/// Submissions are spaced by `download_delay`. A stop request prevents
/// further submissions, but tasks already submitted are always awaited.
pub async fn download_all<F>(
    fetcher: &F,
    job: DownloadJob,
    config: &CrawlerConfig,
    stop: &StopSignal,
    reporter: &Reporter,
) -> PoolSummary
where
    F: Fetcher,
{
    let policy = RetryPolicy {
        attempts: config.retry_count.get(),
        timeout: config.download_timeout(),
    };
    let delay = config.download_delay();
    let permits = Arc::new(Semaphore::new(config.max_workers.get()));
    let folder_name: Arc<str> = job.folder_name.into();
    let dir: Arc<Path> = job.dir.into();
    let album_url: Arc<str> = job.album_url.into();

    let mut summary = PoolSummary::default();
    let mut in_flight = FuturesUnordered::new();
    let mut urls = job.urls.into_iter().peekable();

    while let Some(url) = urls.next() {
        if stop.is_stop_requested() {
            summary.not_submitted = 1 + urls.by_ref().count();
            reporter.info(format!(
                "[{folder_name}] Stop requested, {} downloads not submitted",
                summary.not_submitted
            ));
            break;
        }

        let permits = permits.clone();
        let fetcher = fetcher.clone();
        let reporter = reporter.clone();
        let folder_name = folder_name.clone();
        let dir = dir.clone();
        let album_url = album_url.clone();
        in_flight.push(tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return DownloadOutcome::Failed { attempts: 0 };
            };
            download_image(
                &fetcher,
                &url,
                &album_url,
                &folder_name,
                &dir,
                policy,
                &reporter,
            )
            .await
        }));

        if urls.peek().is_some() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    while let Some(joined) = in_flight.next().await {
        match joined {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                reporter.error(format!("[{folder_name}] Download task aborted: {e}"));
                summary.failed += 1;
            }
        }
    }

    summary
}

pub fn image_file_name(folder_name: &str, url: &str) -> String {
    let basename = url.rsplit('/').next().unwrap_or(url);
    format!("{folder_name}_{basename}")
}

fn backoff(attempt_index: usize) -> Duration {
    Duration::from_secs(2 + attempt_index as u64)
}

async fn download_image<F>(
    fetcher: &F,
    url: &str,
    album_url: &str,
    folder_name: &str,
    dir: &Path,
    policy: RetryPolicy,
    reporter: &Reporter,
) -> DownloadOutcome
where
    F: Fetcher,
{
    let target = dir.join(image_file_name(folder_name, url));
    let total = policy.attempts;

    for index in 0..total {
        let attempt = index + 1;
        let request = FetchRequest::album_asset(url, album_url, policy.timeout);

        let failure = match fetcher.fetch(request).await {
            Ok(bytes) => match fs_err::tokio::write(&target, bytes).await {
                Ok(()) => {
                    reporter.info(format!("[{folder_name}] Downloaded {url}"));
                    return DownloadOutcome::Saved { attempts: attempt };
                }
                Err(e) => e.to_string(),
            },
            Err(FetchError::Tls { message, .. }) => {
                reporter.error(format!(
                    "[{folder_name}] TLS error on attempt {attempt}/{total}, giving up on {url}: {message}"
                ));
                return DownloadOutcome::Failed { attempts: attempt };
            }
            Err(FetchError::Status { code, .. }) => format!("server responded {code}"),
            Err(FetchError::Transport { message, .. }) => message,
        };

        if attempt == total {
            reporter.error(format!(
                "[{folder_name}] Download failed after {total} attempts: {url} ({failure})"
            ));
            return DownloadOutcome::Failed { attempts: attempt };
        }

        let wait = backoff(index);
        reporter.warn(format!(
            "[{folder_name}] Attempt {attempt}/{total} failed for {url} ({failure}), retrying in {}s",
            wait.as_secs()
        ));
        tokio::time::sleep(wait).await;
    }

    DownloadOutcome::Failed { attempts: total }
}
