use crate::config::CrawlerConfig;
use crate::fetch::Fetcher;
use crate::report::Reporter;
use crate::stop::StopSignal;
use crate::walker::{walk_category, WalkSummary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub categories_done: usize,
    pub categories_failed: usize,
    pub totals: WalkSummary,
    pub stopped: bool,
}

/// Crawls every configured category in order, one album at a time.
///
/// The stop flag is cleared on entry. A failing category is logged and the
/// next one still runs.
pub async fn crawl_site<F>(
    config: &CrawlerConfig,
    fetcher: &F,
    reporter: &Reporter,
    stop: &StopSignal,
) -> CrawlSummary
where
    F: Fetcher,
{
    stop.reset();
    let mut summary = CrawlSummary::default();

    for seed in &config.categories {
        if stop.is_stop_requested() {
            break;
        }
        reporter.info(format!("Starting category: {seed}"));
        match walk_category(fetcher, seed, config, stop, reporter).await {
            Ok(walk) => {
                reporter.info(format!(
                    "Category {} done: {} pages, {} albums downloaded, {} skipped",
                    seed.url, walk.pages, walk.albums_downloaded, walk.albums_skipped
                ));
                summary.categories_done += 1;
                summary.totals.merge(walk);
            }
            Err(e) => {
                reporter.error(format!("Category {} failed: {e}", seed.url));
                summary.categories_failed += 1;
            }
        }
    }

    summary.stopped = stop.is_stop_requested();
    if summary.stopped {
        reporter.info("Crawl stopped on request");
    } else {
        reporter.info("Crawl finished");
    }
    summary
}
