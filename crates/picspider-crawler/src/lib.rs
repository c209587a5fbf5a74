mod album;
mod config;
mod crawler;
mod extract;
mod fetch;
mod pool;
mod report;
mod sanitize;
mod stop;
mod walker;

pub use album::{process_album, AlbumOutcome};
pub use config::{CategorySeed, CrawlerConfig};
pub use crawler::{crawl_site, CrawlSummary};
pub use extract::{
    accept_image_filename, extract_album_links, extract_image_urls, next_page_url, AlbumLink,
    ListingPage,
};
pub use fetch::{FetchError, FetchRequest, Fetcher, HttpFetcher};
pub use pool::{download_all, image_file_name, DownloadJob, DownloadOutcome, PoolSummary};
pub use report::Reporter;
pub use sanitize::clean_filename;
pub use stop::StopSignal;
pub use walker::{walk_category, WalkError, WalkSummary};

pub use anyhow;
