use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use picspider_crawler::{crawl_site, CategorySeed, HttpFetcher, Reporter, StopSignal};
use picspider_gallery::Gallery;
use tokio::runtime;

mod settings;

use settings::{parse_category, Settings};

/// Photo gallery crawler and album browser
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    #[clap(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[clap(name = "crawl")]
    Crawl(CrawlArgs),
    #[clap(name = "albums")]
    Albums(AlbumsArgs),
    #[clap(name = "album")]
    Album(AlbumArgs),
    #[clap(name = "init-config")]
    InitConfig(InitConfigArgs),
    #[clap(hide = true)]
    Completion,
}

#[derive(Debug, clap::Args)]
pub struct SettingsArgs {
    /// Settings file (JSON or YAML), created with defaults when missing
    #[clap(env = "PICSPIDER_CONFIG", parse(from_os_str), long, short)]
    pub config: Option<PathBuf>,
    /// Override the directory albums are downloaded to
    #[clap(parse(from_os_str), long)]
    pub photo_dir: Option<PathBuf>,
}

impl TryFrom<&SettingsArgs> for Settings {
    type Error = anyhow::Error;

    fn try_from(args: &SettingsArgs) -> Result<Self, Self::Error> {
        let mut settings = match &args.config {
            Some(path) => Settings::load_or_init(path)?,
            None => Settings::default(),
        };
        if let Some(photo_dir) = &args.photo_dir {
            settings.crawler.photo_dir = photo_dir.clone();
        }
        Ok(settings)
    }
}

/// Crawl the configured categories and download their albums
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    #[clap(flatten)]
    pub settings: SettingsArgs,
    /// Override the number of concurrent image downloads per album
    #[clap(long)]
    pub max_workers: Option<NonZeroUsize>,
    /// Override the delay in seconds between download submissions
    #[clap(long)]
    pub download_delay: Option<f32>,
    /// Override the number of attempts per image
    #[clap(long)]
    pub retry_count: Option<NonZeroUsize>,
    /// Crawl these categories (URL=PAGES) instead of the configured ones
    #[clap(long = "category", parse(try_from_str = parse_category))]
    pub categories: Vec<CategorySeed>,
    /// When quiet no logs are outputted
    #[clap(long, short)]
    pub quiet: bool,
}

impl TryFrom<&CrawlArgs> for Settings {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut settings = Settings::try_from(&args.settings)?;
        let conf = &mut settings.crawler;
        if let Some(max_workers) = args.max_workers {
            conf.max_workers = max_workers;
        }
        if let Some(download_delay) = args.download_delay {
            conf.download_delay = download_delay;
        }
        if let Some(retry_count) = args.retry_count {
            conf.retry_count = retry_count;
        }
        if !args.categories.is_empty() {
            conf.categories = args.categories.clone();
        }
        conf.validate()?;
        Ok(settings)
    }
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let conf = Settings::try_from(&args)?.crawler;
    std::fs::create_dir_all(&conf.photo_dir)
        .with_context(|| format!("Couldn't create {}", conf.photo_dir.display()))?;

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async move {
        let fetcher = HttpFetcher::new(&conf)?;
        let stop = StopSignal::new();

        let stop_c = stop.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if interrupt_forces_exit(&stop_c) {
                    log::error!("Interrupted again, exiting without waiting for downloads");
                    std::process::exit(130);
                }
                log::warn!("Interrupted, finishing in-flight downloads before stopping");
            }
        });

        let summary = crawl_site(&conf, &fetcher, &Reporter::log_only(), &stop).await;
        log::info!(
            "{} categories done, {} failed, {} albums downloaded, {} skipped, {} images saved, {} images failed",
            summary.categories_done,
            summary.categories_failed,
            summary.totals.albums_downloaded,
            summary.totals.albums_skipped,
            summary.totals.images_saved,
            summary.totals.images_failed,
        );
        Ok::<(), anyhow::Error>(())
    })
}

/// Requests a cooperative stop on the first interrupt, returns true once one is already pending.
fn interrupt_forces_exit(stop: &StopSignal) -> bool {
    if stop.is_stop_requested() {
        return true;
    }
    stop.request_stop();
    false
}

/// List one page of downloaded albums as JSON
#[derive(Debug, clap::Args)]
pub struct AlbumsArgs {
    #[clap(flatten)]
    pub settings: SettingsArgs,
    /// Only albums whose name contains this text (case-insensitive)
    #[clap(long, short)]
    pub query: Option<String>,
    #[clap(long, short, default_value = "1")]
    pub page: usize,
    /// Override the number of albums per page
    #[clap(long)]
    pub per_page: Option<NonZeroUsize>,
}

pub fn albums(args: AlbumsArgs) -> anyhow::Result<()> {
    let settings = Settings::try_from(&args.settings)?;
    let per_page = args.per_page.unwrap_or(settings.albums_per_page);
    let gallery = Gallery::new(settings.crawler.photo_dir, per_page);
    let page = gallery.albums(args.query.as_deref(), args.page)?;
    serde_json::to_writer_pretty(io::stdout(), &page)?;
    println!();
    Ok(())
}

/// List the images of one album as JSON
#[derive(Debug, clap::Args)]
pub struct AlbumArgs {
    #[clap(flatten)]
    pub settings: SettingsArgs,
    /// Album folder name
    pub name: String,
}

pub fn album(args: AlbumArgs) -> anyhow::Result<()> {
    let settings = Settings::try_from(&args.settings)?;
    let gallery = Gallery::new(settings.crawler.photo_dir, settings.albums_per_page);
    let images = gallery.album_images(&args.name)?;
    serde_json::to_writer_pretty(io::stdout(), &images)?;
    println!();
    Ok(())
}

/// Write a settings file filled with defaults
#[derive(Debug, clap::Args)]
pub struct InitConfigArgs {
    #[clap(parse(from_os_str), default_value = "config.json")]
    pub path: PathBuf,
    /// Overwrite an existing file
    #[clap(long)]
    pub force: bool,
}

pub fn init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    if args.path.exists() && !args.force {
        anyhow::bail!("{} already exists, use --force to overwrite", args.path.display());
    }
    Settings::default().save(&args.path)?;
    log::info!("Wrote {}", args.path.display());
    Ok(())
}

fn init_logger() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("picspider_crawler=info,picspider=info"),
    )
    .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            if !args.quiet {
                init_logger();
            }
            crawl(args)
        }
        SubCommand::Albums(args) => {
            init_logger();
            albums(args)
        }
        SubCommand::Album(args) => {
            init_logger();
            album(args)
        }
        SubCommand::InitConfig(args) => {
            init_logger();
            init_config(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "picspider", &mut io::stdout());
            Ok(())
        }
    }
}
