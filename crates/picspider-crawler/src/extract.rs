use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::report::Reporter;

lazy_static! {
    static ref THUMBNAIL_LINK: Selector = Selector::parse("a.thumbnail-link").unwrap();
    static ref IMG: Selector = Selector::parse("img").unwrap();
    static ref NEXT_PAGE: Selector = Selector::parse("a.next.page-numbers").unwrap();
    static ref IMAGE_NAME: Regex = Regex::new(r"^[a-z0-9]+_[1-9][0-9]*\.(jpg|jpeg|png)$").unwrap();
}

const UNTITLED: &str = "untitled";
const UPLOADS_MARKER: &str = "/wp-content/uploads/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumLink {
    pub url: String,
    pub title: String,
}

/// What a category listing page links to.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub albums: Vec<AlbumLink>,
    pub next_page: Option<Url>,
}

impl ListingPage {
    pub fn parse(html: &str, base: &Url, reporter: &Reporter) -> Self {
        let document = Html::parse_document(html);
        Self {
            albums: album_links(&document, base, reporter),
            next_page: next_page(&document, base),
        }
    }
}

pub fn extract_album_links(html: &str, base: &Url, reporter: &Reporter) -> Vec<AlbumLink> {
    album_links(&Html::parse_document(html), base, reporter)
}

pub fn next_page_url(html: &str, base: &Url) -> Option<Url> {
    next_page(&Html::parse_document(html), base)
}

fn album_links(document: &Html, base: &Url, reporter: &Reporter) -> Vec<AlbumLink> {
    let mut links = vec![];
    for anchor in document.select(&THUMBNAIL_LINK) {
        let href = anchor.value().attr("href");

        if in_top_teaser(anchor) {
            reporter.info(format!("Skipping top teaser thumbnail: {}", href.unwrap_or("")));
            continue;
        }

        let Some(img) = anchor.select(&IMG).next() else {
            continue;
        };
        if is_featured_duplicate(img) {
            reporter.info(format!("Skipping featured thumbnail: {}", href.unwrap_or("")));
            continue;
        }

        let Some(href) = href else {
            continue;
        };
        match base.join(href) {
            Ok(url) => links.push(AlbumLink {
                url: url.to_string(),
                title: img.value().attr("title").unwrap_or(UNTITLED).to_string(),
            }),
            Err(e) => reporter.warn(format!("Skipping album link {href}: {e}")),
        }
    }
    links
}

fn in_top_teaser(anchor: ElementRef) -> bool {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "div")
        .any(|div| {
            let classes: Vec<_> = div.value().classes().collect();
            classes.contains(&"post_thumb") && classes.contains(&"post_thumb_top")
        })
}

fn is_featured_duplicate(img: ElementRef) -> bool {
    let img = img.value();
    img.attr("post-id").is_some_and(|id| !id.is_empty())
        && img.attr("fifu-featured") == Some("1")
        && img.attr("width") == Some("360")
        && img.attr("height") == Some("540")
}

fn next_page(document: &Html, base: &Url) -> Option<Url> {
    document
        .select(&NEXT_PAGE)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| base.join(href).ok())
}

/// Collects the full size image URLs of an album page.
pub fn extract_image_urls(html: &str, base: &Url, reporter: &Reporter) -> HashSet<String> {
    let document = Html::parse_document(html);
    let mut urls = HashSet::new();
    for img in document.select(&IMG) {
        let img = img.value();
        let src = match img.attr("src") {
            Some(src) if !src.is_empty() => src,
            _ => match img.attr("data-src") {
                Some(src) => src,
                None => continue,
            },
        };
        if !src.contains(UPLOADS_MARKER) {
            continue;
        }

        let filename = src.rsplit('/').next().unwrap_or(src).to_lowercase();
        if !accept_image_filename(&filename) {
            reporter.info(format!("Skipping image {filename}"));
            continue;
        }

        match base.join(src) {
            Ok(url) => {
                urls.insert(url.to_string());
            }
            Err(e) => reporter.warn(format!("Skipping image URL {src}: {e}")),
        }
    }
    urls
}

/// Accepts `name_N.ext` file names, rejecting the placeholder and thumbnail variants.
///
/// `filename` is expected lower-cased.
pub fn accept_image_filename(filename: &str) -> bool {
    let placeholder = filename.starts_with('0')
        || filename.contains("_0.")
        || filename.ends_with("0.jpg")
        || filename.ends_with("0.jpeg");
    !placeholder && IMAGE_NAME.is_match(filename)
}
