use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::cache::ThumbnailCache;

pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("photo directory {0} does not exist")]
    MissingRoot(PathBuf),
    #[error("album {0:?} not found")]
    AlbumNotFound(String),
    #[error("image {album:?}/{file:?} not found")]
    ImageNotFound { album: String, file: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub fn is_image_file(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumSummary {
    pub name: String,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_num: usize,
    pub next_num: usize,
}

impl Pagination {
    fn new(page: usize, total_items: usize, per_page: usize) -> Self {
        let page = page.max(1);
        let total_pages = total_items.div_ceil(per_page);
        Self {
            page,
            total_pages,
            has_prev: page > 1,
            has_next: page < total_pages,
            prev_num: page - 1,
            next_num: page.saturating_add(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumPage {
    pub albums: Vec<AlbumSummary>,
    pub pagination: Pagination,
    pub query: Option<String>,
}

/// Read-only view over a directory holding one sub-directory per album.
#[derive(Debug)]
pub struct Gallery {
    root: PathBuf,
    per_page: NonZeroUsize,
    thumbnails: ThumbnailCache,
}

impl Gallery {
    pub fn new(root: impl Into<PathBuf>, per_page: NonZeroUsize) -> Self {
        Self {
            root: root.into(),
            per_page,
            thumbnails: ThumbnailCache::new(),
        }
    }

    /// Lists one page of albums, optionally filtered by a case-insensitive name match.
    pub fn albums(&self, query: Option<&str>, page: usize) -> Result<AlbumPage, GalleryError> {
        if !self.root.is_dir() {
            return Err(GalleryError::MissingRoot(self.root.clone()));
        }
        let needle = query.map(str::to_lowercase).filter(|q| !q.is_empty());

        let mut names = vec![];
        for entry in fs_err::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                log::warn!("Skipping album with non UTF-8 name: {:?}", entry.path());
                continue;
            };
            if let Some(needle) = &needle {
                if !name.to_lowercase().contains(needle.as_str()) {
                    continue;
                }
            }
            names.push(name);
        }
        names.sort();

        let pagination = Pagination::new(page, names.len(), self.per_page.get());
        let start = (pagination.page - 1).saturating_mul(self.per_page.get());
        let albums = names
            .into_iter()
            .skip(start)
            .take(self.per_page.get())
            .map(|name| {
                let thumbnail = self
                    .thumbnails
                    .get_or_compute(&name, || self.first_image(&name));
                AlbumSummary { name, thumbnail }
            })
            .collect();

        Ok(AlbumPage {
            albums,
            pagination,
            query: query.map(String::from),
        })
    }

    /// Sorted image file names of one album.
    pub fn album_images(&self, album: &str) -> Result<Vec<String>, GalleryError> {
        let dir = self.album_dir(album)?;
        list_images(&dir).map_err(GalleryError::from)
    }

    /// Path of an image, guaranteed to stay inside the photo directory.
    pub fn image_path(&self, album: &str, file: &str) -> Result<PathBuf, GalleryError> {
        let dir = self.album_dir(album)?;
        let not_found = || GalleryError::ImageNotFound {
            album: album.to_string(),
            file: file.to_string(),
        };
        if !is_plain_name(file) {
            return Err(not_found());
        }
        let path = dir.join(file);
        if path.is_file() {
            Ok(path)
        } else {
            Err(not_found())
        }
    }

    /// Forgets every cached thumbnail, they are looked up again on next listing.
    pub fn refresh_thumbnails(&self) {
        self.thumbnails.invalidate_all();
        log::info!("Thumbnail cache cleared");
    }

    fn album_dir(&self, album: &str) -> Result<PathBuf, GalleryError> {
        let dir = self.root.join(album);
        if is_plain_name(album) && dir.is_dir() {
            Ok(dir)
        } else {
            Err(GalleryError::AlbumNotFound(album.to_string()))
        }
    }

    fn first_image(&self, album: &str) -> Option<String> {
        let dir = self.root.join(album);
        match list_images(&dir) {
            Ok(images) => images.into_iter().next(),
            Err(e) => {
                log::warn!("Couldn't read album {}: {e}", dir.display());
                None
            }
        }
    }
}

fn list_images(dir: &Path) -> io::Result<Vec<String>> {
    let mut images = vec![];
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            if is_image_file(&name) {
                images.push(name);
            }
        }
    }
    images.sort();
    Ok(images)
}

/// A single path component, no separators and no parent references.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).components().count() == 1
}
