mod cache;
mod index;

pub use cache::ThumbnailCache;
pub use index::{
    is_image_file, AlbumPage, AlbumSummary, Gallery, GalleryError, Pagination, IMAGE_EXTENSIONS,
};
