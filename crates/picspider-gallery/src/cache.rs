use std::collections::HashMap;
use std::sync::Mutex;

/// Album name to thumbnail file name, misses included.
///
/// Entries live until [`ThumbnailCache::invalidate_all`]; the number of
/// albums on disk bounds its size.
#[derive(Debug, Default)]
pub struct ThumbnailCache {
    entries: Mutex<HashMap<String, Option<String>>>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute<F>(&self, album: &str, compute: F) -> Option<String>
    where
        F: FnOnce() -> Option<String>,
    {
        if let Some(hit) = self.lock().get(album) {
            return hit.clone();
        }
        // Computed outside the lock, a concurrent miss may compute it twice.
        let thumbnail = compute();
        log::debug!("Thumbnail cache updated: {album:?} -> {thumbnail:?}");
        self.lock().insert(album.to_string(), thumbnail.clone());
        thumbnail
    }

    pub fn invalidate_all(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<String>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
