/// Display handles for decoded samples
///
/// Every handle handed to the view is registered in a process-wide
/// `HandlePool` and must be revoked exactly once. `ImageResource` owns one
/// handle and revokes it on `close` or on drop, whichever comes first.
use iced::widget::image::Handle;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::state::data::{DecodedImage, ImageKey};

#[derive(Debug, Default)]
struct PoolState {
    next_id: u64,
    live: HashSet<u64>,
    opened: u64,
    revoked: u64,
}

/// Process-wide registry of open display handles
#[derive(Debug, Clone, Default)]
pub struct HandlePool {
    state: Arc<Mutex<PoolState>>,
}

impl HandlePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles opened and not yet revoked
    pub fn live(&self) -> usize {
        self.lock().live.len()
    }

    pub fn opened(&self) -> u64 {
        self.lock().opened
    }

    pub fn revoked(&self) -> u64 {
        self.lock().revoked
    }

    fn register(&self) -> u64 {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.live.insert(id);
        state.opened += 1;
        id
    }

    fn revoke(&self, id: u64) {
        let mut state = self.lock();
        if state.live.remove(&id) {
            state.revoked += 1;
        } else {
            tracing::warn!(id, "display handle revoked twice");
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A registered, revocable handle the view can render
#[derive(Debug)]
struct DisplayHandle {
    id: u64,
    handle: Handle,
}

/// One decoded sample with an open display handle
#[derive(Debug)]
pub struct ImageResource {
    key: ImageKey,
    display: Option<DisplayHandle>,
    pool: HandlePool,
}

impl ImageResource {
    /// Create a display handle for `payload`
    pub fn open(pool: &HandlePool, key: ImageKey, payload: &DecodedImage) -> Self {
        let id = pool.register();
        let handle = Handle::from_rgba(payload.width, payload.height, payload.pixels.clone());
        Self {
            key,
            display: Some(DisplayHandle { id, handle }),
            pool: pool.clone(),
        }
    }

    pub fn key(&self) -> &ImageKey {
        &self.key
    }

    /// The handle to render; `None` only after revocation
    pub fn handle(&self) -> Option<&Handle> {
        self.display.as_ref().map(|display| &display.handle)
    }

    /// Revoke the handle now
    pub fn close(mut self) {
        self.revoke();
    }

    fn revoke(&mut self) {
        if let Some(display) = self.display.take() {
            self.pool.revoke(display.id);
        }
    }
}

impl Drop for ImageResource {
    fn drop(&mut self) {
        self.revoke();
    }
}

/// The single image a chart currently shows
///
/// Showing a new payload closes the previous resource before opening the
/// next one, so a slot holds at most one live handle.
#[derive(Debug)]
pub struct ImageSlot {
    pool: HandlePool,
    current: Option<ImageResource>,
}

impl ImageSlot {
    pub fn new(pool: HandlePool) -> Self {
        Self {
            pool,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&ImageResource> {
        self.current.as_ref()
    }

    pub fn shows(&self, key: &ImageKey) -> bool {
        self.current.as_ref().is_some_and(|resource| resource.key() == key)
    }

    /// Replace the shown resource unless it already shows `key`
    pub fn show(&mut self, key: &ImageKey, payload: &Arc<DecodedImage>) {
        if self.shows(key) {
            return;
        }
        if let Some(previous) = self.current.take() {
            previous.close();
        }
        self.current = Some(ImageResource::open(&self.pool, key.clone(), payload));
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.close();
        }
    }
}
