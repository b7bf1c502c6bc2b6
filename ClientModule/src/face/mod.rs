//! # Face Cache
//!
//! Maps face ids to image availability. Consumers hold opaque ids and
//! resolve them through the cache on every draw, so a payload delivery is
//! observed by all holders without any pointer re-fetch. Until delivery the
//! cache hands out a shared placeholder image.
//!
//! Deliveries originate from the image pipeline, which may run on a
//! different thread than the update stream; the cache is therefore shareable
//! and internally locked. Listeners are notified exactly once per delivery,
//! including redeliveries of a changed face, which is how a
//! placeholder-rendered tile becomes correct without any map update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, trace};
use once_cell::sync::Lazy;

use gridsync_shared::constants::{EMPTY_FACE, TILE_PIXELS};
use gridsync_shared::types::FaceId;
use gridsync_shared::update::FaceData;

/// Callback invoked when a face's pixel data becomes available.
pub type FaceListener = Arc<dyn Fn(FaceId) + Send + Sync>;

/// The placeholder image handed out for faces whose payload has not arrived.
static PLACEHOLDER: Lazy<Arc<FaceData>> = Lazy::new(|| {
    Arc::new(FaceData::new(
        TILE_PIXELS,
        TILE_PIXELS,
        vec![0; (TILE_PIXELS * TILE_PIXELS) as usize],
    ))
});

/// The image of the reserved empty face: zero-sized, draws nothing.
static EMPTY_IMAGE: Lazy<Arc<FaceData>> = Lazy::new(|| Arc::new(FaceData::new(0, 0, Vec::new())));

/// Opaque handle to a face. Holding one never implies the payload is
/// available; resolve through the cache at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceHandle {
    id: FaceId,
}

impl FaceHandle {
    pub fn id(&self) -> FaceId {
        self.id
    }
}

/// Payload lookup result.
#[derive(Debug, Clone)]
pub enum FacePayload {
    /// Pixel data has not arrived yet; render the placeholder
    Pending,

    /// Pixel data is available
    Available(Arc<FaceData>),
}

impl FacePayload {
    pub fn is_pending(&self) -> bool {
        matches!(self, FacePayload::Pending)
    }
}

#[derive(Default)]
struct FaceEntry {
    data: Option<Arc<FaceData>>,
    watchers: Vec<FaceListener>,
}

struct CacheState {
    faces: HashMap<FaceId, FaceEntry>,
    listeners: Vec<FaceListener>,
}

/// Shared face-id to image mapping. Construct one per session and hand an
/// `Arc` of it to the engine and the renderer.
pub struct FaceCache {
    state: Mutex<CacheState>,
}

impl FaceCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                faces: HashMap::new(),
                listeners: Vec::new(),
            }),
        }
    }

    /// References a face by id, creating a pending entry if the id is new.
    /// Never blocks.
    pub fn reference(&self, id: FaceId) -> FaceHandle {
        if id != EMPTY_FACE {
            let mut state = self.state.lock().unwrap();
            state.faces.entry(id).or_default();
        }
        FaceHandle { id }
    }

    /// Whether pixel data for the face has been delivered. The reserved
    /// empty face is always available.
    pub fn is_available(&self, id: FaceId) -> bool {
        if id == EMPTY_FACE {
            return true;
        }
        let state = self.state.lock().unwrap();
        state.faces.get(&id).map_or(false, |e| e.data.is_some())
    }

    /// The payload of a face, or `Pending` if it has not arrived.
    pub fn payload(&self, id: FaceId) -> FacePayload {
        if id == EMPTY_FACE {
            return FacePayload::Available(EMPTY_IMAGE.clone());
        }
        let state = self.state.lock().unwrap();
        match state.faces.get(&id).and_then(|e| e.data.clone()) {
            Some(data) => FacePayload::Available(data),
            None => FacePayload::Pending,
        }
    }

    /// The image to draw for a face right now: the delivered payload, or the
    /// shared placeholder while it is pending. Never blocks.
    pub fn image(&self, id: FaceId) -> Arc<FaceData> {
        match self.payload(id) {
            FacePayload::Available(data) => data,
            FacePayload::Pending => PLACEHOLDER.clone(),
        }
    }

    /// The face's footprint in whole tiles, derived from its pixel
    /// dimensions. Pending faces report a single tile.
    pub fn span(&self, id: FaceId) -> (u8, u8) {
        match self.payload(id) {
            FacePayload::Available(data) => (
                tiles_for(data.width).max(1),
                tiles_for(data.height).max(1),
            ),
            FacePayload::Pending => (1, 1),
        }
    }

    /// Registers a listener for one face, invoked on every delivery of that
    /// face's payload.
    pub fn on_update(&self, id: FaceId, listener: impl Fn(FaceId) + Send + Sync + 'static) {
        let mut state = self.state.lock().unwrap();
        state
            .faces
            .entry(id)
            .or_default()
            .watchers
            .push(Arc::new(listener));
    }

    /// Registers a listener invoked on every delivery of any face.
    pub fn add_listener(&self, listener: impl Fn(FaceId) + Send + Sync + 'static) {
        let mut state = self.state.lock().unwrap();
        state.listeners.push(Arc::new(listener));
    }

    /// Installs a face's pixel data and notifies interested listeners, each
    /// exactly once for this delivery. Redelivery with different bytes is
    /// permitted and re-notifies. Safe to call from any thread.
    pub fn deliver(&self, id: FaceId, data: FaceData) {
        let notify: Vec<FaceListener> = {
            let mut state = self.state.lock().unwrap();
            let entry = state.faces.entry(id).or_default();
            if entry.data.is_some() {
                debug!("face {} redelivered", id);
            } else {
                trace!("face {} delivered", id);
            }
            entry.data = Some(Arc::new(data));
            let mut notify: Vec<FaceListener> = entry.watchers.clone();
            notify.extend(state.listeners.iter().cloned());
            notify
        };
        // listeners run outside the lock so they may call back into the cache
        for listener in notify {
            listener(id);
        }
    }

    /// Number of faces referenced so far.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().faces.is_empty()
    }
}

impl Default for FaceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole tiles covered by a pixel extent, rounding up.
fn tiles_for(pixels: u32) -> u8 {
    pixels.div_ceil(TILE_PIXELS).min(u8::MAX as u32) as u8
}
