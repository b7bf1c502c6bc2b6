//! # Synchronization Engine
//!
//! Applies the decoded server update stream to the map model and notifies
//! the renderer about changed squares. This is the single entry point the
//! decoder talks to; the renderer registers listeners and reads snapshots.
//!
//! All world state lives behind one mutex. The decoder's update stream and
//! payload deliveries from the image pipeline may run on different threads;
//! both funnel through that lock, so a reader can never observe a square
//! with an overlay cleared but not yet re-set, and listener callbacks always
//! run outside the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use gridsync_shared::constants::EMPTY_FACE;
use gridsync_shared::error::{ProtocolWarning, SyncResult};
use gridsync_shared::types::{AnimationId, FaceId, GridShape, Location, SquareVisibility};
use gridsync_shared::update::{FaceData, MapUpdate};

use crate::animation::AnimationRegistry;
use crate::face::FaceCache;
use crate::map::{AnimatedFace, LayerSlot, MapGrid, MultiSquare};

/// Callback invoked with the viewport-relative coordinate of a changed
/// square.
pub type SquareListener = Arc<dyn Fn(i32, i32) + Send + Sync>;

/// Per-layer view of one square, resolved for drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquareSnapshot {
    /// Resolved face per layer; the reserved empty face where there is
    /// nothing to draw
    pub faces: Vec<FaceId>,

    /// Whether the content is retained last-seen state to be rendered
    /// dimmed
    pub fog: bool,

    /// Darkness level; 0 is fully dark, 255 fully bright
    pub darkness: u8,

    pub visibility: SquareVisibility,
}

/// Footprint of a placed multi-tile face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Footprint {
    face: FaceId,
    w: u8,
    h: u8,
}

/// Everything the update stream mutates, guarded by the engine's lock.
struct WorldState {
    grid: MapGrid,
    animations: AnimationRegistry,
    /// Multi-tile faces currently placed, keyed by anchor (absolute
    /// coordinate plus layer)
    heads: HashMap<Location, Footprint>,
    /// Overlay records of covered squares, keyed by absolute coordinate
    multi: HashMap<(i32, i32), MultiSquare>,
    last_tick: Option<u32>,
}

/// The update-applying façade.
pub struct SyncEngine {
    world: Mutex<WorldState>,
    faces: Arc<FaceCache>,
    listeners: Mutex<Vec<SquareListener>>,
}

impl SyncEngine {
    /// Creates an engine over the given face cache. The cache is shared so
    /// the renderer can resolve images through the same instance.
    pub fn new(faces: Arc<FaceCache>) -> Self {
        Self {
            world: Mutex::new(WorldState {
                grid: MapGrid::unmapped(),
                animations: AnimationRegistry::new(),
                heads: HashMap::new(),
                multi: HashMap::new(),
                last_tick: None,
            }),
            faces,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn face_cache(&self) -> &Arc<FaceCache> {
        &self.faces
    }

    /// Registers a listener for changed squares. Listeners are invoked after
    /// an update has been fully applied, once per changed square.
    pub fn add_square_listener(&self, listener: impl Fn(i32, i32) + Send + Sync + 'static) {
        self.listeners.lock().unwrap().push(Arc::new(listener));
    }

    /// The shape of the current window. Zero-sized before the first map
    /// announcement.
    pub fn shape(&self) -> GridShape {
        self.world.lock().unwrap().grid.shape()
    }

    /// Applies one decoded update. Protocol oddities are logged and skipped;
    /// only unrecoverable desyncs surface as errors, after which the session
    /// should be torn down.
    pub fn apply(&self, update: MapUpdate) -> SyncResult<()> {
        let dirty = {
            let mut world = self.world.lock().unwrap();
            match update {
                MapUpdate::DefineAnimation { id, flags, faces } => {
                    world.animations.define(id, flags, faces);
                }
                MapUpdate::SetFace { x, y, layer, face } => {
                    world.set_face(&self.faces, x, y, layer, face);
                }
                MapUpdate::SetAnim {
                    x,
                    y,
                    layer,
                    animation,
                    phase,
                } => world.set_anim(&self.faces, x, y, layer, animation, phase),
                MapUpdate::SetAnimationSpeed { x, y, layer, speed } => {
                    world.set_animation_speed(x, y, layer, speed);
                }
                MapUpdate::ClearCell { x, y, layer } => {
                    world.set_cell(&self.faces, x, y, layer, LayerSlot::Empty);
                }
                MapUpdate::Darkness { x, y, level } => world.set_darkness(x, y, level),
                MapUpdate::Scroll { dx, dy } => world.scroll(dx, dy)?,
                MapUpdate::HideSquare { x, y } => world.hide_square(x, y),
                MapUpdate::ClearSquare { x, y } => world.clear_square(x, y),
                MapUpdate::NewMap {
                    width,
                    height,
                    layers,
                } => world.new_map(width, height, layers)?,
                MapUpdate::Tick { tick } => world.tick(tick),
            }
            world.grid.take_dirty()
        };
        self.notify(&dirty);
        Ok(())
    }

    /// Installs a face's pixel data: the cache notifies its listeners, then
    /// every square currently showing the face is repainted and multi-tile
    /// footprints are re-derived from the now-known image size. Safe to call
    /// from a different thread than [`apply`](Self::apply).
    pub fn face_data_available(&self, face: FaceId, data: FaceData) {
        self.faces.deliver(face, data);
        let dirty = {
            let mut world = self.world.lock().unwrap();
            world.refresh_face(&self.faces, face);
            world.grid.take_dirty()
        };
        self.notify(&dirty);
    }

    /// Resolved per-layer view of one square, or `None` outside the window.
    /// The view is taken under the engine lock, so it is never mid-update.
    pub fn snapshot(&self, x: i32, y: i32) -> Option<SquareSnapshot> {
        let world = self.world.lock().unwrap();
        let square = world.grid.square(x, y)?;
        let shape = world.grid.shape();
        let mut faces = Vec::with_capacity(shape.layers as usize);
        for layer in 0..shape.layers {
            faces.push(match square.resolved(layer) {
                LayerSlot::Empty => EMPTY_FACE,
                LayerSlot::Face(face) => face,
                LayerSlot::Anim(anim) => world
                    .animations
                    .face_at(anim.animation, anim.frame())
                    .unwrap_or(EMPTY_FACE),
            });
        }
        Some(SquareSnapshot {
            faces,
            fog: square.is_fog(),
            darkness: square.darkness(),
            visibility: square.visibility(),
        })
    }

    fn notify(&self, dirty: &[(i32, i32)]) {
        if dirty.is_empty() {
            return;
        }
        let listeners: Vec<SquareListener> = self.listeners.lock().unwrap().clone();
        for &(x, y) in dirty {
            for listener in &listeners {
                listener(x, y);
            }
        }
    }
}

impl WorldState {
    /// Validates a square address against the window, warning and rejecting
    /// out-of-range updates so one bad frame never stops the stream.
    fn checked_square(&self, x: i32, y: i32) -> bool {
        let shape = self.grid.shape();
        if !shape.contains(x, y) {
            warn!(
                "{}",
                ProtocolWarning::OutsideWindow {
                    x,
                    y,
                    width: shape.width,
                    height: shape.height,
                }
            );
            return false;
        }
        true
    }

    /// Validates a cell address (square plus layer).
    fn checked_cell(&self, x: i32, y: i32, layer: u8) -> bool {
        if !self.checked_square(x, y) {
            return false;
        }
        let layers = self.grid.shape().layers;
        if layer >= layers {
            warn!("{}", ProtocolWarning::LayerOutOfRange { layer, layers });
            return false;
        }
        true
    }

    fn set_face(&mut self, faces: &FaceCache, x: i32, y: i32, layer: u8, face: FaceId) {
        let slot = if face == EMPTY_FACE {
            LayerSlot::Empty
        } else {
            LayerSlot::Face(face)
        };
        self.set_cell(faces, x, y, layer, slot);
    }

    fn set_anim(
        &mut self,
        faces: &FaceCache,
        x: i32,
        y: i32,
        layer: u8,
        animation: AnimationId,
        phase: u32,
    ) {
        let Some(definition) = self.animations.get(animation) else {
            warn!("{}", ProtocolWarning::UnknownAnimation(animation));
            return;
        };
        let phase = phase % definition.frames();
        self.set_cell(
            faces,
            x,
            y,
            layer,
            LayerSlot::Anim(AnimatedFace::new(animation, phase)),
        );
    }

    /// The single routing path for cell content: static faces, animations
    /// and clears all pass through here, so multi-tile bookkeeping and
    /// retained state can never be bypassed.
    fn set_cell(&mut self, faces: &FaceCache, x: i32, y: i32, layer: u8, slot: LayerSlot) {
        if !self.checked_cell(x, y, layer) {
            return;
        }
        let abs = self.grid.absolute(x, y);
        self.release_anchor(Location::new(abs.0, abs.1, layer));

        let Some(square) = self.grid.square_mut(x, y) else {
            return;
        };
        let mut changed = square.set_face(layer, slot);
        changed |= square.set_visibility(SquareVisibility::Visible);
        if changed {
            self.grid.mark_dirty(x, y);
        }

        if let LayerSlot::Face(face) = slot {
            faces.reference(face);
            let (w, h) = faces.span(face);
            if w > 1 || h > 1 {
                self.place_anchor(Location::new(abs.0, abs.1, layer), Footprint { face, w, h });
            }
        }
    }

    fn set_animation_speed(&mut self, x: i32, y: i32, layer: u8, speed: u32) {
        if !self.checked_cell(x, y, layer) {
            return;
        }
        if speed == 0 {
            warn!("{}", ProtocolWarning::ZeroAnimationSpeed { x, y, layer });
            return;
        }
        let Some(square) = self.grid.square_mut(x, y) else {
            return;
        };
        let LayerSlot::Anim(mut anim) = square.get(layer) else {
            warn!("{}", ProtocolWarning::NotAnimated { x, y, layer });
            return;
        };
        if anim.speed == speed {
            return;
        }
        // re-anchor the phase so the displayed frame is preserved
        let frame = anim.phase / anim.speed;
        let delay = (anim.phase % anim.speed).min(speed - 1);
        anim.phase = frame * speed + delay;
        anim.speed = speed;
        if square.set_face(layer, LayerSlot::Anim(anim)) {
            self.grid.mark_dirty(x, y);
        }
    }

    fn set_darkness(&mut self, x: i32, y: i32, level: u8) {
        if !self.checked_square(x, y) {
            return;
        }
        let Some(square) = self.grid.square_mut(x, y) else {
            return;
        };
        let mut changed = square.set_darkness(level);
        changed |= square.set_visibility(SquareVisibility::Visible);
        if changed {
            self.grid.mark_dirty(x, y);
        }
    }

    fn hide_square(&mut self, x: i32, y: i32) {
        if !self.checked_square(x, y) {
            return;
        }
        let Some(square) = self.grid.square_mut(x, y) else {
            return;
        };
        if square.mark_hidden() {
            self.grid.mark_dirty(x, y);
        }
    }

    fn clear_square(&mut self, x: i32, y: i32) {
        if !self.checked_square(x, y) {
            return;
        }
        let abs = self.grid.absolute(x, y);
        for layer in 0..self.grid.shape().layers {
            self.release_anchor(Location::new(abs.0, abs.1, layer));
        }
        self.grid.purge_retained(abs.0, abs.1);
        let Some(square) = self.grid.square_mut(x, y) else {
            return;
        };
        let mut changed = square.clear();
        changed |= square.set_visibility(SquareVisibility::Cleared);
        if changed {
            self.grid.mark_dirty(x, y);
        }
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> SyncResult<()> {
        self.grid.scroll(dx, dy)?;
        self.rebuild_overlays();
        Ok(())
    }

    fn new_map(&mut self, width: u16, height: u16, layers: u8) -> SyncResult<()> {
        self.grid = MapGrid::new(GridShape::new(width, height, layers))?;
        self.heads.clear();
        self.multi.clear();
        self.last_tick = None;
        self.grid.mark_all_dirty();
        debug!("new {}x{} map with {} layers", width, height, layers);
        Ok(())
    }

    /// Advances every animated slot of a visible square by the elapsed
    /// ticks. Hidden squares keep the frame they were last seen with.
    fn tick(&mut self, tick: u32) {
        let diff = match self.last_tick {
            Some(last) if tick < last => {
                warn!("{}", ProtocolWarning::TickRegression { tick, last });
                self.last_tick = Some(tick);
                return;
            }
            Some(last) => tick - last,
            None => 0,
        };
        self.last_tick = Some(tick);
        if diff == 0 {
            return;
        }

        let shape = self.grid.shape();
        let animations = &self.animations;
        let grid = &mut self.grid;
        for y in 0..shape.height as i32 {
            for x in 0..shape.width as i32 {
                let mut frame_changed = false;
                if let Some(square) = grid.square_mut(x, y) {
                    if square.visibility() != SquareVisibility::Visible {
                        continue;
                    }
                    for layer in 0..shape.layers {
                        let LayerSlot::Anim(mut anim) = square.get(layer) else {
                            continue;
                        };
                        let Some(definition) = animations.get(anim.animation) else {
                            continue;
                        };
                        let before = definition.face_at(anim.frame());
                        let period = anim.speed.max(1) * definition.frames();
                        anim.phase = (anim.phase + diff) % period;
                        square.set_face(layer, LayerSlot::Anim(anim));
                        if definition.face_at(anim.frame()) != before {
                            frame_changed = true;
                        }
                    }
                }
                if frame_changed {
                    grid.mark_dirty(x, y);
                }
            }
        }
    }

    /// Paints the overlay faces a multi-tile anchor covers. The anchor is
    /// the bottom-right tile of the face, so the footprint extends up and
    /// left from it; covered squares outside the window are skipped.
    fn place_anchor(&mut self, anchor: Location, footprint: Footprint) {
        let origin = self.grid.origin();
        let layers = self.grid.shape().layers;
        for dx in 0..footprint.w as i32 {
            for dy in 0..footprint.h as i32 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let abs = (anchor.x - dx, anchor.y - dy);
                let rel = (abs.0 - origin.0, abs.1 - origin.1);
                let Some(square) = self.grid.square_mut(rel.0, rel.1) else {
                    continue;
                };
                let multi = self
                    .multi
                    .entry(abs)
                    .or_insert_with(|| MultiSquare::new(abs.0, abs.1, layers));
                if multi.set_face(anchor.layer, footprint.face, square) {
                    self.grid.mark_dirty(rel.0, rel.1);
                }
            }
        }
        self.heads.insert(anchor, footprint);
    }

    /// Takes a multi-tile face back out of the squares it covered.
    fn release_anchor(&mut self, anchor: Location) {
        let Some(footprint) = self.heads.remove(&anchor) else {
            return;
        };
        let origin = self.grid.origin();
        for dx in 0..footprint.w as i32 {
            for dy in 0..footprint.h as i32 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let abs = (anchor.x - dx, anchor.y - dy);
                let Some(multi) = self.multi.get_mut(&abs) else {
                    continue;
                };
                let rel = (abs.0 - origin.0, abs.1 - origin.1);
                match self.grid.square_mut(rel.0, rel.1) {
                    Some(square) => {
                        if multi.set_face(anchor.layer, EMPTY_FACE, square) {
                            self.grid.mark_dirty(rel.0, rel.1);
                        }
                    }
                    None => multi.forget(anchor.layer),
                }
                if multi.is_empty() {
                    self.multi.remove(&abs);
                }
            }
        }
    }

    /// Re-derives every overlay after a scroll: anchors that left the window
    /// release their footprint, surviving anchors repaint theirs at the new
    /// relative positions.
    fn rebuild_overlays(&mut self) {
        let origin = self.grid.origin();
        let shape = self.grid.shape();
        self.grid.clear_overlays();
        self.multi.clear();
        let anchors: Vec<(Location, Footprint)> = self.heads.drain().collect();
        for (anchor, footprint) in anchors {
            if shape.contains(anchor.x - origin.0, anchor.y - origin.1) {
                self.place_anchor(anchor, footprint);
            }
        }
    }

    /// Repaints everything showing a just-delivered face and re-derives
    /// multi-tile footprints now that the image size is known.
    fn refresh_face(&mut self, faces: &FaceCache, face: FaceId) {
        let shape = self.grid.shape();
        let (w, h) = faces.span(face);

        let mut anchors: Vec<Location> = Vec::new();
        for y in 0..shape.height as i32 {
            for x in 0..shape.width as i32 {
                let abs = self.grid.absolute(x, y);
                let Some(square) = self.grid.square(x, y) else {
                    continue;
                };
                let mut holds = false;
                for layer in 0..shape.layers {
                    let shown = match square.resolved(layer) {
                        LayerSlot::Face(f) => Some(f),
                        LayerSlot::Anim(anim) => {
                            self.animations.face_at(anim.animation, anim.frame())
                        }
                        LayerSlot::Empty => None,
                    };
                    if shown == Some(face) {
                        holds = true;
                    }
                    if square.get(layer) == LayerSlot::Face(face) {
                        let anchor = Location::new(abs.0, abs.1, layer);
                        let tracked = self.heads.get(&anchor).map(|fp| (fp.w, fp.h));
                        if tracked != Some((w, h)) && (w > 1 || h > 1 || tracked.is_some()) {
                            anchors.push(anchor);
                        }
                    }
                }
                if holds {
                    self.grid.mark_dirty(x, y);
                }
            }
        }
        for anchor in anchors {
            self.release_anchor(anchor);
            if w > 1 || h > 1 {
                self.place_anchor(anchor, Footprint { face, w, h });
            }
        }
    }
}
