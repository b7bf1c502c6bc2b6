//! The scrollable window of map squares.
//!
//! The grid addresses a fixed `width x height` window; coordinates beyond it
//! do not exist, there is no unbounded world buffer. Scrolling shifts the
//! window over an absolute coordinate space: squares that stay inside keep
//! their state, squares that fall out stow their content into a fog-of-war
//! store keyed by absolute coordinate, and squares that come in are seeded
//! from that store when a record exists.

use std::collections::{HashMap, HashSet};

use log::trace;

use gridsync_shared::error::{SyncError, SyncResult};
use gridsync_shared::types::GridShape;

use super::square::{LayerSlot, MapSquare};

/// Content retained for a square that left the window.
#[derive(Debug, Clone)]
struct FogRecord {
    layers: Vec<LayerSlot>,
    darkness: u8,
}

/// The visible map window.
#[derive(Debug)]
pub struct MapGrid {
    shape: GridShape,
    /// Absolute coordinate of the window's top-left square
    origin: (i32, i32),
    squares: Vec<MapSquare>,
    /// Retained content of evicted squares, keyed by absolute coordinate
    fog_store: HashMap<(i32, i32), FogRecord>,
    /// Squares changed since the last drain, viewport-relative
    dirty: HashSet<(i32, i32)>,
}

impl MapGrid {
    /// Creates a window of untouched squares.
    pub fn new(shape: GridShape) -> SyncResult<Self> {
        if shape.width == 0 || shape.height == 0 || shape.layers == 0 {
            return Err(SyncError::InvalidGridShape {
                width: shape.width,
                height: shape.height,
                layers: shape.layers,
            });
        }
        Ok(Self {
            shape,
            origin: (0, 0),
            squares: (0..shape.square_count())
                .map(|_| MapSquare::new(shape.layers))
                .collect(),
            fog_store: HashMap::new(),
            dirty: HashSet::new(),
        })
    }

    /// A zero-sized grid for the time before the first map announcement.
    /// Every coordinate is outside it.
    pub fn unmapped() -> Self {
        Self {
            shape: GridShape::new(0, 0, 0),
            origin: (0, 0),
            squares: Vec::new(),
            fog_store: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Absolute coordinate of the window's top-left square.
    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    /// Whether a viewport-relative coordinate is addressable.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.shape.contains(x, y)
    }

    fn index(&self, x: i32, y: i32) -> usize {
        y as usize * self.shape.width as usize + x as usize
    }

    /// Absolute coordinate of a viewport-relative one.
    pub fn absolute(&self, x: i32, y: i32) -> (i32, i32) {
        (self.origin.0 + x, self.origin.1 + y)
    }

    pub fn square(&self, x: i32, y: i32) -> Option<&MapSquare> {
        if !self.contains(x, y) {
            return None;
        }
        let index = self.index(x, y);
        Some(&self.squares[index])
    }

    pub fn square_mut(&mut self, x: i32, y: i32) -> Option<&mut MapSquare> {
        if !self.contains(x, y) {
            return None;
        }
        let index = self.index(x, y);
        Some(&mut self.squares[index])
    }

    /// Marks a square as needing repaint.
    pub fn mark_dirty(&mut self, x: i32, y: i32) {
        if self.contains(x, y) {
            self.dirty.insert((x, y));
        }
    }

    pub fn mark_all_dirty(&mut self) {
        for y in 0..self.shape.height as i32 {
            for x in 0..self.shape.width as i32 {
                self.dirty.insert((x, y));
            }
        }
    }

    /// Returns and resets the set of squares needing repaint.
    pub fn take_dirty(&mut self) -> Vec<(i32, i32)> {
        let mut drained: Vec<(i32, i32)> = self.dirty.drain().collect();
        drained.sort_unstable();
        drained
    }

    /// Shifts the window by `(dx, dy)` squares. Content moves against the
    /// scroll direction; evicted squares are retained by absolute
    /// coordinate, entering squares are seeded from retained records.
    pub fn scroll(&mut self, dx: i32, dy: i32) -> SyncResult<()> {
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        let new_origin = (
            checked_origin(self.origin.0, dx, self.shape.width)
                .ok_or(SyncError::ScrollOverflow { dx, dy })?,
            checked_origin(self.origin.1, dy, self.shape.height)
                .ok_or(SyncError::ScrollOverflow { dx, dy })?,
        );

        let width = self.shape.width as i32;
        let old_origin = self.origin;
        let old = std::mem::take(&mut self.squares);

        let mut moved: Vec<Option<MapSquare>> = (0..self.shape.square_count())
            .map(|_| None)
            .collect();
        for (index, square) in old.into_iter().enumerate() {
            let ox = index as i32 % width;
            let oy = index as i32 / width;
            let nx = ox - dx;
            let ny = oy - dy;
            if self.shape.contains(nx, ny) {
                moved[(ny * width + nx) as usize] = Some(square);
            } else {
                let abs = (old_origin.0 + ox, old_origin.1 + oy);
                if square.has_content() {
                    let (layers, darkness) = square.into_retained();
                    self.fog_store.insert(abs, FogRecord { layers, darkness });
                } else {
                    self.fog_store.remove(&abs);
                }
            }
        }

        self.origin = new_origin;
        let layers = self.shape.layers;
        let fog_store = &mut self.fog_store;
        let squares: Vec<MapSquare> = moved
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    let x = index as i32 % width;
                    let y = index as i32 / width;
                    let abs = (new_origin.0 + x, new_origin.1 + y);
                    match fog_store.remove(&abs) {
                        Some(record) => MapSquare::restore(record.layers, record.darkness),
                        None => MapSquare::new(layers),
                    }
                })
            })
            .collect();
        self.squares = squares;

        trace!(
            "scrolled by ({}, {}), origin now ({}, {})",
            dx,
            dy,
            new_origin.0,
            new_origin.1
        );
        self.mark_all_dirty();
        Ok(())
    }

    /// Drops the retained record for an absolute coordinate. Used when the
    /// server declares the square void.
    pub fn purge_retained(&mut self, x: i32, y: i32) {
        self.fog_store.remove(&(x, y));
    }

    /// Removes every large-object overlay from every square. The engine
    /// re-derives overlays from its anchor bookkeeping after a scroll.
    pub(crate) fn clear_overlays(&mut self) {
        let layers = self.shape.layers;
        for square in &mut self.squares {
            for layer in 0..layers {
                square.set_overlay(layer, None);
            }
        }
    }

    /// Number of absolute coordinates with retained content.
    pub fn retained_count(&self) -> usize {
        self.fog_store.len()
    }
}

/// New origin component after a scroll, or `None` on overflow. The window
/// extent must stay representable as well.
fn checked_origin(origin: i32, delta: i32, extent: u16) -> Option<i32> {
    let moved = origin.checked_add(delta)?;
    moved.checked_add(extent as i32)?;
    Some(moved)
}
