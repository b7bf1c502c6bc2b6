//! Secondary-square overlays for multi-tile objects.
//!
//! A large object occupies one anchor square but visually covers others. A
//! [`MultiSquare`] is the overlay record for one covered square: it lets the
//! object paint a face there without disturbing what the server has applied
//! to that square, and takes the face back out when the object moves away.

use gridsync_shared::constants::EMPTY_FACE;
use gridsync_shared::types::FaceId;

use super::square::MapSquare;

/// Overlay record for one square covered by a multi-tile object.
#[derive(Debug, Clone)]
pub struct MultiSquare {
    x: i32,
    y: i32,
    faces: Vec<Option<FaceId>>,
}

impl MultiSquare {
    /// Creates an empty overlay record for the square at the given absolute
    /// coordinate.
    pub fn new(x: i32, y: i32, layers: u8) -> Self {
        Self {
            x,
            y,
            faces: vec![None; layers as usize],
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    /// The overlay face recorded for a layer.
    pub fn face(&self, layer: u8) -> Option<FaceId> {
        self.faces[layer as usize]
    }

    /// Whether no layer carries an overlay face.
    pub fn is_empty(&self) -> bool {
        self.faces.iter().all(|f| f.is_none())
    }

    /// Writes an overlay face into one layer of the covered square.
    ///
    /// The write is last-writer-wins per layer: any previous occupant is
    /// cleared from the square first, then the new face is recorded here and
    /// installed, so the rendering view and this record never diverge under
    /// rapid move/remove churn. The reserved empty face removes the layer's
    /// overlay. Returns whether the square's renderable content changed.
    pub fn set_face(&mut self, layer: u8, face: FaceId, square: &mut MapSquare) -> bool {
        let mut changed = false;
        if self.faces[layer as usize].is_some() {
            changed |= square.set_overlay(layer, None);
        }
        if face == EMPTY_FACE {
            self.faces[layer as usize] = None;
            return changed;
        }
        self.faces[layer as usize] = Some(face);
        changed | square.set_overlay(layer, Some(face))
    }

    /// Drops the record for one layer without touching any square. Used
    /// when the covered square itself left the window, taking its overlay
    /// slots with it.
    pub(crate) fn forget(&mut self, layer: u8) {
        self.faces[layer as usize] = None;
    }

    /// Removes every overlay face in one step. The square's own applied
    /// content, and thereby its retained fog-of-war state, is untouched.
    /// Returns whether the square's renderable content changed.
    pub fn clear(&mut self, square: &mut MapSquare) -> bool {
        let mut changed = false;
        for layer in 0..self.faces.len() as u8 {
            if self.faces[layer as usize].take().is_some() {
                changed |= square.set_overlay(layer, None);
            }
        }
        changed
    }
}
