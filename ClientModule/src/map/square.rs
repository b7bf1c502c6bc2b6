//! Per-square state: one slot per rendering layer, a visibility state, a
//! darkness level and overlay slots for multi-square objects.
//!
//! `set_face` is the single mutation path for layer content. Because a
//! square's content doubles as its fog-of-war snapshot, every applied value,
//! including "empty", is what a hidden square later renders dimmed;
//! `mark_hidden` changes visibility only and can never overwrite retained
//! content with emptiness.

use gridsync_shared::constants::{DEFAULT_ANIMATION_SPEED, DEFAULT_DARKNESS};
use gridsync_shared::types::{AnimationId, FaceId, SquareVisibility};

/// An animation reference held by one layer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimatedFace {
    /// The animation definition to cycle through
    pub animation: AnimationId,

    /// Phase counter, advanced by ticks; wraps at `speed * frames`
    pub phase: u32,

    /// Ticks per frame advance
    pub speed: u32,
}

impl AnimatedFace {
    pub fn new(animation: AnimationId, phase: u32) -> Self {
        Self {
            animation,
            phase,
            speed: DEFAULT_ANIMATION_SPEED,
        }
    }

    /// The frame index currently displayed.
    pub fn frame(&self) -> u32 {
        self.phase / self.speed.max(1)
    }
}

/// Content of one rendering layer of one square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerSlot {
    /// Nothing to draw
    #[default]
    Empty,

    /// A static face
    Face(FaceId),

    /// An animation and its current position in the cycle
    Anim(AnimatedFace),
}

impl LayerSlot {
    pub fn is_empty(&self) -> bool {
        matches!(self, LayerSlot::Empty)
    }
}

/// One square of the visible window.
#[derive(Debug, Clone)]
pub struct MapSquare {
    layers: Vec<LayerSlot>,
    overlay: Vec<Option<FaceId>>,
    visibility: SquareVisibility,
    darkness: u8,
}

impl MapSquare {
    /// Creates an untouched square with the given layer count.
    pub fn new(layers: u8) -> Self {
        Self {
            layers: vec![LayerSlot::Empty; layers as usize],
            overlay: vec![None; layers as usize],
            visibility: SquareVisibility::Unseen,
            darkness: DEFAULT_DARKNESS,
        }
    }

    /// Recreates a square from content retained while it was outside the
    /// window. It starts hidden: the content is last-seen, not live.
    pub(crate) fn restore(layers: Vec<LayerSlot>, darkness: u8) -> Self {
        let overlay = vec![None; layers.len()];
        Self {
            layers,
            overlay,
            visibility: SquareVisibility::Hidden,
            darkness,
        }
    }

    pub fn layer_count(&self) -> u8 {
        self.layers.len() as u8
    }

    /// The applied content of a layer. For a hidden square this is the
    /// fog-of-war snapshot.
    pub fn get(&self, layer: u8) -> LayerSlot {
        self.layers[layer as usize]
    }

    /// The renderable content of a layer: the overlay face of a large
    /// object when one covers this square, the applied content otherwise.
    pub fn resolved(&self, layer: u8) -> LayerSlot {
        match self.overlay[layer as usize] {
            Some(face) => LayerSlot::Face(face),
            None => self.layers[layer as usize],
        }
    }

    pub fn overlay(&self, layer: u8) -> Option<FaceId> {
        self.overlay[layer as usize]
    }

    /// Sets the content of a layer. This is the only mutation path for
    /// layer content, whether the new value is real or empty, so retained
    /// state always reflects the last applied value. Returns whether the
    /// content changed.
    pub fn set_face(&mut self, layer: u8, slot: LayerSlot) -> bool {
        let current = &mut self.layers[layer as usize];
        if *current == slot {
            return false;
        }
        *current = slot;
        true
    }

    /// Empties every layer through `set_face` and resets darkness. Used
    /// when the square becomes definitively void, as opposed to merely
    /// leaving the line of sight. Returns whether anything changed.
    pub fn clear(&mut self) -> bool {
        let mut changed = false;
        for layer in 0..self.layer_count() {
            changed |= self.set_face(layer, LayerSlot::Empty);
        }
        if self.darkness != DEFAULT_DARKNESS {
            self.darkness = DEFAULT_DARKNESS;
            changed = true;
        }
        changed
    }

    /// Marks the square as out of the server's line of sight. Content is
    /// untouched; only a visible square transitions. Returns whether the
    /// visibility changed.
    pub fn mark_hidden(&mut self) -> bool {
        if self.visibility == SquareVisibility::Visible {
            self.visibility = SquareVisibility::Hidden;
            true
        } else {
            false
        }
    }

    pub fn visibility(&self) -> SquareVisibility {
        self.visibility
    }

    pub(crate) fn set_visibility(&mut self, visibility: SquareVisibility) -> bool {
        if self.visibility == visibility {
            return false;
        }
        self.visibility = visibility;
        true
    }

    /// Whether the square renders retained, dimmed content.
    pub fn is_fog(&self) -> bool {
        self.visibility == SquareVisibility::Hidden
    }

    pub fn darkness(&self) -> u8 {
        self.darkness
    }

    pub fn set_darkness(&mut self, darkness: u8) -> bool {
        if self.darkness == darkness {
            return false;
        }
        self.darkness = darkness;
        true
    }

    /// Installs or removes a large-object overlay face. Overlay writes do
    /// not touch applied content, so the square still remembers what was
    /// underneath the object.
    pub(crate) fn set_overlay(&mut self, layer: u8, face: Option<FaceId>) -> bool {
        let current = &mut self.overlay[layer as usize];
        if *current == face {
            return false;
        }
        *current = face;
        true
    }

    /// Whether any layer holds content or the darkness differs from the
    /// default. Squares without content are not worth retaining.
    pub fn has_content(&self) -> bool {
        self.darkness != DEFAULT_DARKNESS || self.layers.iter().any(|slot| !slot.is_empty())
    }

    /// Consumes the square into its retainable content.
    pub(crate) fn into_retained(self) -> (Vec<LayerSlot>, u8) {
        (self.layers, self.darkness)
    }
}
