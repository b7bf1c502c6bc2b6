//! # Common Types
//!
//! Common type definitions used across the decoder, the synchronization
//! engine and the renderer.

use serde::{Deserialize, Serialize};

/// Server-assigned image identity. Stable for the lifetime of a session.
pub type FaceId = u32;

/// Server-assigned animation identity.
pub type AnimationId = u32;

/// A single cell position within the visible map window.
///
/// Coordinates are viewport-relative; `(0, 0)` is the top-left corner of the
/// window. The layer selects one of the server-defined rendering layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
    pub layer: u8,
}

impl Location {
    pub fn new(x: i32, y: i32, layer: u8) -> Self {
        Self { x, y, layer }
    }
}

/// The shape of the visible map window: its dimensions in squares and the
/// number of rendering layers per square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    /// Window width in squares
    pub width: u16,

    /// Window height in squares
    pub height: u16,

    /// Rendering layers per square (server-defined, fixed for a map)
    pub layers: u8,
}

impl GridShape {
    pub fn new(width: u16, height: u16, layers: u8) -> Self {
        Self {
            width,
            height,
            layers,
        }
    }

    /// Total number of squares in the window.
    pub fn square_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether a viewport-relative coordinate falls inside the window.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        0 <= x && x < self.width as i32 && 0 <= y && y < self.height as i32
    }
}

/// The visibility state of one map square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SquareVisibility {
    /// No update has touched the square since it entered the window
    Unseen,

    /// The square is inside the server's line of sight
    Visible,

    /// The square left the server's line of sight; its last-seen content is
    /// retained and rendered dimmed
    Hidden,

    /// The server declared the square void; its content and retained
    /// history are gone
    Cleared,
}
