//! # Decoded Update Messages
//!
//! The typed form of the server's map update stream. The wire-protocol
//! decoder turns network bytes into these values and hands them to the
//! synchronization engine one at a time, in connection order.

use serde::{Deserialize, Serialize};

use crate::types::{AnimationId, FaceId};

/// One decoded map update from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapUpdate {
    /// Register or replace an animation definition
    DefineAnimation {
        id: AnimationId,
        flags: u32,
        faces: Vec<FaceId>,
    },

    /// Put a static face into one layer of one square; the reserved empty
    /// face empties the layer
    SetFace {
        x: i32,
        y: i32,
        layer: u8,
        face: FaceId,
    },

    /// Put an animation into one layer of one square, starting at the given
    /// phase
    SetAnim {
        x: i32,
        y: i32,
        layer: u8,
        animation: AnimationId,
        phase: u32,
    },

    /// Change the tick advance rate of the animation in one layer
    SetAnimationSpeed {
        x: i32,
        y: i32,
        layer: u8,
        speed: u32,
    },

    /// Empty one layer of one square
    ClearCell { x: i32, y: i32, layer: u8 },

    /// Set the darkness level of one square; 0 is fully dark, 255 fully
    /// bright
    Darkness { x: i32, y: i32, level: u8 },

    /// Shift the visible window by the given distance in squares
    Scroll { dx: i32, dy: i32 },

    /// The square left the server's line of sight; retained content stays
    HideSquare { x: i32, y: i32 },

    /// The square is void; drop its content and retained history
    ClearSquare { x: i32, y: i32 },

    /// The player entered a different map; rebuild the window with the given
    /// shape and forget everything retained
    NewMap { width: u16, height: u16, layers: u8 },

    /// Animation clock from the rendering loop
    Tick { tick: u32 },
}

/// Pixel payload of one face, delivered asynchronously by the image
/// pipeline. The bytes are opaque to the engine; the dimensions determine
/// how many squares the face covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceData {
    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Encoded pixel data, interpreted by the renderer only
    pub bytes: Vec<u8>,
}

impl FaceData {
    pub fn new(width: u32, height: u32, bytes: Vec<u8>) -> Self {
        Self {
            width,
            height,
            bytes,
        }
    }
}
