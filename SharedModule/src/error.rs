//! # Error Taxonomy
//!
//! Exactly three kinds of condition leave the engine: fatal desyncs
//! ([`SyncError`], returned to the caller because continuing would corrupt
//! the visible world), protocol warnings ([`ProtocolWarning`], logged and
//! skipped so one bad frame never desynchronizes the rest of the stream),
//! and missing face data, which is not an error at all but the `Pending`
//! payload state handled by placeholder rendering.

use thiserror::Error;

use crate::types::AnimationId;

/// Result type for engine entry points.
pub type SyncResult<T> = Result<T, SyncError>;

/// Unrecoverable session errors. Once one of these is returned the map state
/// can no longer be trusted and the session should be torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Scroll arithmetic would move the window origin outside the
    /// representable coordinate space
    #[error("scroll by ({dx}, {dy}) overflows the map coordinate space")]
    ScrollOverflow { dx: i32, dy: i32 },

    /// A map announcement carried a shape the engine cannot represent
    #[error("unusable map shape {width}x{height} with {layers} layers")]
    InvalidGridShape { width: u16, height: u16, layers: u8 },
}

/// Recoverable protocol oddities. The offending update is skipped and the
/// stream continues; servers legitimately produce some of these (definition
/// resends after a reload, for example).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolWarning {
    /// An animation id was defined twice; the newest definition wins
    #[error("animation {0} redefined, keeping the newest definition")]
    AnimationRedefined(AnimationId),

    /// A single-frame animation animates nothing
    #[error("animation {0} has a single frame")]
    SingleFrameAnimation(AnimationId),

    /// An animation with no frames cannot be displayed; the definition is
    /// dropped
    #[error("animation {0} defines no frames, dropping definition")]
    EmptyAnimation(AnimationId),

    /// A tile references an animation that was never defined
    #[error("unknown animation {0}")]
    UnknownAnimation(AnimationId),

    /// A tile update addressed a layer the grid does not have
    #[error("layer {layer} out of range, grid has {layers} layers")]
    LayerOutOfRange { layer: u8, layers: u8 },

    /// A tile update addressed a square outside the visible window
    #[error("coordinate ({x}, {y}) outside the {width}x{height} window")]
    OutsideWindow {
        x: i32,
        y: i32,
        width: u16,
        height: u16,
    },

    /// A speed update addressed a layer that holds no animation
    #[error("no animation at ({x}, {y}) layer {layer} to change speed of")]
    NotAnimated { x: i32, y: i32, layer: u8 },

    /// An animation speed of zero would stall the cycle
    #[error("animation speed 0 at ({x}, {y}) layer {layer}")]
    ZeroAnimationSpeed { x: i32, y: i32, layer: u8 },

    /// The tick counter moved backwards
    #[error("tick {tick} precedes {last}, ignoring")]
    TickRegression { tick: u32, last: u32 },
}
