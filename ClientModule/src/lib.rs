//! # ClientModule
//!
//! The world-state synchronization engine of a 2D tile-based game client.
//! A remote server streams partial, delta-encoded map updates; this crate
//! applies them to a scrolling, multi-layer grid of squares while tracking
//! animation state, asynchronous face availability, fog-of-war retention and
//! multi-square object overlays.
//!
//! The system is organized into several sub-modules:
//! - `animation`: animation definitions and frame resolution
//! - `face`: face-id to image-data mapping with asynchronous delivery
//! - `map`: the square, grid and overlay data model
//! - `engine`: the update-applying façade the decoder talks to
//!
//! The wire-protocol decoder and the rendering layer are external
//! collaborators: the decoder feeds [`MapUpdate`](gridsync_shared::MapUpdate)
//! values into [`SyncEngine::apply`](engine::SyncEngine::apply), the renderer
//! registers change listeners and reads
//! [`snapshot`](engine::SyncEngine::snapshot) values back out.

// Module declarations
pub mod animation; // Animation registry
pub mod face; // Face cache
pub mod map; // Square / grid / overlay data model
pub mod engine; // Update-applying façade

// Re-export commonly used items
pub use animation::AnimationRegistry;
pub use engine::{SquareSnapshot, SyncEngine};
pub use face::{FaceCache, FaceHandle, FacePayload};
pub use map::{AnimatedFace, LayerSlot, MapGrid, MapSquare, MultiSquare};
