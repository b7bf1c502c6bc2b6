//! # Map Data Model
//!
//! The square, grid and overlay structures the engine mutates. A
//! [`MapGrid`] is a bounded, scrollable window of [`MapSquare`] entries;
//! each square carries one slot per rendering layer plus overlay slots that
//! [`MultiSquare`] handles write large-object faces into.

pub mod square;
pub mod multi;
pub mod grid;

pub use grid::MapGrid;
pub use multi::MultiSquare;
pub use square::{AnimatedFace, LayerSlot, MapSquare};
