//! # Animation Definitions
//!
//! An animation is a server-defined, ordered cycle of faces. Definitions are
//! immutable once registered; the registry in the client module owns the
//! id-to-definition mapping.

use serde::{Deserialize, Serialize};

use crate::types::{AnimationId, FaceId};

/// One animation definition as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animation {
    id: AnimationId,
    flags: u32,
    faces: Vec<FaceId>,
}

impl Animation {
    /// Creates a definition. The face sequence must not be empty; the
    /// registry rejects empty definitions before constructing one.
    pub fn new(id: AnimationId, flags: u32, faces: Vec<FaceId>) -> Self {
        debug_assert!(!faces.is_empty());
        Self { id, flags, faces }
    }

    pub fn id(&self) -> AnimationId {
        self.id
    }

    /// Animation flags as sent by the server. Reserved, currently unused.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Number of frames in the cycle.
    pub fn frames(&self) -> u32 {
        self.faces.len() as u32
    }

    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    /// The face shown at a phase. Phases wrap around the cycle, so callers
    /// never bounds-check their counters.
    pub fn face_at(&self, phase: u32) -> FaceId {
        self.faces[(phase % self.frames()) as usize]
    }
}
