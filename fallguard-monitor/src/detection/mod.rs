//! Tracker output types and the geometry classifier
//!
//! The vision/tracking model is an external collaborator. Per frame it yields
//! `(track_id, bounding_box)` pairs for one object class; this module holds
//! those types and the aspect-ratio heuristic that turns a box into a
//! fallen/not-fallen signal.

pub mod classifier;

pub use classifier::FallHeuristic;
pub use fallguard_common::events::TrackId;

use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left
///
/// Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One tracked entity in one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub track_id: TrackId,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(track_id: TrackId, bbox: BoundingBox) -> Self {
        Self { track_id, bbox }
    }
}

/// What the tracker produced for one frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameInput {
    /// Detections for this frame; an empty list means zero active ids
    Detections(Vec<Detection>),
    /// Frame could not be processed (undecodable image, tracker failure)
    ///
    /// Carries no information about which ids are present, so it leaves
    /// coordinator state untouched.
    Unavailable { reason: String },
}

impl FrameInput {
    /// Build from an optional detection list, `None` meaning unavailable
    pub fn from_optional(detections: Option<Vec<Detection>>) -> Self {
        match detections {
            Some(list) => FrameInput::Detections(list),
            None => FrameInput::Unavailable {
                reason: "no detections reported".to_string(),
            },
        }
    }
}
