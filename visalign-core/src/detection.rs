//! Per-frame detections and image-space geometry

use serde::{Deserialize, Serialize};

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Image center, integer division
    pub fn center(&self) -> (i32, i32) {
        (saturate(i64::from(self.width / 2)), saturate(i64::from(self.height / 2)))
    }

    /// Positional error of a detection relative to the image center.
    /// The y component is positive upward. Saturates at the `i32` range.
    pub fn error_of(&self, detection: &Detection) -> AxisError {
        let (center_x, center_y) = self.center();
        AxisError {
            x: saturate(i64::from(detection.cx) - i64::from(center_x)),
            y: saturate(i64::from(center_y) - i64::from(detection.cy)),
        }
    }
}

/// Bounding box corners in image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn center(&self) -> (i32, i32) {
        (midpoint(self.x1, self.x2), midpoint(self.y1, self.y2))
    }
}

fn midpoint(a: i32, b: i32) -> i32 {
    saturate((i64::from(a) + i64::from(b)) / 2)
}

fn saturate(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// The resolved observation of one target in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub cx: i32,
    pub cy: i32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn from_bbox(bbox: BoundingBox) -> Self {
        let (cx, cy) = bbox.center();
        Self { cx, cy, bbox }
    }

    /// Detection centered on a point with a degenerate box
    pub fn at(cx: i32, cy: i32) -> Self {
        Self {
            cx,
            cy,
            bbox: BoundingBox::new(cx, cy, cx, cy),
        }
    }

    /// Same detection in an image rotated by 180 degrees
    pub fn flipped(&self, frame: FrameSize) -> Self {
        let mirror = |value: i32, size: u32| saturate(i64::from(size) - 1 - i64::from(value));
        let bbox = BoundingBox {
            x1: mirror(self.bbox.x2, frame.width),
            y1: mirror(self.bbox.y2, frame.height),
            x2: mirror(self.bbox.x1, frame.width),
            y2: mirror(self.bbox.y1, frame.height),
        };
        Self {
            cx: mirror(self.cx, frame.width),
            cy: mirror(self.cy, frame.height),
            bbox,
        }
    }
}

/// Image-space error of a detection, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisError {
    pub x: i32,
    pub y: i32,
}

/// A raw labeled candidate as produced by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledBox {
    pub label: String,
    pub bbox: BoundingBox,
}

/// Pick the candidate carrying `label` whose center lies closest to the
/// image center. Ties keep the earliest candidate.
pub fn select_closest(
    candidates: &[LabeledBox],
    label: Option<&str>,
    frame: FrameSize,
) -> Option<Detection> {
    let label = label?;
    let (center_x, center_y) = frame.center();

    candidates
        .iter()
        .filter(|candidate| candidate.label == label)
        .map(|candidate| Detection::from_bbox(candidate.bbox))
        .map(|detection| {
            let dx = f64::from(detection.cx) - f64::from(center_x);
            let dy = f64::from(detection.cy) - f64::from(center_y);
            (dx.hypot(dy), detection)
        })
        .fold(None, |best: Option<(f64, Detection)>, (distance, detection)| match best {
            Some((best_distance, _)) if best_distance <= distance => best,
            _ => Some((distance, detection)),
        })
        .map(|(_, detection)| detection)
}
