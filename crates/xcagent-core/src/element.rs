//! Geometry and element snapshot types.
//!
//! An [`ElementSnapshot`] is the read-only view of a UI element's captured
//! state that the hit-point resolver consumes. The snapshot itself belongs to
//! the accessibility layer; [`SnapshotRecord`] is a plain, serializable
//! implementation for callers that only have the reported values.

use serde::{Deserialize, Serialize};

/// A point in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// True if neither coordinate is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// The frame (position and dimensions) of a UI element.
///
/// Coordinates are in screen points, with the origin at the top-left
/// corner of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementFrame {
    /// The x-coordinate of the element's top-left corner.
    pub x: f64,
    /// The y-coordinate of the element's top-left corner.
    pub y: f64,
    /// The width of the element in points.
    pub width: f64,
    /// The height of the element in points.
    pub height: f64,
}

impl ElementFrame {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// True if origin, size and far edges are all finite.
    ///
    /// Finite fields can still overflow once added, so the far edges are
    /// checked as well.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.max_x().is_finite()
            && self.max_y().is_finite()
    }

    /// True if both width and height are strictly positive.
    pub fn has_positive_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// The geometric center.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether `point` lies inside the frame, edges included.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.max_x() && point.y >= self.y && point.y <= self.max_y()
    }

    /// The overlapping region of two frames, or `None` if they do not overlap
    /// with positive area.
    pub fn intersection(&self, other: &ElementFrame) -> Option<ElementFrame> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());

        let overlap = ElementFrame::new(x, y, max_x - x, max_y - y);
        (overlap.is_finite() && overlap.has_positive_area()).then_some(overlap)
    }

    /// The point inside the frame nearest to `point`.
    pub fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(self.x, self.max_x()),
            point.y.clamp(self.y, self.max_y()),
        )
    }
}

/// Read-only captured state of a UI element.
pub trait ElementSnapshot {
    /// The frame the platform reports for the element.
    fn frame(&self) -> ElementFrame;

    /// The hit point the platform reports, if any. May be invalid.
    fn hit_point(&self) -> Option<Point>;

    /// Whether the platform considers the element hittable.
    fn is_hittable(&self) -> bool;

    /// The visible region of the element's container, if known.
    fn visible_frame(&self) -> Option<ElementFrame>;
}

/// A plain snapshot of reported element values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub frame: ElementFrame,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_point: Option<Point>,

    #[serde(default = "default_hittable")]
    pub is_hittable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_frame: Option<ElementFrame>,
}

fn default_hittable() -> bool {
    true
}

impl SnapshotRecord {
    /// A hittable snapshot with no reported hit point and no visible bounds.
    pub fn new(frame: ElementFrame) -> Self {
        Self {
            frame,
            hit_point: None,
            is_hittable: true,
            visible_frame: None,
        }
    }

    pub fn with_hit_point(mut self, point: Point) -> Self {
        self.hit_point = Some(point);
        self
    }

    pub fn with_visible_frame(mut self, visible_frame: ElementFrame) -> Self {
        self.visible_frame = Some(visible_frame);
        self
    }

    pub fn with_hittable(mut self, is_hittable: bool) -> Self {
        self.is_hittable = is_hittable;
        self
    }
}

impl ElementSnapshot for SnapshotRecord {
    fn frame(&self) -> ElementFrame {
        self.frame
    }

    fn hit_point(&self) -> Option<Point> {
        self.hit_point
    }

    fn is_hittable(&self) -> bool {
        self.is_hittable
    }

    fn visible_frame(&self) -> Option<ElementFrame> {
        self.visible_frame
    }
}
