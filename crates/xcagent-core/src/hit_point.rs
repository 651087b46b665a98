//! Corrected interaction points for UI elements.
//!
//! The platform's own hit point is occasionally wrong: non-finite coordinates,
//! points outside the element, or a stale origin for zero-sized, rotated or
//! clipped elements. [`HitPointResolver`] normalizes these so callers get
//! either a finite point inside the element's visible frame or `None`.
//!
//! Resolution runs a chain of [`HitPointStrategy`] values; the first one that
//! yields a point wins. The default chain is:
//!
//! 1. [`ReportedHitPoint`] - the platform's point, if finite and in bounds.
//! 2. [`FrameCenter`] - the frame's center clipped to the visible bounds, for
//!    hittable elements with a positive-area frame.
//!
//! # Example
//!
//! ```
//! use xcagent_core::element::{ElementFrame, Point, SnapshotRecord};
//! use xcagent_core::hit_point::HitPointResolver;
//!
//! let snapshot = SnapshotRecord::new(ElementFrame::new(0.0, 0.0, 100.0, 50.0))
//!     .with_hit_point(Point::new(f64::NAN, 10.0));
//!
//! let resolver = HitPointResolver::default();
//! assert_eq!(resolver.resolve(&snapshot), Some(Point::new(50.0, 25.0)));
//! ```

use once_cell::sync::Lazy;
use tracing::trace;

use crate::element::{ElementFrame, ElementSnapshot, Point};

/// One rule for choosing an interaction point.
pub trait HitPointStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// A valid point for `snapshot`, or `None` to defer to the next strategy.
    fn resolve(&self, snapshot: &dyn ElementSnapshot) -> Option<Point>;
}

/// The region a hit point must fall in: the frame intersected with the
/// visible bounds, or the frame alone when there are none.
///
/// `None` when the frame is non-finite, has no area, or is not visible.
pub fn effective_bounds(snapshot: &dyn ElementSnapshot) -> Option<ElementFrame> {
    let frame = snapshot.frame();
    if !frame.is_finite() || !frame.has_positive_area() {
        return None;
    }
    match snapshot.visible_frame() {
        Some(visible) => frame.intersection(&visible),
        None => Some(frame),
    }
}

/// Accepts the platform-reported hit point when it is usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportedHitPoint;

impl HitPointStrategy for ReportedHitPoint {
    fn name(&self) -> &'static str {
        "reported"
    }

    fn resolve(&self, snapshot: &dyn ElementSnapshot) -> Option<Point> {
        let point = snapshot.hit_point()?;
        if !point.is_finite() {
            trace!(?point, "reported hit point is not finite");
            return None;
        }
        let bounds = effective_bounds(snapshot)?;
        if !bounds.contains(point) {
            trace!(?point, ?bounds, "reported hit point out of bounds");
            return None;
        }
        Some(point)
    }
}

/// Targets the center of the frame, clipped to the visible bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCenter;

impl HitPointStrategy for FrameCenter {
    fn name(&self) -> &'static str {
        "frame-center"
    }

    fn resolve(&self, snapshot: &dyn ElementSnapshot) -> Option<Point> {
        if !snapshot.is_hittable() {
            return None;
        }
        let bounds = effective_bounds(snapshot)?;
        let point = bounds.clamp(snapshot.frame().center());
        point.is_finite().then_some(point)
    }
}

/// Resolves hit points through an ordered chain of strategies.
///
/// Stateless and shareable across threads.
pub struct HitPointResolver {
    strategies: Vec<Box<dyn HitPointStrategy>>,
}

impl HitPointResolver {
    /// A resolver with an explicit strategy chain.
    pub fn new(strategies: Vec<Box<dyn HitPointStrategy>>) -> Self {
        Self { strategies }
    }

    /// Append a strategy to the end of the chain.
    pub fn with_strategy(mut self, strategy: impl HitPointStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// The interaction point for `snapshot`, or `None` if the element has no
    /// interactable point.
    pub fn resolve(&self, snapshot: &dyn ElementSnapshot) -> Option<Point> {
        for strategy in &self.strategies {
            if let Some(point) = strategy.resolve(snapshot) {
                trace!(strategy = strategy.name(), ?point, "hit point resolved");
                return Some(point);
            }
        }
        trace!(frame = ?snapshot.frame(), "no interactable point");
        None
    }
}

impl Default for HitPointResolver {
    fn default() -> Self {
        Self::new(vec![Box::new(ReportedHitPoint), Box::new(FrameCenter)])
    }
}

impl std::fmt::Debug for HitPointResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("HitPointResolver").field("strategies", &names).finish()
    }
}

static DEFAULT_RESOLVER: Lazy<HitPointResolver> = Lazy::new(HitPointResolver::default);

/// Resolve with the default strategy chain.
pub fn resolve_hit_point(snapshot: &dyn ElementSnapshot) -> Option<Point> {
    DEFAULT_RESOLVER.resolve(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::SnapshotRecord;

    fn frame(x: f64, y: f64, width: f64, height: f64) -> ElementFrame {
        ElementFrame::new(x, y, width, height)
    }

    #[test]
    fn test_valid_reported_point_returned_unchanged() {
        let snapshot = SnapshotRecord::new(frame(0.0, 0.0, 50.0, 50.0))
            .with_hit_point(Point::new(10.0, 20.0));
        assert_eq!(resolve_hit_point(&snapshot), Some(Point::new(10.0, 20.0)));
    }

    #[test]
    fn test_missing_point_uses_center() {
        let snapshot = SnapshotRecord::new(frame(0.0, 0.0, 100.0, 50.0))
            .with_visible_frame(frame(0.0, 0.0, 400.0, 800.0));
        assert_eq!(resolve_hit_point(&snapshot), Some(Point::new(50.0, 25.0)));
    }

    #[test]
    fn test_zero_frame_is_absent() {
        let snapshot = SnapshotRecord::new(frame(0.0, 0.0, 0.0, 0.0));
        assert_eq!(resolve_hit_point(&snapshot), None);

        // A stale origin reported for a zero-sized element is rejected too.
        let snapshot = snapshot.with_hit_point(Point::new(0.0, 0.0));
        assert_eq!(resolve_hit_point(&snapshot), None);
    }

    #[test]
    fn test_zero_width_frame_is_absent() {
        let snapshot = SnapshotRecord::new(frame(10.0, 10.0, 0.0, 30.0));
        assert_eq!(resolve_hit_point(&snapshot), None);
    }

    #[test]
    fn test_non_finite_point_falls_back_to_center() {
        for bad in [
            Point::new(f64::NAN, 5.0),
            Point::new(5.0, f64::INFINITY),
            Point::new(f64::NEG_INFINITY, f64::NAN),
        ] {
            let snapshot = SnapshotRecord::new(frame(0.0, 0.0, 100.0, 50.0)).with_hit_point(bad);
            assert_eq!(resolve_hit_point(&snapshot), Some(Point::new(50.0, 25.0)));
        }
    }

    #[test]
    fn test_out_of_frame_point_falls_back_to_center() {
        let snapshot = SnapshotRecord::new(frame(100.0, 100.0, 20.0, 20.0))
            .with_hit_point(Point::new(-1.0, 300.0));
        assert_eq!(resolve_hit_point(&snapshot), Some(Point::new(110.0, 110.0)));
    }

    #[test]
    fn test_center_clipped_to_visible_bounds() {
        // Element half scrolled off the bottom of its container.
        let snapshot = SnapshotRecord::new(frame(0.0, 700.0, 100.0, 200.0))
            .with_visible_frame(frame(0.0, 0.0, 400.0, 750.0));
        assert_eq!(resolve_hit_point(&snapshot), Some(Point::new(50.0, 750.0)));
    }

    #[test]
    fn test_reported_point_outside_visible_bounds_is_replaced() {
        let snapshot = SnapshotRecord::new(frame(0.0, 700.0, 100.0, 200.0))
            .with_hit_point(Point::new(50.0, 800.0))
            .with_visible_frame(frame(0.0, 0.0, 400.0, 750.0));
        assert_eq!(resolve_hit_point(&snapshot), Some(Point::new(50.0, 750.0)));
    }

    #[test]
    fn test_fully_clipped_element_is_absent() {
        let snapshot = SnapshotRecord::new(frame(0.0, 900.0, 100.0, 50.0))
            .with_visible_frame(frame(0.0, 0.0, 400.0, 800.0));
        assert_eq!(resolve_hit_point(&snapshot), None);
    }

    #[test]
    fn test_not_hittable_without_reported_point_is_absent() {
        let snapshot = SnapshotRecord::new(frame(0.0, 0.0, 100.0, 50.0)).with_hittable(false);
        assert_eq!(resolve_hit_point(&snapshot), None);
    }

    #[test]
    fn test_not_hittable_keeps_valid_reported_point() {
        let snapshot = SnapshotRecord::new(frame(0.0, 0.0, 100.0, 50.0))
            .with_hittable(false)
            .with_hit_point(Point::new(5.0, 5.0));
        assert_eq!(resolve_hit_point(&snapshot), Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_non_finite_frame_is_absent() {
        let snapshot = SnapshotRecord::new(frame(f64::NAN, 0.0, 100.0, 50.0))
            .with_hit_point(Point::new(10.0, 10.0));
        assert_eq!(resolve_hit_point(&snapshot), None);
    }

    #[test]
    fn test_overflowing_frame_center_is_absent() {
        let snapshot = SnapshotRecord::new(frame(1.5e308, 0.0, 1.0e308, 10.0));
        assert_eq!(resolve_hit_point(&snapshot), None);

        let snapshot = SnapshotRecord::new(frame(0.0, f64::MAX, 10.0, f64::MAX))
            .with_hit_point(Point::new(5.0, f64::MAX));
        assert_eq!(resolve_hit_point(&snapshot), None);
    }

    #[test]
    fn test_huge_but_finite_frame_resolves_to_center() {
        let snapshot = SnapshotRecord::new(frame(-1.0e308, 0.0, 1.5e308, 10.0));
        let point = resolve_hit_point(&snapshot).unwrap();
        assert!(point.is_finite());
        assert!(snapshot.frame.contains(point));
        assert_eq!(point.y, 5.0);
    }

    #[test]
    fn test_default_resolver_is_shared() {
        let snapshot = SnapshotRecord::new(frame(0.0, 0.0, 10.0, 10.0));
        assert_eq!(resolve_hit_point(&snapshot), DEFAULT_RESOLVER.resolve(&snapshot));
        assert!(format!("{:?}", *DEFAULT_RESOLVER).contains("frame-center"));
    }

    #[test]
    fn test_custom_strategy_chain() {
        struct TopLeft;

        impl HitPointStrategy for TopLeft {
            fn name(&self) -> &'static str {
                "top-left"
            }

            fn resolve(&self, snapshot: &dyn ElementSnapshot) -> Option<Point> {
                effective_bounds(snapshot).map(|b| Point::new(b.x, b.y))
            }
        }

        let resolver = HitPointResolver::new(vec![]).with_strategy(TopLeft);
        let snapshot = SnapshotRecord::new(frame(5.0, 6.0, 10.0, 10.0))
            .with_hit_point(Point::new(8.0, 8.0));
        assert_eq!(resolver.resolve(&snapshot), Some(Point::new(5.0, 6.0)));

        let empty = HitPointResolver::new(vec![]);
        assert_eq!(empty.resolve(&snapshot), None);
        assert!(format!("{resolver:?}").contains("top-left"));
    }

    #[test]
    fn test_resolved_points_always_in_bounds() {
        let coords = [
            -50.0,
            0.0,
            0.5,
            25.0,
            99.0,
            400.0,
            -f64::MAX,
            1.5e308,
            f64::MAX,
            f64::NAN,
            f64::INFINITY,
        ];
        let sizes = [-10.0, 0.0, 1.0, 50.0, 300.0, 1.0e308, f64::MAX];
        let visible = [None, Some(frame(0.0, 0.0, 120.0, 80.0)), Some(frame(500.0, 500.0, 10.0, 10.0))];

        for &x in &coords {
            for &size in &sizes {
                for vis in &visible {
                    for hittable in [true, false] {
                        let mut snapshot = SnapshotRecord::new(frame(x, 10.0, size, size / 2.0))
                            .with_hittable(hittable)
                            .with_hit_point(Point::new(x + 1.0, 12.0));
                        snapshot.visible_frame = *vis;

                        if let Some(point) = resolve_hit_point(&snapshot) {
                            assert!(point.is_finite(), "{snapshot:?} -> {point:?}");
                            let bounds = effective_bounds(&snapshot).unwrap();
                            assert!(bounds.contains(point), "{snapshot:?} -> {point:?}");
                            assert!(snapshot.frame.contains(point), "{snapshot:?} -> {point:?}");
                        }
                    }
                }
            }
        }
    }
}
