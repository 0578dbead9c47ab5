//! Geometry classifier
//!
//! A tracked person is considered fallen when its box is wider than it is
//! tall by more than a configured factor. Two factors are common: `1.0`
//! (plain `width > height`) and the stricter `1.25`, which is the default.

use super::BoundingBox;

/// Default width/height factor above which a box counts as fallen
pub const DEFAULT_FALL_ASPECT_RATIO: f64 = 1.25;

/// Aspect-ratio fall heuristic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallHeuristic {
    ratio: f64,
}

impl FallHeuristic {
    /// Create a heuristic with the given width/height factor
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Returns true when `width > height * ratio`
    ///
    /// Total over all inputs: degenerate boxes (zero or negative height or
    /// width) and non-finite coordinates are never fallen.
    pub fn is_fallen(&self, bbox: &BoundingBox) -> bool {
        let (w, h) = (bbox.width(), bbox.height());
        if !w.is_finite() || !h.is_finite() || w <= 0.0 || h <= 0.0 {
            return false;
        }
        w > h * self.ratio
    }
}

impl Default for FallHeuristic {
    fn default() -> Self {
        Self::new(DEFAULT_FALL_ASPECT_RATIO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_box_is_fallen_under_both_factors() {
        let b = BoundingBox::new(10.0, 10.0, 110.0, 60.0);
        assert!(FallHeuristic::new(1.0).is_fallen(&b));
        assert!(FallHeuristic::new(1.25).is_fallen(&b));
    }

    #[test]
    fn test_tall_box_is_not_fallen() {
        let b = BoundingBox::new(10.0, 10.0, 60.0, 110.0);
        assert!(!FallHeuristic::default().is_fallen(&b));
    }

    #[test]
    fn test_factors_disagree_in_between() {
        // width 110, height 100: fallen only for the plain comparison
        let b = BoundingBox::new(0.0, 0.0, 110.0, 100.0);
        assert!(FallHeuristic::new(1.0).is_fallen(&b));
        assert!(!FallHeuristic::new(1.25).is_fallen(&b));
    }

    #[test]
    fn test_boundary_is_strict() {
        let b = BoundingBox::new(0.0, 0.0, 125.0, 100.0);
        assert!(!FallHeuristic::new(1.25).is_fallen(&b));
    }

    #[test]
    fn test_degenerate_boxes_are_not_fallen() {
        let heuristic = FallHeuristic::default();
        assert!(!heuristic.is_fallen(&BoundingBox::new(0.0, 50.0, 100.0, 50.0)));
        assert!(!heuristic.is_fallen(&BoundingBox::new(0.0, 60.0, 100.0, 50.0)));
        assert!(!heuristic.is_fallen(&BoundingBox::new(50.0, 0.0, 50.0, 10.0)));
        assert!(!heuristic.is_fallen(&BoundingBox::new(0.0, 0.0, f64::NAN, 10.0)));
        assert!(!heuristic.is_fallen(&BoundingBox::new(0.0, 0.0, f64::INFINITY, 10.0)));
    }

    #[test]
    fn test_small_height_still_classified() {
        let b = BoundingBox::new(0.0, 0.0, 2.0, 0.5);
        assert!(FallHeuristic::default().is_fallen(&b));
    }
}
