use crate::math::Vec2;

/// Latitude/longitude bounding box in degrees.
///
/// `x` is latitude and `y` is longitude on both corners. A box whose corners
/// are equal is treated as unbounded.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LatLongBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl LatLongBounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        LatLongBounds { min, max }
    }

    pub fn from_degrees(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self::new(Vec2::new(min_lat, min_lon), Vec2::new(max_lat, max_lon))
    }

    pub fn unbounded() -> Self {
        Self::new(Vec2::zero(), Vec2::zero())
    }

    pub fn is_unbounded(&self) -> bool {
        self.min == self.max
    }

    /// Inclusive containment; every point is inside an unbounded box.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if self.is_unbounded() {
            return true;
        }
        lat >= self.min.x && lat <= self.max.x && lon >= self.min.y && lon <= self.max.y
    }
}

#[cfg(test)]
mod tests {
    use super::LatLongBounds;

    #[test]
    fn equal_corners_mean_unbounded() {
        let b = LatLongBounds::unbounded();
        assert!(b.is_unbounded());
        assert!(b.contains(89.0, 179.0));
    }

    #[test]
    fn edges_are_inclusive() {
        let b = LatLongBounds::from_degrees(-10.0, 100.0, 10.0, 110.0);
        assert!(b.contains(-10.0, 100.0));
        assert!(b.contains(10.0, 110.0));
        assert!(!b.contains(10.000001, 105.0));
        assert!(!b.contains(0.0, 99.999));
    }
}
