use imageproc::geometry::{approximate_polygon_dp, convex_hull};
use imageproc::point::Point;

/// Axis-aligned bounding box in pixel coordinates (width/height are inclusive
/// pixel counts, matching what a raster contour covers)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Geometric profile of one contour, computed once so the acceptance checks
/// can be expressed as independent predicates over this value
#[derive(Debug, Clone)]
pub struct CandidateMeasure {
    /// Polygon approximation of the contour (2% of perimeter tolerance)
    pub polygon: Vec<Point<i32>>,
    /// Whether the polygon approximation is convex
    pub convex: bool,
    /// Enclosed area of the raw contour (shoelace)
    pub area: f64,
    /// Closed arc length of the raw contour
    pub perimeter: f64,
    pub bbox: BoundingBox,
    /// bbox width / height
    pub aspect_ratio: f64,
    /// area / bbox area
    pub fill_ratio: f64,
    /// area / convex hull area
    pub solidity: f64,
    /// 4*pi*area / perimeter^2
    pub compactness: f64,
}

impl CandidateMeasure {
    /// Measure a raw contour. Returns `None` for degenerate input (fewer than
    /// 3 points, zero perimeter, or a collapsed bounding box) - such contours
    /// are dropped silently by the detector.
    pub fn from_contour(contour: &[Point<i32>]) -> Option<Self> {
        if contour.len() < 3 {
            return None;
        }

        let perimeter = closed_arc_length(contour);
        if perimeter <= f64::EPSILON {
            return None;
        }

        let epsilon = 0.02 * perimeter;
        let polygon = approximate_polygon_dp(contour, epsilon, true);
        let bbox = bounding_box(&polygon)?;
        if bbox.width <= 1 || bbox.height <= 1 {
            return None;
        }

        let area = contour_area(contour);
        let rect_area = bbox.width as f64 * bbox.height as f64;

        let hull = convex_hull(contour);
        let hull_area = contour_area(&hull);
        if hull_area <= f64::EPSILON {
            return None;
        }

        let convex = is_convex(&polygon);
        let compactness = 4.0 * std::f64::consts::PI * area / (perimeter * perimeter);

        Some(Self {
            convex,
            area,
            perimeter,
            bbox,
            aspect_ratio: bbox.width as f64 / bbox.height as f64,
            fill_ratio: area / rect_area,
            solidity: area / hull_area,
            compactness,
            polygon,
        })
    }

    pub fn center(&self) -> (f64, f64) {
        self.bbox.center()
    }
}

/// Enclosed area of a closed point chain via the shoelace formula
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut doubled: i64 = 0;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        doubled += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }

    (doubled.abs() as f64) / 2.0
}

/// Length of a point chain, closing the last segment back to the first point
pub fn closed_arc_length(points: &[Point<i32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    let mut length = 0.0;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        let dx = (q.x - p.x) as f64;
        let dy = (q.y - p.y) as f64;
        length += (dx * dx + dy * dy).sqrt();
    }

    length
}

/// Check polygon convexity: all non-zero cross products of consecutive edges
/// share a sign. Collinear vertices (zero cross) are tolerated.
pub fn is_convex(polygon: &[Point<i32>]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut sign = 0i64;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        let c = polygon[(i + 2) % polygon.len()];

        let cross = (b.x - a.x) as i64 * (c.y - b.y) as i64
            - (b.y - a.y) as i64 * (c.x - b.x) as i64;

        if cross != 0 {
            if sign == 0 {
                sign = cross.signum();
            } else if sign != cross.signum() {
                return false;
            }
        }
    }

    true
}

/// Axis-aligned bounding box of a point set, inclusive pixel extents
pub fn bounding_box(points: &[Point<i32>]) -> Option<BoundingBox> {
    if points.is_empty() {
        return None;
    }

    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;

    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: i32, y: i32, side: i32) -> Vec<Point<i32>> {
        vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ]
    }

    #[test]
    fn test_square_area() {
        let sq = square(10, 10, 20);
        assert_eq!(contour_area(&sq), 400.0);
    }

    #[test]
    fn test_square_perimeter() {
        let sq = square(0, 0, 25);
        assert_eq!(closed_arc_length(&sq), 100.0);
    }

    #[test]
    fn test_convexity() {
        let sq = square(0, 0, 10);
        assert!(is_convex(&sq));

        let concave = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(5, 5),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert!(!is_convex(&concave));
    }

    #[test]
    fn test_bounding_box() {
        let bbox = bounding_box(&square(5, 7, 10)).unwrap();
        assert_eq!(bbox.x, 5);
        assert_eq!(bbox.y, 7);
        assert_eq!(bbox.width, 11);
        assert_eq!(bbox.height, 11);
        assert_eq!(bbox.center(), (10.5, 12.5));
    }

    #[test]
    fn test_degenerate_contour_rejected() {
        assert!(CandidateMeasure::from_contour(&[Point::new(0, 0), Point::new(1, 0)]).is_none());

        let collinear = vec![Point::new(0, 0), Point::new(5, 0), Point::new(10, 0)];
        assert!(CandidateMeasure::from_contour(&collinear).is_none());
    }

    #[test]
    fn test_square_measure() {
        let measure = CandidateMeasure::from_contour(&square(0, 0, 29)).unwrap();
        assert!(measure.convex);
        assert_eq!(measure.polygon.len(), 4);
        assert!((measure.aspect_ratio - 1.0).abs() < 1e-9);
        // 4*pi*a/p^2 for a square is pi/4
        assert!((measure.compactness - std::f64::consts::FRAC_PI_4).abs() < 0.01);
        assert!(measure.solidity > 0.99);
    }
}
