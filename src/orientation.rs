use crate::detection::Marker;

/// Rotation to apply to bring a scanned form into canonical orientation.
/// Always one of the four quarter turns; arbitrary angles never come out of
/// the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} deg", self.degrees())
    }
}

/// A horizontal line of markers: centers whose y values fall within the band
/// tolerance of the founding member's y
struct Band {
    key_y: f64,
    members: Vec<(f64, f64)>,
}

/// Infers the form rotation from the marker layout.
///
/// The canonical form carries 2 markers along the top edge and 4 along the
/// bottom edge, so the counts in the extreme marker bands identify the
/// quarter turn. A shape-based heuristic over the center cloud covers layouts
/// the band table cannot match (partial marker loss).
#[derive(Debug, Clone)]
pub struct OrientationResolver {
    /// Band grouping tolerance as a fraction of image height
    pub y_tolerance: f64,
}

impl Default for OrientationResolver {
    fn default() -> Self {
        Self { y_tolerance: 0.05 }
    }
}

impl OrientationResolver {
    pub fn new(y_tolerance: f64) -> Self {
        Self { y_tolerance }
    }

    /// Resolve the rotation for an image of the given dimensions. With fewer
    /// than 6 markers the layout is unreadable and the identity rotation is
    /// returned as a best-effort default.
    pub fn resolve(
        &self,
        markers: &[Marker],
        width: u32,
        height: u32,
        verbose: bool,
    ) -> Rotation {
        if markers.len() < 6 {
            if verbose {
                eprintln!(
                    "Not enough markers for orientation ({}), defaulting to 0",
                    markers.len()
                );
            }
            return Rotation::Deg0;
        }

        let centers: Vec<(f64, f64)> = markers.iter().map(|m| m.center).collect();
        let bands = self.group_into_bands(&centers, height);

        if bands.len() < 2 {
            if verbose {
                eprintln!("Only {} marker band(s), using shape fallback", bands.len());
            }
            return fallback_orientation(&centers, width, height);
        }

        let top = &bands[0];
        let bottom = &bands[bands.len() - 1];

        if verbose {
            eprintln!(
                "Top band: {} markers, bottom band: {} markers",
                top.members.len(),
                bottom.members.len()
            );
        }

        match (top.members.len(), bottom.members.len()) {
            (2, 4) => Rotation::Deg0,
            (4, 2) => Rotation::Deg180,
            (2, 2) => resolve_sideways(top, bottom, width),
            _ => {
                if verbose {
                    eprintln!("Band counts match no known layout, using shape fallback");
                }
                let union: Vec<(f64, f64)> = top
                    .members
                    .iter()
                    .chain(bottom.members.iter())
                    .copied()
                    .collect();
                fallback_orientation(&union, width, height)
            }
        }
    }

    /// First-fit grouping of centers into horizontal bands, sorted by band y.
    /// Bands with a single member carry no line signal and are dropped.
    fn group_into_bands(&self, centers: &[(f64, f64)], height: u32) -> Vec<Band> {
        let tolerance = height as f64 * self.y_tolerance;
        let mut bands: Vec<Band> = Vec::new();

        for &(cx, cy) in centers {
            match bands.iter_mut().find(|b| (cy - b.key_y).abs() < tolerance) {
                Some(band) => band.members.push((cx, cy)),
                None => bands.push(Band {
                    key_y: cy,
                    members: vec![(cx, cy)],
                }),
            }
        }

        bands.retain(|b| b.members.len() >= 2);
        bands.sort_by(|a, b| a.key_y.total_cmp(&b.key_y));
        bands
    }
}

/// Two bands of two markers each mean the form lies on its side; which side
/// is told by where both bands sit relative to the vertical midline.
fn resolve_sideways(top: &Band, bottom: &Band, width: u32) -> Rotation {
    let mid = width as f64 * 0.5;
    let avg_x = |band: &Band| {
        band.members.iter().map(|(x, _)| x).sum::<f64>() / band.members.len() as f64
    };

    if avg_x(top) < mid && avg_x(bottom) < mid {
        Rotation::Deg90
    } else {
        Rotation::Deg270
    }
}

/// Shape-based heuristic over the center cloud: classify the spread as
/// landscape or portrait, then pick the turn from where the cloud's mean
/// sits in the image.
fn fallback_orientation(centers: &[(f64, f64)], width: u32, height: u32) -> Rotation {
    if centers.is_empty() {
        return Rotation::Deg0;
    }

    let min_x = centers.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_x = centers.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = centers.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_y = centers.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

    let extent_x = max_x - min_x;
    let extent_y = max_y - min_y;

    if extent_x > extent_y * 1.5 {
        let avg_y = centers.iter().map(|c| c.1).sum::<f64>() / centers.len() as f64;
        if avg_y < height as f64 * 0.4 {
            Rotation::Deg90
        } else {
            Rotation::Deg270
        }
    } else {
        let avg_x = centers.iter().map(|c| c.0).sum::<f64>() / centers.len() as f64;
        if avg_x < width as f64 * 0.4 {
            Rotation::Deg0
        } else {
            Rotation::Deg180
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::marker_at;

    fn markers(centers: &[(f64, f64)]) -> Vec<Marker> {
        centers.iter().map(|&(x, y)| marker_at(x, y, 0.9)).collect()
    }

    #[test]
    fn test_canonical_layout() {
        // 2 top / 4 bottom in an 800x1000 portrait image
        let set = markers(&[
            (200.0, 100.0),
            (600.0, 100.0),
            (100.0, 900.0),
            (300.0, 900.0),
            (500.0, 900.0),
            (700.0, 900.0),
        ]);
        let resolver = OrientationResolver::default();
        assert_eq!(resolver.resolve(&set, 800, 1000, false), Rotation::Deg0);
    }

    #[test]
    fn test_upside_down_layout() {
        let set = markers(&[
            (100.0, 100.0),
            (300.0, 100.0),
            (500.0, 100.0),
            (700.0, 100.0),
            (200.0, 900.0),
            (600.0, 900.0),
        ]);
        let resolver = OrientationResolver::default();
        assert_eq!(resolver.resolve(&set, 800, 1000, false), Rotation::Deg180);
    }

    #[test]
    fn test_sideways_left_of_center() {
        // Two 2-marker bands, both hugging the left half
        let set = markers(&[
            (100.0, 100.0),
            (200.0, 100.0),
            (150.0, 900.0),
            (250.0, 900.0),
            (120.0, 500.0),
            (140.0, 505.0),
        ]);
        let resolver = OrientationResolver::default();
        assert_eq!(resolver.resolve(&set, 800, 1000, false), Rotation::Deg90);
    }

    #[test]
    fn test_sideways_right_of_center() {
        let set = markers(&[
            (600.0, 100.0),
            (700.0, 100.0),
            (650.0, 900.0),
            (750.0, 900.0),
            (620.0, 500.0),
            (640.0, 505.0),
        ]);
        let resolver = OrientationResolver::default();
        assert_eq!(resolver.resolve(&set, 800, 1000, false), Rotation::Deg270);
    }

    #[test]
    fn test_too_few_markers_defaults_to_identity() {
        let set = markers(&[(100.0, 100.0), (200.0, 200.0), (300.0, 300.0)]);
        let resolver = OrientationResolver::default();
        assert_eq!(resolver.resolve(&set, 800, 1000, false), Rotation::Deg0);
    }

    #[test]
    fn test_unmatched_counts_use_fallback() {
        // 3 top / 4 bottom is no known layout; the union's spread is wide and
        // high up, so the fallback reads it as a 90-degree turn
        let set = markers(&[
            (100.0, 100.0),
            (400.0, 100.0),
            (700.0, 100.0),
            (100.0, 160.0),
            (300.0, 160.0),
            (500.0, 160.0),
            (700.0, 160.0),
        ]);
        let resolver = OrientationResolver::default();
        assert_eq!(resolver.resolve(&set, 800, 1000, false), Rotation::Deg90);
    }

    #[test]
    fn test_fallback_portrait_right_cloud() {
        // All six markers in one tall column on the right: one band survives
        // at most, portrait spread, mean x past 0.4 of width
        let set = markers(&[
            (700.0, 100.0),
            (700.0, 250.0),
            (700.0, 400.0),
            (700.0, 550.0),
            (700.0, 700.0),
            (700.0, 850.0),
        ]);
        let resolver = OrientationResolver::default();
        assert_eq!(resolver.resolve(&set, 800, 1000, false), Rotation::Deg180);
    }

    #[test]
    fn test_result_always_quarter_turn() {
        let sets = [
            markers(&[]),
            markers(&[(10.0, 10.0)]),
            markers(&[
                (50.0, 50.0),
                (55.0, 55.0),
                (60.0, 60.0),
                (65.0, 65.0),
                (70.0, 70.0),
                (75.0, 75.0),
            ]),
        ];
        let resolver = OrientationResolver::default();
        for set in &sets {
            let rotation = resolver.resolve(set, 800, 1000, false);
            assert!(matches!(
                rotation.degrees(),
                0 | 90 | 180 | 270
            ));
        }
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(0), Some(Rotation::Deg0));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
    }
}
