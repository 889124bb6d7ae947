//! Coordinate to region classification over fixed bounding boxes

use crate::models::Region;

#[derive(Debug, Clone, Copy)]
enum Bound {
    Inclusive(f64),
    Exclusive(f64),
}

impl Bound {
    fn below(self, value: f64) -> bool {
        match self {
            Bound::Inclusive(max) => value <= max,
            Bound::Exclusive(max) => value < max,
        }
    }
}

/// Axis-aligned latitude/longitude box. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy)]
struct RegionBox {
    region: Region,
    min_lat: f64,
    max_lat: Bound,
    min_lon: f64,
    max_lon: Bound,
}

impl RegionBox {
    fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat
            && self.max_lat.below(lat)
            && lon >= self.min_lon
            && self.max_lon.below(lon)
    }
}

/// Ordered box table. Boxes may overlap (Northeast and Great Lakes do);
/// the first listed box that contains the point wins.
const REGION_BOXES: [RegionBox; 7] = [
    RegionBox {
        region: Region::Northeast,
        min_lat: 35.0,
        max_lat: Bound::Inclusive(45.0),
        min_lon: -80.0,
        max_lon: Bound::Inclusive(-65.0),
    },
    RegionBox {
        region: Region::Southeast,
        min_lat: 25.0,
        max_lat: Bound::Exclusive(35.0),
        min_lon: -85.0,
        max_lon: Bound::Inclusive(-75.0),
    },
    RegionBox {
        region: Region::GulfCoast,
        min_lat: 25.0,
        max_lat: Bound::Exclusive(30.0),
        min_lon: -95.0,
        max_lon: Bound::Exclusive(-85.0),
    },
    RegionBox {
        region: Region::WestCoast,
        min_lat: 30.0,
        max_lat: Bound::Inclusive(50.0),
        min_lon: -130.0,
        max_lon: Bound::Inclusive(-115.0),
    },
    RegionBox {
        region: Region::Hawaii,
        min_lat: 18.0,
        max_lat: Bound::Inclusive(23.0),
        min_lon: -160.0,
        max_lon: Bound::Inclusive(-154.0),
    },
    RegionBox {
        region: Region::Alaska,
        min_lat: 50.0,
        max_lat: Bound::Inclusive(60.0),
        min_lon: -170.0,
        max_lon: Bound::Inclusive(-130.0),
    },
    RegionBox {
        region: Region::GreatLakes,
        min_lat: 40.0,
        max_lat: Bound::Inclusive(50.0),
        min_lon: -90.0,
        max_lon: Bound::Inclusive(-75.0),
    },
];

/// Classifies a coordinate pair into a named region.
///
/// Total over all inputs: out-of-range and NaN coordinates yield `Other`.
pub fn classify_region(lat: f64, lon: f64) -> Region {
    REGION_BOXES
        .iter()
        .find(|b| b.contains(lat, lon))
        .map(|b| b.region)
        .unwrap_or(Region::Other)
}
