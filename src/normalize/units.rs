//! Unit conversions between upstream and display units

/// Gallons in one cubic foot
pub const GALLONS_PER_CUBIC_FOOT: f64 = 7.48052;

/// Feet in one meter
pub const FEET_PER_METER: f64 = 3.28084;

/// Width of one compass sector in degrees
const COMPASS_SECTOR_DEGREES: f64 = 22.5;

/// 16-point compass labels, clockwise from north
pub const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

pub fn cfs_to_gallons_per_second(cfs: f64) -> f64 {
    cfs * GALLONS_PER_CUBIC_FOOT
}

pub fn gallons_per_second_to_cfs(gps: f64) -> f64 {
    gps / GALLONS_PER_CUBIC_FOOT
}

pub fn meters_to_feet(meters: f64) -> f64 {
    meters * FEET_PER_METER
}

/// Maps a bearing in degrees onto a 16-point compass label.
///
/// Negative and >360 bearings wrap around; non-finite input falls back to "N".
pub fn degrees_to_compass(degrees: f64) -> &'static str {
    if !degrees.is_finite() {
        return COMPASS_POINTS[0];
    }
    let index = (degrees / COMPASS_SECTOR_DEGREES).round() as i64;
    COMPASS_POINTS[index.rem_euclid(16) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_temperature_conversion_known_points() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(fahrenheit_to_celsius(-40.0), -40.0);
    }

    #[test]
    fn test_temperature_conversions_are_inverse() {
        for c in [-273.15, -40.0, 0.0, 18.5, 37.0, 1.0e6] {
            let back = fahrenheit_to_celsius(celsius_to_fahrenheit(c));
            assert!((back - c).abs() < EPSILON * c.abs().max(1.0), "{c} -> {back}");
        }
    }

    #[test]
    fn test_discharge_conversions_are_inverse() {
        for cfs in [0.0, 1.0, 245.0, 12_345.678] {
            let back = gallons_per_second_to_cfs(cfs_to_gallons_per_second(cfs));
            assert!((back - cfs).abs() < EPSILON * cfs.abs().max(1.0));
        }
        assert!((cfs_to_gallons_per_second(1.0) - 7.48052).abs() < EPSILON);
    }

    #[test]
    fn test_meters_to_feet() {
        assert!((meters_to_feet(1.2) - 3.937008).abs() < 1e-6);
    }

    #[test]
    fn test_degrees_to_compass() {
        assert_eq!(degrees_to_compass(0.0), "N");
        assert_eq!(degrees_to_compass(22.5), "NNE");
        assert_eq!(degrees_to_compass(90.0), "E");
        assert_eq!(degrees_to_compass(270.0), "W");
        assert_eq!(degrees_to_compass(349.0), "N");
        assert_eq!(degrees_to_compass(360.0), "N");
        assert_eq!(degrees_to_compass(-90.0), "W");
        assert_eq!(degrees_to_compass(f64::NAN), "N");
    }
}
