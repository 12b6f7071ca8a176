//! Base-32 geohash encoding.

const ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

pub const MAX_PRECISION: usize = 12;

/// Encode a coordinate pair at `precision` characters (clamped to
/// `1..=12`).  `None` if either coordinate is out of range or not finite.
#[must_use]
pub fn encode(latitude: f64, longitude: f64, precision: usize) -> Option<String> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    let precision = precision.clamp(1, MAX_PRECISION);

    let mut lat = (-90.0_f64, 90.0_f64);
    let mut lon = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut even = true;

    while hash.len() < precision {
        let mut index = 0_usize;
        for _ in 0..5 {
            let (range, value) = if even {
                (&mut lon, longitude)
            } else {
                (&mut lat, latitude)
            };
            let mid = (range.0 + range.1) / 2.0;
            index <<= 1;
            if value >= mid {
                index |= 1;
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
        hash.push(char::from(ALPHABET[index]));
    }
    Some(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_points() {
        assert_eq!(encode(57.64911, 10.40744, 11).as_deref(), Some("u4pruydqqvj"));
        assert_eq!(encode(35.6812, 139.7671, 10).as_deref(), Some("xn76urx613"));
        assert_eq!(encode(37.7749, -122.4194, 9).as_deref(), Some("9q8yyk8yt"));
    }

    #[test]
    fn corners_of_the_grid() {
        assert_eq!(encode(0.0, 0.0, 5).as_deref(), Some("s0000"));
        assert_eq!(encode(-90.0, -180.0, 3).as_deref(), Some("000"));
        assert_eq!(encode(90.0, 180.0, 4).as_deref(), Some("zzzz"));
    }

    #[test]
    fn precision_is_clamped() {
        assert_eq!(encode(1.0, 1.0, 0).map(|h| h.len()), Some(1));
        assert_eq!(encode(1.0, 1.0, 40).map(|h| h.len()), Some(MAX_PRECISION));
    }

    #[test]
    fn rejects_invalid_coordinates() {
        assert!(encode(91.0, 0.0, 5).is_none());
        assert!(encode(0.0, -180.5, 5).is_none());
        assert!(encode(f64::NAN, 0.0, 5).is_none());
    }
}
