//! Maidenhead locator decoding.
//!
//! Both 4- and 6-character locators resolve to the *center* of their grid
//! square, not a corner.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("locator must be 4 or 6 characters, got {0}")]
    BadLength(usize),
    #[error("invalid locator character {0:?} at position {1}")]
    BadChar(char, usize),
}

/// A validated Maidenhead grid locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator(String);

impl Locator {
    pub fn parse(raw: &str) -> Result<Self, GridError> {
        let chars: Vec<char> = raw.chars().collect();
        if chars.len() != 4 && chars.len() != 6 {
            return Err(GridError::BadLength(chars.len()));
        }
        validate_letter(chars[0], 0, 'A', 'R')?;
        validate_letter(chars[1], 1, 'A', 'R')?;
        validate_digit(chars[2], 2)?;
        validate_digit(chars[3], 3)?;
        if chars.len() == 6 {
            validate_letter(chars[4], 4, 'a', 'x')?;
            validate_letter(chars[5], 5, 'a', 'x')?;
        }
        Ok(Locator(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Center-of-square latitude/longitude for this locator, in degrees.
    /// Longitude in `[-180, 180]`, latitude in `[-90, 90]`.
    pub fn to_lat_lon(&self) -> (f64, f64) {
        let c: Vec<char> = self.0.chars().collect();
        let upper = |ch: char| ch.to_ascii_uppercase();

        let field_lon = (upper(c[0]) as u8 - b'A') as f64;
        let field_lat = (upper(c[1]) as u8 - b'A') as f64;
        let square_lon = (c[2] as u8 - b'0') as f64;
        let square_lat = (c[3] as u8 - b'0') as f64;

        // Field = 20 deg lon x 10 deg lat; square = 2 deg lon x 1 deg lat.
        let mut lon = field_lon * 20.0 + square_lon * 2.0 - 180.0;
        let mut lat = field_lat * 10.0 + square_lat * 1.0 - 90.0;

        if c.len() == 6 {
            let subsquare_lon = (c[4].to_ascii_lowercase() as u8 - b'a') as f64;
            let subsquare_lat = (c[5].to_ascii_lowercase() as u8 - b'a') as f64;
            // Subsquare = 5' lon x 2.5' lat; center by adding half a subsquare.
            lon += subsquare_lon * (2.0 / 24.0) + (1.0 / 24.0);
            lat += subsquare_lat * (1.0 / 24.0) + (0.5 / 24.0);
        } else {
            // Center of the 2x1 degree square.
            lon += 1.0;
            lat += 0.5;
        }

        (lat, lon)
    }
}

/// Case-insensitive range check for a letter field/square position.
fn validate_letter(ch: char, pos: usize, lo: char, hi: char) -> Result<(), GridError> {
    let normalized = if lo.is_ascii_uppercase() {
        ch.to_ascii_uppercase()
    } else {
        ch.to_ascii_lowercase()
    };
    if ch.is_ascii_alphabetic() && (lo..=hi).contains(&normalized) {
        Ok(())
    } else {
        Err(GridError::BadChar(ch, pos))
    }
}

fn validate_digit(ch: char, pos: usize) -> Result<(), GridError> {
    if ch.is_ascii_digit() {
        Ok(())
    } else {
        Err(GridError::BadChar(ch, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_length() {
        assert_eq!(Locator::parse("FN4"), Err(GridError::BadLength(3)));
        assert_eq!(Locator::parse("FN42qcx"), Err(GridError::BadLength(7)));
    }

    #[test]
    fn rejects_bad_characters() {
        assert!(Locator::parse("1N42").is_err());
        assert!(Locator::parse("FNAB").is_err());
    }

    #[test]
    fn decodes_six_char_locator_center() {
        let loc = Locator::parse("FN42qc").unwrap();
        let (lat, lon) = loc.to_lat_lon();
        assert!((lat - 42.104167).abs() < 1.0 / 48.0, "lat={lat}");
        assert!((lon - (-70.625)).abs() < 1.0 / 48.0, "lon={lon}");
    }

    #[test]
    fn four_char_locator_is_within_bounds() {
        let loc = Locator::parse("FN42").unwrap();
        let (lat, lon) = loc.to_lat_lon();
        assert!((-90.0..=90.0).contains(&lat));
        assert!((-180.0..=180.0).contains(&lon));
        // Center of the FN42 square: lon field F=5 -> -180+100=-80, square 4 -> +8 => -72, +1 center => -71
        assert!((lon - (-71.0)).abs() < 1e-9);
        assert!((lat - 42.5).abs() < 1e-9);
    }

    #[test]
    fn accepts_lowercase_input() {
        let loc = Locator::parse("fn42qc").unwrap();
        let (lat, lon) = loc.to_lat_lon();
        assert!((lat - 42.104167).abs() < 1.0 / 48.0);
        assert!((lon - (-70.625)).abs() < 1.0 / 48.0);
    }
}
