//! Nominal frequency ranges for the amateur-radio bands WSPR is commonly
//! run on. Used to classify a decoded frequency as in-band or as a
//! candidate for the `spots_frequency_overflow` side table.

/// `band` code (as stored in [`crate::model::Spot::band`]) to `(low_hz, high_hz)`.
///
/// Codes follow the convention used by the aggregator: the band's
/// approximate wavelength in meters, or a negative code for LF/MF bands.
const NOMINAL_RANGES_HZ: &[(i16, u64, u64)] = &[
    (-1, 135_700, 137_800),   // 2190m
    (0, 472_000, 479_000),    // 630m
    (1, 1_800_000, 2_000_000),  // 160m
    (3, 3_500_000, 3_800_000),  // 80m
    (5, 5_288_600, 5_405_000),  // 60m
    (7, 7_000_000, 7_200_000),  // 40m
    (10, 10_100_000, 10_150_000), // 30m
    (14, 14_000_000, 14_350_000), // 20m
    (18, 18_068_000, 18_168_000), // 17m
    (21, 21_000_000, 21_450_000), // 15m
    (24, 24_890_000, 24_990_000), // 12m
    (28, 28_000_000, 29_700_000), // 10m
    (50, 50_000_000, 54_000_000), // 6m
    (70, 70_000_000, 71_000_000), // 4m
    (144, 144_000_000, 148_000_000), // 2m
];

pub fn nominal_range_hz(band: i16) -> Option<(u64, u64)> {
    NOMINAL_RANGES_HZ
        .iter()
        .find(|(code, _, _)| *code == band)
        .map(|(_, lo, hi)| (*lo, *hi))
}

/// Best-effort reverse lookup: which band code a raw frequency belongs to.
/// Returns `None` if the frequency doesn't fall inside any known band, in
/// which case the caller should fall back to whatever band code the archive
/// line itself reported.
pub fn band_for_frequency(frequency_hz: u64) -> Option<i16> {
    NOMINAL_RANGES_HZ
        .iter()
        .find(|(_, lo, hi)| frequency_hz >= *lo && frequency_hz <= *hi)
        .map(|(code, _, _)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_bands() {
        assert_eq!(band_for_frequency(14_097_100), Some(14));
        assert_eq!(band_for_frequency(7_040_000), Some(7));
    }

    #[test]
    fn unknown_frequency_has_no_band() {
        assert_eq!(band_for_frequency(1), None);
    }

    #[test]
    fn overflow_detection() {
        let (lo, hi) = nominal_range_hz(20).map_or((0, 0), |r| r); // band 20 doesn't exist
        assert_eq!((lo, hi), (0, 0));
        let (lo, hi) = nominal_range_hz(14).unwrap();
        assert!(14_097_100 >= lo && 14_097_100 <= hi);
    }
}
