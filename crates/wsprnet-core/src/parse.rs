//! Line parsers for WSPRDAEMON archive members.
//!
//! Both `*_spots.txt` and `*_noise.txt` members are line-oriented,
//! whitespace-separated, with a fixed positional field count. A line whose
//! field count doesn't match exactly is a [`ParseError::FieldCount`] —
//! counted, sample-logged, and skipped by the caller; it never aborts the
//! batch.

use crate::grid::Locator;
use crate::model::{ExtendedSpot, NoiseSample};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("expected {expected} fields, got {got}")]
    FieldCount { expected: usize, got: usize },
    #[error("invalid number in field {field}: {raw:?}")]
    BadNumber { field: &'static str, raw: String },
    #[error("invalid timestamp: {0:?}")]
    BadTimestamp(String),
    #[error("invalid grid locator: {0}")]
    BadGrid(#[from] crate::grid::GridError),
}

const SPOT_FIELDS: usize = 24;
const NOISE_FIELDS: usize = 8;

/// Parses one line of a `*_spots.txt` archive member into an
/// [`ExtendedSpot`].
///
/// Field order (positional, fixed by the receiver client):
/// `epoch rx_sign rx_loc tx_sign tx_loc distance azimuth rx_azimuth
/// frequency power snr drift version code fft_noise rms_noise sync_quality
/// decode_cycles jitter blocksize decoder_metric decode_type pass
/// packet_mode`
///
/// `rx_overload_count` isn't present in this line format and is always `0`
/// here; it's populated from the receiver's noise report instead, where
/// available.
pub fn parse_spot_line(
    line: &str,
    source_archive: &str,
    source_member: &str,
) -> Result<ExtendedSpot, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != SPOT_FIELDS {
        return Err(ParseError::FieldCount {
            expected: SPOT_FIELDS,
            got: fields.len(),
        });
    }

    let epoch = parse_field::<i64>(fields[0], "epoch")?;
    let time = OffsetDateTime::from_unix_timestamp(epoch)
        .map_err(|_| ParseError::BadTimestamp(fields[0].to_string()))?;
    let rx_sign = fields[1].to_string();
    let rx_loc = fields[2].to_string();
    let (rx_lat, rx_lon) = Locator::parse(&rx_loc)?.to_lat_lon();
    let tx_sign = fields[3].to_string();
    let tx_loc = fields[4].to_string();
    let (tx_lat, tx_lon) = Locator::parse(&tx_loc)?.to_lat_lon();

    Ok(ExtendedSpot {
        time,
        rx_sign,
        rx_lat,
        rx_lon,
        rx_loc,
        tx_sign,
        tx_lat,
        tx_lon,
        tx_loc,
        distance: parse_field(fields[5], "distance")?,
        azimuth: parse_field(fields[6], "azimuth")?,
        rx_azimuth: parse_field(fields[7], "rx_azimuth")?,
        frequency: parse_field(fields[8], "frequency")?,
        power: parse_field(fields[9], "power")?,
        snr: parse_field(fields[10], "snr")?,
        drift: parse_field(fields[11], "drift")?,
        version: fields[12].to_string(),
        code: parse_field(fields[13], "code")?,
        fft_noise: parse_field(fields[14], "fft_noise")?,
        rms_noise: parse_field(fields[15], "rms_noise")?,
        sync_quality: parse_field(fields[16], "sync_quality")?,
        decode_cycles: parse_field(fields[17], "decode_cycles")?,
        jitter: parse_field(fields[18], "jitter")?,
        blocksize: parse_field(fields[19], "blocksize")?,
        decoder_metric: parse_field(fields[20], "decoder_metric")?,
        decode_type: parse_field(fields[21], "decode_type")?,
        pass: parse_field(fields[22], "pass")?,
        packet_mode: parse_field(fields[23], "packet_mode")?,
        rx_overload_count: 0,
        source_archive: source_archive.to_string(),
        source_member: source_member.to_string(),
        uploaded: true,
    })
}

/// Parses one line of a `*_noise.txt` archive member into a [`NoiseSample`].
///
/// Field order: `epoch site receiver rx_loc band rms_level c2_level
/// overload_count`, plus the filename supplied by the caller for
/// `source_file`.
pub fn parse_noise_line(
    line: &str,
    tar_file: &str,
    source_file: &str,
) -> Result<NoiseSample, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != NOISE_FIELDS {
        return Err(ParseError::FieldCount {
            expected: NOISE_FIELDS,
            got: fields.len(),
        });
    }

    let epoch = parse_field::<i64>(fields[0], "epoch")?;
    let time = OffsetDateTime::from_unix_timestamp(epoch)
        .map_err(|_| ParseError::BadTimestamp(fields[0].to_string()))?;

    Ok(NoiseSample {
        time,
        site: fields[1].to_string(),
        receiver: fields[2].to_string(),
        rx_loc: fields[3].to_string(),
        band: parse_field(fields[4], "band")?,
        rms_level: parse_field(fields[5], "rms_level")?,
        c2_level: parse_field(fields[6], "c2_level")?,
        overload_count: parse_field(fields[7], "overload_count")?,
        tar_file: tar_file.to_string(),
        source_file: source_file.to_string(),
    })
}

fn parse_field<T: std::str::FromStr>(raw: &str, field: &'static str) -> Result<T, ParseError> {
    raw.parse::<T>().map_err(|_| ParseError::BadNumber {
        field,
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_spot_line() -> String {
        [
            "1700000000", "K1ABC", "FN42qc", "W1XYZ", "EM79", "1500", "90", "270", "14097100",
            "37", "-15", "0", "2.12", "1", "0.5", "0.3", "95.0", "4", "1.2", "8192", "0.88", "1",
            "1", "0",
        ]
        .join(" ")
    }

    #[test]
    fn parses_valid_spot_line() {
        let spot = parse_spot_line(&valid_spot_line(), "a.tbz", "a_spots.txt").unwrap();
        assert_eq!(spot.rx_sign, "K1ABC");
        assert_eq!(spot.frequency, 14_097_100);
        assert_eq!(spot.source_archive, "a.tbz");
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = parse_spot_line("1700000000 K1ABC", "a.tbz", "a_spots.txt").unwrap_err();
        assert!(matches!(err, ParseError::FieldCount { .. }));
    }

    #[test]
    fn rejects_bad_grid() {
        let mut fields: Vec<&str> = valid_spot_line().split_whitespace().collect();
        fields[2] = "XX";
        let line = fields.join(" ");
        let err = parse_spot_line(&line, "a.tbz", "a_spots.txt").unwrap_err();
        assert!(matches!(err, ParseError::BadGrid(_)));
    }

    #[test]
    fn parses_valid_noise_line() {
        let line = "1700000000 site1 rx1 FN42 14 -25.5 -30.1 0";
        let noise = parse_noise_line(line, "a.tbz", "a_noise.txt").unwrap();
        assert_eq!(noise.site, "site1");
        assert_eq!(noise.band, 14);
    }

    #[test]
    fn tolerates_malformed_lines_in_a_batch() {
        let lines = vec![
            valid_spot_line(),
            "garbage line".to_string(),
            valid_spot_line(),
        ];
        let parsed: Vec<_> = lines
            .iter()
            .filter_map(|l| parse_spot_line(l, "a.tbz", "a_spots.txt").ok())
            .collect();
        assert_eq!(parsed.len(), 2);
    }
}
