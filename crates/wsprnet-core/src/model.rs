//! Row types shared by the scraper and the archive ingester.
//!
//! Each type derives `clickhouse::Row` so column order is taken directly from
//! struct field order (see DESIGN.md — "dynamic row tuples -> typed structs").

use clickhouse::Row;
use serde::{Deserialize, Serialize};

/// A reception report pulled from the WSPRNET aggregator.
///
/// `id` is the upstream monotonically increasing identifier and is the
/// global dedup key; `(rx_sign, band, time)` is the local dedup key used
/// when the scraper reconciles overlapping fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct Spot {
    pub id: u64,
    #[serde(with = "clickhouse::serde::time::datetime")]
    pub time: time::OffsetDateTime,
    pub band: i16,
    pub rx_sign: String,
    pub rx_lat: f64,
    pub rx_lon: f64,
    pub rx_loc: String,
    pub tx_sign: String,
    pub tx_lat: f64,
    pub tx_lon: f64,
    pub tx_loc: String,
    pub distance: u16,
    pub azimuth: u16,
    pub rx_azimuth: u16,
    pub frequency: u64,
    pub power: i8,
    pub snr: i8,
    pub drift: i8,
    pub version: String,
    pub code: i8,
}

impl Spot {
    /// Local dedup key used for records produced outside the aggregator's
    /// own `id` space.
    pub fn dedup_key(&self) -> (String, i16, i64) {
        (self.rx_sign.clone(), self.band, self.time.unix_timestamp())
    }

    /// True if the decoded frequency falls outside the nominal band
    /// allocation, routing it to the `spots_frequency_overflow` side table
    /// in addition to `spots`.
    pub fn is_frequency_overflow(&self) -> bool {
        crate::band::nominal_range_hz(self.band)
            .map(|(lo, hi)| self.frequency < lo || self.frequency > hi)
            .unwrap_or(false)
    }
}

/// Augments [`Spot`] with receiver-side decode metadata and provenance.
/// Sourced from WSPRDAEMON archive uploads, not the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct ExtendedSpot {
    #[serde(with = "clickhouse::serde::time::datetime")]
    pub time: time::OffsetDateTime,
    pub rx_sign: String,
    pub rx_lat: f64,
    pub rx_lon: f64,
    pub rx_loc: String,
    pub tx_sign: String,
    pub tx_lat: f64,
    pub tx_lon: f64,
    pub tx_loc: String,
    pub distance: u16,
    pub azimuth: u16,
    pub rx_azimuth: u16,
    pub frequency: u64,
    pub power: i8,
    pub snr: i8,
    pub drift: i8,
    pub version: String,
    pub code: i8,
    pub fft_noise: f32,
    pub rms_noise: f32,
    pub sync_quality: f32,
    pub decode_cycles: u16,
    pub jitter: f32,
    pub blocksize: u16,
    pub decoder_metric: f32,
    pub decode_type: u8,
    pub pass: u8,
    pub packet_mode: u8,
    pub rx_overload_count: u16,
    pub source_archive: String,
    pub source_member: String,
    pub uploaded: bool,
}

impl ExtendedSpot {
    /// The effective identity key for this record family.
    pub fn identity_key(&self) -> (i64, String, String, i16, u64) {
        (
            self.time.unix_timestamp(),
            self.rx_sign.clone(),
            self.tx_sign.clone(),
            self.band(),
            self.frequency,
        )
    }

    fn band(&self) -> i16 {
        crate::band::band_for_frequency(self.frequency).unwrap_or(-1)
    }
}

/// Per-receiver-per-band background noise sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Row)]
pub struct NoiseSample {
    #[serde(with = "clickhouse::serde::time::datetime")]
    pub time: time::OffsetDateTime,
    pub site: String,
    pub receiver: String,
    pub rx_loc: String,
    pub band: i16,
    pub rms_level: f32,
    pub c2_level: f32,
    pub overload_count: u16,
    pub tar_file: String,
    pub source_file: String,
}
