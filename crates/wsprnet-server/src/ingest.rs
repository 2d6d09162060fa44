//! Parses a claimed archive's members and batch-inserts the results.

use std::path::Path;

use tracing::{info, warn};
use wsprnet_core::model::ExtendedSpot;
use wsprnet_core::parse::{parse_noise_line, parse_spot_line};
use wsprnet_db::Database;

use crate::error::ArchiveError;
use crate::extract::{classify_member, extract_members, MemberKind};

/// Malformed-line warnings are capped per archive; anything past this many
/// is still counted in `lines_skipped` but no longer logged individually.
const MAX_LOGGED_MALFORMED_LINES: usize = 10;

pub struct IngestReport {
    pub spots_inserted: usize,
    pub noise_inserted: usize,
    pub lines_skipped: usize,
}

pub async fn ingest_archive(claimed_path: &Path, db: &Database) -> Result<IngestReport, ArchiveError> {
    let archive_name = claimed_path.to_string_lossy().into_owned();

    let members = extract_members(claimed_path).map_err(|source| ArchiveError::Extract {
        path: archive_name.clone(),
        source,
    })?;

    if members.is_empty() {
        return Err(ArchiveError::Empty { path: archive_name });
    }

    let mut spots = Vec::new();
    let mut noise = Vec::new();
    let mut skipped = 0usize;
    let mut logged = 0usize;

    for member in members {
        match classify_member(&member.name) {
            MemberKind::Spots => {
                for line in String::from_utf8_lossy(&member.bytes).lines() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_spot_line(line, &archive_name, &member.name) {
                        Ok(spot) => spots.push(spot),
                        Err(e) => {
                            skipped += 1;
                            if logged < MAX_LOGGED_MALFORMED_LINES {
                                logged += 1;
                                warn!(member = %member.name, error = %e, "skipping malformed spot line");
                            }
                        }
                    }
                }
            }
            MemberKind::Noise => {
                for line in String::from_utf8_lossy(&member.bytes).lines() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_noise_line(line, &archive_name, &member.name) {
                        Ok(sample) => noise.push(sample),
                        Err(e) => {
                            skipped += 1;
                            if logged < MAX_LOGGED_MALFORMED_LINES {
                                logged += 1;
                                warn!(member = %member.name, error = %e, "skipping malformed noise line");
                            }
                        }
                    }
                }
            }
            MemberKind::Other => continue,
        }
    }

    if !spots.is_empty() {
        insert_extended_spots(db, &spots).await?;
    }
    if !noise.is_empty() {
        db.insert_batch("noise", &noise).await?;
    }

    info!(
        archive = %archive_name,
        spots = spots.len(),
        noise = noise.len(),
        skipped,
        "archive ingested"
    );

    Ok(IngestReport {
        spots_inserted: spots.len(),
        noise_inserted: noise.len(),
        lines_skipped: skipped,
    })
}

async fn insert_extended_spots(db: &Database, spots: &[ExtendedSpot]) -> Result<(), ArchiveError> {
    db.insert_batch("spots_extended", spots).await?;
    Ok(())
}
