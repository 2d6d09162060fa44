//! Decompresses a `.tbz`/`.tar.bz2` WSPRDAEMON archive into its member files.

use std::io::Read;
use std::path::Path;

use bzip2::read::BzDecoder;
use tar::Archive;

pub struct Member {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub fn extract_members(path: &Path) -> std::io::Result<Vec<Member>> {
    let file = std::fs::File::open(path)?;
    let decoder = BzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    let mut members = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        members.push(Member { name, bytes });
    }
    Ok(members)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Spots,
    Noise,
    Other,
}

pub fn classify_member(name: &str) -> MemberKind {
    if name.ends_with("_spots.txt") {
        MemberKind::Spots
    } else if name.ends_with("_noise.txt") {
        MemberKind::Noise
    } else {
        MemberKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_member_names() {
        assert_eq!(classify_member("2024-01-01_spots.txt"), MemberKind::Spots);
        assert_eq!(classify_member("2024-01-01_noise.txt"), MemberKind::Noise);
        assert_eq!(classify_member("readme.txt"), MemberKind::Other);
    }
}
