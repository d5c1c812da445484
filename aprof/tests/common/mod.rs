//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Encode a width-4 PROFDAT1 capture the way the on-device writer does,
/// including its 8-byte zero placeholder after `MAPSDATA`.
pub fn profile_bytes(samples: &[u32], maps: &str) -> Vec<u8> {
    let mut bytes = b"PROFDAT1".to_vec();
    bytes.extend_from_slice(&4u32.to_le_bytes());
    bytes.extend_from_slice(&(samples.len() as u64).to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes.extend_from_slice(b"MAPSDATA");
    bytes.extend_from_slice(&[0u8; 8]);
    bytes.extend_from_slice(maps.as_bytes());
    bytes
}

pub fn write_profile(dir: &Path, samples: &[u32], maps: &str) -> PathBuf {
    let path = dir.join("capture.prof");
    std::fs::write(&path, profile_bytes(samples, maps)).expect("Failed to write profile");
    path
}

/// Split CSV output into sections of rows of fields.
///
/// Naive: assumes no commas inside quoted symbols.
pub fn csv_sections(csv: &str) -> Vec<Vec<Vec<String>>> {
    csv.trim_end_matches('\n')
        .split("\n\n")
        .map(|section| {
            section
                .lines()
                .map(|line| line.split(',').map(str::to_string).collect())
                .collect()
        })
        .collect()
}
