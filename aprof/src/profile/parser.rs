//! Chunk-level decoding of PROFDAT1 files.

use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::domain::{Mapping, ProfileError};
use crate::profile::maps::parse_maps;

const PROFILE_CHUNK_ID: &[u8; 8] = b"PROFDAT1";
const MAPS_CHUNK_ID: &[u8; 8] = b"MAPSDATA";

/// Width of the only sample format currently decoded.
const SUPPORTED_SAMPLE_WIDTH: u32 = 4;

/// Decoded capture: samples in capture order plus the accepted mappings.
#[derive(Debug, Clone, Default)]
pub struct RawProfile {
    pub sample_width: u32,
    pub samples: Vec<u64>,
    pub mappings: Vec<Mapping>,
}

/// Parser position. Transitions only move forward.
enum ParseState {
    ExpectHeader,
    ExpectSamples { width: u32, count: u64 },
    ExpectMaps { width: u32, samples: Vec<u64> },
    Done(RawProfile),
}

/// Open and parse a PROFDAT1 file.
///
/// # Errors
/// Returns an error if the file cannot be opened or is corrupted
pub fn read_profile<P: AsRef<Path>>(path: P) -> Result<RawProfile, ProfileError> {
    let file = File::open(path.as_ref())?;
    parse_profile(BufReader::new(file))
}

/// Parse a PROFDAT1 stream.
///
/// Any failure is fatal: nothing partially decoded is returned.
///
/// # Errors
/// See [`ProfileError`] for the individual corruption cases
pub fn parse_profile<R: Read>(mut reader: R) -> Result<RawProfile, ProfileError> {
    let mut state = ParseState::ExpectHeader;

    loop {
        state = match state {
            ParseState::ExpectHeader => {
                if read_chunk_id(&mut reader)? != *PROFILE_CHUNK_ID {
                    return Err(ProfileError::BadChunkId);
                }
                let width = u32::from_le_bytes(read_field(&mut reader, "sample width")?);
                if width != 4 && width != 8 {
                    return Err(ProfileError::InvalidSampleWidth(width));
                }
                let count = u64::from_le_bytes(read_field(&mut reader, "sample count")?);
                if width != SUPPORTED_SAMPLE_WIDTH {
                    return Err(ProfileError::UnsupportedSampleWidth(width));
                }
                debug!("PROFDAT1 header: width={width} count={count}");
                ParseState::ExpectSamples { width, count }
            }
            ParseState::ExpectSamples { width, count } => {
                let samples = read_samples(&mut reader, width, count)?;
                info!("Read {} samples", samples.len());
                ParseState::ExpectMaps { width, samples }
            }
            ParseState::ExpectMaps { width, samples } => {
                if read_chunk_id(&mut reader)? != *MAPS_CHUNK_ID {
                    return Err(ProfileError::MissingMapsChunk);
                }
                // Reserved: the sampler never writes a usable length here.
                let _reserved: [u8; 4] = read_field(&mut reader, "MAPSDATA header")?;
                let mut raw = Vec::new();
                reader.read_to_end(&mut raw)?;
                let text = String::from_utf8_lossy(&raw);
                // The sampler pads with 8 zero bytes; only 4 have been consumed.
                let mappings = parse_maps(text.trim_start_matches('\0'));
                info!("Accepted {} executable mappings", mappings.len());
                ParseState::Done(RawProfile { sample_width: width, samples, mappings })
            }
            ParseState::Done(profile) => return Ok(profile),
        };
    }
}

/// Read up to 8 bytes; a short read simply yields a mismatching ID.
fn read_chunk_id<R: Read>(reader: &mut R) -> Result<[u8; 8], ProfileError> {
    let mut buf = Vec::with_capacity(8);
    reader.by_ref().take(8).read_to_end(&mut buf)?;
    let mut id = [0u8; 8];
    id[..buf.len()].copy_from_slice(&buf);
    Ok(id)
}

fn read_field<R: Read, const N: usize>(
    reader: &mut R,
    what: &'static str,
) -> Result<[u8; N], ProfileError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => ProfileError::TooShort(what),
        _ => ProfileError::Io(e),
    })?;
    Ok(buf)
}

fn read_samples<R: Read>(reader: &mut R, width: u32, count: u64) -> Result<Vec<u64>, ProfileError> {
    let width = u64::from(width);
    let Some(expected_bytes) = count.checked_mul(width) else {
        return Err(ProfileError::TruncatedSamples { expected: count, found: 0 });
    };

    let mut raw = Vec::new();
    reader.by_ref().take(expected_bytes).read_to_end(&mut raw)?;
    if (raw.len() as u64) < expected_bytes {
        return Err(ProfileError::TruncatedSamples {
            expected: count,
            found: raw.len() as u64 / width,
        });
    }

    Ok(raw
        .chunks_exact(SUPPORTED_SAMPLE_WIDTH as usize)
        .map(|c| u64::from(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
        .collect())
}
