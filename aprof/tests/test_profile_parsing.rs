mod common;

use aprof::domain::ProfileError;
use aprof::profile::read_profile;
use common::{profile_bytes, write_profile};

const MAPS: &str = "\
b6f00000-b6f40000 r-xp 00000000 b3:19 1052 /system/lib/libc.so
b6f40000-b6f42000 r--p 0003f000 b3:19 1052 /system/lib/libc.so
b6f50000-b6f51000 r-xp 00000000 00:00 0 [sigpage]
b6f60000-b6f61000 r-xp 00000000 00:05 12 /dev/ashmem/dalvik-jit-code-cache (deleted)
b6f70000-b6f80000 rw-p 00000000 00:00 0
ffff0000-ffff1000 r-xp 00000000 00:00 0 [vectors]
";

fn write_raw(bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.prof");
    std::fs::write(&path, bytes).unwrap();
    (dir, path)
}

#[test]
fn test_reads_device_capture() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_profile(dir.path(), &[0xb6f0_1000, 0xb6f0_1004, 0xdead_beef], MAPS);

    let profile = read_profile(&path).expect("Failed to parse profile");
    assert_eq!(profile.sample_width, 4);
    assert_eq!(profile.samples, vec![0xb6f0_1000, 0xb6f0_1004, 0xdead_beef]);

    // Only the executable libc mapping survives the filters
    assert_eq!(profile.mappings.len(), 1);
    let libc = &profile.mappings[0];
    assert_eq!(libc.path, "/system/lib/libc.so");
    assert_eq!((libc.begin, libc.end, libc.file_offset), (0xb6f0_0000, 0xb6f4_0000, 0));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_profile(dir.path().join("nope.prof")).unwrap_err();
    assert!(matches!(err, ProfileError::Io(_)));
}

#[test]
fn test_wrong_tag_is_fatal() {
    let mut bytes = profile_bytes(&[1, 2, 3], MAPS);
    bytes[..8].copy_from_slice(b"PROFDAT2");
    let (_dir, path) = write_raw(&bytes);
    assert!(matches!(read_profile(&path), Err(ProfileError::BadChunkId)));
}

#[test]
fn test_sample_width_must_be_four() {
    for (width, unsupported) in [(8u32, true), (2, false), (0, false)] {
        let mut bytes = profile_bytes(&[], MAPS);
        bytes[8..12].copy_from_slice(&width.to_le_bytes());
        let (_dir, path) = write_raw(&bytes);

        match read_profile(&path) {
            Err(ProfileError::UnsupportedSampleWidth(w)) => assert!(unsupported && w == width),
            Err(ProfileError::InvalidSampleWidth(w)) => assert!(!unsupported && w == width),
            other => panic!("width {width}: unexpected {other:?}"),
        }
    }
}

#[test]
fn test_truncation_is_fatal_everywhere() {
    let bytes = profile_bytes(&[0x1000, 0x2000], MAPS);
    // Inside the header, inside the samples, inside the maps tag
    for cut in [3, 10, 18, 24, 30] {
        let (_dir, path) = write_raw(&bytes[..cut]);
        assert!(read_profile(&path).is_err(), "cut at {cut} should fail");
    }
}

#[test]
fn test_reserved_word_is_not_a_length() {
    let mut bytes = profile_bytes(&[0xb6f0_1000], "");
    // Garbage in the reserved bytes must not matter
    let reserved = 20 + 4 + 8;
    bytes[reserved..reserved + 4].copy_from_slice(&0xffff_ffffu32.to_le_bytes());
    bytes.truncate(reserved + 4);
    bytes.extend_from_slice(MAPS.as_bytes());
    let (_dir, path) = write_raw(&bytes);

    let profile = read_profile(&path).expect("Failed to parse profile");
    assert_eq!(profile.mappings.len(), 1);
}
