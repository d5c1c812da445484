//! Memory map parsing for captured process address spaces
//!
//! The MAPSDATA chunk is a verbatim copy of `/proc/self/maps` taken when the
//! capture ended. Only executable, file-backed mappings can contain sampled
//! code, so everything else is filtered out here.

use log::debug;

use crate::domain::{Mapping, Permissions};

/// Platform pseudo-mappings that are executable but have no backing file.
const PSEUDO_MAPPINGS: &[&str] = &["[vectors]", "[sigpage]"];

/// Parse one line: `HEXBEGIN-HEXEND PERM OFFSET DEV INODE PATH`.
///
/// PATH is the remainder of the line and may contain spaces. Lines without a
/// path (anonymous memory) or with malformed fields yield `None`.
#[must_use]
pub fn parse_map_line(line: &str) -> Option<Mapping> {
    let (range, rest) = next_field(line)?;
    let (perm, rest) = next_field(rest)?;
    let (offset, rest) = next_field(rest)?;
    let (_dev, rest) = next_field(rest)?;
    let (_inode, rest) = next_field(rest)?;
    let path = rest.trim_start();
    if path.is_empty() {
        return None;
    }

    let (begin, end) = range.split_once('-')?;
    Some(Mapping {
        begin: u64::from_str_radix(begin, 16).ok()?,
        end: u64::from_str_radix(end, 16).ok()?,
        file_offset: u64::from_str_radix(offset, 16).ok()?,
        permissions: Permissions::parse(perm)?,
        path: path.to_string(),
    })
}

/// Whether a parsed mapping can hold sampled code.
#[must_use]
pub fn is_code_mapping(mapping: &Mapping) -> bool {
    mapping.permissions.is_executable()
        && !mapping.path.starts_with("/dev/")
        && !PSEUDO_MAPPINGS.contains(&mapping.path.as_str())
}

/// Parse a full maps dump, keeping candidate code mappings in file order.
#[must_use]
pub fn parse_maps(text: &str) -> Vec<Mapping> {
    text.lines()
        .filter_map(parse_map_line)
        .filter(|mapping| {
            let keep = is_code_mapping(mapping);
            if !keep {
                debug!("Skipping mapping {} ({})", mapping.path, mapping.permissions);
            }
            keep
        })
        .collect()
}

/// Split off the next whitespace-delimited field.
fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(idx) => Some((&s[..idx], &s[idx..])),
        None => Some((s, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_map_line_fields() {
        let mapping =
            parse_map_line("4001d000-4002f000 r-xp 00001000 b3:17 1234   /system/lib/libm.so")
                .unwrap();

        assert_eq!(mapping.begin, 0x4001_d000);
        assert_eq!(mapping.end, 0x4002_f000);
        assert_eq!(mapping.file_offset, 0x1000);
        assert_eq!(mapping.permissions.as_str(), "r-xp");
        assert_eq!(mapping.path, "/system/lib/libm.so");
    }

    #[test]
    fn test_parse_map_line_path_with_spaces() {
        let mapping =
            parse_map_line("1000-2000 r-xp 00000000 00:00 0 /data/app/My App/lib.so").unwrap();
        assert_eq!(mapping.path, "/data/app/My App/lib.so");
    }

    #[test]
    fn test_parse_map_line_rejects_anonymous_and_garbage() {
        assert!(parse_map_line("1000-2000 rw-p 00000000 00:00 0").is_none());
        assert!(parse_map_line("1000-2000 rw-p 00000000 00:00 0      ").is_none());
        assert!(parse_map_line("zzzz-2000 r-xp 00000000 00:00 0 /lib/x.so").is_none());
        assert!(parse_map_line("1000-2000 r-x 00000000 00:00 0 /lib/x.so").is_none());
        assert!(parse_map_line("").is_none());
    }

    #[test]
    fn test_parse_maps_filters_non_code() {
        let text = "\
00008000-0000a000 r-xp 00000000 b3:17 123 /system/bin/app
0000a000-0000b000 rw-p 00002000 b3:17 123 /system/bin/app
40000000-40001000 r-xs 00000000 00:0b 77 /dev/ashmem/dalvik
ffff0000-ffff1000 r-xp 00000000 00:00 0 [vectors]
ffff1000-ffff2000 r-xp 00000000 00:00 0 [sigpage]
b6f00000-b6f10000 r-xp 00000000 b3:17 99 /system/lib/libc.so
b6f10000-b6f11000 r-xp 00000000 00:00 0
";
        let mappings = parse_maps(text);
        let paths: Vec<&str> = mappings.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["/system/bin/app", "/system/lib/libc.so"]);
    }
}
