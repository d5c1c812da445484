//! JSON rendering of a [`Report`].
//!
//! Same views and ordering as the CSV output, as one document. Unresolved
//! values are `null`; VMAs are `0x` hex strings.

use std::io::Write;

use super::report::Report;

/// Write the report as pretty-printed JSON followed by a newline.
///
/// # Errors
/// Returns an error if serialization or the underlying writer fails
pub fn write_json<W: Write>(report: &Report, out: &mut W) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out).map_err(serde_json::Error::io)
}
