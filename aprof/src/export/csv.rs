//! Comma-separated rendering of a [`Report`].
//!
//! ```text
//! Module,Samples,Percent
//! /system/lib/libc.so,3,100.00
//!
//! Module,Symbol,Samples,Percent
//! /system/lib/libc.so,"memcpy",3,100.00
//! ...
//! ```
//!
//! Four sections separated by one empty line. Symbols are double-quoted;
//! anything unresolved prints as `<unknown>`.

use std::io::{self, Write};

use super::report::Report;
use crate::analysis::label;

pub const MODULE_HEADER: &str = "Module,Samples,Percent";
pub const SYMBOL_HEADER: &str = "Module,Symbol,Samples,Percent";
pub const LINE_HEADER: &str = "Module,Symbol,File,Line,Samples,Percent";
pub const ADDRESS_HEADER: &str = "Module,Symbol,File,Line,VMA,Samples,Percent";

fn text(value: Option<&String>) -> &str {
    label(value.map(String::as_str))
}

fn quoted(symbol: Option<&String>) -> String {
    format!("\"{}\"", text(symbol).replace('"', "\"\""))
}

/// Write all four sections.
///
/// # Errors
/// Returns any error from the underlying writer
pub fn write_csv<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    writeln!(out, "{MODULE_HEADER}")?;
    for row in &report.modules {
        writeln!(out, "{},{},{:.2}", text(row.module.as_ref()), row.samples, row.percent)?;
    }

    writeln!(out)?;
    writeln!(out, "{SYMBOL_HEADER}")?;
    for row in &report.symbols {
        writeln!(
            out,
            "{},{},{},{:.2}",
            text(row.module.as_ref()),
            quoted(row.symbol.as_ref()),
            row.samples,
            row.percent
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{LINE_HEADER}")?;
    for row in &report.lines {
        writeln!(
            out,
            "{},{},{},{},{},{:.2}",
            text(row.module.as_ref()),
            quoted(row.symbol.as_ref()),
            text(row.file.as_ref()),
            text(row.line.as_ref()),
            row.samples,
            row.percent
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{ADDRESS_HEADER}")?;
    for row in &report.addresses {
        writeln!(
            out,
            "{},{},{},{},{},{},{:.2}",
            text(row.module.as_ref()),
            quoted(row.symbol.as_ref()),
            text(row.file.as_ref()),
            text(row.line.as_ref()),
            row.vma,
            row.samples,
            row.percent
        )?;
    }
    Ok(())
}
