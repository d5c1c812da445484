//! Report export.
//!
//! A finished tally becomes a [`Report`]: four sorted views with
//! percentages. The report is then written either as CSV sections (the
//! default) or as a single JSON document.

pub mod csv;
pub mod json;
pub mod report;

use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;

pub use csv::write_csv;
pub use json::write_json;
pub use report::{
    percent, split_location, AddressRow, DemangleCache, LineRow, ModuleRow, Report, SymbolRow,
};

/// Output format of the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl Report {
    /// Render in the requested format.
    ///
    /// # Errors
    /// Returns an error if writing fails
    pub fn write_to<W: Write>(&self, format: OutputFormat, out: &mut W) -> Result<()> {
        match format {
            OutputFormat::Csv => write_csv(self, out)?,
            OutputFormat::Json => write_json(self, out)?,
        }
        Ok(())
    }
}
