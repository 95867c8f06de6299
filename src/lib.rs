//! xlsxcsv - Heuristic Excel table extraction and CSV conversion
//!
//! This crate converts one worksheet of an XLSX workbook into delimited text
//! (RFC 4180 style CSV). Real-world spreadsheets rarely start with a clean header
//! row, so the converter locates the header heuristically, trims the table to the
//! header's column span, and falls back to a raw cell dump (and optionally to an
//! external conversion engine) when the structured pass produces nothing.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use xlsxcsv::{ConversionOptions, ConverterBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create a converter with default settings
//!     let converter = ConverterBuilder::new().build()?;
//!
//!     // Convert the first sheet
//!     let input = File::open("example.xlsx")?;
//!     let output = converter.convert(input, &ConversionOptions::default())?;
//!     println!("{}", output.body);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Request Options
//!
//! Per-request options mirror the JSON body accepted by an HTTP front end:
//!
//! ```rust,no_run
//! use std::fs::File;
//! use xlsxcsv::{ConversionOptions, ConverterBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = ConverterBuilder::new().build()?;
//!     let options = ConversionOptions::from_json(
//!         r#"{"sheet": "Hoja1", "delimiter": ";", "fillMerges": true, "skipPattern": "^Total"}"#,
//!     )?;
//!
//!     let csv = converter.convert_to_string(File::open("example.xlsx")?, &options)?;
//!     println!("{}", csv);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use xlsxcsv::{ConverterBuilder, DateFormat, SofficeEngine};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = ConverterBuilder::new()
//!         .with_header_markers(vec!["date".to_string(), "fecha".to_string()])
//!         .with_date_format(DateFormat::Custom("%d/%m/%Y".to_string()))
//!         .with_external_engine(Arc::new(SofficeEngine::default()))
//!         .with_engine_timeout(Duration::from_secs(30))
//!         .build()?;
//!     # let _ = converter;
//!
//!     Ok(())
//! }
//! ```

mod api;
mod builder;
mod detect;
mod engine;
mod error;
mod formatter;
mod grid;
mod merge;
mod output;
mod parser;
mod pipeline;
mod security;
mod selector;
mod types;

// 公開API
pub use api::{
    ConversionOptions, ConversionOutput, DateFormat, QuotePolicy, ResponseEncoding, SheetRef,
    SheetSummary,
};
pub use builder::{Converter, ConverterBuilder};
pub use engine::{ExternalEngine, SofficeEngine};
pub use error::{EngineError, ErrorClass, XlsxToCsvError};
pub use types::{CellCoord, CellRange, CellValue, MergedRegion, Sheet, Workbook};
