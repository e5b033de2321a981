//! XLSX (Office Open XML) reader for the booking dashboard.
//!
//! Reads .xlsx files, which are ZIP archives containing XML documents, and
//! returns the rows of the first worksheet keyed by its header row.

pub mod parser;

pub use parser::XlsxParser;
