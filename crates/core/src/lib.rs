//! Core domain types, normalization, aggregation, presentation and secure
//! client-report export for the booking dashboard.

pub mod aggregate;
pub mod chart;
pub mod error;
pub mod export;
pub mod format;
pub mod ingest;
pub mod normalize;
pub mod presentation;
pub mod sample;
pub mod sanitize;
pub mod session;
pub mod types;

pub use aggregate::{aggregate, Aggregator, DashboardSummary, Kpis, TableRow};
pub use chart::{ChartKind, ChartSeries, ChartSpec, ChartSurface, NullSurface, SeriesPoint};
pub use error::{Error, Result};
pub use export::{
    read_client_report, ExportOutcome, ReportExporter, ReportPayload, StandaloneDocument,
    CLIENT_REPORT_FILENAME,
};
pub use ingest::{records_from_json, records_from_json_bytes};
pub use normalize::{FieldMap, FieldNormalizer};
pub use presentation::{select_slides, AudienceMode, SlideDeck, SlideFrame};
pub use sanitize::Sanitizer;
pub use session::{IngestStatus, IngestTicket, Session, SessionOrigin};
pub use types::{CanonicalRecord, FieldValue, RawRecord, RecordDate, SourceFormat};
