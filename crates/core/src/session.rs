//! The dashboard session: active dataset, chart registry and presentation state.

use crate::aggregate::{Aggregator, DashboardSummary};
use crate::chart::ChartSurface;
use crate::error::{Error, Result};
use crate::export::{read_client_report, ExportOutcome, ReportExporter, EXPORT_CONFIRMATION_PROMPT};
use crate::normalize::FieldNormalizer;
use crate::presentation::{AudienceMode, SlideDeck, SlideFrame};
use crate::sample::sample_records;
use crate::types::{CanonicalRecord, RawRecord};
use std::collections::HashMap;

/// Where the session's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Internal dashboard; uploads and exports allowed.
    Workspace,
    /// Opened from an exported client report; read-only.
    ClientReport,
}

/// Token for one ingestion. Only the most recent ticket can complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestTicket {
    generation: u64,
}

/// What happened to a completed ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    /// The rows replaced the dataset.
    Loaded { records: usize },
    /// A newer ingestion started meanwhile; the rows were dropped.
    Stale,
}

/// Session state for one dashboard page.
///
/// Owns the dataset (replaced wholesale on each ingestion) and the chart
/// registry. A chart id maps to at most one live handle; redrawing destroys
/// the previous handle first.
pub struct Session<S: ChartSurface> {
    surface: S,
    normalizer: FieldNormalizer,
    aggregator: Aggregator,
    exporter: ReportExporter,
    origin: SessionOrigin,
    generation: u64,
    dataset: Vec<RawRecord>,
    records: Vec<CanonicalRecord>,
    summary: DashboardSummary,
    charts: HashMap<&'static str, S::Handle>,
    deck: Option<SlideDeck>,
}

impl<S: ChartSurface> Session<S> {
    /// Create an empty workspace session drawing on `surface`.
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            normalizer: FieldNormalizer::default(),
            aggregator: Aggregator::default(),
            exporter: ReportExporter::default(),
            origin: SessionOrigin::Workspace,
            generation: 0,
            dataset: Vec::new(),
            records: Vec::new(),
            summary: DashboardSummary::default(),
            charts: HashMap::new(),
            deck: None,
        }
    }

    pub fn with_normalizer(mut self, normalizer: FieldNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_exporter(mut self, exporter: ReportExporter) -> Self {
        self.exporter = exporter;
        self
    }

    /// Load the records embedded in an exported report.
    ///
    /// The session becomes read-only: further uploads and exports fail.
    pub fn open_report(mut self, html: &str) -> Result<Self> {
        let payload = read_client_report(html)?;
        log::debug!(
            "Opening client report v{} with {} records",
            payload.version,
            payload.records.len()
        );
        self.origin = SessionOrigin::ClientReport;
        self.generation += 1;
        self.adopt(payload.records);
        Ok(self)
    }

    pub fn origin(&self) -> SessionOrigin {
        self.origin
    }

    pub fn is_read_only(&self) -> bool {
        self.origin == SessionOrigin::ClientReport
    }

    /// Start an ingestion. Any earlier ticket becomes stale.
    pub fn begin_ingest(&mut self) -> Result<IngestTicket> {
        if self.is_read_only() {
            return Err(Error::IngestionDisabled);
        }
        self.generation += 1;
        Ok(IngestTicket {
            generation: self.generation,
        })
    }

    /// Finish an ingestion with the rows read, or the read error.
    ///
    /// On error the current dataset stays in place. Results for stale
    /// tickets are discarded, errors included.
    pub fn complete_ingest(
        &mut self,
        ticket: IngestTicket,
        rows: Result<Vec<RawRecord>>,
    ) -> Result<IngestStatus> {
        if ticket.generation != self.generation {
            log::warn!(
                "Discarding ingestion {} superseded by {}",
                ticket.generation,
                self.generation
            );
            return Ok(IngestStatus::Stale);
        }

        let rows = rows?;
        let count = rows.len();
        self.adopt(rows);
        Ok(IngestStatus::Loaded { records: count })
    }

    /// Replace the dataset with rows that are already in memory.
    pub fn load_records(&mut self, rows: Vec<RawRecord>) -> Result<IngestStatus> {
        let ticket = self.begin_ingest()?;
        self.complete_ingest(ticket, Ok(rows))
    }

    /// Replace the dataset with the built-in sample bookings.
    pub fn load_sample(&mut self) -> Result<IngestStatus> {
        self.load_records(sample_records())
    }

    fn adopt(&mut self, rows: Vec<RawRecord>) {
        self.records = self.normalizer.normalize_all(&rows);
        self.summary = self.aggregator.aggregate(&self.records);
        self.dataset = rows;
        self.render();
    }

    /// The raw rows of the active dataset.
    pub fn dataset(&self) -> &[RawRecord] {
        &self.dataset
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn summary(&self) -> &DashboardSummary {
        &self.summary
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Redraw every dashboard chart that has a target on the surface.
    pub fn render(&mut self) {
        for spec in self.summary.charts() {
            if let Some(old) = self.charts.remove(spec.id) {
                self.surface.destroy(old);
            }
            if !self.surface.has_target(spec.id) {
                log::debug!("No target for chart '{}', skipping", spec.id);
                continue;
            }
            let handle = self.surface.draw(spec.id, spec.kind, spec.series);
            self.charts.insert(spec.id, handle);
        }
    }

    /// Destroy every live chart.
    pub fn clear_charts(&mut self) {
        for (_, handle) in self.charts.drain() {
            self.surface.destroy(handle);
        }
    }

    pub fn chart_handle(&self, id: &str) -> Option<&S::Handle> {
        self.charts.get(id)
    }

    pub fn live_chart_count(&self) -> usize {
        self.charts.len()
    }

    /// Enter presentation mode for an audience, at the first slide.
    pub fn start_presentation(&mut self, mode: AudienceMode) -> Option<SlideFrame> {
        self.deck = Some(SlideDeck::new(mode));
        self.slide_frame()
    }

    pub fn next_slide(&mut self) -> Option<SlideFrame> {
        self.deck.as_mut()?.next();
        self.slide_frame()
    }

    pub fn prev_slide(&mut self) -> Option<SlideFrame> {
        self.deck.as_mut()?.prev();
        self.slide_frame()
    }

    /// Leave presentation mode and redraw the dashboard.
    pub fn exit_presentation(&mut self) {
        self.deck = None;
        self.render();
    }

    pub fn deck(&self) -> Option<&SlideDeck> {
        self.deck.as_ref()
    }

    /// The frame of the current slide, if presenting a non-empty deck.
    pub fn slide_frame(&self) -> Option<SlideFrame> {
        let deck = self.deck.as_ref()?;
        let id = deck.current()?;
        Some(SlideFrame {
            counter: deck.counter_label(),
            title: deck.current_title().unwrap_or_default(),
            chart_id: id,
            chart_available: self.charts.contains_key(id),
        })
    }

    /// Export a client report of the active dataset.
    ///
    /// `confirm` is asked [`EXPORT_CONFIRMATION_PROMPT`] first; declining
    /// yields [`ExportOutcome::Cancelled`].
    pub fn export_client_report(
        &self,
        markup: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> Result<ExportOutcome> {
        if self.is_read_only() {
            return Err(Error::ExportDisabled);
        }
        if !confirm(EXPORT_CONFIRMATION_PROMPT) {
            log::debug!("Client report export cancelled");
            return Ok(ExportOutcome::Cancelled);
        }
        let document = self.exporter.export(&self.dataset, markup)?;
        Ok(ExportOutcome::Exported(document))
    }
}

impl<S: ChartSurface> Drop for Session<S> {
    fn drop(&mut self) {
        self.clear_charts();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ids, ChartKind, ChartSeries, NullSurface};
    use crate::export::DEFAULT_TEMPLATE;
    use crate::sanitize::SENSITIVE_KEYWORDS;
    use std::collections::HashSet;

    /// Surface that records draws and tracks live handles.
    #[derive(Debug, Default)]
    struct RecordingSurface {
        targets: HashSet<String>,
        next_handle: u32,
        live: HashSet<u32>,
        draws: Vec<(String, ChartKind, usize)>,
        destroyed: usize,
    }

    impl RecordingSurface {
        fn with_targets(targets: &[&str]) -> Self {
            Self {
                targets: targets.iter().map(|t| t.to_string()).collect(),
                ..Self::default()
            }
        }
    }

    impl ChartSurface for RecordingSurface {
        type Handle = u32;

        fn has_target(&self, id: &str) -> bool {
            self.targets.contains(id)
        }

        fn draw(&mut self, id: &str, kind: ChartKind, series: &ChartSeries) -> u32 {
            self.next_handle += 1;
            self.live.insert(self.next_handle);
            self.draws.push((id.to_string(), kind, series.len()));
            self.next_handle
        }

        fn destroy(&mut self, handle: u32) {
            assert!(self.live.remove(&handle), "handle {handle} destroyed twice");
            self.destroyed += 1;
        }
    }

    fn all_targets() -> RecordingSurface {
        RecordingSurface::with_targets(&[
            ids::TREND,
            ids::STATUS,
            ids::REGION,
            ids::PAYMENT_TYPE,
            ids::REVENUE_BY_LOCATION,
        ])
    }

    #[test]
    fn test_load_draws_every_chart() {
        let mut session = Session::new(all_targets());
        let status = session.load_sample().unwrap();

        assert_eq!(status, IngestStatus::Loaded { records: 6 });
        assert_eq!(session.live_chart_count(), 5);
        assert_eq!(session.surface().draws.len(), 5);
        assert_eq!(session.summary().kpis.total_count, 6);
    }

    #[test]
    fn test_redraw_destroys_previous_handles() {
        let mut session = Session::new(all_targets());
        for _ in 0..4 {
            session.load_sample().unwrap();
        }

        assert_eq!(session.surface().draws.len(), 20);
        assert_eq!(session.surface().destroyed, 15);
        assert_eq!(session.surface().live.len(), 5);
        assert_eq!(session.live_chart_count(), 5);
    }

    #[test]
    fn test_missing_targets_are_skipped() {
        let mut session = Session::new(RecordingSurface::with_targets(&[ids::STATUS]));
        session.load_sample().unwrap();

        assert_eq!(session.live_chart_count(), 1);
        assert!(session.chart_handle(ids::STATUS).is_some());
        assert!(session.chart_handle(ids::TREND).is_none());
    }

    #[test]
    fn test_stale_ingestion_is_discarded() {
        let mut session = Session::new(NullSurface);

        let slow = session.begin_ingest().unwrap();
        let fast = session.begin_ingest().unwrap();

        let status = session.complete_ingest(fast, Ok(sample_records())).unwrap();
        assert_eq!(status, IngestStatus::Loaded { records: 6 });

        let late = session
            .complete_ingest(slow, Ok(vec![RawRecord::new()]))
            .unwrap();
        assert_eq!(late, IngestStatus::Stale);
        assert_eq!(session.dataset().len(), 6);
    }

    #[test]
    fn test_failed_ingestion_keeps_previous_dataset() {
        let mut session = Session::new(NullSurface);
        session.load_sample().unwrap();

        let ticket = session.begin_ingest().unwrap();
        let result = session.complete_ingest(
            ticket,
            Err(Error::XlsxParseError("not a workbook".to_string())),
        );

        assert!(result.is_err());
        assert_eq!(session.dataset().len(), 6);
        assert_eq!(session.summary().kpis.total_count, 6);
    }

    #[test]
    fn test_presentation_frames() {
        let mut session = Session::new(all_targets());
        session.load_sample().unwrap();

        let frame = session.start_presentation(AudienceMode::Internal).unwrap();
        assert_eq!(frame.counter, "1 / 12");
        assert_eq!(frame.title, "Self Pay Origin");
        assert!(!frame.chart_available);

        session.next_slide();
        session.next_slide();
        let frame = session.next_slide().unwrap();
        assert_eq!(frame.chart_id, ids::REVENUE_BY_LOCATION);
        assert!(frame.chart_available);

        session.exit_presentation();
        assert!(session.deck().is_none());
        assert!(session.next_slide().is_none());
        assert_eq!(session.live_chart_count(), 5);
    }

    #[test]
    fn test_client_presentation_never_shows_financial_chart() {
        let mut session = Session::new(all_targets());
        session.load_sample().unwrap();

        let mut seen = vec![session.start_presentation(AudienceMode::Client).unwrap()];
        for _ in 0..12 {
            seen.push(session.next_slide().unwrap());
        }

        assert!(seen.iter().all(|f| f.chart_id != ids::REVENUE_BY_LOCATION));
        assert_eq!(seen.last().unwrap().counter, "9 / 9");
    }

    #[test]
    fn test_export_requires_confirmation() {
        let mut session = Session::new(NullSurface);
        session.load_sample().unwrap();

        let mut asked = String::new();
        let outcome = session
            .export_client_report(DEFAULT_TEMPLATE, |prompt| {
                asked = prompt.to_string();
                false
            })
            .unwrap();

        assert_eq!(outcome, ExportOutcome::Cancelled);
        assert_eq!(asked, EXPORT_CONFIRMATION_PROMPT);
    }

    #[test]
    fn test_exported_report_reopens_read_only() {
        let mut session = Session::new(NullSurface);
        session.load_sample().unwrap();

        let ExportOutcome::Exported(doc) = session
            .export_client_report(DEFAULT_TEMPLATE, |_| true)
            .unwrap()
        else {
            panic!("export was confirmed");
        };

        let mut reopened = Session::new(all_targets()).open_report(&doc.html).unwrap();

        assert!(reopened.is_read_only());
        assert_eq!(reopened.dataset().len(), 6);
        assert_eq!(reopened.summary().kpis.total_count, 6);
        assert_eq!(reopened.summary().kpis.total_revenue, 0.0);
        assert_eq!(reopened.summary().kpis.corporate_count, 3);
        assert_eq!(reopened.live_chart_count(), 5);
        for record in reopened.dataset() {
            for key in record.keys() {
                let lower = key.to_lowercase();
                assert!(SENSITIVE_KEYWORDS.iter().all(|k| !lower.contains(k)));
            }
        }

        assert!(matches!(reopened.load_sample(), Err(Error::IngestionDisabled)));
        assert!(matches!(
            reopened.export_client_report(DEFAULT_TEMPLATE, |_| true),
            Err(Error::ExportDisabled)
        ));
    }

    #[test]
    fn test_export_of_empty_session() {
        let session = Session::new(NullSurface);
        let outcome = session.export_client_report("<body></body>", |_| true).unwrap();

        match outcome {
            ExportOutcome::Exported(doc) => assert_eq!(doc.record_count, 0),
            ExportOutcome::Cancelled => panic!("export was confirmed"),
        }
    }

    #[test]
    fn test_clear_charts_releases_handles() {
        let mut session = Session::new(all_targets());
        session.load_sample().unwrap();
        session.clear_charts();

        assert_eq!(session.live_chart_count(), 0);
        assert!(session.surface().live.is_empty());
    }
}
