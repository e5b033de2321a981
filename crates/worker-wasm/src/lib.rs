//! WASM bindings for the booking dashboard.
//!
//! This crate exposes workbook parsing, aggregation, presentation slides
//! and the secure client-report export to the browser page.

use dash_core::export::read_client_report as read_report_payload;
use dash_core::presentation::{is_financial, slide_title};
use dash_core::{
    records_from_json_bytes, AudienceMode, ChartKind, ChartSeries, ChartSpec, ChartSurface,
    DashboardSummary, Error, ExportOutcome, FieldMap, FieldNormalizer, IngestStatus,
    IngestTicket, NullSurface, RawRecord, Sanitizer, Session, SlideFrame, SourceFormat,
};
use js_sys::{Function, Reflect};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

#[wasm_bindgen(start)]
pub fn init() {
    // Set up better panic messages in the console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Rows read from an uploaded file.
#[derive(Debug, Serialize, Deserialize)]
pub struct ParseResult {
    /// Detected format of the source file.
    pub format: String,
    /// Rows from the first sheet, keyed by header.
    pub records: Vec<RawRecord>,
}

/// Aggregates plus the charts to draw from them.
#[derive(Debug, Serialize)]
pub struct DashboardView<'a> {
    pub summary: &'a DashboardSummary,
    pub charts: Vec<ChartSpec<'a>>,
}

/// One entry of a presentation deck.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SlideInfo {
    pub id: String,
    pub title: String,
    pub financial: bool,
}

/// Result of an export request.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ExportResult {
    /// True when the user declined the confirmation.
    pub cancelled: bool,
    pub filename: Option<String>,
    pub html: Option<String>,
    pub record_count: usize,
}

/// Data read back from an exported report.
#[derive(Debug, Serialize)]
pub struct ReportView {
    pub version: u32,
    pub redacted_keywords: Vec<String>,
    pub records: Vec<RawRecord>,
    pub summary: DashboardSummary,
}

/// Serialize to plain JS objects (not `Map`s) so records read like the rows
/// the page already handles.
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn records_from_js(records: JsValue) -> Result<Vec<RawRecord>, JsValue> {
    serde_wasm_bindgen::from_value(records)
        .map_err(|e| JsValue::from_str(&format!("Invalid records array: {}", e)))
}

fn fields_from_js(fields: JsValue) -> Result<FieldMap, JsValue> {
    if fields.is_undefined() || fields.is_null() {
        return Ok(FieldMap::default());
    }
    serde_wasm_bindgen::from_value(fields)
        .map_err(|e| JsValue::from_str(&format!("Invalid field map: {}", e)))
}

fn ask(confirm: &Function, prompt: &str) -> bool {
    confirm
        .call1(&JsValue::NULL, &JsValue::from_str(prompt))
        .map(|answer| answer.is_truthy())
        .unwrap_or(false)
}

/// Parse an uploaded workbook (.xlsx) or JSON rows.
///
/// # Arguments
/// * `data` - The raw bytes of the file
/// * `filename` - The original filename (used for format detection)
///
/// # Returns
/// A JavaScript object `{ format, records }`, or throws on error.
#[wasm_bindgen]
pub fn parse_workbook(data: &[u8], filename: &str) -> Result<JsValue, JsValue> {
    let result =
        parse_workbook_impl(data, filename).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&result)
}

fn parse_workbook_impl(data: &[u8], filename: &str) -> dash_core::Result<ParseResult> {
    if data.is_empty() {
        return Err(Error::UnsupportedFormat(format!("{} is empty", filename)));
    }

    let format = SourceFormat::from_magic(data)
        .or_else(|| {
            filename
                .rsplit('.')
                .next()
                .and_then(SourceFormat::from_extension)
        })
        .ok_or_else(|| Error::UnsupportedFormat(filename.to_string()))?;

    let records = match format {
        SourceFormat::Xlsx => {
            let parser = dash_xlsx::XlsxParser::new();
            parser.parse(Cursor::new(data))?
        }
        SourceFormat::Json => records_from_json_bytes(data)?,
    };

    Ok(ParseResult {
        format: format.as_str().to_string(),
        records,
    })
}

/// Compute KPIs and chart series for a set of rows.
///
/// `fields` optionally renames the columns read (see `FieldMap`).
#[wasm_bindgen]
pub fn build_dashboard(records: JsValue, fields: JsValue) -> Result<JsValue, JsValue> {
    let records = records_from_js(records)?;
    let fields = fields_from_js(fields)?;
    let summary = build_dashboard_impl(records, fields).map_err(|e| JsValue::from_str(&e))?;

    to_js(&DashboardView {
        summary: &summary,
        charts: summary.charts(),
    })
}

fn build_dashboard_impl(records: Vec<RawRecord>, fields: FieldMap) -> Result<DashboardSummary, String> {
    let mut session = headless_session(fields);
    session.load_records(records).map_err(|e| e.to_string())?;
    Ok(session.summary().clone())
}

fn headless_session(fields: FieldMap) -> Session<NullSurface> {
    Session::new(NullSurface)
        .with_normalizer(FieldNormalizer::new().with_fields(fields.clone()))
        .with_aggregator(dash_core::Aggregator::new().with_fields(fields))
}

/// Ordered slides for an audience (`"internal"` or `"client"`).
#[wasm_bindgen]
pub fn select_slides(mode: &str) -> Result<JsValue, JsValue> {
    let slides = select_slides_impl(mode).map_err(|e| JsValue::from_str(&e))?;
    to_js(&slides)
}

fn select_slides_impl(mode: &str) -> Result<Vec<SlideInfo>, String> {
    let mode: AudienceMode = mode.parse()?;
    Ok(dash_core::select_slides(mode)
        .into_iter()
        .map(|id| SlideInfo {
            id: id.to_string(),
            title: slide_title(id),
            financial: is_financial(id),
        })
        .collect())
}

/// Remove financial fields from every row.
#[wasm_bindgen]
pub fn sanitize_records(records: JsValue) -> Result<JsValue, JsValue> {
    let records = records_from_js(records)?;
    to_js(&sanitize_records_impl(&records))
}

fn sanitize_records_impl(records: &[RawRecord]) -> Vec<RawRecord> {
    Sanitizer::new().sanitize(records)
}

/// Build a secure client report from rows and the page markup.
///
/// `confirm` is called with the confirmation question and must return a
/// truthy value for the export to proceed.
#[wasm_bindgen]
pub fn export_client_report(
    records: JsValue,
    markup: &str,
    confirm: &Function,
) -> Result<JsValue, JsValue> {
    let records = records_from_js(records)?;
    let result = export_client_report_impl(records, markup, |prompt| ask(confirm, prompt))
        .map_err(|e| JsValue::from_str(&e))?;
    to_js(&result)
}

fn export_client_report_impl(
    records: Vec<RawRecord>,
    markup: &str,
    confirm: impl FnOnce(&str) -> bool,
) -> Result<ExportResult, String> {
    let mut session = Session::new(NullSurface);
    session.load_records(records).map_err(|e| e.to_string())?;
    let outcome = session
        .export_client_report(markup, confirm)
        .map_err(|e| e.to_string())?;
    Ok(export_result(outcome))
}

fn export_result(outcome: ExportOutcome) -> ExportResult {
    match outcome {
        ExportOutcome::Exported(document) => ExportResult {
            cancelled: false,
            filename: Some(document.filename),
            html: Some(document.html),
            record_count: document.record_count,
        },
        ExportOutcome::Cancelled => ExportResult {
            cancelled: true,
            filename: None,
            html: None,
            record_count: 0,
        },
    }
}

/// Read the rows embedded in an exported report, with their aggregates.
#[wasm_bindgen]
pub fn read_client_report(html: &str) -> Result<JsValue, JsValue> {
    let view = read_client_report_impl(html).map_err(|e| JsValue::from_str(&e))?;
    to_js(&view)
}

fn read_client_report_impl(html: &str) -> Result<ReportView, String> {
    let payload = read_report_payload(html).map_err(|e| e.to_string())?;
    let session = Session::new(NullSurface)
        .open_report(html)
        .map_err(|e| e.to_string())?;

    Ok(ReportView {
        version: payload.version,
        redacted_keywords: payload.redacted_keywords,
        records: payload.records,
        summary: session.summary().clone(),
    })
}

/// Chart surface backed by a JS object with `draw(id, kind, series)`,
/// `destroy(handle)` and `hasTarget(id)` methods.
pub struct JsChartSurface {
    target: JsValue,
    draw: Function,
    destroy: Function,
    has_target: Function,
}

impl JsChartSurface {
    pub fn new(target: JsValue) -> Result<Self, JsValue> {
        let method = |name: &str| -> Result<Function, JsValue> {
            Reflect::get(&target, &JsValue::from_str(name))?
                .dyn_into::<Function>()
                .map_err(|_| JsValue::from_str(&format!("Chart surface has no '{}' method", name)))
        };

        Ok(Self {
            draw: method("draw")?,
            destroy: method("destroy")?,
            has_target: method("hasTarget")?,
            target,
        })
    }
}

impl ChartSurface for JsChartSurface {
    type Handle = JsValue;

    fn has_target(&self, id: &str) -> bool {
        self.has_target
            .call1(&self.target, &JsValue::from_str(id))
            .map(|found| found.is_truthy())
            .unwrap_or(false)
    }

    fn draw(&mut self, id: &str, kind: ChartKind, series: &ChartSeries) -> JsValue {
        let series = to_js(series).unwrap_or(JsValue::NULL);
        self.draw
            .call3(
                &self.target,
                &JsValue::from_str(id),
                &JsValue::from_str(kind.as_str()),
                &series,
            )
            .unwrap_or(JsValue::UNDEFINED)
    }

    fn destroy(&mut self, handle: JsValue) {
        let _ = self.destroy.call1(&self.target, &handle);
    }
}

/// Token for a pending upload. Pass it back to `completeIngest`; an older
/// token than the latest is ignored.
#[wasm_bindgen]
pub struct IngestToken {
    ticket: IngestTicket,
}

/// A dashboard page session drawing on a JS chart surface.
#[wasm_bindgen]
pub struct Dashboard {
    session: Session<JsChartSurface>,
}

#[wasm_bindgen]
impl Dashboard {
    /// Create an empty dashboard. `fields` optionally renames the columns read.
    #[wasm_bindgen(constructor)]
    pub fn new(surface: JsValue, fields: JsValue) -> Result<Dashboard, JsValue> {
        let fields = fields_from_js(fields)?;
        let session = Session::new(JsChartSurface::new(surface)?)
            .with_normalizer(FieldNormalizer::new().with_fields(fields.clone()))
            .with_aggregator(dash_core::Aggregator::new().with_fields(fields));
        Ok(Dashboard { session })
    }

    /// Open an exported client report. The dashboard is read-only.
    #[wasm_bindgen(js_name = fromReport)]
    pub fn from_report(surface: JsValue, html: &str) -> Result<Dashboard, JsValue> {
        let session = Session::new(JsChartSurface::new(surface)?)
            .open_report(html)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Dashboard { session })
    }

    #[wasm_bindgen(js_name = isReadOnly)]
    pub fn is_read_only(&self) -> bool {
        self.session.is_read_only()
    }

    /// Start an upload; call before reading the file.
    #[wasm_bindgen(js_name = beginIngest)]
    pub fn begin_ingest(&mut self) -> Result<IngestToken, JsValue> {
        self.session
            .begin_ingest()
            .map(|ticket| IngestToken { ticket })
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Finish an upload with the file bytes. Returns the number of rows
    /// loaded, or `undefined` when a newer upload superseded this one.
    #[wasm_bindgen(js_name = completeIngest)]
    pub fn complete_ingest(
        &mut self,
        token: &IngestToken,
        data: &[u8],
        filename: &str,
    ) -> Result<Option<usize>, JsValue> {
        let rows = parse_workbook_impl(data, filename).map(|parsed| parsed.records);
        let status = self
            .session
            .complete_ingest(token.ticket, rows)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(loaded_count(status))
    }

    /// Replace the dataset with rows already in JS.
    #[wasm_bindgen(js_name = loadRecords)]
    pub fn load_records(&mut self, records: JsValue) -> Result<Option<usize>, JsValue> {
        let records = records_from_js(records)?;
        let status = self
            .session
            .load_records(records)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(loaded_count(status))
    }

    /// Show the built-in sample bookings.
    #[wasm_bindgen(js_name = loadSample)]
    pub fn load_sample(&mut self) -> Result<Option<usize>, JsValue> {
        let status = self
            .session
            .load_sample()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(loaded_count(status))
    }

    /// The current aggregates.
    pub fn summary(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.summary())
    }

    /// The rows of the current dataset.
    pub fn records(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.dataset())
    }

    /// Redraw every chart.
    pub fn render(&mut self) {
        self.session.render();
    }

    #[wasm_bindgen(js_name = startPresentation)]
    pub fn start_presentation(&mut self, mode: &str) -> Result<JsValue, JsValue> {
        let mode: AudienceMode = mode.parse().map_err(|e: String| JsValue::from_str(&e))?;
        frame_to_js(self.session.start_presentation(mode))
    }

    #[wasm_bindgen(js_name = nextSlide)]
    pub fn next_slide(&mut self) -> Result<JsValue, JsValue> {
        frame_to_js(self.session.next_slide())
    }

    #[wasm_bindgen(js_name = prevSlide)]
    pub fn prev_slide(&mut self) -> Result<JsValue, JsValue> {
        frame_to_js(self.session.prev_slide())
    }

    #[wasm_bindgen(js_name = exitPresentation)]
    pub fn exit_presentation(&mut self) {
        self.session.exit_presentation();
    }

    /// Export a client report of the current dataset, embedded in `markup`.
    #[wasm_bindgen(js_name = exportClientReport)]
    pub fn export_client_report(&self, markup: &str, confirm: &Function) -> Result<JsValue, JsValue> {
        let outcome = self
            .session
            .export_client_report(markup, |prompt| ask(confirm, prompt))
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        to_js(&export_result(outcome))
    }
}

fn loaded_count(status: IngestStatus) -> Option<usize> {
    match status {
        IngestStatus::Loaded { records } => Some(records),
        IngestStatus::Stale => None,
    }
}

fn frame_to_js(frame: Option<SlideFrame>) -> Result<JsValue, JsValue> {
    match frame {
        Some(frame) => to_js(&frame),
        None => Ok(JsValue::NULL),
    }
}
