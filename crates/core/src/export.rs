//! Self-contained client report export.
//!
//! A report is the dashboard markup with two blocks inserted before
//! `</body>`:
//!
//! ```text
//! <script type="application/json" id="client-report-data">{"format":..,"version":1,"records":[..]}</script>
//! <script>/* feeds records to the page pipeline, hides upload and export */</script>
//! ```
//!
//! The payload is versioned so a reader can refuse reports written under
//! rules it does not know.

use crate::error::{Error, Result};
use crate::sanitize::Sanitizer;
use crate::types::RawRecord;
use serde::{Deserialize, Serialize};

/// Fixed download name of the exported report.
pub const CLIENT_REPORT_FILENAME: &str = "Client_Report_Secure.html";

/// Payload format identifier.
pub const REPORT_FORMAT: &str = "booking-dashboard/client-report";

/// Current payload version.
pub const REPORT_FORMAT_VERSION: u32 = 1;

/// Question shown before an export is produced.
pub const EXPORT_CONFIRMATION_PROMPT: &str =
    "Do you want to export a Secure Client Report (Financials Removed)?";

/// Element id of the embedded payload block.
pub const PAYLOAD_ELEMENT_ID: &str = "client-report-data";

/// Controls hidden when a report is opened.
pub const HIDDEN_CONTROLS: [&str; 3] = [".uploader", "#fileInput", "#exportReportBtn"];

/// Minimal dashboard page used when no page markup is supplied.
pub const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Booking Dashboard</title>
</head>
<body>
<header>
  <label class="uploader">Upload workbook <input type="file" id="fileInput" accept=".xlsx,.json"></label>
  <button id="presentBtn">Present</button>
  <button id="exportReportBtn">Export Client Report</button>
</header>
<section id="dashboardContent">
  <div class="kpi"><span>Bookings</span><strong id="kpiBookings">0</strong></div>
  <div class="kpi"><span>Locations</span><strong id="kpiLocations">0</strong></div>
  <div class="kpi"><span>Corporate</span><strong id="kpiCorp">0</strong></div>
  <div class="kpi"><span>Self Pay</span><strong id="kpiSelf">0</strong></div>
  <div class="kpi"><span>Corporate Flex</span><strong id="kpiFlex">0</strong></div>
  <canvas id="trendChart"></canvas>
  <canvas id="statusChart"></canvas>
  <canvas id="regionChart"></canvas>
  <canvas id="typeChart"></canvas>
  <table><tbody id="dataTableBody"></tbody></table>
</section>
</body>
</html>
"#;

/// The data embedded in a client report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub format: String,
    pub version: u32,
    /// Keywords the records were redacted with.
    pub redacted_keywords: Vec<String>,
    pub records: Vec<RawRecord>,
}

/// An exported, standalone report file.
#[derive(Debug, Clone, PartialEq)]
pub struct StandaloneDocument {
    pub filename: String,
    pub html: String,
    pub record_count: usize,
}

/// Result of an export request.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Exported(StandaloneDocument),
    /// The user declined the confirmation.
    Cancelled,
}

/// Serialize a value as JSON that is safe inside an HTML `<script>` block.
///
/// `<`, `>` and `&` only occur inside JSON strings, where their `\u` escapes
/// decode to the same text.
fn script_safe_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

/// Builds client reports from raw datasets.
#[derive(Debug, Clone)]
pub struct ReportExporter {
    sanitizer: Sanitizer,
    entry_point: String,
}

impl Default for ReportExporter {
    fn default() -> Self {
        Self {
            sanitizer: Sanitizer::default(),
            entry_point: "processData".to_string(),
        }
    }
}

impl ReportExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redact with a custom sanitizer.
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Name of the page function that ingests records (default `processData`).
    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Redact `records` and embed them in `markup`.
    ///
    /// An empty dataset produces a report with zero records.
    pub fn export(&self, records: &[RawRecord], markup: &str) -> Result<StandaloneDocument> {
        let payload = ReportPayload {
            format: REPORT_FORMAT.to_string(),
            version: REPORT_FORMAT_VERSION,
            redacted_keywords: self.sanitizer.keywords().to_vec(),
            records: self.sanitizer.sanitize(records),
        };

        let blocks = format!(
            "<script type=\"application/json\" id=\"{}\">{}</script>\n{}",
            PAYLOAD_ELEMENT_ID,
            script_safe_json(&payload)?,
            self.bootstrap_script()?
        );

        let html = match markup.rfind("</body>") {
            Some(pos) => format!("{}{}{}", &markup[..pos], blocks, &markup[pos..]),
            None => format!("{}{}", markup, blocks),
        };

        log::debug!(
            "Exported client report with {} records ({} bytes)",
            payload.records.len(),
            html.len()
        );

        Ok(StandaloneDocument {
            filename: CLIENT_REPORT_FILENAME.to_string(),
            html,
            record_count: payload.records.len(),
        })
    }

    /// Script that replays the payload through the page pipeline on load.
    fn bootstrap_script(&self) -> Result<String> {
        let entry_point = script_safe_json(&self.entry_point)?;
        let hidden = script_safe_json(&HIDDEN_CONTROLS)?;

        Ok(format!(
            r#"<script>
document.addEventListener('DOMContentLoaded', function () {{
  var node = document.getElementById('{id}');
  if (!node) return;
  var payload = JSON.parse(node.textContent);
  if (payload.format !== '{format}' || payload.version > {version}) return;
  window.initialData = payload.records;
  {hidden}.forEach(function (selector) {{
    var el = document.querySelector(selector);
    if (el) el.style.display = 'none';
  }});
  var run = window[{entry}];
  if (typeof run === 'function') run(payload.records);
}});
</script>
"#,
            id = PAYLOAD_ELEMENT_ID,
            format = REPORT_FORMAT,
            version = REPORT_FORMAT_VERSION,
            hidden = hidden,
            entry = entry_point,
        ))
    }
}

/// Read the payload back out of an exported report.
pub fn read_client_report(html: &str) -> Result<ReportPayload> {
    let marker = format!("id=\"{}\"", PAYLOAD_ELEMENT_ID);
    let tag_start = html
        .find(&marker)
        .ok_or_else(|| Error::InvalidReport("no embedded report data".to_string()))?;
    let body_start = html[tag_start..]
        .find('>')
        .map(|i| tag_start + i + 1)
        .ok_or_else(|| Error::InvalidReport("unterminated report data tag".to_string()))?;
    let body_end = html[body_start..]
        .find("</script>")
        .map(|i| body_start + i)
        .ok_or_else(|| Error::InvalidReport("unterminated report data block".to_string()))?;

    let payload: ReportPayload = serde_json::from_str(&html[body_start..body_end])?;

    if payload.format != REPORT_FORMAT {
        return Err(Error::InvalidReport(format!(
            "unexpected format '{}'",
            payload.format
        )));
    }
    if payload.version > REPORT_FORMAT_VERSION {
        return Err(Error::UnsupportedReportVersion {
            found: payload.version,
            supported: REPORT_FORMAT_VERSION,
        });
    }

    Ok(payload)
}
