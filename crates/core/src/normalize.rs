//! Field normalization for booking rows.
//!
//! Turns schema-less rows into [`CanonicalRecord`]s. Every function here is
//! total: malformed cells fall back to documented defaults instead of failing.

use crate::types::{CanonicalRecord, FieldValue, RawRecord, RecordDate};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Regex matching everything that cannot be part of a plain decimal number.
static CURRENCY_STRIP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.\-]").unwrap());

/// Regex matching the longest leading decimal number of a cleaned string.
static FLOAT_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(?:[0-9]+\.?[0-9]*|\.[0-9]+)").unwrap());

/// Regex matching a leading integer, as used for ages.
static INT_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+").unwrap());

/// Default value for missing text fields.
pub const UNKNOWN: &str = "Unknown";

/// Names of the raw columns the normalizer reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub revenue: String,
    pub date: String,
    pub age: String,
    pub region: String,
    pub status: String,
    pub payment_type: String,
    /// Column used for the corporate / self pay counters. Falls back to
    /// `payment_type` when the row has no such value.
    pub payment_category: String,
    pub first_name: String,
    pub last_name: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            revenue: "totals".to_string(),
            date: "date".to_string(),
            age: "Age".to_string(),
            region: "Region".to_string(),
            status: "status".to_string(),
            payment_type: "Corporate Or Self Pay".to_string(),
            payment_category: "corp_or_self".to_string(),
            first_name: "first_name".to_string(),
            last_name: "last_name".to_string(),
        }
    }
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_revenue(mut self, name: impl Into<String>) -> Self {
        self.revenue = name.into();
        self
    }

    pub fn with_date(mut self, name: impl Into<String>) -> Self {
        self.date = name.into();
        self
    }

    pub fn with_age(mut self, name: impl Into<String>) -> Self {
        self.age = name.into();
        self
    }

    pub fn with_region(mut self, name: impl Into<String>) -> Self {
        self.region = name.into();
        self
    }

    pub fn with_status(mut self, name: impl Into<String>) -> Self {
        self.status = name.into();
        self
    }

    pub fn with_payment_type(mut self, name: impl Into<String>) -> Self {
        self.payment_type = name.into();
        self
    }

    pub fn with_payment_category(mut self, name: impl Into<String>) -> Self {
        self.payment_category = name.into();
        self
    }
}

/// Parse a currency-formatted string such as `£1,234.50`.
///
/// Strips every character other than digits, `.` and `-`, then reads the
/// leading decimal number. Anything unparsable yields 0.
pub fn parse_revenue(text: &str) -> f64 {
    let cleaned = CURRENCY_STRIP_REGEX.replace_all(text, "");
    let value = FLOAT_PREFIX_REGEX
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);

    if value.is_finite() && value != 0.0 {
        value
    } else {
        0.0
    }
}

/// Parse a `DD/MM/YYYY` string.
///
/// Returns `None` unless there are exactly three `/`-separated parts. Three
/// parts that do not name a calendar day give `RecordDate::Invalid`.
pub fn parse_date(text: &str) -> Option<RecordDate> {
    let parts: Vec<&str> = text.split('/').collect();
    if parts.len() != 3 {
        return None;
    }

    let day = parts[0].trim().parse::<u32>().ok();
    let month = parts[1].trim().parse::<u32>().ok();
    let year = parts[2].trim().parse::<i32>().ok();

    let date = match (year, month, day) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d),
        _ => None,
    };

    Some(date.map(RecordDate::Day).unwrap_or(RecordDate::Invalid))
}

/// Parse an age cell, reading the leading integer of text cells.
pub fn parse_age(value: &FieldValue) -> i64 {
    match value {
        FieldValue::Number(n) if n.is_finite() => n.trunc() as i64,
        FieldValue::Number(_) => 0,
        FieldValue::Text(text) => INT_PREFIX_REGEX
            .find(text.trim_start())
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(0),
    }
}

/// Normalizer producing canonical records from raw rows.
#[derive(Debug, Clone, Default)]
pub struct FieldNormalizer {
    fields: FieldMap,
}

impl FieldNormalizer {
    /// Create a normalizer reading the default booking columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from a custom set of columns.
    pub fn with_fields(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Normalize a single row.
    ///
    /// Defaults only apply when a field is absent; an explicit empty string is
    /// kept as-is.
    pub fn normalize(&self, raw: &RawRecord) -> CanonicalRecord {
        let f = &self.fields;

        let revenue = match raw.get(&f.revenue) {
            Some(FieldValue::Number(n)) if n.is_finite() => *n,
            Some(FieldValue::Number(_)) | None => 0.0,
            Some(FieldValue::Text(text)) => parse_revenue(text),
        };

        let date = raw.get_text(&f.date).and_then(|text| parse_date(&text));
        let age = raw.get(&f.age).map(parse_age).unwrap_or(0);

        let text_or_unknown = |name: &str| raw.get_text(name).unwrap_or_else(|| UNKNOWN.to_string());
        let region = text_or_unknown(&f.region);
        let status = text_or_unknown(&f.status);
        let payment_type = text_or_unknown(&f.payment_type);

        let payment_category = raw
            .get_text(&f.payment_category)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| payment_type.clone())
            .to_lowercase();

        CanonicalRecord {
            raw: raw.clone(),
            revenue,
            date,
            age,
            region,
            status,
            payment_type,
            payment_category,
        }
    }

    /// Normalize every row, preserving order.
    pub fn normalize_all(&self, rows: &[RawRecord]) -> Vec<CanonicalRecord> {
        log::debug!("Normalizing {} rows", rows.len());
        rows.iter().map(|row| self.normalize(row)).collect()
    }
}
