//! Domain types for representing booking rows before and after normalization.

use chrono::NaiveDate;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single cell value from a tabular source.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Text cell (including currency strings like `£543.38`).
    Text(String),
    /// Numeric cell.
    Number(f64),
}

impl FieldValue {
    /// Create a text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// The value as a number, if it is numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            // Whole numbers stay integers in JSON (`"Age": 50`).
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                serializer.serialize_i64(*n as i64)
            }
            Self::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldValueVisitor;

        impl<'de> Visitor<'de> for FieldValueVisitor {
            type Value = FieldValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, number or boolean cell value")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<FieldValue, E> {
                Ok(FieldValue::Text(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<FieldValue, E> {
                Ok(FieldValue::Text(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<FieldValue, E> {
                Ok(FieldValue::Text(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<FieldValue, E> {
                Ok(FieldValue::Number(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<FieldValue, E> {
                Ok(FieldValue::Number(v as f64))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<FieldValue, E> {
                Ok(FieldValue::Number(v))
            }
        }

        deserializer.deserialize_any(FieldValueVisitor)
    }
}

/// A row as it arrives from the tabular source.
///
/// Keys are header names and carry no schema; every lookup is optional.
/// Field order follows the source columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, FieldValue)>,
}

impl RawRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a field, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Look up a field by exact name.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up a field and render it as text.
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    /// Whether a field with this exact name exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove a field by exact name.
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let pos = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(pos).1)
    }

    /// Keep only the fields for which the predicate holds.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &FieldValue) -> bool) {
        self.fields.retain(|(k, v)| keep(k, v));
    }

    /// Field names in source order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Fields in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RawRecordVisitor;

        impl<'de> Visitor<'de> for RawRecordVisitor {
            type Value = RawRecord;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of field names to cell values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<RawRecord, A::Error> {
                let mut record = RawRecord::new();
                // Null cells are treated as absent fields.
                while let Some((key, value)) = map.next_entry::<String, Option<FieldValue>>()? {
                    if let Some(value) = value {
                        record.insert(key, value);
                    }
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RawRecordVisitor)
    }
}

/// A parsed `DD/MM/YYYY` date.
///
/// Strings with three parts that do not form a calendar day are kept as
/// `Invalid` instead of being rejected; they never contribute to day buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDate {
    Day(NaiveDate),
    Invalid,
}

impl RecordDate {
    /// The ISO `YYYY-MM-DD` day, or `None` for an invalid date.
    pub fn iso_day(&self) -> Option<String> {
        match self {
            Self::Day(day) => Some(day.format("%Y-%m-%d").to_string()),
            Self::Invalid => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Day(_))
    }
}

/// A raw record plus derived, typed fields. Built once by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    /// The source row, untouched.
    pub raw: RawRecord,

    /// Parsed currency amount, 0 when absent or unparsable.
    pub revenue: f64,

    /// Parsed booking date. `None` when the field is absent or not `a/b/c`.
    pub date: Option<RecordDate>,

    /// Parsed age, 0 when absent or unparsable.
    pub age: i64,

    pub region: String,

    pub status: String,

    pub payment_type: String,

    /// Lowercased payment category used for the corporate/self pay counters.
    pub payment_category: String,
}

/// The format of an ingested source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    /// Excel workbook (Office Open XML).
    Xlsx,
    /// JSON array of row objects.
    Json,
}

impl SourceFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "xlsx" | "xlsm" => Some(Self::Xlsx),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Detect format from the leading bytes of the file.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        // XLSX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Xlsx);
        }

        let first = bytes
            .iter()
            .copied()
            .find(|b| !b.is_ascii_whitespace() && *b != 0xEF && *b != 0xBB && *b != 0xBF)?;
        if first == b'[' {
            return Some(Self::Json);
        }

        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut record = RawRecord::new().with("a", "1").with("b", 2);
        record.insert("a", "3");

        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get_text("a"), Some("3".to_string()));
    }

    #[test]
    fn test_number_display() {
        assert_eq!(FieldValue::Number(50.0).to_string(), "50");
        assert_eq!(FieldValue::Number(543.38).to_string(), "543.38");
    }

    #[test]
    fn test_json_preserves_field_order_and_skips_nulls() {
        let record: RawRecord =
            serde_json::from_str(r#"{"z": "last?", "a": 1, "gone": null, "flag": true}"#).unwrap();

        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["z", "a", "flag"]);
        assert_eq!(record.get("a"), Some(&FieldValue::Number(1.0)));
        assert_eq!(record.get_text("flag"), Some("true".to_string()));

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.starts_with(r#"{"z":"last?","a":1"#));
    }

    #[test]
    fn test_record_date_iso_day() {
        let day = RecordDate::Day(NaiveDate::from_ymd_opt(2025, 1, 13).unwrap());
        assert_eq!(day.iso_day(), Some("2025-01-13".to_string()));
        assert_eq!(RecordDate::Invalid.iso_day(), None);
    }

    #[test]
    fn test_source_format_detection() {
        assert_eq!(
            SourceFormat::from_magic(&[0x50, 0x4B, 0x03, 0x04, 0, 0]),
            Some(SourceFormat::Xlsx)
        );
        assert_eq!(SourceFormat::from_magic(b"  \n[{}]"), Some(SourceFormat::Json));
        assert_eq!(
            SourceFormat::from_magic(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]),
            None
        );
        assert_eq!(SourceFormat::from_extension("XLSX"), Some(SourceFormat::Xlsx));
        assert_eq!(SourceFormat::from_extension("xls"), None);
    }
}
