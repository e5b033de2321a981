//! JSON row ingestion.

use crate::error::{Error, Result};
use crate::types::RawRecord;

/// Parse a JSON array of row objects.
pub fn records_from_json(text: &str) -> Result<Vec<RawRecord>> {
    let text = text.trim_start_matches('\u{feff}');
    serde_json::from_str(text).map_err(|e| Error::JsonError(format!("Invalid row data: {}", e)))
}

/// Parse JSON rows from raw bytes.
pub fn records_from_json_bytes(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::JsonError(format!("Row data is not UTF-8: {}", e)))?;
    records_from_json(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldValue;

    #[test]
    fn test_records_from_json() {
        let rows = records_from_json(
            r#"[{"date": "13/01/2025", "totals": "£543.38", "Age": 50}, {}]"#,
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Age"), Some(&FieldValue::Number(50.0)));
        assert!(rows[1].is_empty());
    }

    #[test]
    fn test_rejects_non_array() {
        assert!(matches!(
            records_from_json(r#"{"date": "x"}"#),
            Err(Error::JsonError(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        assert!(records_from_json_bytes(&[b'[', 0xFF, b']']).is_err());
    }
}
