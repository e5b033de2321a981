//! Redaction of financial fields before a dataset leaves the internal view.
//!
//! Matching is by substring on the case-folded field name, so the policy
//! over-redacts: `service_charge_notes` goes too. A financial column whose
//! name contains none of the keywords (say `GBP`) is not caught.

use crate::types::RawRecord;
use unicode_normalization::UnicodeNormalization;

/// Derived field holding the parsed revenue.
pub const DERIVED_REVENUE_FIELD: &str = "_revenue";

/// Field name fragments that mark a column as financial.
pub const SENSITIVE_KEYWORDS: [&str; 8] = [
    "totals",
    "revenue",
    "price",
    "cost",
    "invoice_amount",
    "amount",
    "fee",
    "charge",
];

/// Fold a field name for keyword matching: NFKC, then lowercase.
fn fold_key(key: &str) -> String {
    key.nfkc().collect::<String>().to_lowercase()
}

/// Strips derived and sensitive fields from raw records.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    derived_fields: Vec<String>,
    keywords: Vec<String>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            derived_fields: vec![DERIVED_REVENUE_FIELD.to_string()],
            keywords: SENSITIVE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl Sanitizer {
    /// Create a sanitizer with the standard keyword list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also redact fields containing this keyword.
    pub fn with_keyword(mut self, keyword: impl AsRef<str>) -> Self {
        let folded = fold_key(keyword.as_ref());
        if !folded.is_empty() && !self.keywords.contains(&folded) {
            self.keywords.push(folded);
        }
        self
    }

    /// Keywords in match order.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Whether a field name contains any sensitive keyword.
    ///
    /// Both the plain lowercase name and its NFKC fold are checked. NFKC
    /// can compose a keyword's last letter with a trailing combining mark,
    /// so the fold alone may only widen the match, never replace it.
    pub fn is_sensitive(&self, key: &str) -> bool {
        let lower = key.to_lowercase();
        let folded = fold_key(key);
        self.keywords
            .iter()
            .any(|k| lower.contains(k.as_str()) || folded.contains(k.as_str()))
    }

    /// Redact one record.
    ///
    /// Derived fields are dropped by exact name first, then every field
    /// matching a keyword.
    pub fn sanitize_record(&self, record: &RawRecord) -> RawRecord {
        let mut clean = record.clone();
        for derived in &self.derived_fields {
            clean.remove(derived);
        }
        clean.retain(|key, _| !self.is_sensitive(key));
        clean
    }

    /// Redact every record, preserving order.
    pub fn sanitize(&self, records: &[RawRecord]) -> Vec<RawRecord> {
        let clean: Vec<RawRecord> = records.iter().map(|r| self.sanitize_record(r)).collect();

        let removed: usize = records
            .iter()
            .zip(&clean)
            .map(|(before, after)| before.len() - after.len())
            .sum();
        log::debug!(
            "Sanitized {} records, removed {} fields",
            records.len(),
            removed
        );

        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::sample_records;

    fn assert_clean(sanitizer: &Sanitizer, record: &RawRecord) {
        assert!(!record.contains_key(DERIVED_REVENUE_FIELD));
        for key in record.keys() {
            let lower = key.to_lowercase();
            for keyword in SENSITIVE_KEYWORDS {
                assert!(!lower.contains(keyword), "{key} survived redaction");
            }
            assert!(!sanitizer.is_sensitive(key));
        }
    }

    #[test]
    fn test_export_scenario() {
        let record = RawRecord::new()
            .with("totals", "£10")
            .with("invoice_amount", "£5")
            .with("date", "01/01/2025");

        let clean = Sanitizer::new().sanitize_record(&record);

        assert_eq!(clean, RawRecord::new().with("date", "01/01/2025"));
    }

    #[test]
    fn test_removes_derived_revenue_field() {
        let record = RawRecord::new()
            .with("_revenue", 543.38)
            .with("Region", "Ilford");

        let clean = Sanitizer::new().sanitize_record(&record);
        assert_eq!(clean.keys().collect::<Vec<_>>(), vec!["Region"]);
    }

    #[test]
    fn test_substring_match_over_redacts() {
        let sanitizer = Sanitizer::new();

        assert!(sanitizer.is_sensitive("service_charge_notes"));
        assert!(sanitizer.is_sensitive("Unit Price"));
        assert!(sanitizer.is_sensitive("COST_CENTRE"));
        assert!(sanitizer.is_sensitive("feedback"));
        assert!(!sanitizer.is_sensitive("GBP"));
        assert!(!sanitizer.is_sensitive("Region"));
    }

    #[test]
    fn test_case_and_compatibility_folding() {
        let sanitizer = Sanitizer::new();

        assert!(sanitizer.is_sensitive("TOTALS"));
        assert!(sanitizer.is_sensitive("Invoice_Amount"));
        // Full-width letters fold to ASCII under NFKC.
        assert!(sanitizer.is_sensitive("ＴＯＴＡＬＳ"));
    }

    #[test]
    fn test_passes_through_non_financial_fields_in_order() {
        let record = RawRecord::new()
            .with("date", "13/01/2025")
            .with("Amount Paid", "£3")
            .with("status", "Booked")
            .with("Region", "Ilford")
            .with("Corporate Or Self Pay", "Corporate");

        let clean = Sanitizer::new().sanitize_record(&record);

        assert_eq!(
            clean.keys().collect::<Vec<_>>(),
            vec!["date", "status", "Region", "Corporate Or Self Pay"]
        );
        assert_eq!(clean.get_text("status"), Some("Booked".to_string()));
    }

    #[test]
    fn test_no_sensitive_key_survives() {
        let keys = [
            "totals", "Totals", "sub_totals", "revenue", "_revenue", "Revenue GBP", "price",
            "PriceList", "cost", "Costing", "invoice_amount", "amount", "AMOUNT_DUE", "fee",
            "Fees", "charge", "Surcharge", "date", "status", "Region", "Age", "first_name",
            "notes", "", "ＡＭＯＵＮＴ", "totals\u{0301}", "Fee\u{0301}s", "Price\u{0327}",
            "sub_cost\u{0308}_centre",
        ];
        let record: RawRecord = keys.iter().map(|k| (*k, "x")).collect();
        let sanitizer = Sanitizer::new();

        let clean = sanitizer.sanitize(&[record.clone(), RawRecord::new(), record]);

        assert_eq!(clean.len(), 3);
        for r in &clean {
            assert_clean(&sanitizer, r);
        }
        assert_eq!(
            clean[0].keys().collect::<Vec<_>>(),
            vec!["date", "status", "Region", "Age", "first_name", "notes", ""]
        );
    }

    #[test]
    fn test_combining_marks_do_not_hide_keywords() {
        let record = RawRecord::new()
            .with("totals\u{0301}", "£543.38")
            .with("Fee\u{0301}s", "£5")
            .with("date", "01/01/2025");

        let clean = Sanitizer::new().sanitize_record(&record);

        assert_eq!(clean.keys().collect::<Vec<_>>(), vec!["date"]);
    }

    #[test]
    fn test_sample_records_lose_totals_only() {
        let sanitizer = Sanitizer::new();
        for (before, after) in sample_records().iter().zip(sanitizer.sanitize(&sample_records())) {
            assert_eq!(after.len(), before.len() - 1);
            assert!(!after.contains_key("totals"));
            assert_clean(&sanitizer, &after);
        }
    }

    #[test]
    fn test_extra_keyword() {
        let sanitizer = Sanitizer::new().with_keyword("GBP");
        assert!(sanitizer.is_sensitive("gbp"));
        assert_eq!(sanitizer.keywords().len(), 9);
    }

    #[test]
    fn test_empty_dataset() {
        assert!(Sanitizer::new().sanitize(&[]).is_empty());
    }
}
