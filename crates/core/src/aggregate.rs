//! KPI and chart aggregation over canonical records.

use crate::chart::{ids, ChartKind, ChartSeries, ChartSpec};
use crate::format::format_amount_cell;
use crate::normalize::FieldMap;
use crate::types::CanonicalRecord;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Payment category labels counted on the KPI tiles.
pub const CORPORATE: &str = "corporate";
pub const SELF_PAY: &str = "self pay";
pub const CORPORATE_FLEX: &str = "corporate flex";

/// Scalar KPI values.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Kpis {
    pub total_count: usize,
    pub total_revenue: f64,
    /// Mean revenue per record, 0 for an empty dataset.
    pub average_revenue: f64,
    pub unique_region_count: usize,
    pub corporate_count: usize,
    pub self_pay_count: usize,
    pub corporate_flex_count: usize,
}

/// A row of the recent bookings table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub date: String,
    pub name: String,
    pub status: String,
    pub payment_type: String,
    pub revenue: String,
}

/// Everything the dashboard shows for one dataset.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DashboardSummary {
    pub kpis: Kpis,
    pub daily_bookings: ChartSeries,
    pub status_distribution: ChartSeries,
    pub payment_type_distribution: ChartSeries,
    pub top_regions_by_count: ChartSeries,
    pub top_regions_by_revenue: ChartSeries,
    pub recent_rows: Vec<TableRow>,
}

impl DashboardSummary {
    /// The charts of the dashboard, in drawing order.
    pub fn charts(&self) -> Vec<ChartSpec<'_>> {
        vec![
            ChartSpec {
                id: ids::TREND,
                kind: ChartKind::Line,
                series: &self.daily_bookings,
            },
            ChartSpec {
                id: ids::STATUS,
                kind: ChartKind::Doughnut,
                series: &self.status_distribution,
            },
            ChartSpec {
                id: ids::REGION,
                kind: ChartKind::Bar,
                series: &self.top_regions_by_count,
            },
            ChartSpec {
                id: ids::PAYMENT_TYPE,
                kind: ChartKind::Pie,
                series: &self.payment_type_distribution,
            },
            ChartSpec {
                id: ids::REVENUE_BY_LOCATION,
                kind: ChartKind::Bar,
                series: &self.top_regions_by_revenue,
            },
        ]
    }
}

/// Sums keyed by category, remembering first-seen order.
#[derive(Debug, Default)]
struct OrderedTally {
    index: HashMap<String, usize>,
    entries: Vec<(String, f64)>,
}

impl OrderedTally {
    fn add(&mut self, key: &str, amount: f64) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += amount,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), amount));
            }
        }
    }

    fn into_series(self, label: &str) -> ChartSeries {
        let mut series = ChartSeries::new(label);
        for (category, value) in self.entries {
            series.push(category, value);
        }
        series
    }

    /// Largest `n` entries, descending. Ties keep first-seen order.
    fn into_top_series(mut self, label: &str, n: usize) -> ChartSeries {
        self.entries
            .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        self.entries.truncate(n);
        self.into_series(label)
    }
}

/// Computes a [`DashboardSummary`] from canonical records.
#[derive(Debug, Clone)]
pub struct Aggregator {
    top_n: usize,
    recent_rows: usize,
    fields: FieldMap,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            top_n: 10,
            recent_rows: 10,
            fields: FieldMap::default(),
        }
    }
}

impl Aggregator {
    /// Create an aggregator with top-10 region series and a 10-row table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the length of the top-N region series.
    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    /// Set the number of rows in the recent bookings table.
    pub fn with_recent_rows(mut self, n: usize) -> Self {
        self.recent_rows = n;
        self
    }

    /// Columns used for the name and date cells of the table.
    pub fn with_fields(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    /// Aggregate records. Pure: the input is only read.
    pub fn aggregate(&self, records: &[CanonicalRecord]) -> DashboardSummary {
        let mut total_revenue = 0.0;
        let mut regions: HashSet<&str> = HashSet::new();
        let mut corporate_count = 0;
        let mut self_pay_count = 0;
        let mut corporate_flex_count = 0;
        let mut daily: BTreeMap<String, f64> = BTreeMap::new();
        let mut statuses = OrderedTally::default();
        let mut payment_types = OrderedTally::default();
        let mut region_counts = OrderedTally::default();
        let mut region_revenue = OrderedTally::default();

        for record in records {
            total_revenue += record.revenue;
            regions.insert(record.region.as_str());

            match record.payment_category.as_str() {
                CORPORATE => corporate_count += 1,
                SELF_PAY => self_pay_count += 1,
                CORPORATE_FLEX => corporate_flex_count += 1,
                _ => {}
            }

            if let Some(day) = record.date.and_then(|d| d.iso_day()) {
                *daily.entry(day).or_insert(0.0) += 1.0;
            }

            statuses.add(&record.status, 1.0);
            payment_types.add(&record.payment_type, 1.0);
            region_counts.add(&record.region, 1.0);
            region_revenue.add(&record.region, record.revenue);
        }

        let total_count = records.len();
        let average_revenue = if total_count == 0 {
            0.0
        } else {
            total_revenue / total_count as f64
        };

        let mut daily_bookings = ChartSeries::new("Daily Bookings");
        for (day, count) in daily {
            daily_bookings.push(day, count);
        }

        DashboardSummary {
            kpis: Kpis {
                total_count,
                total_revenue,
                average_revenue,
                unique_region_count: regions.len(),
                corporate_count,
                self_pay_count,
                corporate_flex_count,
            },
            daily_bookings,
            status_distribution: statuses.into_series("Status"),
            payment_type_distribution: payment_types.into_series("Payment Type"),
            top_regions_by_count: region_counts.into_top_series("Bookings", self.top_n),
            top_regions_by_revenue: region_revenue.into_top_series("Revenue", self.top_n),
            recent_rows: records
                .iter()
                .take(self.recent_rows)
                .map(|r| self.table_row(r))
                .collect(),
        }
    }

    fn table_row(&self, record: &CanonicalRecord) -> TableRow {
        let name = [&self.fields.first_name, &self.fields.last_name]
            .iter()
            .filter_map(|f| record.raw.get_text(f))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        TableRow {
            date: record
                .raw
                .get_text(&self.fields.date)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "-".to_string()),
            name: if name.is_empty() { "-".to_string() } else { name },
            status: record.status.clone(),
            payment_type: record.payment_type.clone(),
            revenue: format_amount_cell(record.revenue),
        }
    }
}

/// Aggregate with default settings.
pub fn aggregate(records: &[CanonicalRecord]) -> DashboardSummary {
    Aggregator::new().aggregate(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::FieldNormalizer;
    use crate::sample::sample_records;
    use crate::types::RawRecord;

    fn canonical(rows: &[RawRecord]) -> Vec<CanonicalRecord> {
        FieldNormalizer::new().normalize_all(rows)
    }

    fn region_row(region: &str, totals: &str) -> RawRecord {
        RawRecord::new().with("Region", region).with("totals", totals)
    }

    #[test]
    fn test_empty_dataset() {
        let summary = aggregate(&[]);

        assert_eq!(summary.kpis.total_count, 0);
        assert_eq!(summary.kpis.total_revenue, 0.0);
        assert_eq!(summary.kpis.average_revenue, 0.0);
        assert_eq!(summary.kpis.unique_region_count, 0);
        assert!(summary.daily_bookings.is_empty());
        assert!(summary.top_regions_by_revenue.is_empty());
        assert!(summary.recent_rows.is_empty());
    }

    #[test]
    fn test_single_row_scenario() {
        let rows = vec![RawRecord::new()
            .with("date", "13/01/2025")
            .with("totals", "£543.38")
            .with("Age", 50)
            .with("Region", "Ilford")
            .with("corp_or_self", "Corporate")];

        let summary = aggregate(&canonical(&rows));

        assert_eq!(summary.kpis.total_count, 1);
        assert_eq!(summary.kpis.total_revenue, 543.38);
        assert_eq!(summary.kpis.average_revenue, 543.38);
        assert_eq!(summary.kpis.corporate_count, 1);
        assert_eq!(summary.kpis.self_pay_count, 0);
        assert_eq!(summary.daily_bookings.len(), 1);
        assert_eq!(summary.daily_bookings.value_of("2025-01-13"), Some(1.0));
        assert_eq!(summary.top_regions_by_count.categories(), vec!["Ilford"]);
    }

    #[test]
    fn test_sample_dataset_kpis() {
        let summary = aggregate(&canonical(&sample_records()));

        assert_eq!(summary.kpis.total_count, 6);
        assert!((summary.kpis.total_revenue - 1980.14).abs() < 1e-9);
        assert_eq!(summary.kpis.unique_region_count, 4);
        assert_eq!(summary.kpis.corporate_count, 3);
        assert_eq!(summary.kpis.self_pay_count, 2);
        assert_eq!(summary.kpis.corporate_flex_count, 1);
        assert_eq!(
            summary.daily_bookings.categories(),
            vec!["2025-01-13", "2025-01-14", "2025-01-15"]
        );
        assert_eq!(
            summary.status_distribution.categories(),
            vec!["Booked", "Completed", "Cancelled"]
        );
        assert_eq!(summary.status_distribution.values(), vec![4.0, 1.0, 1.0]);
    }

    #[test]
    fn test_daily_series_sorted_and_skips_invalid_dates() {
        let rows = vec![
            RawRecord::new().with("date", "15/01/2025"),
            RawRecord::new().with("date", "32/13/2025"),
            RawRecord::new().with("date", "13/01/2025"),
            RawRecord::new().with("date", "not a date"),
            RawRecord::new(),
            RawRecord::new().with("date", "15/01/2025"),
        ];

        let summary = aggregate(&canonical(&rows));

        assert_eq!(summary.kpis.total_count, 6);
        assert_eq!(summary.daily_bookings.categories(), vec!["2025-01-13", "2025-01-15"]);
        assert_eq!(summary.daily_bookings.values(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_top_regions_ties_keep_first_seen_order() {
        let rows = vec![
            region_row("Leeds", "£10"),
            region_row("York", "£30"),
            region_row("Hull", "£10"),
            region_row("York", "£0"),
            region_row("Leeds", "£20"),
            region_row("Bath", "£30"),
        ];

        let summary = aggregate(&canonical(&rows));

        assert_eq!(
            summary.top_regions_by_count.categories(),
            vec!["Leeds", "York", "Hull", "Bath"]
        );
        assert_eq!(
            summary.top_regions_by_revenue.categories(),
            vec!["Leeds", "York", "Bath", "Hull"]
        );
    }

    #[test]
    fn test_top_regions_truncated() {
        let rows: Vec<RawRecord> = (0..15)
            .map(|i| region_row(&format!("Region {i}"), "£1"))
            .collect();

        let summary = Aggregator::new().with_top_n(10).aggregate(&canonical(&rows));
        assert_eq!(summary.top_regions_by_count.len(), 10);
        assert_eq!(summary.top_regions_by_count.points[0].category, "Region 0");
    }

    #[test]
    fn test_payment_category_is_case_folded() {
        let rows = vec![
            RawRecord::new().with("corp_or_self", "CORPORATE"),
            RawRecord::new().with("corp_or_self", "Self Pay"),
            RawRecord::new().with("corp_or_self", "Corporate Flex"),
            RawRecord::new().with("corp_or_self", "corporate "),
        ];

        let kpis = aggregate(&canonical(&rows)).kpis;
        assert_eq!(kpis.corporate_count, 1);
        assert_eq!(kpis.self_pay_count, 1);
        assert_eq!(kpis.corporate_flex_count, 1);
    }

    #[test]
    fn test_aggregate_is_pure() {
        let records = canonical(&sample_records());
        let before = records.clone();

        let first = aggregate(&records);
        let second = aggregate(&records);

        assert_eq!(first, second);
        assert_eq!(records, before);
    }

    #[test]
    fn test_recent_rows() {
        let summary = aggregate(&canonical(&sample_records()));

        assert_eq!(summary.recent_rows.len(), 6);
        let first = &summary.recent_rows[0];
        assert_eq!(first.date, "13/01/2025");
        assert_eq!(first.name, "Valentin Elsip");
        assert_eq!(first.status, "Booked");
        assert_eq!(first.payment_type, "Corporate");
        assert_eq!(first.revenue, "£543.38");

        let empty = aggregate(&canonical(&[RawRecord::new()]));
        assert_eq!(empty.recent_rows[0].date, "-");
        assert_eq!(empty.recent_rows[0].name, "-");
    }

    #[test]
    fn test_chart_plan() {
        let summary = aggregate(&canonical(&sample_records()));
        let charts = summary.charts();

        let ids: Vec<&str> = charts.iter().map(|c| c.id).collect();
        assert_eq!(
            ids,
            vec![
                "trendChart",
                "statusChart",
                "regionChart",
                "typeChart",
                "chartRevenueByLocation"
            ]
        );
        assert_eq!(charts[0].kind, ChartKind::Line);
        assert_eq!(charts[1].kind, ChartKind::Doughnut);
        assert_eq!(charts[3].kind, ChartKind::Pie);
    }
}
