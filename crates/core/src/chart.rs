//! Chart series and the rendering surface seam.

use serde::{Deserialize, Serialize};

/// Chart ids drawn on the dashboard.
pub mod ids {
    pub const TREND: &str = "trendChart";
    pub const STATUS: &str = "statusChart";
    pub const REGION: &str = "regionChart";
    pub const PAYMENT_TYPE: &str = "typeChart";
    pub const REVENUE_BY_LOCATION: &str = "chartRevenueByLocation";
}

/// Visual type of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Doughnut,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Pie => "pie",
            Self::Doughnut => "doughnut",
        }
    }
}

/// One category of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub category: String,
    pub value: f64,
}

/// A labelled, ordered sequence of points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartSeries {
    pub label: String,
    pub points: Vec<SeriesPoint>,
}

impl ChartSeries {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            points: Vec::new(),
        }
    }

    pub fn push(&mut self, category: impl Into<String>, value: f64) {
        self.points.push(SeriesPoint {
            category: category.into(),
            value,
        });
    }

    pub fn categories(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.category.as_str()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Value of a category, if present.
    pub fn value_of(&self, category: &str) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.category == category)
            .map(|p| p.value)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A chart to draw: where, how, and with which data.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChartSpec<'a> {
    pub id: &'static str,
    pub kind: ChartKind,
    pub series: &'a ChartSeries,
}

/// Something that can draw charts by id.
///
/// Handles are owned by the caller's chart registry and must be passed back
/// to [`ChartSurface::destroy`] before the same id is drawn again.
pub trait ChartSurface {
    type Handle;

    /// Whether the surface has a place to draw this chart.
    fn has_target(&self, id: &str) -> bool;

    /// Draw a chart and return a handle to the new widget.
    fn draw(&mut self, id: &str, kind: ChartKind, series: &ChartSeries) -> Self::Handle;

    /// Release a widget previously returned by `draw`.
    fn destroy(&mut self, handle: Self::Handle);
}

/// A surface that draws nothing, for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl ChartSurface for NullSurface {
    type Handle = ();

    fn has_target(&self, _id: &str) -> bool {
        false
    }

    fn draw(&mut self, _id: &str, _kind: ChartKind, _series: &ChartSeries) {}

    fn destroy(&mut self, _handle: ()) {}
}
