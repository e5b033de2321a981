//! Presentation mode: slide selection per audience and slide navigation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every chart that can be presented, in slide order.
pub const SLIDE_CATALOG: [&str; 12] = [
    "chartSelfPayOrigin",
    "chartAgeProduct",
    "chartStackedProdLocation",
    "chartRevenueByLocation",
    "chartProductDistribution",
    "chartSexDistribution",
    "chartProcessStatus",
    "chartBookingType",
    "chartProductPaymentRatio",
    "chartTopClients",
    "chartTopPostcodes",
    "chartRevByMonth",
];

/// Charts hidden from client audiences.
pub const FINANCIAL_SLIDES: [&str; 3] = [
    "chartRevenueByLocation",
    "chartProductPaymentRatio",
    "chartRevByMonth",
];

/// Who the presentation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudienceMode {
    /// Full catalog.
    Internal,
    /// Catalog without financial charts.
    Client,
}

impl FromStr for AudienceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "internal" => Ok(Self::Internal),
            "client" => Ok(Self::Client),
            other => Err(format!("Unknown presentation mode: {}", other)),
        }
    }
}

impl fmt::Display for AudienceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => f.write_str("internal"),
            Self::Client => f.write_str("client"),
        }
    }
}

/// Whether a chart id is in the financial set.
pub fn is_financial(id: &str) -> bool {
    FINANCIAL_SLIDES.contains(&id)
}

/// Ordered slide ids for an audience.
pub fn select_slides(mode: AudienceMode) -> Vec<&'static str> {
    match mode {
        AudienceMode::Internal => SLIDE_CATALOG.to_vec(),
        AudienceMode::Client => SLIDE_CATALOG
            .iter()
            .copied()
            .filter(|id| !is_financial(id))
            .collect(),
    }
}

/// Human title for a chart id, e.g. `chartRevByMonth` -> `Rev By Month`.
pub fn slide_title(id: &str) -> String {
    let name = id.replacen("chart", "", 1);
    let mut title = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            title.push(' ');
        }
        title.push(c);
    }
    title.trim().to_string()
}

/// A slideshow over a fixed list of chart ids.
///
/// Navigation clamps at both ends; moving past an end is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideDeck {
    mode: AudienceMode,
    slides: Vec<&'static str>,
    index: usize,
}

impl SlideDeck {
    /// Start a deck for an audience at the first slide.
    pub fn new(mode: AudienceMode) -> Self {
        Self::from_slides(mode, select_slides(mode))
    }

    /// Start a deck over an explicit slide list.
    pub fn from_slides(mode: AudienceMode, slides: Vec<&'static str>) -> Self {
        Self {
            mode,
            slides,
            index: 0,
        }
    }

    pub fn mode(&self) -> AudienceMode {
        self.mode
    }

    pub fn slides(&self) -> &[&'static str] {
        &self.slides
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// Current 0-based position.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current chart id, `None` for an empty deck.
    pub fn current(&self) -> Option<&'static str> {
        self.slides.get(self.index).copied()
    }

    /// Advance one slide, stopping at the last.
    pub fn next(&mut self) -> usize {
        if self.index + 1 < self.slides.len() {
            self.index += 1;
        }
        self.index
    }

    /// Go back one slide, stopping at the first.
    pub fn prev(&mut self) -> usize {
        self.index = self.index.saturating_sub(1);
        self.index
    }

    /// Jump to a slide. Out-of-range positions are ignored.
    pub fn go_to(&mut self, index: usize) -> usize {
        if index < self.slides.len() {
            self.index = index;
        }
        self.index
    }

    /// Position label such as `3 / 9`.
    pub fn counter_label(&self) -> String {
        if self.slides.is_empty() {
            return "0 / 0".to_string();
        }
        format!("{} / {}", self.index + 1, self.slides.len())
    }

    /// Title of the current slide.
    pub fn current_title(&self) -> Option<String> {
        self.current().map(slide_title)
    }
}

/// What a slide shows once rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideFrame {
    pub counter: String,
    pub title: String,
    pub chart_id: &'static str,
    /// False when the chart has not been drawn; the frame shows a
    /// "Chart not found" placeholder instead.
    pub chart_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_is_full_catalog() {
        let slides = select_slides(AudienceMode::Internal);
        assert_eq!(slides.len(), 12);
        assert_eq!(slides, SLIDE_CATALOG.to_vec());
    }

    #[test]
    fn test_client_excludes_financial_slides() {
        let internal = select_slides(AudienceMode::Internal);
        let client = select_slides(AudienceMode::Client);

        assert_eq!(client.len(), internal.len() - 3);
        for id in FINANCIAL_SLIDES {
            assert!(!client.contains(&id), "{id} should be hidden");
        }
    }

    #[test]
    fn test_client_preserves_relative_order() {
        let internal = select_slides(AudienceMode::Internal);
        let client = select_slides(AudienceMode::Client);

        let positions: Vec<usize> = client
            .iter()
            .map(|id| internal.iter().position(|i| i == id).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_audience_mode_parsing() {
        assert_eq!("client".parse::<AudienceMode>(), Ok(AudienceMode::Client));
        assert_eq!(" Internal ".parse::<AudienceMode>(), Ok(AudienceMode::Internal));
        assert!("public".parse::<AudienceMode>().is_err());
        assert_eq!(AudienceMode::Client.to_string(), "client");
    }

    #[test]
    fn test_slide_title() {
        assert_eq!(slide_title("chartRevByMonth"), "Rev By Month");
        assert_eq!(slide_title("chartSelfPayOrigin"), "Self Pay Origin");
        assert_eq!(slide_title("trendChart"), "trend Chart");
    }

    #[test]
    fn test_navigation_clamps_at_both_ends() {
        let mut deck = SlideDeck::new(AudienceMode::Client);
        assert_eq!(deck.index(), 0);

        assert_eq!(deck.prev(), 0);
        for _ in 0..20 {
            deck.next();
        }
        assert_eq!(deck.index(), 8);
        assert_eq!(deck.counter_label(), "9 / 9");

        assert_eq!(deck.prev(), 7);
        assert_eq!(deck.counter_label(), "8 / 9");
    }

    #[test]
    fn test_go_to_out_of_range_is_noop() {
        let mut deck = SlideDeck::new(AudienceMode::Internal);
        deck.go_to(3);
        assert_eq!(deck.current(), Some("chartRevenueByLocation"));
        assert_eq!(deck.go_to(12), 3);
    }

    #[test]
    fn test_empty_deck() {
        let mut deck = SlideDeck::from_slides(AudienceMode::Client, Vec::new());
        assert_eq!(deck.next(), 0);
        assert_eq!(deck.prev(), 0);
        assert_eq!(deck.current(), None);
        assert_eq!(deck.counter_label(), "0 / 0");
    }
}
