//! Dashboard view model and terminal rendering.
//!
//! Stat cards, usage history bars, carbon intensity sparkline and the
//! "smart analysis" panel, derived from a sorted report.

use std::fmt;

use super::report::{average_kwh, peak_kwh};
use crate::gateway::ReportEntry;

/// Advice shown when the report carries no recommendation
pub const DEFAULT_RECOMMENDATION: &str =
    "Data trend looks healthy. Continue monitoring consumption peaks during morning hours.";

const BAR_WIDTH: usize = 32;
const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// What the dashboard area shows
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    /// No property selected; nothing is fetched
    NoProperty,
    /// First fetch still outstanding
    Loading,
    Ready(ReportView),
}

/// One bar of the usage history chart
#[derive(Debug, Clone, PartialEq)]
pub struct UsageBar {
    pub label: String,
    pub kwh: f64,
    pub high: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportView {
    pub property_id: String,
    pub last_reading_kwh: f64,
    pub carbon_score: Option<f64>,
    pub status: String,
    pub status_is_red: bool,
    pub usage: Vec<UsageBar>,
    pub carbon_series: Vec<f64>,
    pub readings: usize,
    pub average_kwh: Option<f64>,
    pub peak_kwh: Option<f64>,
    pub recommendation: String,
}

impl ReportView {
    /// Build the view from entries already sorted ascending by creation time
    pub fn from_sorted(property_id: &str, entries: &[ReportEntry], high_usage_kwh: f64) -> Self {
        let latest = entries.last();

        let usage = entries
            .iter()
            .map(|e| UsageBar {
                label: e.created_at.format("%b %d").to_string(),
                kwh: e.kwh_used,
                high: e.kwh_used > high_usage_kwh,
            })
            .collect();

        let recommendation = latest
            .map(|e| e.recommendation_message.trim())
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_RECOMMENDATION)
            .to_string();

        let status = latest.and_then(|e| e.status.as_ref());

        Self {
            property_id: property_id.to_string(),
            last_reading_kwh: latest.map(|e| e.kwh_used).unwrap_or(0.0),
            carbon_score: latest.map(|e| e.carbon_score),
            status: status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "STABLE".to_string()),
            status_is_red: status.map(|s| s.is_red()).unwrap_or(false),
            usage,
            carbon_series: entries.iter().map(|e| e.carbon_score).collect(),
            readings: entries.len(),
            average_kwh: average_kwh(entries),
            peak_kwh: peak_kwh(entries),
            recommendation,
        }
    }

    fn render_cards(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let carbon = self
            .carbon_score
            .map(|c| format!("{:.1}", c))
            .unwrap_or_else(|| "N/A".to_string());
        let status = if self.status_is_red {
            format!("[!] {}", self.status)
        } else {
            self.status.clone()
        };

        writeln!(
            f,
            "  Last Reading: {} kWh   |   Carbon Score: {}   |   Current Status: {}",
            trim_number(self.last_reading_kwh),
            carbon,
            status
        )
    }

    fn render_usage(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Usage History")?;
        if self.usage.is_empty() {
            return writeln!(f, "    (no readings yet)");
        }

        let max = self.usage.iter().map(|b| b.kwh).fold(0.0_f64, f64::max);
        for bar in &self.usage {
            let len = if max > 0.0 {
                ((bar.kwh / max) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            let glyph = if bar.high { '▓' } else { '░' };
            writeln!(
                f,
                "    {:<7} {:<width$} {}{}",
                bar.label,
                std::iter::repeat(glyph).take(len).collect::<String>(),
                trim_number(bar.kwh),
                if bar.high { " !" } else { "" },
                width = BAR_WIDTH
            )?;
        }
        Ok(())
    }

    fn render_carbon(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Carbon Intensity")?;
        writeln!(f, "    {}", sparkline(&self.carbon_series))
    }

    fn render_analysis(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Smart Analysis")?;
        writeln!(
            f,
            "    Based on your last {} readings, our system suggests:",
            self.readings
        )?;
        writeln!(f, "    \"{}\"", self.recommendation)
    }
}

impl fmt::Display for ReportView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Property {}", self.property_id)?;
        self.render_cards(f)?;
        writeln!(f)?;
        self.render_usage(f)?;
        if let (Some(avg), Some(peak)) = (self.average_kwh, self.peak_kwh) {
            writeln!(f, "    avg {:.1} kWh, peak {} kWh", avg, trim_number(peak))?;
        }
        writeln!(f)?;
        self.render_carbon(f)?;
        writeln!(f)?;
        self.render_analysis(f)
    }
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardView::NoProperty => writeln!(
                f,
                "Dashboard unavailable: no property selected. Register one with `add-property`."
            ),
            DashboardView::Loading => writeln!(f, "Fetching Energy Profile..."),
            DashboardView::Ready(view) => write!(f, "{}", view),
        }
    }
}

/// Render a series as a unicode sparkline
pub fn sparkline(series: &[f64]) -> String {
    if series.is_empty() {
        return "(no data)".to_string();
    }

    let min = series.iter().copied().fold(f64::INFINITY, f64::min);
    let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    series
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                SPARK[SPARK.len() / 2]
            } else {
                let idx = (((v - min) / span) * (SPARK.len() - 1) as f64).round() as usize;
                SPARK[idx.min(SPARK.len() - 1)]
            }
        })
        .collect()
}

fn trim_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.1}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ReportStatus;
    use chrono::{TimeZone, Utc};

    fn entry(day: u32, kwh: f64, status: Option<ReportStatus>, message: &str) -> ReportEntry {
        ReportEntry {
            created_at: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
            kwh_used: kwh,
            carbon_score: kwh / 4.0,
            status,
            recommendation_message: message.to_string(),
            reading_date: None,
            id: None,
        }
    }

    #[test]
    fn test_empty_report_defaults() {
        let view = ReportView::from_sorted("P1", &[], 50.0);
        assert_eq!(view.last_reading_kwh, 0.0);
        assert_eq!(view.carbon_score, None);
        assert_eq!(view.status, "STABLE");
        assert_eq!(view.recommendation, DEFAULT_RECOMMENDATION);

        let text = view.to_string();
        assert!(text.contains("Carbon Score: N/A"));
        assert!(text.contains("(no readings yet)"));
    }

    #[test]
    fn test_latest_entry_drives_cards() {
        let entries = vec![
            entry(1, 20.0, None, "old advice"),
            entry(2, 80.0, Some(ReportStatus::Red), "Shift laundry to off-peak hours"),
        ];
        let view = ReportView::from_sorted("P1", &entries, 50.0);

        assert_eq!(view.last_reading_kwh, 80.0);
        assert_eq!(view.carbon_score, Some(20.0));
        assert_eq!(view.status, "RED");
        assert!(view.status_is_red);
        assert_eq!(view.recommendation, "Shift laundry to off-peak hours");
        assert_eq!(view.readings, 2);

        let high: Vec<bool> = view.usage.iter().map(|b| b.high).collect();
        assert_eq!(high, vec![false, true]);

        let text = view.to_string();
        assert!(text.contains("Based on your last 2 readings"));
        assert!(text.contains("[!] RED"));
    }

    #[test]
    fn test_blank_recommendation_falls_back() {
        let entries = vec![entry(1, 20.0, Some(ReportStatus::Other("GREEN".into())), "  ")];
        let view = ReportView::from_sorted("P1", &entries, 50.0);
        assert_eq!(view.recommendation, DEFAULT_RECOMMENDATION);
        assert_eq!(view.status, "GREEN");
    }

    #[test]
    fn test_sparkline() {
        assert_eq!(sparkline(&[]), "(no data)");
        assert_eq!(sparkline(&[1.0, 1.0]), "▅▅");
        assert_eq!(sparkline(&[0.0, 7.0]), "▁█");
    }

    #[test]
    fn test_placeholder_views() {
        assert!(DashboardView::Loading.to_string().contains("Fetching Energy Profile"));
        assert!(DashboardView::NoProperty.to_string().contains("no property selected"));
    }
}
