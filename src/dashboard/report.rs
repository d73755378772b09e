//! Report ordering and summary figures.

use crate::gateway::ReportEntry;

/// Sort entries ascending by creation time.
///
/// The gateway's ordering is not trusted. The sort is stable, so entries
/// with equal timestamps keep their server order.
pub fn sort_by_creation(entries: &mut [ReportEntry]) {
    entries.sort_by_key(|e| e.created_at);
}

/// Mean consumption over the report, if it has entries
pub fn average_kwh(entries: &[ReportEntry]) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }
    Some(entries.iter().map(|e| e.kwh_used).sum::<f64>() / entries.len() as f64)
}

/// Highest single reading
pub fn peak_kwh(entries: &[ReportEntry]) -> Option<f64> {
    entries
        .iter()
        .map(|e| e.kwh_used)
        .fold(None, |max, v| Some(max.map_or(v, |m: f64| m.max(v))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(day: u32, kwh: f64) -> ReportEntry {
        ReportEntry {
            created_at: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
            kwh_used: kwh,
            carbon_score: kwh / 4.0,
            status: None,
            recommendation_message: String::new(),
            reading_date: None,
            id: None,
        }
    }

    #[test]
    fn test_sort_ascending_from_any_order() {
        let mut entries = vec![entry(3, 30.0), entry(1, 10.0), entry(4, 40.0), entry(2, 20.0)];
        sort_by_creation(&mut entries);

        let days: Vec<f64> = entries.iter().map(|e| e.kwh_used).collect();
        assert_eq!(days, vec![10.0, 20.0, 30.0, 40.0]);
        assert!(entries.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut entries = vec![entry(2, 1.0), entry(1, 5.0), entry(2, 2.0)];
        sort_by_creation(&mut entries);
        let kwh: Vec<f64> = entries.iter().map(|e| e.kwh_used).collect();
        assert_eq!(kwh, vec![5.0, 1.0, 2.0]);
    }

    #[test]
    fn test_summary_figures() {
        let entries = vec![entry(1, 10.0), entry(2, 30.0)];
        assert_eq!(average_kwh(&entries), Some(20.0));
        assert_eq!(peak_kwh(&entries), Some(30.0));
        assert_eq!(average_kwh(&[]), None);
        assert_eq!(peak_kwh(&[]), None);
    }
}
