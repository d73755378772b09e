//! Active and history views over the alert stream.
//!
//! Pure bookkeeping; timers live in [`super::AlertFeed`]. Both views hold
//! `Arc`s to the same enriched alert, newest first.

use std::collections::VecDeque;
use std::sync::Arc;

use super::alert::{AlertId, EnrichedAlert};

/// The two derived views of the alert stream
#[derive(Debug)]
pub struct AlertViews {
    active: VecDeque<Arc<EnrichedAlert>>,
    history: VecDeque<Arc<EnrichedAlert>>,
    active_cap: usize,
    history_cap: Option<usize>,
}

impl AlertViews {
    pub fn new(active_cap: usize, history_cap: Option<usize>) -> Self {
        Self {
            active: VecDeque::with_capacity(active_cap + 1),
            history: VecDeque::new(),
            active_cap,
            history_cap,
        }
    }

    /// Record a new alert in both views.
    ///
    /// Returns the ids pushed out of the active view by the cap. Their
    /// expiry timers are no longer needed.
    pub fn ingest(&mut self, alert: Arc<EnrichedAlert>) -> Vec<AlertId> {
        self.history.push_front(Arc::clone(&alert));
        if let Some(cap) = self.history_cap {
            self.history.truncate(cap);
        }

        self.active.push_front(alert);
        let mut evicted = Vec::new();
        while self.active.len() > self.active_cap {
            if let Some(oldest) = self.active.pop_back() {
                evicted.push(oldest.id);
            }
        }
        evicted
    }

    /// Remove an alert from the active view. Returns false if it was
    /// already gone.
    pub fn expire(&mut self, id: AlertId) -> bool {
        match self.active.iter().position(|a| a.id == id) {
            Some(index) => {
                self.active.remove(index);
                true
            }
            None => false,
        }
    }

    /// Empty the active view, returning the ids that were still shown
    pub fn clear_active(&mut self) -> Vec<AlertId> {
        self.active.drain(..).map(|a| a.id).collect()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn active(&self) -> impl Iterator<Item = &Arc<EnrichedAlert>> {
        self.active.iter()
    }

    pub fn history(&self) -> impl Iterator<Item = &Arc<EnrichedAlert>> {
        self.history.iter()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn active_cap(&self) -> usize {
        self.active_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::alert::{AlertEvent, AlertIdGenerator};

    fn alert(ids: &AlertIdGenerator, n: i64) -> Arc<EnrichedAlert> {
        let event = AlertEvent {
            property_id: format!("P{}", n),
            kwh_used: 60.0 + n as f64,
            carbon_score: 15.0,
            recommendation_message: None,
            timestamp: n,
        };
        Arc::new(EnrichedAlert::new(ids.next_id(), event, "Main St"))
    }

    fn active_timestamps(views: &AlertViews) -> Vec<i64> {
        views.active().map(|a| a.event.timestamp).collect()
    }

    #[test]
    fn test_active_never_exceeds_cap() {
        let ids = AlertIdGenerator::new();
        let mut views = AlertViews::new(3, None);

        for n in 1..=10 {
            views.ingest(alert(&ids, n));
            assert!(views.active_len() <= 3);
            assert_eq!(views.active_len(), (n as usize).min(3));
            assert_eq!(views.history_len(), n as usize);
        }
    }

    #[test]
    fn test_four_alerts_keep_three_newest() {
        let ids = AlertIdGenerator::new();
        let mut views = AlertViews::new(3, None);

        let first = alert(&ids, 1);
        let first_id = first.id;
        assert!(views.ingest(first).is_empty());
        views.ingest(alert(&ids, 2));
        views.ingest(alert(&ids, 3));
        let evicted = views.ingest(alert(&ids, 4));

        assert_eq!(evicted, vec![first_id]);
        assert_eq!(active_timestamps(&views), vec![4, 3, 2]);
        let history: Vec<i64> = views.history().map(|a| a.event.timestamp).collect();
        assert_eq!(history, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_expire_after_eviction_is_noop() {
        let ids = AlertIdGenerator::new();
        let mut views = AlertViews::new(3, None);

        let first = alert(&ids, 1);
        let first_id = first.id;
        views.ingest(first);
        for n in 2..=4 {
            views.ingest(alert(&ids, n));
        }

        assert!(!views.expire(first_id));
        assert_eq!(active_timestamps(&views), vec![4, 3, 2]);
        assert_eq!(views.history_len(), 4);
    }

    #[test]
    fn test_expire_removes_by_identity() {
        let ids = AlertIdGenerator::new();
        let mut views = AlertViews::new(3, None);

        views.ingest(alert(&ids, 1));
        let middle = alert(&ids, 2);
        let middle_id = middle.id;
        views.ingest(middle);
        views.ingest(alert(&ids, 3));

        assert!(views.expire(middle_id));
        assert_eq!(active_timestamps(&views), vec![3, 1]);
        assert!(!views.expire(middle_id));
        assert_eq!(views.history_len(), 3);
    }

    #[test]
    fn test_history_cap_is_optional() {
        let ids = AlertIdGenerator::new();
        let mut views = AlertViews::new(3, Some(2));
        for n in 1..=5 {
            views.ingest(alert(&ids, n));
        }
        let history: Vec<i64> = views.history().map(|a| a.event.timestamp).collect();
        assert_eq!(history, vec![5, 4]);
    }

    #[test]
    fn test_clear_active_returns_ids() {
        let ids = AlertIdGenerator::new();
        let mut views = AlertViews::new(3, None);
        views.ingest(alert(&ids, 1));
        views.ingest(alert(&ids, 2));

        let cleared = views.clear_active();
        assert_eq!(cleared.len(), 2);
        assert_eq!(views.active_len(), 0);
        assert_eq!(views.history_len(), 2);

        views.clear_history();
        assert_eq!(views.history_len(), 0);
    }
}
