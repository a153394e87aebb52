//! Shared points counter fed by solved incidents.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::asset::IncidentObserver;

/// Points of the running game. Clones share the same total, so one handle
/// can be registered on every asset while the session reads another.
#[derive(Debug, Clone, Default)]
pub struct Score {
    points: Arc<AtomicU64>,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> u64 {
        self.points.load(Ordering::Relaxed)
    }

    pub fn add_points(&self, points: u64) {
        self.points.fetch_add(points, Ordering::Relaxed);
    }
}

impl IncidentObserver for Score {
    fn on_solving(&mut self, _asset: &str, remaining_pct: u32) {
        self.add_points(u64::from(remaining_pct));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_points() {
        let score = Score::new();
        let mut observer = score.clone();
        observer.on_solving("rack", 42);
        observer.on_incoming("rack");
        score.add_points(8);
        assert_eq!(score.points(), 50);
        assert_eq!(observer.points(), 50);
    }
}
