use crate::crawler::Rejection;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Outcome counters for one crawl, shared by every task
#[derive(Debug, Default)]
pub struct CrawlCounters {
    yielded: AtomicUsize,
    seeded: AtomicU64,
    discovered: AtomicU64,
    admitted: AtomicU64,
    blocked: AtomicU64,
    http_errors: AtomicU64,
    low_value: AtomicU64,
    failed: AtomicU64,
    robots_denied: AtomicU64,
    rejections: Mutex<BTreeMap<&'static str, u64>>,
}

/// Point-in-time copy of [`CrawlCounters`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlCountersSnapshot {
    pub yielded: u64,
    pub seeded: u64,
    pub discovered: u64,
    pub admitted: u64,
    pub blocked: u64,
    pub http_errors: u64,
    pub low_value: u64,
    pub failed: u64,
    pub robots_denied: u64,

    /// Admission rejections keyed by reason
    pub rejections: BTreeMap<String, u64>,
}

impl CrawlCounters {
    pub fn yielded(&self) -> usize {
        self.yielded.load(Ordering::SeqCst)
    }

    pub fn record_yield(&self) -> usize {
        self.yielded.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_seed(&self) {
        self.seeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discovered(&self) {
        self.discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_error(&self) {
        self.http_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_low_value(&self) {
        self.low_value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_robots_denied(&self) {
        self.robots_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, rejection: &Rejection) {
        if let Ok(mut rejections) = self.rejections.lock() {
            *rejections.entry(rejection.as_str()).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> CrawlCountersSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CrawlCountersSnapshot {
            yielded: self.yielded() as u64,
            seeded: load(&self.seeded),
            discovered: load(&self.discovered),
            admitted: load(&self.admitted),
            blocked: load(&self.blocked),
            http_errors: load(&self.http_errors),
            low_value: load(&self.low_value),
            failed: load(&self.failed),
            robots_denied: load(&self.robots_denied),
            rejections: self
                .rejections
                .lock()
                .map(|r| r.iter().map(|(k, v)| (k.to_string(), *v)).collect())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let counters = CrawlCounters::default();
        counters.record_yield();
        assert_eq!(counters.record_yield(), 2);
        counters.record_blocked();
        counters.record_rejection(&Rejection::Visited);
        counters.record_rejection(&Rejection::Locale("locale:de".to_string()));
        counters.record_rejection(&Rejection::Locale("locale:fr".to_string()));

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.yielded, 2);
        assert_eq!(snapshot.blocked, 1);
        assert_eq!(snapshot.rejections.get("visited"), Some(&1));
        assert_eq!(snapshot.rejections.get("locale"), Some(&2));
    }
}
