use crate::engine::StrategyKind;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-strategy outcome counters for one engine
#[derive(Debug, Default)]
pub struct EngineStats {
    successes: [AtomicU64; 3],
    blocks: [AtomicU64; 3],
    failures: [AtomicU64; 3],
    exhausted: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub successes: [u64; 3],
    pub blocks: [u64; 3],
    pub failures: [u64; 3],
    pub exhausted: u64,
}

impl EngineStatsSnapshot {
    pub fn successes_for(&self, kind: StrategyKind) -> u64 {
        self.successes[index(kind)]
    }

    pub fn blocks_for(&self, kind: StrategyKind) -> u64 {
        self.blocks[index(kind)]
    }

    pub fn failures_for(&self, kind: StrategyKind) -> u64 {
        self.failures[index(kind)]
    }

    pub fn total_successes(&self) -> u64 {
        self.successes.iter().sum()
    }
}

fn index(kind: StrategyKind) -> usize {
    match kind {
        StrategyKind::Fast => 0,
        StrategyKind::Browser => 1,
        StrategyKind::Stealth => 2,
    }
}

impl EngineStats {
    pub fn record_success(&self, kind: StrategyKind) {
        self.successes[index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block(&self, kind: StrategyKind) {
        self.blocks[index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: StrategyKind) {
        self.failures[index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        let load = |counters: &[AtomicU64; 3]| {
            [
                counters[0].load(Ordering::Relaxed),
                counters[1].load(Ordering::Relaxed),
                counters[2].load(Ordering::Relaxed),
            ]
        };

        EngineStatsSnapshot {
            successes: load(&self.successes),
            blocks: load(&self.blocks),
            failures: load(&self.failures),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = EngineStats::default();
        stats.record_success(StrategyKind::Fast);
        stats.record_success(StrategyKind::Stealth);
        stats.record_block(StrategyKind::Fast);
        stats.record_failure(StrategyKind::Browser);
        stats.record_exhausted();

        let snap = stats.snapshot();
        assert_eq!(snap.successes_for(StrategyKind::Fast), 1);
        assert_eq!(snap.successes_for(StrategyKind::Browser), 0);
        assert_eq!(snap.blocks_for(StrategyKind::Fast), 1);
        assert_eq!(snap.failures_for(StrategyKind::Browser), 1);
        assert_eq!(snap.total_successes(), 2);
        assert_eq!(snap.exhausted, 1);
    }
}
