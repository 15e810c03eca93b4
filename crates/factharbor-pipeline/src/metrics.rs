//! Warnings & Metrics Collector (§4.J). `WarningsCollector` itself lives in
//! `factharbor-types` since every crate needs to push into it; this module
//! owns the metrics half: per-phase timings, LLM/search call counts, and
//! token totals, shaped like the teacher's
//! `coordinator::metrics::CoordinatorMetricsSnapshot`/`TimingMetrics` (SPEC_FULL
//! §1.1, §2) rather than the single flat timing map §4.J's prose suggests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use factharbor_types::Gate1Stats;

/// Total time and call count accrued by one named phase (`stage1`,
/// `stage2`, ... `stage5`).
#[derive(Debug, Clone)]
pub struct PhaseTiming {
    pub phase: &'static str,
    pub total_ms: u64,
    pub calls: u32,
}

impl PhaseTiming {
    pub fn average_ms(&self) -> u64 {
        if self.calls == 0 {
            0
        } else {
            self.total_ms / self.calls as u64
        }
    }
}

/// Accumulates phase timings across a job. One recorder lives on the
/// `PipelineContext` for the whole job's lifetime.
#[derive(Default)]
pub struct PhaseRecorder {
    timings: Mutex<HashMap<&'static str, (u64, u32)>>,
}

impl PhaseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, phase: &'static str, elapsed_ms: u64) {
        let mut timings = self.timings.lock().unwrap();
        let entry = timings.entry(phase).or_insert((0, 0));
        entry.0 += elapsed_ms;
        entry.1 += 1;
    }

    pub fn snapshot(&self) -> Vec<PhaseTiming> {
        let timings = self.timings.lock().unwrap();
        let mut out: Vec<PhaseTiming> = timings
            .iter()
            .map(|(phase, (total_ms, calls))| PhaseTiming {
                phase,
                total_ms: *total_ms,
                calls: *calls,
            })
            .collect();
        out.sort_by_key(|t| t.phase);
        out
    }
}

/// Thread-safe counters fed by `PipelineContext::call_llm` and Stage 4's
/// challenge-enforcement step, read once at the end of the job to build the
/// final `AnalysisMetrics` (§6 "Persisted state on success").
#[derive(Default)]
pub struct MetricCounters {
    pub llm_calls: AtomicU32,
    pub total_tokens: AtomicU64,
    pub challenges_proposed: AtomicU32,
    pub challenges_dropped: AtomicU32,
}

impl MetricCounters {
    pub fn record_llm_call(&self, tokens: u32) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        self.total_tokens.fetch_add(tokens as u64, Ordering::Relaxed);
    }

    pub fn record_challenges(&self, proposed: u32, dropped: u32) {
        self.challenges_proposed.fetch_add(proposed, Ordering::Relaxed);
        self.challenges_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    /// `baselessAdjustmentRate = dropped / proposed` (§4.H, §6, §8), `0.0`
    /// when no challenges were ever proposed.
    pub fn baseless_adjustment_rate(&self) -> f32 {
        let proposed = self.challenges_proposed.load(Ordering::Relaxed);
        if proposed == 0 {
            return 0.0;
        }
        self.challenges_dropped.load(Ordering::Relaxed) as f32 / proposed as f32
    }
}

/// Final metrics snapshot persisted alongside a successful job's
/// `OverallAssessment` (§6).
#[derive(Debug, Clone, Default)]
pub struct AnalysisMetrics {
    pub phase_timings: Vec<PhaseTiming>,
    pub llm_calls: u32,
    pub search_queries: u32,
    pub gate1_stats: Gate1Stats,
    pub total_tokens: u64,
    pub baseless_adjustment_rate: f32,
    pub query_budget_usage: HashMap<String, u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_recorder_accumulates_total_and_average() {
        let recorder = PhaseRecorder::new();
        recorder.record("stage1", 100);
        recorder.record("stage1", 300);
        let snapshot = recorder.snapshot();
        let stage1 = snapshot.iter().find(|t| t.phase == "stage1").unwrap();
        assert_eq!(stage1.total_ms, 400);
        assert_eq!(stage1.calls, 2);
        assert_eq!(stage1.average_ms(), 200);
    }

    #[test]
    fn phase_recorder_snapshot_is_sorted_by_phase_name() {
        let recorder = PhaseRecorder::new();
        recorder.record("stage5", 1);
        recorder.record("stage1", 1);
        let snapshot = recorder.snapshot();
        let names: Vec<&str> = snapshot.iter().map(|t| t.phase).collect();
        assert_eq!(names, vec!["stage1", "stage5"]);
    }

    #[test]
    fn baseless_adjustment_rate_is_zero_with_no_challenges() {
        let counters = MetricCounters::default();
        assert_eq!(counters.baseless_adjustment_rate(), 0.0);
    }

    #[test]
    fn baseless_adjustment_rate_divides_dropped_by_proposed() {
        let counters = MetricCounters::default();
        counters.record_challenges(4, 1);
        assert_eq!(counters.baseless_adjustment_rate(), 0.25);
    }
}
