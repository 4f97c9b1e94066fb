//! Phase timing and allocator statistics for `--time`/`--stats`/`--perf-stats`
//! (spec §6.1; recovered from the original `ProfilingTimer.h`/benchmark rig,
//! see `SPEC_FULL.md` §C.1).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct PhaseTimer {
    durations: BTreeMap<&'static str, Duration>,
    template_instantiations: u64,
}

pub struct PhaseGuard<'a> {
    timer: &'a mut PhaseTimer,
    phase: &'static str,
    started: Instant,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        *self.timer.durations.entry(self.phase).or_default() += elapsed;
    }
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts timing `phase`; the returned guard accumulates elapsed time
    /// into the timer when dropped, so phases may be entered more than once
    /// (e.g. codegen runs once per function).
    pub fn phase(&mut self, phase: &'static str) -> PhaseGuard<'_> {
        PhaseGuard {
            timer: self,
            phase,
            started: Instant::now(),
        }
    }

    pub fn record_instantiation(&mut self) {
        self.template_instantiations += 1;
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        out.push_str("phase timings:\n");
        for (phase, dur) in &self.durations {
            out.push_str(&format!("  {:<16} {:>10.3} ms\n", phase, dur.as_secs_f64() * 1000.0));
        }
        out.push_str(&format!(
            "template instantiations: {}\n",
            self.template_instantiations
        ));
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllocatorStats {
    pub interner_bytes: usize,
    pub interner_chunks: usize,
    pub ast_arena_bytes: usize,
}

impl AllocatorStats {
    pub fn report(&self) -> String {
        format!(
            "allocator stats:\n  interner: {} bytes across {} chunks\n  ast arena: {} bytes\n",
            self.interner_bytes, self.interner_chunks, self.ast_arena_bytes
        )
    }
}
