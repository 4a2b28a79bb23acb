// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Frame timing that clients can observe for pacing and diagnostics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use await_values::{Observer, Value};

use crate::sys::time::Instant;

const MAX_HISTORY: usize = 60;

/**
Tracks one tick of the orchestrator.

Created when the tick begins; [FrameGuard::finish] records the frame once it is published.  A guard
dropped without finishing (the tick failed) records nothing.
*/
#[derive(Debug)]
pub(crate) struct FrameGuard {
    frame_start: Instant,
    fence_wait: Duration,
    steps: usize,
    reporter: Arc<ReporterShared>,
}

impl FrameGuard {
    pub(crate) fn mark_acquired(&mut self, fence_wait: Duration) {
        self.fence_wait = fence_wait;
    }
    pub(crate) fn mark_simulated(&mut self, steps: usize) {
        self.steps = steps;
    }
    pub(crate) fn finish(self, fence_target: u64) {
        let info = FrameInfo {
            frame_start: self.frame_start,
            cpu_end: Instant::now(),
            fence_wait: self.fence_wait,
            simulation_steps: self.steps,
            fence_target,
        };
        self.reporter.add_frame_info(info);
    }
}

/// Timing for one published frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    frame_start: Instant,
    cpu_end: Instant,
    pub fence_wait: Duration,
    pub simulation_steps: usize,
    pub fence_target: u64,
}

impl FrameInfo {
    /// Wall time of the tick, including any fence wait.
    pub fn cpu_duration(&self) -> Duration {
        self.cpu_end.duration_since(self.frame_start)
    }
}

/// Averages over the recent history.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    pub frames: usize,
    pub fps: f64,
    pub cpu_ms: f64,
    pub fence_wait_ms: f64,
    pub min_elapsed_ms: f64,
}

#[derive(Debug)]
struct ReporterShared {
    latest_published: AtomicU64,
    fps: Value<i32>,
    cpu_ms: Value<i32>,
    fence_wait_ms: Value<i32>,
    history: Mutex<VecDeque<FrameInfo>>,
}

impl ReporterShared {
    fn add_frame_info(&self, info: FrameInfo) {
        self.latest_published
            .fetch_max(info.fence_target, Ordering::Relaxed);
        let stats = {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push_back(info);
            while history.len() > MAX_HISTORY {
                history.pop_front();
            }
            compute_stats(history.make_contiguous())
        };
        if stats.frames > 1 {
            self.fps.set(stats.fps.round() as i32);
        }
        self.cpu_ms.set(stats.cpu_ms.round() as i32);
        self.fence_wait_ms.set(stats.fence_wait_ms.round() as i32);
    }
}

fn compute_stats(history: &[FrameInfo]) -> FrameStats {
    if history.is_empty() {
        return FrameStats::default();
    }
    let mut stats = FrameStats {
        frames: history.len(),
        ..FrameStats::default()
    };
    if history.len() > 1 {
        let mut total = 0.0;
        let mut min = f64::MAX;
        for pair in history.windows(2) {
            let interval = pair[1]
                .frame_start
                .duration_since(pair[0].frame_start)
                .as_secs_f64();
            total += interval;
            min = min.min(interval);
        }
        let average = total / (history.len() - 1) as f64;
        if average > 0.0 {
            stats.fps = 1.0 / average;
        }
        stats.min_elapsed_ms = min * 1000.0;
    }
    let n = history.len() as f64;
    stats.cpu_ms = history
        .iter()
        .map(|f| f.cpu_duration().as_secs_f64() * 1000.0)
        .sum::<f64>()
        / n;
    stats.fence_wait_ms = history
        .iter()
        .map(|f| f.fence_wait.as_secs_f64() * 1000.0)
        .sum::<f64>()
        / n;
    stats
}

/**
A handle clients can use to watch the pipeline.

Cheap to clone; every clone observes the same orchestrator.
*/
#[derive(Clone, Debug)]
pub struct FrameReporter {
    shared: Arc<ReporterShared>,
    fps: Observer<i32>,
    cpu_ms: Observer<i32>,
    fence_wait_ms: Observer<i32>,
}

impl FrameReporter {
    pub(crate) fn new() -> Self {
        let fps = Value::new(0);
        let cpu_ms = Value::new(0);
        let fence_wait_ms = Value::new(0);
        let fps_observer = fps.observe();
        let cpu_ms_observer = cpu_ms.observe();
        let fence_wait_ms_observer = fence_wait_ms.observe();
        FrameReporter {
            shared: Arc::new(ReporterShared {
                latest_published: AtomicU64::new(0),
                fps,
                cpu_ms,
                fence_wait_ms,
                history: Mutex::new(VecDeque::with_capacity(MAX_HISTORY)),
            }),
            fps: fps_observer,
            cpu_ms: cpu_ms_observer,
            fence_wait_ms: fence_wait_ms_observer,
        }
    }

    pub(crate) fn begin_frame(&self) -> FrameGuard {
        FrameGuard {
            frame_start: Instant::now(),
            fence_wait: Duration::ZERO,
            steps: 0,
            reporter: self.shared.clone(),
        }
    }

    /// The fence target of the most recently published frame.
    pub fn latest_published(&self) -> u64 {
        self.shared.latest_published.load(Ordering::Relaxed)
    }

    pub fn fps(&self) -> &Observer<i32> {
        &self.fps
    }
    pub fn cpu_ms(&self) -> &Observer<i32> {
        &self.cpu_ms
    }
    pub fn fence_wait_ms(&self) -> &Observer<i32> {
        &self.fence_wait_ms
    }

    /// Up to the last 60 frames, oldest first.
    pub fn history(&self) -> Vec<FrameInfo> {
        self.shared
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    pub fn stats(&self) -> FrameStats {
        let history = self.history();
        compute_stats(&history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn history_is_bounded() {
        let reporter = FrameReporter::new();
        for target in 1..=70 {
            let mut guard = reporter.begin_frame();
            guard.mark_acquired(Duration::from_millis(1));
            guard.mark_simulated(2);
            guard.finish(target);
        }
        let history = reporter.history();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history[0].fence_target, 11);
        assert_eq!(reporter.latest_published(), 70);
        let stats = reporter.stats();
        assert_eq!(stats.frames, MAX_HISTORY);
        assert!((stats.fence_wait_ms - 1.0).abs() < 1e-9);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn unfinished_frames_are_not_recorded() {
        let reporter = FrameReporter::new();
        drop(reporter.begin_frame());
        assert!(reporter.history().is_empty());
        assert_eq!(reporter.stats(), FrameStats::default());
    }
}
