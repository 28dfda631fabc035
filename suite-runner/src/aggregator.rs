// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The attempt aggregator: consumes run events for each attempt and folds
//! repeated attempts into one authoritative result per run name.

use crate::events::RunListener;
use crate::results::{MergedRunResult, MetricBag, RunFailure, RunResult, TestCaseId};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Builds one [`RunResult`] per (run name, attempt) from the event stream
/// and merges attempt lists on demand.
///
/// All units within a module feed one aggregator, so runs with the same
/// name share a merged result set. Attempt indices are per run name: if a
/// run is reported at attempt `k` without having produced attempts
/// `0..k`, placeholder failed attempts are synthesized to note the gap.
#[derive(Debug, Default)]
pub struct AttemptAggregator {
    runs: IndexMap<SmolStr, Vec<RunResult>>,
    active: Option<(SmolStr, usize)>,
}

impl AttemptAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// The run currently receiving events, if one is open.
    pub fn active_run(&self) -> Option<&SmolStr> {
        self.active.as_ref().map(|(name, _)| name)
    }

    /// All attempts recorded for a run name, in attempt order.
    pub fn attempts(&self, run_name: &str) -> &[RunResult] {
        self.runs
            .get(run_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// One recorded attempt of one run.
    pub fn attempt_result(&self, run_name: &str, attempt: usize) -> Option<&RunResult> {
        self.runs.get(run_name)?.get(attempt)
    }

    /// Run names in first-seen order.
    pub fn run_names(&self) -> impl Iterator<Item = &SmolStr> + '_ {
        self.runs.keys()
    }

    /// Recomputes the merged result for every run name seen.
    pub fn merged_results(&self) -> Vec<MergedRunResult> {
        self.runs
            .values()
            .filter_map(|attempts| MergedRunResult::fold(attempts))
            .collect()
    }

    /// Consumes the aggregator, yielding the full attempt history.
    pub fn into_attempts(self) -> IndexMap<SmolStr, Vec<RunResult>> {
        self.runs
    }

    fn current_mut(&mut self) -> Option<&mut RunResult> {
        let (name, attempt) = self.active.as_ref()?;
        self.runs.get_mut(name)?.get_mut(*attempt)
    }
}

impl RunListener for AttemptAggregator {
    fn run_started(&mut self, run_name: &str, expected_count: usize, attempt: usize) {
        let name = SmolStr::new(run_name);
        let attempts = self.runs.entry(name.clone()).or_default();

        if attempt < attempts.len() {
            // Internal resume of an attempt already seen: accumulate into
            // the same record without re-baselining the expected count.
            debug!(run_name, attempt, "resuming run attempt");
            attempts[attempt].resume();
        } else {
            while attempts.len() < attempt {
                let missing = attempts.len();
                warn!(run_name, missing, "synthesizing placeholder for missing attempt");
                attempts.push(RunResult::placeholder(name.clone(), missing));
            }
            debug!(run_name, expected_count, attempt, "run started");
            attempts.push(RunResult::new(name.clone(), attempt, expected_count));
        }

        self.active = Some((name, attempt));
    }

    fn test_started(&mut self, id: &TestCaseId) {
        match self.current_mut() {
            Some(run) => run.on_test_started(id),
            None => warn!(%id, "test started with no open run"),
        }
    }

    fn test_failed(&mut self, id: &TestCaseId, message: &str) {
        match self.current_mut() {
            Some(run) => run.on_test_failed(id, message),
            None => warn!(%id, "test failed with no open run"),
        }
    }

    fn test_ignored(&mut self, id: &TestCaseId) {
        match self.current_mut() {
            Some(run) => run.on_test_ignored(id),
            None => warn!(%id, "test ignored with no open run"),
        }
    }

    fn test_ended(&mut self, id: &TestCaseId, metrics: MetricBag) {
        match self.current_mut() {
            Some(run) => run.on_test_ended(id, metrics),
            None => warn!(%id, "test ended with no open run"),
        }
    }

    fn run_failed(&mut self, failure: RunFailure) {
        match self.current_mut() {
            Some(run) => run.on_run_failed(failure),
            None => warn!(message = %failure.message, "run failure with no open run"),
        }
    }

    fn run_ended(&mut self, elapsed: Duration, metrics: MetricBag) {
        if let Some(run) = self.current_mut() {
            run.on_run_ended(elapsed, metrics);
        } else {
            warn!("run ended with no open run");
        }
        self.active = None;
    }
}
