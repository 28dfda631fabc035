// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{MergedRunResult, RunFailure, RunResult};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::BTreeSet;

/// Pass/fail recovery statistics accumulated over one or more units'
/// attempt loops.
///
/// Only test cases that failed at least once are counted: a case whose
/// final merged status is passed counts as recovered, one still failing at
/// the end counts as still failing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RetryStatistics {
    /// Cases that failed at some point and ended up passing.
    pub recovered_count: usize,

    /// Cases that failed at some point and never recovered.
    pub still_failing_count: usize,
}

impl RetryStatistics {
    pub(crate) fn absorb(&mut self, other: RetryStatistics) {
        self.recovered_count += other.recovered_count;
        self.still_failing_count += other.still_failing_count;
    }
}

/// The final product of one module's lifecycle.
#[derive(Clone, Debug)]
pub struct ModuleOutcome {
    pub(crate) merged: Vec<MergedRunResult>,
    pub(crate) module_failure: Option<RunFailure>,
    pub(crate) attempts: IndexMap<SmolStr, Vec<RunResult>>,
    pub(crate) retry_stats: RetryStatistics,
    pub(crate) required_tokens: BTreeSet<SmolStr>,
}

impl ModuleOutcome {
    pub(crate) fn empty(required_tokens: BTreeSet<SmolStr>) -> Self {
        Self {
            merged: Vec::new(),
            module_failure: None,
            attempts: IndexMap::new(),
            retry_stats: RetryStatistics::default(),
            required_tokens,
        }
    }

    /// Merged results, one per run name, in first-seen order.
    pub fn merged_results(&self) -> &[MergedRunResult] {
        &self.merged
    }

    /// The merged result for one run name.
    pub fn merged_result(&self, run_name: &str) -> Option<&MergedRunResult> {
        self.merged
            .iter()
            .find(|merged| merged.run_name() == run_name)
    }

    /// The top-level module run failure. Set only when the module aborted
    /// before execution (a preparer setup failure).
    pub fn module_failure(&self) -> Option<&RunFailure> {
        self.module_failure.as_ref()
    }

    /// The full ordered attempt history for one run name, for diagnostics
    /// and reporting.
    pub fn attempts(&self, run_name: &str) -> &[RunResult] {
        self.attempts
            .get(run_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Attempt histories for every run name seen.
    pub fn all_attempts(&self) -> &IndexMap<SmolStr, Vec<RunResult>> {
        &self.attempts
    }

    /// Recovery statistics accumulated across the module's units.
    pub fn retry_statistics(&self) -> RetryStatistics {
        self.retry_stats
    }

    /// External resource tokens the module declared it needs (e.g. a SIM
    /// card). Passed through for schedulers that match modules to devices.
    pub fn required_tokens(&self) -> &BTreeSet<SmolStr> {
        &self.required_tokens
    }

    /// True if the module produced no results and no failure.
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty() && self.module_failure.is_none()
    }
}
