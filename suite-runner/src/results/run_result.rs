// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{MetricBag, TestCaseId, TestCaseResult, TestStatus};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::time::Duration;

/// Classification of a run failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureStatus {
    /// No particular classification.
    Unclassified,

    /// The failure came from a preparer's setup.
    SetupFailure,

    /// A device became unresponsive mid-run and was recovered.
    DeviceRecovered,
}

/// A failure attributed to an entire run rather than one test case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunFailure {
    /// A description of the failure.
    pub message: String,

    /// How the failure is classified.
    pub status: FailureStatus,
}

impl RunFailure {
    /// Creates an unclassified run failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_status(message, FailureStatus::Unclassified)
    }

    /// Creates a run failure with an explicit classification.
    pub fn with_status(message: impl Into<String>, status: FailureStatus) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    /// Combines independent failure causes into a single description
    /// enumerating each cause in occurrence order.
    ///
    /// A single cause is passed through unchanged. The combined failure
    /// keeps the first classified (non-[`Unclassified`]) status among the
    /// causes.
    ///
    /// [`Unclassified`]: FailureStatus::Unclassified
    pub fn combine(causes: &[RunFailure]) -> Option<RunFailure> {
        match causes {
            [] => None,
            [single] => Some(single.clone()),
            many => {
                let message = format!(
                    "There were {} failures:\n  {}",
                    many.len(),
                    many.iter().map(|f| f.message.as_str()).join("\n  "),
                );
                let status = many
                    .iter()
                    .map(|f| f.status)
                    .find(|status| *status != FailureStatus::Unclassified)
                    .unwrap_or(FailureStatus::Unclassified);
                Some(RunFailure { message, status })
            }
        }
    }
}

/// The results of one attempt of one named run.
///
/// Built up by the attempt aggregator as events arrive and sealed when the
/// run ends. A runner may legitimately report `run_started` twice within
/// one attempt to resume after partial execution; the aggregator
/// accumulates into the same record without re-baselining
/// [`expected_count`](Self::expected_count).
#[derive(Clone, Debug)]
pub struct RunResult {
    run_name: SmolStr,
    attempt: usize,
    expected_count: usize,
    test_results: IndexMap<TestCaseId, TestCaseResult>,
    failures: Vec<RunFailure>,
    metrics: MetricBag,
    elapsed: Duration,
    complete: bool,
    placeholder: bool,
}

impl RunResult {
    pub(crate) fn new(run_name: SmolStr, attempt: usize, expected_count: usize) -> Self {
        Self {
            run_name,
            attempt,
            expected_count,
            test_results: IndexMap::new(),
            failures: Vec::new(),
            metrics: MetricBag::new(),
            elapsed: Duration::ZERO,
            complete: false,
            placeholder: false,
        }
    }

    /// Stands in for an attempt that was expected at `attempt` but never
    /// produced, e.g. because another run advanced attempt counters while
    /// this run did not execute.
    pub(crate) fn placeholder(run_name: SmolStr, attempt: usize) -> Self {
        let message = format!(
            "attempt {attempt} of run {run_name} never executed; this is a \
             placeholder for the missing attempt"
        );
        Self {
            failures: vec![RunFailure::new(message)],
            complete: true,
            placeholder: true,
            ..Self::new(run_name, attempt, 0)
        }
    }

    /// The name of the run this attempt belongs to.
    pub fn run_name(&self) -> &SmolStr {
        &self.run_name
    }

    /// The attempt index, starting from 0.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// The number of test cases the run declared at start.
    pub fn expected_count(&self) -> usize {
        self.expected_count
    }

    /// Per-case results in reporting order.
    pub fn test_results(&self) -> &IndexMap<TestCaseId, TestCaseResult> {
        &self.test_results
    }

    /// The run-level failure, with multiple causes folded into one
    /// enumerated description.
    pub fn run_failure(&self) -> Option<RunFailure> {
        RunFailure::combine(&self.failures)
    }

    /// True if any run-level failure was reported.
    pub fn is_run_failure(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Test cases that ended this attempt with a failed status.
    pub fn failed_cases(&self) -> impl Iterator<Item = &TestCaseId> + '_ {
        self.test_results
            .iter()
            .filter(|(_, result)| result.status == TestStatus::Failed)
            .map(|(id, _)| id)
    }

    /// Metrics reported at the end of the run.
    pub fn metrics(&self) -> &MetricBag {
        &self.metrics
    }

    /// Time the run reported for this attempt.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// True once `run_ended` has been observed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// True for synthesized stand-ins for missing attempts.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub(crate) fn resume(&mut self) {
        self.complete = false;
    }

    pub(crate) fn on_test_started(&mut self, id: &TestCaseId) {
        self.test_results
            .insert(id.clone(), TestCaseResult::incomplete());
    }

    pub(crate) fn on_test_failed(&mut self, id: &TestCaseId, message: &str) {
        let result = self
            .test_results
            .entry(id.clone())
            .or_insert_with(TestCaseResult::incomplete);
        result.status = TestStatus::Failed;
        result.message = Some(message.to_owned());
    }

    pub(crate) fn on_test_ignored(&mut self, id: &TestCaseId) {
        let result = self
            .test_results
            .entry(id.clone())
            .or_insert_with(TestCaseResult::incomplete);
        result.status = TestStatus::Ignored;
    }

    pub(crate) fn on_test_ended(&mut self, id: &TestCaseId, metrics: MetricBag) {
        let result = self
            .test_results
            .entry(id.clone())
            .or_insert_with(TestCaseResult::incomplete);
        if result.status == TestStatus::Incomplete {
            result.status = TestStatus::Passed;
        }
        result.metrics.extend(metrics);
    }

    pub(crate) fn on_run_failed(&mut self, failure: RunFailure) {
        self.failures.push(failure);
    }

    pub(crate) fn on_run_ended(&mut self, elapsed: Duration, metrics: MetricBag) {
        self.elapsed += elapsed;
        self.metrics.extend(metrics);
        self.complete = true;
    }
}

/// The attempt-folded outcome for one run name.
///
/// Recomputed from the full attempt list, never mutated in place. A test
/// case's final status is the status from the highest-indexed attempt in
/// which it executed; a case not re-executed in a later attempt keeps its
/// earlier status.
#[derive(Clone, Debug)]
pub struct MergedRunResult {
    run_name: SmolStr,
    expected_count: usize,
    attempt_count: usize,
    test_results: IndexMap<TestCaseId, TestCaseResult>,
    run_failure: Option<RunFailure>,
    metrics: MetricBag,
}

impl MergedRunResult {
    /// Folds an attempt list, in increasing attempt order, into one merged
    /// result. Returns `None` for an empty list.
    ///
    /// The merged run failure comes from the final attempt only; a failure
    /// in an earlier attempt that cleared on retry does not mark the merged
    /// run as failed. Synthetic placeholder attempts are the exception:
    /// their messages always fold into the final failure description.
    pub fn fold(attempts: &[RunResult]) -> Option<MergedRunResult> {
        let first = attempts.first()?;

        let mut test_results = IndexMap::new();
        let mut metrics = MetricBag::new();
        for attempt in attempts {
            for (id, result) in attempt.test_results() {
                test_results.insert(id.clone(), result.clone());
            }
            metrics.extend(attempt.metrics().clone());
        }

        let mut causes: Vec<RunFailure> = attempts
            .iter()
            .filter(|attempt| attempt.is_placeholder())
            .flat_map(|attempt| attempt.failures.iter().cloned())
            .collect();
        if let Some(last) = attempts.last() {
            if !last.is_placeholder() {
                causes.extend(last.failures.iter().cloned());
            }
        }

        Some(MergedRunResult {
            run_name: first.run_name().clone(),
            expected_count: first.expected_count(),
            attempt_count: attempts.len(),
            test_results,
            run_failure: RunFailure::combine(&causes),
            metrics,
        })
    }

    /// The name of the merged run.
    pub fn run_name(&self) -> &SmolStr {
        &self.run_name
    }

    /// The expected test case count, baselined from the first attempt.
    pub fn expected_count(&self) -> usize {
        self.expected_count
    }

    /// How many attempts were folded in.
    pub fn attempt_count(&self) -> usize {
        self.attempt_count
    }

    /// Final per-case results, last-observed-wins.
    pub fn test_results(&self) -> &IndexMap<TestCaseId, TestCaseResult> {
        &self.test_results
    }

    /// The final status of one test case, if it was ever observed.
    pub fn status_of(&self, id: &TestCaseId) -> Option<TestStatus> {
        self.test_results.get(id).map(|result| result.status)
    }

    /// The merged run failure, if the final attempt failed.
    pub fn run_failure(&self) -> Option<&RunFailure> {
        self.run_failure.as_ref()
    }

    /// Counts cases with the given final status.
    pub fn count_with_status(&self, status: TestStatus) -> usize {
        self.test_results
            .values()
            .filter(|result| result.status == status)
            .count()
    }

    /// Merged metrics across attempts, later attempts winning per key.
    pub fn metrics(&self) -> &MetricBag {
        &self.metrics
    }
}
