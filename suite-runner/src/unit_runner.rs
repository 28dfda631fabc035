// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives 1..N attempts of one executable unit.
//!
//! The retry policy decides continuation after each attempt; the attempt
//! aggregator records and merges outcomes. Later attempts are narrowed to
//! the previously failing test cases when the unit supports selective
//! filtering, except while a run-level failure forces unfiltered
//! re-execution.

use crate::aggregator::AttemptAggregator;
use crate::device::DeviceHandle;
use crate::errors::DeviceError;
use crate::events::{FanoutListener, RunListener, TestEventSink};
use crate::metrics::MetricCollector;
use crate::results::{
    MergedRunResult, MetricBag, RetryStatistics, RunFailure, TestCaseId, TestStatus,
};
use crate::retry::{AttemptOutcome, RetryConfig, RetryDecision, RetryPolicy};
use crate::unit::TestUnit;
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

/// The product of one unit's full attempt loop.
#[derive(Clone, Debug)]
pub struct UnitResult {
    /// Merged results for every run name the unit reported.
    pub merged: IndexMap<SmolStr, MergedRunResult>,

    /// How many attempts actually executed.
    pub attempts_run: usize,

    /// Recovery statistics for the loop.
    pub statistics: RetryStatistics,
}

/// How the next attempt's include filter should be configured.
#[derive(Clone, Debug)]
enum FilterDirective {
    /// The empty set: no restriction, used for attempt 0.
    Empty,
    /// Clear the filter for an unfiltered re-run.
    Clear,
    /// Narrow to the given cases.
    Cases(BTreeSet<TestCaseId>),
}

/// Runs one unit's attempts against a module's devices and collectors.
pub struct UnitRunner<'a> {
    config: &'a RetryConfig,
    devices: &'a mut [Box<dyn DeviceHandle>],
    collectors: &'a mut [Box<dyn MetricCollector>],
    convert_to_ignored: bool,
}

impl<'a> UnitRunner<'a> {
    /// Creates a runner over the module's retry configuration, devices and
    /// metric collectors.
    pub fn new(
        config: &'a RetryConfig,
        devices: &'a mut [Box<dyn DeviceHandle>],
        collectors: &'a mut [Box<dyn MetricCollector>],
    ) -> Self {
        Self {
            config,
            devices,
            collectors,
            convert_to_ignored: false,
        }
    }

    /// Converts every test case outcome to ignored. Used when a capability
    /// check forces the module to skip its test cases while still
    /// reporting its runs.
    pub fn converting_to_ignored(mut self) -> Self {
        self.convert_to_ignored = true;
        self
    }

    /// Runs the unit's attempt loop, feeding events into `aggregator` and
    /// the identical stream into `side` listeners.
    ///
    /// A fatal device unavailability raised by the unit aborts the loop
    /// and propagates; so does an unresponsive condition, which the module
    /// orchestrator recovers from.
    pub fn run(
        &mut self,
        unit: &mut dyn TestUnit,
        aggregator: &mut AttemptAggregator,
        side: &mut [Box<dyn RunListener>],
    ) -> Result<UnitResult, DeviceError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut policy = RetryPolicy::new(self.config.clone());
        let mut seen_runs: BTreeSet<SmolStr> = BTreeSet::new();
        let mut next_filter = FilterDirective::Empty;
        let mut attempts_run = 0;

        for attempt in 0..max_attempts {
            if let Some(filterable) = unit.as_filterable() {
                match &next_filter {
                    FilterDirective::Empty => filterable.set_include_filter(BTreeSet::new()),
                    FilterDirective::Clear => filterable.clear_include_filter(),
                    FilterDirective::Cases(cases) => {
                        filterable.set_include_filter(cases.clone());
                    }
                }
            }

            if self.config.reboot_at_last_retry && max_attempts > 1 && attempt + 1 == max_attempts
            {
                self.reboot_devices();
            }

            debug!(unit = unit.name(), attempt, "executing attempt");
            {
                let mut fanout = FanoutListener::new(aggregator, side);
                let mut sink = AttemptSink {
                    listener: &mut fanout,
                    collectors: &mut *self.collectors,
                    attempt,
                    seen_runs: &mut seen_runs,
                    current_run: None,
                    convert_to_ignored: self.convert_to_ignored,
                };
                unit.run(&mut sink)?;
            }
            attempts_run += 1;

            let outcome = attempt_outcome(aggregator, &seen_runs, attempt);
            let supports_filtering = unit.as_filterable().is_some();
            match policy.decide(attempt, &outcome, supports_filtering) {
                RetryDecision::Stop => break,
                RetryDecision::RetryAll => next_filter = FilterDirective::Clear,
                RetryDecision::RetryFiltered { failing } => {
                    debug!(
                        unit = unit.name(),
                        failing = failing.len(),
                        "narrowing next attempt to failing cases"
                    );
                    next_filter = FilterDirective::Cases(failing);
                }
            }
        }

        let mut merged = IndexMap::new();
        for run_name in &seen_runs {
            let attempts = aggregator.attempts(run_name);
            let Some(folded) = MergedRunResult::fold(attempts) else {
                continue;
            };
            for (id, result) in folded.test_results() {
                let ever_failed = attempts.iter().any(|run| {
                    run.test_results()
                        .get(id)
                        .is_some_and(|case| case.status == TestStatus::Failed)
                });
                policy.record_case(ever_failed, result.status);
            }
            merged.insert(folded.run_name().clone(), folded);
        }

        Ok(UnitResult {
            merged,
            attempts_run,
            statistics: policy.statistics(),
        })
    }

    fn reboot_devices(&mut self) {
        for device in self.devices.iter_mut() {
            debug!(serial = device.serial(), "rebooting device before final attempt");
            if let Err(error) = device.reboot() {
                warn!(
                    serial = device.serial(),
                    %error,
                    "best-effort reboot before final attempt failed"
                );
            }
        }
    }
}

fn attempt_outcome(
    aggregator: &AttemptAggregator,
    seen_runs: &BTreeSet<SmolStr>,
    attempt: usize,
) -> AttemptOutcome {
    let mut outcome = AttemptOutcome::default();
    for run_name in seen_runs {
        if let Some(run) = aggregator.attempt_result(run_name, attempt) {
            if run.is_run_failure() {
                outcome.run_failure = true;
            }
            outcome.failing_cases.extend(run.failed_cases().cloned());
        }
    }
    outcome
}

/// Tags unit events with the current attempt, notifies enabled metric
/// collectors, and tracks which run names the unit touched.
struct AttemptSink<'a> {
    listener: &'a mut dyn RunListener,
    collectors: &'a mut [Box<dyn MetricCollector>],
    attempt: usize,
    seen_runs: &'a mut BTreeSet<SmolStr>,
    current_run: Option<SmolStr>,
    convert_to_ignored: bool,
}

impl AttemptSink<'_> {
    fn enabled_collectors<'b>(
        &'b mut self,
    ) -> impl Iterator<Item = &'b mut Box<dyn MetricCollector>> + 'b {
        self.collectors
            .iter_mut()
            .filter(|collector| !collector.is_disabled())
    }
}

impl TestEventSink for AttemptSink<'_> {
    fn run_started(&mut self, run_name: &str, expected_count: usize) {
        self.seen_runs.insert(run_name.into());
        self.current_run = Some(run_name.into());
        for collector in self.enabled_collectors() {
            collector.on_run_start(run_name);
        }
        self.listener
            .run_started(run_name, expected_count, self.attempt);
    }

    fn test_started(&mut self, id: &TestCaseId) {
        for collector in self.enabled_collectors() {
            collector.on_test_start(id);
        }
        self.listener.test_started(id);
    }

    fn test_failed(&mut self, id: &TestCaseId, message: &str) {
        if self.convert_to_ignored {
            return;
        }
        self.listener.test_failed(id, message);
    }

    fn test_ignored(&mut self, id: &TestCaseId) {
        self.listener.test_ignored(id);
    }

    fn test_ended(&mut self, id: &TestCaseId, metrics: MetricBag) {
        for collector in self.enabled_collectors() {
            collector.on_test_end(id, &metrics);
        }
        if self.convert_to_ignored {
            self.listener.test_ignored(id);
        }
        self.listener.test_ended(id, metrics);
    }

    fn run_failed(&mut self, failure: RunFailure) {
        self.listener.run_failed(failure);
    }

    fn run_ended(&mut self, elapsed: Duration, metrics: MetricBag) {
        let run_name = self.current_run.take().unwrap_or_default();
        for collector in self.collectors.iter_mut() {
            if !collector.is_disabled() {
                collector.on_run_end(&run_name, &metrics);
            }
        }
        self.listener.run_ended(elapsed, metrics);
    }
}
