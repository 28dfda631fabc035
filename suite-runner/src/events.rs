// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event-sink contracts connecting executable units, the attempt
//! aggregator, and side listeners.
//!
//! Units report through [`TestEventSink`], which carries no attempt index;
//! the retry wrapper tags each event with the current attempt before it
//! reaches the [`RunListener`] chain. Event ordering per run name is what
//! attempt merging relies on, so everything here is strictly sequential.

use crate::results::{MetricBag, RunFailure, TestCaseId};
use std::time::Duration;

/// The unit-facing event sink.
///
/// A unit reports one or more named runs per execution: `run_started`,
/// test case events, then `run_ended`. Calling `run_started` again for the
/// same run before `run_ended` resumes the run after partial execution.
pub trait TestEventSink {
    /// A run began, declaring how many test cases it expects to execute.
    fn run_started(&mut self, run_name: &str, expected_count: usize);

    /// A test case began executing.
    fn test_started(&mut self, id: &TestCaseId);

    /// A test case failed. Reported between `test_started` and
    /// `test_ended`.
    fn test_failed(&mut self, id: &TestCaseId, message: &str);

    /// A test case was deliberately not executed.
    fn test_ignored(&mut self, id: &TestCaseId);

    /// A test case finished, with any metrics it reported.
    fn test_ended(&mut self, id: &TestCaseId, metrics: MetricBag);

    /// A failure affecting the entire current run.
    fn run_failed(&mut self, failure: RunFailure);

    /// The current run finished.
    fn run_ended(&mut self, elapsed: Duration, metrics: MetricBag);
}

/// An attempt-tagged run listener.
///
/// Same event stream as [`TestEventSink`], with the attempt index attached
/// to `run_started`. The attempt aggregator is the primary implementation;
/// side listeners (e.g. log persistence fan-out) implement it too and
/// receive the identical stream, synthetic events included.
pub trait RunListener {
    /// A run began at the given attempt index.
    fn run_started(&mut self, run_name: &str, expected_count: usize, attempt: usize);

    /// A test case began executing.
    fn test_started(&mut self, id: &TestCaseId);

    /// A test case failed.
    fn test_failed(&mut self, id: &TestCaseId, message: &str);

    /// A test case was deliberately not executed.
    fn test_ignored(&mut self, id: &TestCaseId);

    /// A test case finished.
    fn test_ended(&mut self, id: &TestCaseId, metrics: MetricBag);

    /// A failure affecting the entire current run.
    fn run_failed(&mut self, failure: RunFailure);

    /// The current run finished.
    fn run_ended(&mut self, elapsed: Duration, metrics: MetricBag);
}

/// Forwards one identical event stream to a primary listener and any
/// number of side listeners.
pub struct FanoutListener<'a> {
    primary: &'a mut dyn RunListener,
    side: &'a mut [Box<dyn RunListener>],
}

impl<'a> FanoutListener<'a> {
    /// Creates a fan-out over a primary listener and side listeners.
    pub fn new(primary: &'a mut dyn RunListener, side: &'a mut [Box<dyn RunListener>]) -> Self {
        Self { primary, side }
    }
}

impl RunListener for FanoutListener<'_> {
    fn run_started(&mut self, run_name: &str, expected_count: usize, attempt: usize) {
        self.primary.run_started(run_name, expected_count, attempt);
        for listener in self.side.iter_mut() {
            listener.run_started(run_name, expected_count, attempt);
        }
    }

    fn test_started(&mut self, id: &TestCaseId) {
        self.primary.test_started(id);
        for listener in self.side.iter_mut() {
            listener.test_started(id);
        }
    }

    fn test_failed(&mut self, id: &TestCaseId, message: &str) {
        self.primary.test_failed(id, message);
        for listener in self.side.iter_mut() {
            listener.test_failed(id, message);
        }
    }

    fn test_ignored(&mut self, id: &TestCaseId) {
        self.primary.test_ignored(id);
        for listener in self.side.iter_mut() {
            listener.test_ignored(id);
        }
    }

    fn test_ended(&mut self, id: &TestCaseId, metrics: MetricBag) {
        self.primary.test_ended(id, metrics.clone());
        for listener in self.side.iter_mut() {
            listener.test_ended(id, metrics.clone());
        }
    }

    fn run_failed(&mut self, failure: RunFailure) {
        self.primary.run_failed(failure.clone());
        for listener in self.side.iter_mut() {
            listener.run_failed(failure.clone());
        }
    }

    fn run_ended(&mut self, elapsed: Duration, metrics: MetricBag) {
        self.primary.run_ended(elapsed, metrics.clone());
        for listener in self.side.iter_mut() {
            listener.run_ended(elapsed, metrics.clone());
        }
    }
}
