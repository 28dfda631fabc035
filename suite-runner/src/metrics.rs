// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Side-channel metric collectors.
//!
//! Collectors observe run and test boundaries for every attempt that
//! actually executes, without participating in result aggregation. A
//! disabled collector receives no callbacks at all.

use crate::results::{MetricBag, TestCaseId};

/// Observes run/test start and end across a unit's attempts.
pub trait MetricCollector {
    /// Disabled collectors receive none of the callbacks below, ever.
    fn is_disabled(&self) -> bool {
        false
    }

    /// A run began.
    fn on_run_start(&mut self, run_name: &str);

    /// A run finished, with the metrics it reported.
    fn on_run_end(&mut self, run_name: &str, metrics: &MetricBag);

    /// A test case began.
    fn on_test_start(&mut self, id: &TestCaseId);

    /// A test case finished, with the metrics it reported.
    fn on_test_end(&mut self, id: &TestCaseId, metrics: &MetricBag);
}
