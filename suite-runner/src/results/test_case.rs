// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Metrics attached to a test case or run, in reporting order.
pub type MetricBag = IndexMap<SmolStr, String>;

/// Identifies one test case within a run, independent of the attempt in
/// which it executed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestCaseId {
    /// The class (or fixture) the test case belongs to.
    pub class_name: SmolStr,

    /// The method within the class.
    pub method_name: SmolStr,
}

impl TestCaseId {
    /// Creates a new test case identifier.
    pub fn new(class_name: impl Into<SmolStr>, method_name: impl Into<SmolStr>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.method_name)
    }
}

/// The status of one test case within one attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    /// The test case ran to completion without failing.
    Passed,

    /// The test case reported a failure.
    Failed,

    /// The test case was deliberately not executed.
    Ignored,

    /// The test case started but never ended. Usually means the runner
    /// crashed partway through the run.
    Incomplete,
}

/// The recorded outcome of one test case within one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCaseResult {
    /// The status the test case ended the attempt with.
    pub status: TestStatus,

    /// The failure message, if the test case failed.
    pub message: Option<String>,

    /// Metrics reported alongside the test case.
    pub metrics: MetricBag,
}

impl TestCaseResult {
    pub(crate) fn incomplete() -> Self {
        Self {
            status: TestStatus::Incomplete,
            message: None,
            metrics: MetricBag::new(),
        }
    }
}
