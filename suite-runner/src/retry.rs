// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry strategy decisions and recovery statistics.
//!
//! [`RetryPolicy::decide`] is a pure function of the strategy, the attempt
//! index and the latest attempt's outcome; the statistics accumulator is
//! the only state, scoped to one unit's full attempt loop.

use crate::results::{RetryStatistics, TestCaseId, TestStatus};
use serde::Deserialize;
use std::collections::BTreeSet;

/// How a module's units are retried across attempts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// Run each unit exactly once.
    #[default]
    NoRetry,

    /// Retry while the latest attempt reported a run failure or at least
    /// one failed test case. While a run-level failure is present the next
    /// attempt re-runs the whole unit unfiltered; once it clears, later
    /// attempts narrow to the still-failing cases.
    RetryAnyFailure,

    /// Run a fixed number of iterations regardless of outcome.
    Iterations,

    /// Keep re-running while attempts stay clean; stop on the first
    /// failure.
    RerunUntilFailure,
}

/// Retry configuration handed to the orchestrator by the option layer.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RetryConfig {
    /// The retry strategy.
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Upper bound on attempts per unit, counting the first execution.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Reboot every allocated device right before the final attempt, as
    /// best-effort recovery. Independent of strategy.
    #[serde(default)]
    pub reboot_at_last_retry: bool,
}

fn default_max_attempts() -> usize {
    1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::default(),
            max_attempts: default_max_attempts(),
            reboot_at_last_retry: false,
        }
    }
}

impl RetryConfig {
    /// A configuration that runs every unit exactly once.
    pub fn no_retry() -> Self {
        Self::default()
    }

    /// A configuration retrying any failure up to `max_attempts` total
    /// attempts.
    pub fn retry_any_failure(max_attempts: usize) -> Self {
        Self {
            strategy: RetryStrategy::RetryAnyFailure,
            max_attempts,
            reboot_at_last_retry: false,
        }
    }
}

/// Summary of the latest attempt, as input to the retry decision.
#[derive(Clone, Debug, Default)]
pub struct AttemptOutcome {
    /// Whether any run the unit reported ended with a run-level failure.
    pub run_failure: bool,

    /// Test cases that ended the attempt failed, across the unit's runs.
    pub failing_cases: BTreeSet<TestCaseId>,
}

impl AttemptOutcome {
    fn is_clean(&self) -> bool {
        !self.run_failure && self.failing_cases.is_empty()
    }
}

/// What the retry wrapper should do after an attempt completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stop; the attempt loop is done.
    Stop,

    /// Run another attempt against the full unit, unfiltered.
    RetryAll,

    /// Run another attempt narrowed to the still-failing test cases.
    RetryFiltered {
        /// The cases to re-run.
        failing: BTreeSet<TestCaseId>,
    },
}

/// Decides whether to keep attempting a unit, and accumulates recovery
/// statistics over the loop.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    stats: RetryStatistics,
}

impl RetryPolicy {
    /// Creates a policy for one unit's attempt loop.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            stats: RetryStatistics::default(),
        }
    }

    /// The configuration this policy decides under.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// True when `attempt` is the last attempt the configuration allows.
    pub fn is_final_attempt(&self, attempt: usize) -> bool {
        attempt + 1 >= self.config.max_attempts
    }

    /// Decides what to do after `attempt` completed with `outcome`.
    ///
    /// A unit without the selective-filter capability is never continued
    /// past attempt 0, regardless of strategy or failures. This is an
    /// explicit contract, not an oversight: re-running such a unit would
    /// silently re-execute its entire suite.
    pub fn decide(
        &self,
        attempt: usize,
        outcome: &AttemptOutcome,
        supports_filtering: bool,
    ) -> RetryDecision {
        if self.is_final_attempt(attempt) {
            return RetryDecision::Stop;
        }
        if !supports_filtering {
            return RetryDecision::Stop;
        }

        match self.config.strategy {
            RetryStrategy::NoRetry => RetryDecision::Stop,
            RetryStrategy::Iterations => RetryDecision::RetryAll,
            RetryStrategy::RerunUntilFailure => {
                if outcome.is_clean() {
                    RetryDecision::RetryAll
                } else {
                    RetryDecision::Stop
                }
            }
            RetryStrategy::RetryAnyFailure => {
                if outcome.run_failure {
                    // A run-level failure taints the whole execution, so
                    // partial filtering is unsafe.
                    RetryDecision::RetryAll
                } else if !outcome.failing_cases.is_empty() {
                    RetryDecision::RetryFiltered {
                        failing: outcome.failing_cases.clone(),
                    }
                } else {
                    RetryDecision::Stop
                }
            }
        }
    }

    /// Records the final merged status of one test case, once all attempts
    /// are done. Only cases that failed at least once are counted, and the
    /// iterations strategy records no statistics at all.
    pub fn record_case(&mut self, ever_failed: bool, final_status: TestStatus) {
        if self.config.strategy == RetryStrategy::Iterations || !ever_failed {
            return;
        }
        match final_status {
            TestStatus::Passed => self.stats.recovered_count += 1,
            TestStatus::Failed => self.stats.still_failing_count += 1,
            TestStatus::Ignored | TestStatus::Incomplete => {}
        }
    }

    /// The statistics accumulated so far.
    pub fn statistics(&self) -> RetryStatistics {
        self.stats
    }
}
