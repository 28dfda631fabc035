// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The module lifecycle orchestrator.
//!
//! Runs preparers, drives each unit through its retry loop, runs teardown,
//! and classifies failures along the way. The lifecycle is strictly
//! sequential; every device call blocks. The caller always gets a
//! well-formed [`ModuleOutcome`] back, except when a device becomes
//! unavailable, in which case that error propagates after teardown has
//! still been attempted.

use crate::aggregator::AttemptAggregator;
use crate::device::DeviceHandle;
use crate::errors::{DeviceError, PrepareError};
use crate::events::{FanoutListener, RunListener};
use crate::metrics::MetricCollector;
use crate::prepare::Preparer;
use crate::results::{
    FailureStatus, MetricBag, ModuleOutcome, RetryStatistics, RunFailure,
};
use crate::retry::RetryConfig;
use crate::unit::TestUnit;
use crate::unit_runner::UnitRunner;
use serde::Deserialize;
use smol_str::SmolStr;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle states for one module run.
///
/// `Aborted` is absorbing and reachable only from `Prepare`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModuleState {
    /// Not started yet.
    Init,
    /// Running preparer setup.
    Prepare,
    /// Running test units.
    Execute,
    /// Running preparer teardown.
    Teardown,
    /// Finished.
    Done,
    /// Setup failed; execution was skipped.
    Aborted,
}

/// Execution mode forced by a capability check before execution.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleRunMode {
    /// Run everything normally.
    #[default]
    Normal,

    /// Skip preparers; units still execute their runs, but every test case
    /// outcome is converted to ignored.
    SkipTestCases,

    /// Emit no events at all and produce an empty outcome.
    FullBypass,
}

/// Static description of a module, handed in by the configuration layer.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ModuleConfig {
    /// The module identifier, e.g. `armeabi-v7a CtsGestureTestCases`.
    pub id: SmolStr,

    /// External resource tokens the module needs (e.g. a SIM card).
    #[serde(default)]
    pub required_tokens: BTreeSet<SmolStr>,

    /// Retry configuration applied to each unit.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Execution mode forced by the capability check.
    #[serde(default)]
    pub run_mode: ModuleRunMode,
}

impl ModuleConfig {
    /// A plain module with no tokens and no retries.
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self {
            id: id.into(),
            required_tokens: BTreeSet::new(),
            retry: RetryConfig::default(),
            run_mode: ModuleRunMode::default(),
        }
    }
}

/// Builder for [`ModuleRunner`].
pub struct ModuleRunnerBuilder {
    config: ModuleConfig,
    preparers: Vec<Box<dyn Preparer>>,
    units: Vec<Box<dyn TestUnit>>,
    devices: Vec<Box<dyn DeviceHandle>>,
    collectors: Vec<Box<dyn MetricCollector>>,
    side_listeners: Vec<Box<dyn RunListener>>,
}

impl ModuleRunnerBuilder {
    /// Starts a builder for the given module configuration.
    pub fn new(config: ModuleConfig) -> Self {
        Self {
            config,
            preparers: Vec::new(),
            units: Vec::new(),
            devices: Vec::new(),
            collectors: Vec::new(),
            side_listeners: Vec::new(),
        }
    }

    /// Adds a preparer; setup runs in the order added, teardown in
    /// reverse.
    pub fn preparer(mut self, preparer: Box<dyn Preparer>) -> Self {
        self.preparers.push(preparer);
        self
    }

    /// Adds an executable unit; units run in the order added.
    pub fn unit(mut self, unit: Box<dyn TestUnit>) -> Self {
        self.units.push(unit);
        self
    }

    /// Adds an allocated device handle.
    pub fn device(mut self, device: Box<dyn DeviceHandle>) -> Self {
        self.devices.push(device);
        self
    }

    /// Adds a side-channel metric collector.
    pub fn collector(mut self, collector: Box<dyn MetricCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    /// Adds a side listener receiving the identical event stream as the
    /// aggregator, synthetic events included.
    pub fn side_listener(mut self, listener: Box<dyn RunListener>) -> Self {
        self.side_listeners.push(listener);
        self
    }

    /// Builds the runner.
    pub fn build(self) -> ModuleRunner {
        ModuleRunner {
            config: self.config,
            preparers: self.preparers,
            units: self.units,
            devices: self.devices,
            collectors: self.collectors,
            side_listeners: self.side_listeners,
            state: ModuleState::Init,
        }
    }
}

/// Executes one module's full lifecycle.
pub struct ModuleRunner {
    config: ModuleConfig,
    preparers: Vec<Box<dyn Preparer>>,
    units: Vec<Box<dyn TestUnit>>,
    devices: Vec<Box<dyn DeviceHandle>>,
    collectors: Vec<Box<dyn MetricCollector>>,
    side_listeners: Vec<Box<dyn RunListener>>,
    state: ModuleState,
}

impl ModuleRunner {
    /// Starts a builder for the given module configuration.
    pub fn builder(config: ModuleConfig) -> ModuleRunnerBuilder {
        ModuleRunnerBuilder::new(config)
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ModuleState {
        self.state
    }

    /// Runs the module lifecycle to completion.
    ///
    /// Returns an error only for a fatal device unavailability; every
    /// other failure is folded into the outcome.
    pub fn run(&mut self) -> Result<ModuleOutcome, DeviceError> {
        assert!(
            self.state == ModuleState::Init,
            "module lifecycle already ran"
        );
        info!(module = %self.config.id, "running module");

        if self.config.run_mode == ModuleRunMode::FullBypass {
            debug!(module = %self.config.id, "full bypass; emitting nothing");
            self.state = ModuleState::Done;
            return Ok(ModuleOutcome::empty(self.config.required_tokens.clone()));
        }

        let mut aggregator = AttemptAggregator::new();
        let skip_preparers = self.config.run_mode == ModuleRunMode::SkipTestCases;

        self.state = ModuleState::Prepare;
        let setup_error = if skip_preparers {
            debug!(module = %self.config.id, "skipping preparers");
            None
        } else {
            self.run_setup()
        };
        if let Some(error) = setup_error {
            return self.abort(error, aggregator);
        }

        self.state = ModuleState::Execute;
        let mut stats = RetryStatistics::default();
        let mut deferred: Vec<RunFailure> = Vec::new();
        let mut fatal: Option<DeviceError> = None;

        for index in 0..self.units.len() {
            let mut runner = UnitRunner::new(
                &self.config.retry,
                &mut self.devices,
                &mut self.collectors,
            );
            if skip_preparers {
                runner = runner.converting_to_ignored();
            }
            let result = runner.run(
                self.units[index].as_mut(),
                &mut aggregator,
                &mut self.side_listeners,
            );
            match result {
                Ok(unit_result) => stats.absorb(unit_result.statistics),
                Err(error @ DeviceError::Unavailable { .. }) => {
                    warn!(%error, "fatal device error; aborting module execution");
                    fatal = Some(error);
                    break;
                }
                Err(error @ DeviceError::Unresponsive { .. }) => {
                    warn!(serial = %error.serial(), "device unresponsive; recovered, converting to run failure");
                    let failure =
                        RunFailure::with_status(error.to_string(), FailureStatus::DeviceRecovered);
                    if aggregator.active_run().is_some() {
                        let mut fanout =
                            FanoutListener::new(&mut aggregator, &mut self.side_listeners);
                        fanout.run_failed(failure);
                        fanout.run_ended(Duration::ZERO, MetricBag::new());
                    } else {
                        deferred.push(failure);
                    }
                    self.capture_failure_bugreport(&error);
                }
            }
        }

        self.state = ModuleState::Teardown;
        let teardown_failures = if skip_preparers {
            Vec::new()
        } else {
            self.run_teardown(fatal.as_ref())
        };
        if fatal.is_none() {
            deferred.extend(teardown_failures);
        } else if !teardown_failures.is_empty() {
            warn!(
                count = teardown_failures.len(),
                "ignoring teardown failures after fatal device error"
            );
        }

        if let Some(error) = fatal {
            return Err(error);
        }

        if !deferred.is_empty() {
            let combined = RunFailure::combine(&deferred).expect("deferred is non-empty");
            let mut fanout = FanoutListener::new(&mut aggregator, &mut self.side_listeners);
            fanout.run_started(&self.config.id, 0, 0);
            fanout.run_failed(combined);
            fanout.run_ended(Duration::ZERO, MetricBag::new());
        }

        self.state = ModuleState::Done;
        Ok(ModuleOutcome {
            merged: aggregator.merged_results(),
            module_failure: None,
            attempts: aggregator.into_attempts(),
            retry_stats: stats,
            required_tokens: self.config.required_tokens.clone(),
        })
    }

    /// Aborts out of `Prepare`: teardown still runs, one synthetic run
    /// carries the setup failure, and only a fatal device unavailability
    /// propagates.
    fn abort(
        &mut self,
        error: PrepareError,
        mut aggregator: AttemptAggregator,
    ) -> Result<ModuleOutcome, DeviceError> {
        self.state = ModuleState::Aborted;
        warn!(module = %self.config.id, %error, "setup failed; aborting module");

        let trigger = error.fatal_device().cloned();
        let teardown_failures = self.run_teardown(trigger.as_ref());

        let mut causes = vec![RunFailure::with_status(
            error.to_string(),
            FailureStatus::SetupFailure,
        )];
        causes.extend(teardown_failures);
        let combined = RunFailure::combine(&causes).expect("at least the setup cause");

        {
            let mut fanout = FanoutListener::new(&mut aggregator, &mut self.side_listeners);
            fanout.run_started(&self.config.id, 1, 0);
            fanout.run_failed(combined.clone());
            fanout.run_ended(Duration::ZERO, MetricBag::new());
        }

        if let Some(device_error) = trigger {
            return Err(device_error);
        }

        Ok(ModuleOutcome {
            merged: aggregator.merged_results(),
            module_failure: Some(combined),
            attempts: aggregator.into_attempts(),
            retry_stats: RetryStatistics::default(),
            required_tokens: self.config.required_tokens.clone(),
        })
    }

    fn run_setup(&mut self) -> Option<PrepareError> {
        for index in 0..self.preparers.len() {
            if self.preparers[index].is_disabled() {
                debug!(
                    preparer = self.preparers[index].name(),
                    "preparer disabled; skipping setup"
                );
                continue;
            }
            debug!(preparer = self.preparers[index].name(), "running setup");
            if let Err(error) = self.preparers[index].set_up(&mut self.devices) {
                return Some(error);
            }
        }
        None
    }

    /// Teardown in reverse declared order, regardless of how execution
    /// went. Individual failures are collected, never raised.
    fn run_teardown(&mut self, trigger: Option<&DeviceError>) -> Vec<RunFailure> {
        let mut failures = Vec::new();
        for index in (0..self.preparers.len()).rev() {
            if self.preparers[index].is_disabled()
                || self.preparers[index].is_teardown_disabled()
            {
                debug!(
                    preparer = self.preparers[index].name(),
                    "teardown disabled; skipping"
                );
                continue;
            }
            debug!(preparer = self.preparers[index].name(), "running teardown");
            if let Err(error) = self.preparers[index].tear_down(&mut self.devices, trigger) {
                warn!(preparer = self.preparers[index].name(), %error, "teardown failed");
                failures.push(RunFailure::new(error.to_string()));
            }
        }
        failures
    }

    fn capture_failure_bugreport(&mut self, error: &DeviceError) {
        let serial = error.serial();
        let name = format!("module-{}-failure-{serial}-bugreport", self.config.id);
        match self
            .devices
            .iter_mut()
            .find(|device| device.serial() == serial.as_str())
        {
            Some(device) => {
                if device.capture_bugreport(&name) {
                    debug!(%serial, name = name.as_str(), "captured bugreport");
                } else {
                    warn!(%serial, name = name.as_str(), "bugreport capture failed");
                }
            }
            None => warn!(%serial, "no allocated device matches; skipping bugreport"),
        }
    }
}
