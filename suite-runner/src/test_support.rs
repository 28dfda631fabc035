// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted fakes shared by the crate's unit tests.

use crate::device::DeviceHandle;
use crate::errors::{DeviceError, PrepareError};
use crate::events::{RunListener, TestEventSink};
use crate::metrics::MetricCollector;
use crate::prepare::Preparer;
use crate::results::{MetricBag, RunFailure, TestCaseId};
use crate::unit::{SelectiveFilter, TestUnit};
use smol_str::SmolStr;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

/// Outcome a scripted case produces at a given attempt.
#[derive(Copy, Clone, Debug)]
pub(crate) enum CaseScript {
    Pass,
    Fail,
    Ignore,
}

/// When a scripted device error fires within an attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ErrorPhase {
    /// Before `run_started` is reported.
    BeforeRun,
    /// After `run_started`, leaving the run open.
    MidRun,
}

/// A recorded include-filter call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FilterCall {
    Include(BTreeSet<TestCaseId>),
    Clear,
}

/// A unit that reports one named run per execution, with per-attempt
/// scripted case outcomes.
pub(crate) struct ScriptedUnit {
    name: String,
    run_name: SmolStr,
    cases: Vec<(TestCaseId, Vec<CaseScript>)>,
    run_failures: BTreeMap<usize, String>,
    device_errors: BTreeMap<usize, (ErrorPhase, DeviceError)>,
    filterable: bool,
    filter: Option<BTreeSet<TestCaseId>>,
    pub(crate) filter_calls: Vec<FilterCall>,
    pub(crate) attempts_executed: usize,
}

impl ScriptedUnit {
    pub(crate) fn new(run_name: &str) -> Self {
        Self {
            name: format!("unit-{run_name}"),
            run_name: run_name.into(),
            cases: Vec::new(),
            run_failures: BTreeMap::new(),
            device_errors: BTreeMap::new(),
            filterable: true,
            filter: None,
            filter_calls: Vec::new(),
            attempts_executed: 0,
        }
    }

    pub(crate) fn case(mut self, method: &str, outcomes: &[CaseScript]) -> Self {
        assert!(!outcomes.is_empty());
        self.cases.push((
            TestCaseId::new("com.android.FooTest", method),
            outcomes.to_vec(),
        ));
        self
    }

    pub(crate) fn run_failure_at(mut self, attempt: usize, message: &str) -> Self {
        self.run_failures.insert(attempt, message.to_owned());
        self
    }

    pub(crate) fn device_error_at(
        mut self,
        attempt: usize,
        phase: ErrorPhase,
        error: DeviceError,
    ) -> Self {
        self.device_errors.insert(attempt, (phase, error));
        self
    }

    pub(crate) fn not_filterable(mut self) -> Self {
        self.filterable = false;
        self
    }

    fn selected(&self) -> Vec<(TestCaseId, Vec<CaseScript>)> {
        self.cases
            .iter()
            .filter(|(id, _)| match &self.filter {
                Some(filter) if !filter.is_empty() => filter.contains(id),
                _ => true,
            })
            .cloned()
            .collect()
    }
}

impl TestUnit for ScriptedUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, sink: &mut dyn TestEventSink) -> Result<(), DeviceError> {
        let attempt = self.attempts_executed;
        self.attempts_executed += 1;

        if let Some((ErrorPhase::BeforeRun, error)) = self.device_errors.get(&attempt) {
            return Err(error.clone());
        }

        let selected = self.selected();
        sink.run_started(&self.run_name, selected.len());

        if let Some((ErrorPhase::MidRun, error)) = self.device_errors.get(&attempt) {
            return Err(error.clone());
        }

        for (id, outcomes) in &selected {
            let outcome = outcomes[attempt.min(outcomes.len() - 1)];
            sink.test_started(id);
            match outcome {
                CaseScript::Pass => {}
                CaseScript::Fail => sink.test_failed(id, "scripted failure"),
                CaseScript::Ignore => sink.test_ignored(id),
            }
            sink.test_ended(id, MetricBag::new());
        }

        if let Some(message) = self.run_failures.get(&attempt) {
            sink.run_failed(RunFailure::new(message));
        }
        sink.run_ended(Duration::from_millis(1), MetricBag::new());
        Ok(())
    }

    fn as_filterable(&mut self) -> Option<&mut dyn SelectiveFilter> {
        self.filterable.then_some(self as &mut dyn SelectiveFilter)
    }
}

impl SelectiveFilter for ScriptedUnit {
    fn set_include_filter(&mut self, cases: BTreeSet<TestCaseId>) {
        self.filter_calls.push(FilterCall::Include(cases.clone()));
        self.filter = Some(cases);
    }

    fn clear_include_filter(&mut self) {
        self.filter_calls.push(FilterCall::Clear);
        self.filter = None;
    }
}

/// What a fake device observed.
#[derive(Debug, Default)]
pub(crate) struct DeviceLog {
    pub(crate) reboots: usize,
    pub(crate) bugreports: Vec<String>,
    pub(crate) commands: Vec<String>,
}

pub(crate) struct FakeDevice {
    serial: SmolStr,
    log: Rc<RefCell<DeviceLog>>,
    reboot_error: Option<DeviceError>,
}

impl FakeDevice {
    pub(crate) fn new(serial: &str) -> (Self, Rc<RefCell<DeviceLog>>) {
        let log = Rc::new(RefCell::new(DeviceLog::default()));
        (
            Self {
                serial: serial.into(),
                log: log.clone(),
                reboot_error: None,
            },
            log,
        )
    }

    pub(crate) fn with_reboot_error(mut self, error: DeviceError) -> Self {
        self.reboot_error = Some(error);
        self
    }
}

impl DeviceHandle for FakeDevice {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn reboot(&mut self) -> Result<(), DeviceError> {
        self.log.borrow_mut().reboots += 1;
        match &self.reboot_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn execute_command(&mut self, command: &str) -> Result<String, DeviceError> {
        self.log.borrow_mut().commands.push(command.to_owned());
        Ok(String::new())
    }

    fn capture_bugreport(&mut self, name: &str) -> bool {
        self.log.borrow_mut().bugreports.push(name.to_owned());
        true
    }
}

/// What a fake preparer observed.
#[derive(Debug, Default)]
pub(crate) struct PrepLog {
    pub(crate) setups: Vec<String>,
    pub(crate) teardowns: Vec<(String, Option<DeviceError>)>,
}

pub(crate) struct FakePreparer {
    name: String,
    log: Rc<RefCell<PrepLog>>,
    setup_error: Option<PrepareError>,
    teardown_error: Option<PrepareError>,
    disabled: bool,
    teardown_disabled: bool,
}

impl FakePreparer {
    pub(crate) fn new(name: &str, log: Rc<RefCell<PrepLog>>) -> Self {
        Self {
            name: name.to_owned(),
            log,
            setup_error: None,
            teardown_error: None,
            disabled: false,
            teardown_disabled: false,
        }
    }

    pub(crate) fn with_setup_error(mut self, error: PrepareError) -> Self {
        self.setup_error = Some(error);
        self
    }

    pub(crate) fn with_teardown_error(mut self, error: PrepareError) -> Self {
        self.teardown_error = Some(error);
        self
    }

    pub(crate) fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub(crate) fn teardown_disabled(mut self) -> Self {
        self.teardown_disabled = true;
        self
    }
}

impl Preparer for FakePreparer {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_up(&mut self, _devices: &mut [Box<dyn DeviceHandle>]) -> Result<(), PrepareError> {
        self.log.borrow_mut().setups.push(self.name.clone());
        match &self.setup_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn tear_down(
        &mut self,
        _devices: &mut [Box<dyn DeviceHandle>],
        triggering_error: Option<&DeviceError>,
    ) -> Result<(), PrepareError> {
        self.log
            .borrow_mut()
            .teardowns
            .push((self.name.clone(), triggering_error.cloned()));
        match &self.teardown_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn is_teardown_disabled(&self) -> bool {
        self.teardown_disabled
    }
}

/// A side listener that flattens every event into a string, for stream
/// equality checks.
pub(crate) struct RecordingListener {
    events: Rc<RefCell<Vec<String>>>,
}

impl RecordingListener {
    pub(crate) fn new() -> (Self, Rc<RefCell<Vec<String>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                events: events.clone(),
            },
            events,
        )
    }
}

impl RunListener for RecordingListener {
    fn run_started(&mut self, run_name: &str, expected_count: usize, attempt: usize) {
        self.events
            .borrow_mut()
            .push(format!("run_started:{run_name}:{expected_count}:{attempt}"));
    }

    fn test_started(&mut self, id: &TestCaseId) {
        self.events.borrow_mut().push(format!("test_started:{id}"));
    }

    fn test_failed(&mut self, id: &TestCaseId, message: &str) {
        self.events
            .borrow_mut()
            .push(format!("test_failed:{id}:{message}"));
    }

    fn test_ignored(&mut self, id: &TestCaseId) {
        self.events.borrow_mut().push(format!("test_ignored:{id}"));
    }

    fn test_ended(&mut self, id: &TestCaseId, _metrics: MetricBag) {
        self.events.borrow_mut().push(format!("test_ended:{id}"));
    }

    fn run_failed(&mut self, failure: RunFailure) {
        self.events
            .borrow_mut()
            .push(format!("run_failed:{}", failure.message));
    }

    fn run_ended(&mut self, _elapsed: Duration, _metrics: MetricBag) {
        self.events.borrow_mut().push("run_ended".to_owned());
    }
}

/// A metric collector that records callback order.
pub(crate) struct FakeCollector {
    calls: Rc<RefCell<Vec<String>>>,
    disabled: bool,
}

impl FakeCollector {
    pub(crate) fn new(disabled: bool) -> (Self, Rc<RefCell<Vec<String>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                calls: calls.clone(),
                disabled,
            },
            calls,
        )
    }
}

impl MetricCollector for FakeCollector {
    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn on_run_start(&mut self, run_name: &str) {
        self.calls.borrow_mut().push(format!("run_start:{run_name}"));
    }

    fn on_run_end(&mut self, run_name: &str, _metrics: &MetricBag) {
        self.calls.borrow_mut().push(format!("run_end:{run_name}"));
    }

    fn on_test_start(&mut self, id: &TestCaseId) {
        self.calls.borrow_mut().push(format!("test_start:{id}"));
    }

    fn on_test_end(&mut self, id: &TestCaseId, _metrics: &MetricBag) {
        self.calls.borrow_mut().push(format!("test_end:{id}"));
    }
}
