// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The executable test unit capability and its selective-filter extension.

use crate::errors::DeviceError;
use crate::events::TestEventSink;
use crate::results::TestCaseId;
use std::collections::BTreeSet;

/// One executable group of test cases.
///
/// A unit reports one or more named runs through the sink during
/// [`run`](Self::run). Returning a [`DeviceError`] aborts the attempt:
/// unavailability is fatal to the whole module, unresponsiveness is
/// recovered by the orchestrator.
pub trait TestUnit {
    /// A short name for logging.
    fn name(&self) -> &str;

    /// Executes the unit, reporting events to `sink`.
    fn run(&mut self, sink: &mut dyn TestEventSink) -> Result<(), DeviceError>;

    /// The selective re-run capability, if this unit can narrow an
    /// execution to a subset of its test cases. Units that can only run in
    /// full return `None` -- and are never retried, to avoid silently
    /// re-executing an entire suite redundantly.
    fn as_filterable(&mut self) -> Option<&mut dyn SelectiveFilter> {
        None
    }
}

/// Narrows a unit's next execution to an explicit set of test cases.
pub trait SelectiveFilter {
    /// Restricts the next run to the given cases. An empty set means no
    /// restriction.
    fn set_include_filter(&mut self, cases: BTreeSet<TestCaseId>);

    /// Clears any include filter; the next run executes in full.
    fn clear_include_filter(&mut self);
}
