// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The preparer capability: setup/teardown hooks bound to a module's
//! devices.

use crate::device::DeviceHandle;
use crate::errors::{DeviceError, PrepareError};

/// A setup/teardown hook run before and after a module's tests.
///
/// Setup runs in declared order, teardown in reverse declared order.
/// Implementations normalize whatever goes wrong into a [`PrepareError`];
/// the orchestrator treats every setup error uniformly as a setup failure.
pub trait Preparer {
    /// A short name for logging and failure messages.
    fn name(&self) -> &str;

    /// Prepares the target devices.
    fn set_up(&mut self, devices: &mut [Box<dyn DeviceHandle>]) -> Result<(), PrepareError>;

    /// Undoes the preparation. `triggering_error` is set only when a fatal
    /// device unavailability aborted the lifecycle; otherwise teardown runs
    /// as if nothing went wrong.
    fn tear_down(
        &mut self,
        devices: &mut [Box<dyn DeviceHandle>],
        triggering_error: Option<&DeviceError>,
    ) -> Result<(), PrepareError>;

    /// Disabled preparers are skipped entirely.
    fn is_disabled(&self) -> bool {
        false
    }

    /// Skips only the teardown half of this preparer.
    fn is_teardown_disabled(&self) -> bool {
        false
    }
}
