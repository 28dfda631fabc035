// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The device handle capability.
//!
//! Device allocation and low-level command execution live outside this
//! crate; the orchestrator only needs this narrow surface. Handles are
//! exclusively owned by the orchestrator for the duration of one module's
//! lifecycle, and every call blocks until the device operation finishes.
//! Timeouts are the implementation's responsibility and surface as
//! ordinary [`DeviceError`]s.

use crate::errors::DeviceError;

/// One allocated device.
pub trait DeviceHandle {
    /// The device serial, used in bugreport names and error reports.
    fn serial(&self) -> &str;

    /// Reboots the device, blocking until it is back online.
    fn reboot(&mut self) -> Result<(), DeviceError>;

    /// Runs a shell command on the device and returns its output.
    fn execute_command(&mut self, command: &str) -> Result<String, DeviceError>;

    /// Captures a bugreport under the given name. Returns true on success;
    /// failures are never raised as errors.
    fn capture_bugreport(&mut self, name: &str) -> bool;
}
