// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the module execution core.

use smol_str::SmolStr;
use thiserror::Error;

/// An error raised by a device handle, or by a unit driving one.
///
/// The two variants have asymmetric handling: [`Unavailable`] is fatal and
/// propagates out of the orchestrator after teardown has been attempted,
/// while [`Unresponsive`] is converted into a run failure and execution
/// continues.
///
/// [`Unavailable`]: DeviceError::Unavailable
/// [`Unresponsive`]: DeviceError::Unresponsive
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The device is gone and cannot be recovered.
    #[error("device {serial} unavailable: {message}")]
    Unavailable {
        /// The serial of the device that was lost.
        serial: SmolStr,
        /// A description of how the device was lost.
        message: String,
    },

    /// The device stopped responding but was recovered.
    #[error("device {serial} unresponsive: {message}")]
    Unresponsive {
        /// The serial of the device that stopped responding.
        serial: SmolStr,
        /// A description of the unresponsive condition.
        message: String,
    },
}

impl DeviceError {
    /// Creates a fatal unavailability error.
    pub fn unavailable(serial: impl Into<SmolStr>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            serial: serial.into(),
            message: message.into(),
        }
    }

    /// Creates a recoverable unresponsive error.
    pub fn unresponsive(serial: impl Into<SmolStr>, message: impl Into<String>) -> Self {
        Self::Unresponsive {
            serial: serial.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors that abort the remaining module lifecycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// The serial of the device the error was raised against.
    pub fn serial(&self) -> &SmolStr {
        match self {
            Self::Unavailable { serial, .. } | Self::Unresponsive { serial, .. } => serial,
        }
    }
}

/// A normalized preparer failure.
///
/// Checked failures, unexpected runtime errors and assertion failures are
/// all collapsed into this one shape at the preparer boundary, so the
/// orchestrator's state machine branches on a single tagged outcome rather
/// than on error class.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PrepareError {
    /// The preparer reported a failure.
    #[error("{message}")]
    Failed {
        /// A description of what went wrong.
        message: String,
    },

    /// A device error surfaced while the preparer ran.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl PrepareError {
    /// Creates a plain preparer failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Returns the underlying device error if this failure is a fatal
    /// device unavailability, and `None` otherwise.
    pub fn fatal_device(&self) -> Option<&DeviceError> {
        match self {
            Self::Device(err) if err.is_fatal() => Some(err),
            _ => None,
        }
    }
}
