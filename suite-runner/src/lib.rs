// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Module execution core for a device test-suite harness.
//!
//! A *module* is a named group of preparers and executable test units run
//! against a set of allocated devices. This crate drives one module's
//! lifecycle: preparer setup, each unit's retry loop, aggregation of
//! repeated attempts into one authoritative result per test case, and
//! teardown with device-recovery side effects.
//!
//! Everything around this core is a collaborator: module discovery and
//! parameterization, device allocation and command execution, sharding of
//! module sets across workers, and option parsing all live outside this
//! crate. They hand in preparers, test units, a retry configuration and
//! device handles, and get back a [`results::ModuleOutcome`].

pub mod aggregator;
pub mod device;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod module;
pub mod prepare;
pub mod results;
pub mod retry;
pub mod unit;
pub mod unit_runner;

#[cfg(test)]
mod test_support;
