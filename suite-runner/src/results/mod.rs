// Copyright (c) The suite-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The result model: test case identifiers, per-attempt run results, and
//! attempt-merged results.
//!
//! [`RunResult`] records are created as events arrive and sealed when the
//! run ends, one per (run name, attempt). [`MergedRunResult`] is derived by
//! folding an attempt list and is recomputed whenever a new attempt
//! completes; it is never constructed from events directly.

mod outcome;
mod run_result;
mod test_case;

pub use outcome::*;
pub use run_result::*;
pub use test_case::*;
