//! Shared test harness modules for the Waypost CLI.
#![expect(clippy::expect_used, reason = "tests should fail fast when setup breaks")]

use super::*;

mod helpers;
mod score_unit;
