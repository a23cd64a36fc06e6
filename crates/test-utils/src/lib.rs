// crates/test-utils/src/lib.rs

//! Shared helpers for the `simrunner` integration tests.

pub mod builders;
pub mod fakes;

use std::sync::Once;

use simrunner::logging::LOG_ENV_VAR;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Install a per-test tracing subscriber once per test binary.
///
/// Output goes through the test writer, so it only shows for failing tests
/// (or with `--nocapture`). The filter comes from `SIMRUNNER_LOG`, e.g.
/// `SIMRUNNER_LOG=simrunner=debug`, and defaults to `info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}
