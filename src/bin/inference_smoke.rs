//! Fire sample prediction requests at a running model server.
//!
//! `INFERENCE_URL` overrides the endpoint. Request failures are counted,
//! never fatal.

use std::io::{self, Write};

use anyhow::Context;
use attrition_ml::inference::{run_smoke_test, SmokeTestConfig};
use attrition_ml::logging::{self, LoggingConfig};

fn main() -> anyhow::Result<()> {
    logging::init(&LoggingConfig::default()).context("failed to initialize logging")?;

    let config = SmokeTestConfig::from_env();
    let mut out = io::stdout();
    let report = run_smoke_test(&config, &mut out).context("failed to write progress")?;
    out.flush()?;
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed(),
        "Smoke test finished"
    );
    Ok(())
}
