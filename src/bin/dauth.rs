use anyhow::Result;
use dauth::cli::{start, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let action = start()?;

    let result = action.execute().await;

    // Flush pending spans before exit.
    telemetry::shutdown_tracer();

    result
}
