use crate::cli::{
    actions::Action,
    commands::{
        self,
        logging::{ARG_LOG_JSON, ARG_VERBOSITY},
    },
    dispatch::handler,
    telemetry,
};
use anyhow::Result;

/// Parse the command line, set up logging and return the action to run.
/// # Errors
/// Returns an error if logging cannot be initialized or the arguments are inconsistent.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity_level = match matches.get_one::<u8>(ARG_VERBOSITY).map_or(0, |&v| v) {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    telemetry::init(Some(verbosity_level), matches.get_flag(ARG_LOG_JSON))?;

    let action = handler(&matches)?;

    Ok(action)
}
