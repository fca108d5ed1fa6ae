//! Config loading and logging bootstrap shared by the composer binary
//! (spec §4.10-§4.11). Environment-variable configuration extraction stays
//! on `figment`; the job binary chooses plain or JSON logging via a CLI
//! flag instead of the fixed CloudWatch-flavored JSON init this crate's
//! predecessor always ran.

use figment::providers::Env;
use figment::Figment;
use serde::Deserialize;

/// Initializes the global tracing subscriber, then extracts `Config` from
/// environment variables via figment.
///
/// `log_json` selects structured JSON output (for log aggregation) over
/// the default human-readable compact format used in local/CI runs.
///
/// # Errors
/// If the environment variables don't satisfy `Config`'s schema.
pub fn create_app_context<'a, Config: Deserialize<'a>>(log_json: bool) -> Result<Config, figment::Error> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();

    if log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_current_span(false)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    Figment::new().merge(Env::raw()).extract()
}
