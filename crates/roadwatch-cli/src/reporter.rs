//! Reporter identity resolution for CLI commands.
//!
//! The resolution chain: `--as` flag > `ROADWATCH_USER` env > `reporter` in
//! the user config > the configured anonymous name.

use std::env;

/// Environment reader, injectable for tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn resolve_reporter_with(
    cli_flag: Option<&str>,
    configured: Option<&str>,
    anonymous: &str,
    env: &dyn EnvReader,
) -> String {
    cli_flag
        .and_then(non_blank)
        .or_else(|| env.get("ROADWATCH_USER").as_deref().and_then(non_blank))
        .or_else(|| configured.and_then(non_blank))
        .unwrap_or_else(|| anonymous.to_string())
}

/// Resolve who is filing or updating reports.
pub fn resolve_reporter(cli_flag: Option<&str>, configured: Option<&str>, anonymous: &str) -> String {
    resolve_reporter_with(cli_flag, configured, anonymous, &RealEnv)
}
