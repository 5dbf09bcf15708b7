use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a full filter directive; it overrides every other source.
pub const LOG_ENV: &str = "VAULTVIEW_LOG";

/// 依優先順序選出日誌過濾字串。 / Picks the filter directive: environment, then the
/// `--log-level` flag, then the preferences file.
pub fn log_directive(
    env_value: Option<&str>,
    cli_level: Option<&str>,
    prefs_level: &str,
) -> String {
    env_value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or(cli_level)
        .unwrap_or(prefs_level)
        .to_string()
}

/// Installs the stderr subscriber. Stdout stays reserved for command output.
pub fn init_logging(cli_level: Option<&str>, prefs_level: &str) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    let directive = log_directive(env_value.as_deref(), cli_level, prefs_level);
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter `{directive}`"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("install log subscriber: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_wins_over_flag_and_preferences() {
        assert_eq!(
            log_directive(Some("vaultview_core=trace"), Some("info"), "warn"),
            "vaultview_core=trace"
        );
    }

    #[test]
    fn flag_wins_over_preferences() {
        assert_eq!(log_directive(None, Some("debug"), "warn"), "debug");
        assert_eq!(log_directive(Some("  "), Some("debug"), "warn"), "debug");
    }

    #[test]
    fn preferences_are_the_fallback() {
        assert_eq!(log_directive(None, None, "error"), "error");
    }
}
