use anyhow::{Context, Result, ensure};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Reconciliation loop configuration
    pub monitor: MonitorConfig,

    /// netsh invocation configuration
    pub netsh: NetshConfig,

    /// Log output configuration
    pub log: LogConfig,
}

/// Configuration handed to the reconciliation loop
///
/// Defaults: interface `Wi-Fi`, profiles in `wifi_ip_config.json`, a tick
/// every 5 seconds, change detection enabled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    pub interface_name: String,
    pub profiles_file: PathBuf,
    pub poll_interval: Duration,
    /// Evaluate every tick instead of only when SSID or profile changed
    pub reevaluate_every_tick: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetshConfig {
    pub command_timeout: Duration,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Append log records to this file instead of stdout
    pub log_file: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interface_name: String::from("Wi-Fi"),
            profiles_file: PathBuf::from("wifi_ip_config.json"),
            poll_interval: Duration::from_secs(5),
            reevaluate_every_tick: false,
        }
    }
}

impl Default for NetshConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// Load and validate the configuration from environment variables
    pub fn load() -> Result<Self> {
        Self::load_with(|name| env::var(name).ok())
    }

    /// Load the configuration using `var` to look up variables
    fn load_with(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let monitor = MonitorConfig::load(&var)?;
        let netsh = NetshConfig::load(&var)?;
        let log = LogConfig::load(&var);

        Ok(Self {
            monitor,
            netsh,
            log,
        })
    }
}

impl MonitorConfig {
    fn load(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let interface_name = var("WIFI_INTERFACE").unwrap_or(defaults.interface_name);
        ensure!(
            !interface_name.trim().is_empty(),
            "failed to parse WIFI_INTERFACE: empty"
        );

        let profiles_file = var("PROFILES_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.profiles_file);

        let poll_interval = Duration::from_secs(parse_or(
            var,
            "POLL_INTERVAL_SECS",
            defaults.poll_interval.as_secs(),
        )?);
        ensure!(
            !poll_interval.is_zero(),
            "failed to parse POLL_INTERVAL_SECS: must be greater than 0"
        );

        let reevaluate_every_tick =
            parse_or(var, "REEVALUATE_EVERY_TICK", defaults.reevaluate_every_tick)?;

        Ok(Self {
            interface_name,
            profiles_file,
            poll_interval,
            reevaluate_every_tick,
        })
    }
}

impl NetshConfig {
    fn load(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let command_timeout = Duration::from_secs(parse_or(
            var,
            "COMMAND_TIMEOUT_SECS",
            Self::default().command_timeout.as_secs(),
        )?);
        ensure!(
            !command_timeout.is_zero(),
            "failed to parse COMMAND_TIMEOUT_SECS: must be greater than 0"
        );

        Ok(Self { command_timeout })
    }
}

impl LogConfig {
    fn load(var: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            log_file: var("LOG_FILE")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        }
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .context(format!("failed to parse {name}: invalid format")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::load_with(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[]).expect("should load");

        assert_eq!(config.monitor, MonitorConfig::default());
        assert_eq!(config.monitor.interface_name, "Wi-Fi");
        assert_eq!(config.monitor.poll_interval, Duration::from_secs(5));
        assert_eq!(config.netsh.command_timeout, Duration::from_secs(30));
        assert_eq!(config.log.log_file, None);
    }

    #[test]
    fn overrides_from_environment() {
        let config = load(&[
            ("WIFI_INTERFACE", "WLAN 2"),
            ("PROFILES_FILE", "C:\\ProgramData\\switcher\\profiles.json"),
            ("POLL_INTERVAL_SECS", "10"),
            ("REEVALUATE_EVERY_TICK", "true"),
            ("COMMAND_TIMEOUT_SECS", " 15 "),
            ("LOG_FILE", "switcher.log"),
        ])
        .expect("should load");

        assert_eq!(config.monitor.interface_name, "WLAN 2");
        assert_eq!(
            config.monitor.profiles_file,
            PathBuf::from("C:\\ProgramData\\switcher\\profiles.json")
        );
        assert_eq!(config.monitor.poll_interval, Duration::from_secs(10));
        assert!(config.monitor.reevaluate_every_tick);
        assert_eq!(config.netsh.command_timeout, Duration::from_secs(15));
        assert_eq!(config.log.log_file, Some(PathBuf::from("switcher.log")));
    }

    #[test]
    fn invalid_poll_interval_is_rejected() {
        let err = load(&[("POLL_INTERVAL_SECS", "five")]).expect_err("should fail");
        assert!(err.to_string().contains("POLL_INTERVAL_SECS"));

        let err = load(&[("POLL_INTERVAL_SECS", "0")]).expect_err("should fail");
        assert!(err.to_string().contains("greater than 0"));
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let err = load(&[("REEVALUATE_EVERY_TICK", "yes")]).expect_err("should fail");
        assert!(err.to_string().contains("REEVALUATE_EVERY_TICK"));
    }

    #[test]
    fn empty_interface_is_rejected() {
        assert!(load(&[("WIFI_INTERFACE", " ")]).is_err());
    }

    #[test]
    fn empty_log_file_means_stdout() {
        let config = load(&[("LOG_FILE", "")]).expect("should load");
        assert_eq!(config.log.log_file, None);
    }
}
