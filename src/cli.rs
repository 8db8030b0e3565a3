use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::router::RouterConfig;
use crate::sink::SinkConfig;
use crate::Config;

/// Polls a RouterOS router for PPPoE sessions and interface throughput and
/// writes them to InfluxDB.
#[derive(Debug, Parser)]
#[command(name = "pppoe-monitor", version)]
pub struct Args {
    /// Router management API host; also tags every record
    #[arg(long, env = "ROUTER_IP", default_value = "192.168.88.1")]
    pub router_ip: String,

    /// Router management API port
    #[arg(long, env = "ROUTER_PORT", default_value_t = 8728)]
    pub router_port: u16,

    #[arg(long, env = "ROUTER_USER", default_value = "admin")]
    pub router_user: String,

    #[arg(long, env = "ROUTER_PASS", default_value = "yourpassword", hide_env_values = true)]
    pub router_pass: String,

    /// Seconds allowed for connect, login and query of one fetch
    #[arg(long, env = "ROUTER_TIMEOUT", default_value_t = 10.0)]
    pub router_timeout: f64,

    /// Line-protocol write URL including org/bucket query parameters
    #[arg(
        long,
        env = "INFLUX_URL",
        default_value = "http://influxdb:8086/api/v2/write?org=netmon&bucket=pppoe"
    )]
    pub influx_url: String,

    #[arg(long, env = "INFLUX_TOKEN", default_value = "your_influx_token", hide_env_values = true)]
    pub influx_token: String,

    /// Seconds allowed for a single write request
    #[arg(long, env = "INFLUX_TIMEOUT", default_value_t = 3.0)]
    pub influx_timeout: f64,

    /// Seconds between polls; also the elapsed time used for bandwidth
    #[arg(long, env = "POLL_INTERVAL", default_value_t = 5.0)]
    pub poll_interval: f64,

    /// Extra `key=value` tag added to every record (repeatable)
    #[arg(long = "tag", env = "INFLUX_TAGS", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Run a single poll cycle and exit
    #[arg(long, env = "MONITOR_ONCE")]
    pub once: bool,

    /// Log filter directive, e.g. `info` or `routeros_pppoe_monitor=debug`
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Invalid command-line or environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid duration; option={option}; value={value}")]
    Duration { option: &'static str, value: f64 },
    #[error("Invalid tag; tag={0}")]
    Tag(String),
}

impl Args {
    /// Validates the arguments and converts them into a runtime [`Config`].
    ///
    /// # Errors
    ///
    /// Errors if a duration is not a positive finite number of seconds, or a
    /// tag is not of the form `key=value`.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let default_tags = self
            .tags
            .iter()
            .map(String::as_str)
            .map(parse_tag)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Config {
            router: RouterConfig {
                address: self.router_ip,
                port: self.router_port,
                username: self.router_user,
                password: self.router_pass,
                timeout: seconds("router-timeout", self.router_timeout)?,
            },
            sink: SinkConfig {
                write_url: self.influx_url,
                token: self.influx_token,
                timeout: seconds("influx-timeout", self.influx_timeout)?,
                default_tags,
            },
            interval: seconds("poll-interval", self.poll_interval)?,
            once: self.once,
        })
    }
}

fn seconds(option: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|duration| !duration.is_zero())
        .ok_or(ConfigError::Duration { option, value })
}

fn parse_tag(tag: &str) -> Result<(String, String), ConfigError> {
    match tag.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(ConfigError::Tag(tag.to_string())),
    }
}
