use crate::errors::{Error, Result};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_COMMIT: &str = match option_env!("GIT_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};
pub const BUILD_DATE: &str = match option_env!("BUILD_DATE") {
    Some(date) => date,
    None => "unknown",
};

#[derive(Debug, Parser)]
#[command(name = "watchdog", about = "Detects a stuck litter box and power-cycles it")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub settings: Settings,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print build metadata and exit
    Version,
}

#[derive(Debug, Clone, Default, Args)]
pub struct Settings {
    #[arg(long, env = "TUYA_ACCESS_ID", hide_env_values = true)]
    pub access_id: Option<String>,

    #[arg(long, env = "TUYA_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    #[arg(long, env = "TUYA_REGION", default_value = "eu")]
    pub region: String,

    /// Overrides the regional endpoint, e.g. a local simulator
    #[arg(long, env = "TUYA_API_HOST")]
    pub api_host: Option<String>,

    #[arg(long, env = "TUYA_DEVICE_ID")]
    pub device_id: Option<String>,

    /// Any value other than empty, `0`, `false`, `no`, `off`, `n` or `f`
    /// enables debug output
    #[arg(
        long,
        env = "DEBUG",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub debug: bool,

    /// Wait before exiting, e.g. `30s` or `1m30s`. Negative values are ignored.
    #[arg(long, env = "SHUTDOWN_DELAY")]
    pub shutdown_delay: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Eu,
    Us,
    Cn,
    In,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Eu, Region::Us, Region::Cn, Region::In];

    pub fn api_host(self) -> &'static str {
        match self {
            Region::Eu => "https://openapi.tuyaeu.com",
            Region::Us => "https://openapi.tuyaus.com",
            Region::Cn => "https://openapi.tuyacn.com",
            Region::In => "https://openapi.tuyain.com",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Region::Eu => "eu",
            Region::Us => "us",
            Region::Cn => "cn",
            Region::In => "in",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Region::ALL.iter().map(|r| r.as_str()).collect();
                Error::Config(format!("invalid region: {} (valid: {})", s, valid.join(", ")))
            })
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub access_id: String,
    pub access_key: String,
    pub region: Region,
    pub api_host: String,
    pub device_id: String,
    pub debug: bool,
    /// `None` when no delay was requested or it was zero or negative
    pub shutdown_delay: Option<Duration>,
}

impl Config {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let mut missing = Vec::new();
        let mut require = |value: Option<String>, name: &'static str| {
            match value.filter(|v| !v.trim().is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let access_id = require(settings.access_id, "TUYA_ACCESS_ID");
        let access_key = require(settings.access_key, "TUYA_ACCESS_KEY");
        let device_id = require(settings.device_id, "TUYA_DEVICE_ID");

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let region: Region = if settings.region.is_empty() {
            Region::Eu
        } else {
            settings.region.parse()?
        };

        let shutdown_delay = match settings.shutdown_delay.as_deref() {
            None | Some("") => None,
            Some(raw) => parse_delay(raw)
                .map_err(|e| Error::Config(format!("invalid SHUTDOWN_DELAY: {}", e)))?,
        };

        let api_host = settings
            .api_host
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| region.api_host().to_string());

        Ok(Self {
            access_id,
            access_key,
            region,
            api_host: api_host.trim_end_matches('/').to_string(),
            device_id,
            debug: settings.debug,
            shutdown_delay,
        })
    }
}

/// Parses a signed duration. Zero and negative values mean no delay.
fn parse_delay(input: &str) -> std::result::Result<Option<Duration>, String> {
    let s = input.trim();
    let (negative, magnitude) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let delay = parse_duration(magnitude)?;
    Ok(Some(delay).filter(|d| !negative && !d.is_zero()))
}

/// Parses durations such as `300ms`, `1.5s` or `1h2m3s`. A bare `0` is zero.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {:?}", input))?;
        if num_len == 0 {
            return Err(format!("invalid duration {:?}", input));
        }
        let number: f64 = rest[..num_len]
            .parse()
            .map_err(|_| format!("invalid number in duration {:?}", input))?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1e0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            other => return Err(format!("unknown unit {:?} in duration {:?}", other, input)),
        };
        rest = &rest[unit_len..];
        total += number * nanos_per_unit;
    }

    Ok(Duration::from_nanos(total.round() as u64))
}

/// Loads `KEY=VALUE` pairs into the process environment, overriding
/// existing values. Blank lines and `#` comments are skipped.
///
/// Must run before any other thread exists, as it mutates the environment.
pub fn load_env_file(path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)?;
    for (key, value) in parse_env_lines(&contents) {
        std::env::set_var(key, value);
    }
    Ok(())
}

fn parse_env_lines(contents: &str) -> Vec<(&str, &str)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

/// Looks for `.env` in the working directory, then next to the executable.
/// Returns the failure, if any, so it can be reported once logging is up.
pub fn load_dotenv() -> Option<(PathBuf, Error)> {
    let local = PathBuf::from(".env");
    let candidate = if local.exists() {
        Some(local)
    } else {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(".env")))
            .filter(|p| p.exists())
    };

    let path = candidate?;
    load_env_file(&path).err().map(|e| (path, e))
}
