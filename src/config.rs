//! Config file loading and merging with CLI arguments.
//!
//! Precedence: CLI flag > config file > built-in default.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reelfetch_core::download::constants::{DOWNLOAD_TIMEOUT_SECS, HEAD_TIMEOUT_SECS};
use reelfetch_core::{
    ClientSettings, HarvestConfig, MAX_CONCURRENCY, resolve_user_agent, split_source_urls,
};

use crate::cli::Args;

/// `key = value` file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// `;`-separated source page URLs used when none are given on the command line.
    pub start_urls: Option<String>,
    /// Default output directory.
    pub output_dir: Option<PathBuf>,
    /// Default concurrent downloads per page.
    pub concurrency: Option<u8>,
    /// Default attempts per fetch/download.
    pub max_retries: Option<u8>,
    /// Page fetch and size check timeout.
    pub page_timeout_secs: Option<u64>,
    /// Streaming idle timeout.
    pub download_timeout_secs: Option<u64>,
    /// User-Agent override.
    pub user_agent: Option<String>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates values against the CLI ranges.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=16).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=16");
        }
        if let Some(max_retries) = self.max_retries
            && !(1..=10).contains(&max_retries)
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 1..=10");
        }
        validate_timeout_secs("page_timeout_secs", self.page_timeout_secs)?;
        validate_timeout_secs("download_timeout_secs", self.download_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log level used when neither `RUST_LOG` nor a CLI flag decides.
    #[must_use]
    pub fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/reelfetch/config.toml`
/// 2. `$HOME/.config/reelfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("reelfetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("reelfetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config named by `--config`, or the default file if it exists.
///
/// An explicit path must exist; a missing default file is not an error.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "start_urls" => cfg.start_urls = Some(parse_string_literal(value).with_context(context)?),
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "concurrency" => cfg.concurrency = Some(parse_integer_u8(value).with_context(context)?),
            "max_retries" => cfg.max_retries = Some(parse_integer_u8(value).with_context(context)?),
            "page_timeout_secs" => {
                cfg.page_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "download_timeout_secs" => {
                cfg.download_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "user_agent" => cfg.user_agent = Some(parse_string_literal(value).with_context(context)?),
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => bail!("Unknown configuration key: '{unknown}' on line {line_no}"),
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

/// Fully merged settings for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Source pages in run order.
    pub urls: Vec<String>,
    /// Library configuration.
    pub harvest: HarvestConfig,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: &'static str,
    /// Optional JSON report destination.
    pub summary_json: Option<PathBuf>,
    /// Show the terminal progress bar.
    pub show_progress: bool,
}

/// Merges CLI arguments over file values over defaults.
///
/// URLs given on the command line replace `start_urls` from the file.
#[must_use]
pub fn merge_settings(args: &Args, file: Option<&FileConfig>) -> RunSettings {
    let file = file.cloned().unwrap_or_default();

    let urls = if args.urls.is_empty() {
        file.start_urls
            .as_deref()
            .map(split_source_urls)
            .unwrap_or_default()
    } else {
        args.urls.iter().flat_map(|u| split_source_urls(u)).collect()
    };

    let defaults = HarvestConfig::default();
    let page_timeout = args
        .page_timeout
        .or(file.page_timeout_secs)
        .map(Duration::from_secs);
    let client = ClientSettings {
        user_agent: resolve_user_agent(args.user_agent.as_deref().or(file.user_agent.as_deref())),
        page_timeout: page_timeout.unwrap_or(defaults.client.page_timeout),
        head_timeout: page_timeout.unwrap_or(Duration::from_secs(HEAD_TIMEOUT_SECS)),
        download_timeout: Duration::from_secs(
            args.download_timeout
                .or(file.download_timeout_secs)
                .unwrap_or(DOWNLOAD_TIMEOUT_SECS),
        ),
    };

    let harvest = HarvestConfig {
        output_dir: args
            .output_dir
            .clone()
            .or(file.output_dir)
            .unwrap_or(defaults.output_dir),
        concurrency: args
            .concurrency
            .or(file.concurrency)
            .map_or(defaults.concurrency, |c| usize::from(c).min(MAX_CONCURRENCY)),
        max_retries: args
            .max_retries
            .or(file.max_retries)
            .map_or(defaults.max_retries, u32::from),
        client,
        ..defaults
    };

    let log_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => file.verbosity.unwrap_or(VerbositySetting::Default).log_level(),
            1 => "debug",
            _ => "trace",
        }
    };

    RunSettings {
        urls,
        harvest,
        log_level,
        summary_json: args.summary_json.clone(),
        show_progress: !args.no_progress && !args.quiet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_config_all_fields() {
        let raw = r#"
            # collection downloads
            start_urls = "https://a.test/App/me/x/; https://a.test/App/me/y/"
            output_dir = "videos"   # trailing comment
            concurrency = 4
            max_retries = 5
            page_timeout_secs = 10
            download_timeout_secs = 120
            user_agent = "Custom/1.0"
            verbosity = "debug"
        "#;
        let cfg = parse_config_str(raw).unwrap();
        assert_eq!(
            cfg.start_urls.as_deref(),
            Some("https://a.test/App/me/x/; https://a.test/App/me/y/")
        );
        assert_eq!(cfg.output_dir, Some(PathBuf::from("videos")));
        assert_eq!(cfg.concurrency, Some(4));
        assert_eq!(cfg.max_retries, Some(5));
        assert_eq!(cfg.page_timeout_secs, Some(10));
        assert_eq!(cfg.download_timeout_secs, Some(120));
        assert_eq!(cfg.user_agent.as_deref(), Some("Custom/1.0"));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Debug));
    }

    #[test]
    fn test_parse_config_hash_inside_string_is_kept() {
        let cfg = parse_config_str(r#"output_dir = "clips#1""#).unwrap();
        assert_eq!(cfg.output_dir, Some(PathBuf::from("clips#1")));
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        let err = parse_config_str("rate_limit = 5").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_parse_config_rejects_out_of_range() {
        let err = parse_config_str("concurrency = 17").unwrap_err();
        assert!(err.to_string().contains("1..=16"));
        assert!(parse_config_str("max_retries = 0").is_err());
        assert!(parse_config_str("page_timeout_secs = 0").is_err());
    }

    #[test]
    fn test_parse_config_rejects_bad_syntax() {
        assert!(parse_config_str("output_dir").is_err());
        assert!(parse_config_str("output_dir = videos").is_err());
        assert!(parse_config_str("concurrency = -1").is_err());
        assert!(parse_config_str(r#"verbosity = "loud""#).is_err());
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(load_file_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_merge_defaults() {
        let args = Args::try_parse_from(["reelfetch", "https://a.test/;https://b.test/"]).unwrap();
        let settings = merge_settings(&args, None);
        assert_eq!(settings.urls, vec!["https://a.test/", "https://b.test/"]);
        assert_eq!(settings.harvest.output_dir, PathBuf::from("mediafiles"));
        assert_eq!(settings.harvest.concurrency, 1);
        assert_eq!(settings.harvest.max_retries, 3);
        assert_eq!(settings.harvest.client.page_timeout, Duration::from_secs(30));
        assert_eq!(settings.harvest.client.download_timeout, Duration::from_secs(60));
        assert_eq!(settings.log_level, "info");
        assert!(settings.show_progress);
    }

    #[test]
    fn test_merge_cli_overrides_file() {
        let file = FileConfig {
            start_urls: Some("https://file.test/".to_string()),
            output_dir: Some(PathBuf::from("from-file")),
            concurrency: Some(2),
            max_retries: Some(7),
            verbosity: Some(VerbositySetting::Quiet),
            ..FileConfig::default()
        };
        let args =
            Args::try_parse_from(["reelfetch", "-o", "from-cli", "-r", "4", "-v"]).unwrap();
        let settings = merge_settings(&args, Some(&file));

        assert_eq!(settings.urls, vec!["https://file.test/"]);
        assert_eq!(settings.harvest.output_dir, PathBuf::from("from-cli"));
        assert_eq!(settings.harvest.concurrency, 2);
        assert_eq!(settings.harvest.max_retries, 4);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_merge_file_verbosity_and_user_agent() {
        let file = FileConfig {
            user_agent: Some("Custom/2.0".to_string()),
            verbosity: Some(VerbositySetting::Verbose),
            page_timeout_secs: Some(9),
            ..FileConfig::default()
        };
        let args = Args::try_parse_from(["reelfetch"]).unwrap();
        let settings = merge_settings(&args, Some(&file));
        assert_eq!(settings.harvest.client.user_agent, "Custom/2.0");
        assert_eq!(settings.harvest.client.head_timeout, Duration::from_secs(9));
        assert_eq!(settings.log_level, "debug");
        assert!(settings.urls.is_empty());
    }

    #[test]
    fn test_quiet_disables_progress() {
        let args = Args::try_parse_from(["reelfetch", "-q"]).unwrap();
        let settings = merge_settings(&args, None);
        assert_eq!(settings.log_level, "error");
        assert!(!settings.show_progress);
    }
}
