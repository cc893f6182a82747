use crate::bar::{Bar, Cell};
use crate::module::CommandModule;
use crate::scheduler::ReloadSignals;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Bar configuration as read from disk.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Maximum stagger delay, e.g. `"2s"`.
    #[serde(default)]
    pub jitter: Option<String>,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ModuleConfig {
    pub command: Vec<String>,
    pub interval: String,
}

/// JSON configs may be the bare module list or the full object.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonConfig {
    Modules(Vec<ModuleConfig>),
    Full(Config),
}

impl Config {
    /// Read a config file. `.toml` files are parsed as TOML, anything else
    /// as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let parsed: JsonConfig =
            serde_json::from_str(content).context("Failed to parse config JSON")?;
        Ok(match parsed {
            JsonConfig::Modules(modules) => Config {
                jitter: None,
                modules,
            },
            JsonConfig::Full(config) => config,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// Maximum jitter, zero when unset.
    pub fn jitter(&self) -> Result<Duration> {
        match &self.jitter {
            Some(raw) => parse_duration(raw).with_context(|| format!("invalid jitter {:?}", raw)),
            None => Ok(Duration::ZERO),
        }
    }

    /// Validate every entry and turn them into command cells.
    pub fn cells(&self) -> Result<Vec<Cell>> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                entry
                    .cell()
                    .with_context(|| format!("invalid module #{}", i + 1))
            })
            .collect()
    }

    pub fn into_bar(self, signals: ReloadSignals) -> Result<Bar> {
        let jitter = self.jitter()?;
        let bar = self
            .cells()?
            .into_iter()
            .fold(Bar::builder(), |builder, cell| builder.cell(cell))
            .jitter(jitter)
            .reload_signals(signals)
            .build();
        Ok(bar)
    }
}

impl ModuleConfig {
    fn cell(&self) -> Result<Cell> {
        let module = CommandModule::new(&self.command)?;
        let interval = parse_duration(&self.interval)
            .with_context(|| format!("invalid interval {:?}", self.interval))?;
        if interval.is_zero() {
            anyhow::bail!("interval for {} must be greater than zero", module.program());
        }
        Ok(Cell {
            module: Arc::new(module),
            interval,
        })
    }
}

/// Parse a duration such as `"1s"`, `"1m"`, `"1h30m"`, `"1.5s"` or `"250ms"`.
///
/// Units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `"0"` is zero.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    if s.starts_with('-') {
        anyhow::bail!("duration cannot be negative");
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        anyhow::bail!("empty duration");
    }

    let mut total: f64 = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            anyhow::bail!("expected a number in {:?}", input);
        }
        let value: f64 = number
            .parse()
            .with_context(|| format!("bad number {:?}", number))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let nanos_per_unit = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            "" => anyhow::bail!("missing unit in duration {:?}", input),
            other => anyhow::bail!("unknown unit {:?} in duration {:?}", other, input),
        };
        total += value * nanos_per_unit;
        rest = tail;
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        anyhow::bail!("duration {:?} is out of range", input);
    }
    Ok(Duration::from_nanos(total.round() as u64))
}
