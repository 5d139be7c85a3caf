use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    storage::entities::{OwnerId, DEFAULT_OWNER_ID},
    timer::TimerDurations,
};

pub const CONFIG_JSON: &str = "config.json";
const SCHEMA: u8 = 1;
const MIN_MINUTES: u32 = 1;
const MAX_MINUTES: u32 = 240;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub schema: u8,
    pub owner_id: OwnerId,
    pub focus_minutes: u32,
    pub break_minutes: u32,
    pub notifications: bool,
    pub tick_interval_ms: u64,
    pub reload_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: SCHEMA,
            owner_id: DEFAULT_OWNER_ID,
            focus_minutes: 25,
            break_minutes: 5,
            notifications: true,
            tick_interval_ms: 100,
            reload_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Reads `config.json` from the application directory, writing the defaults first if it
    /// doesn't exist yet.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_JSON);
        if !path.exists() {
            let config = Self::default();
            config.save(dir)?;
            info!("Created default config at {path:?}");
            return Ok(config);
        }

        let raw = fs::read_to_string(&path).with_context(|| format!("reading {path:?}"))?;
        let config: Config =
            serde_json::from_str(&raw).with_context(|| format!("parsing {path:?}"))?;
        config.validate().with_context(|| format!("in {path:?}"))?;
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        self.validate()?;
        fs::create_dir_all(dir)?;
        let formatted = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(CONFIG_JSON), format!("{formatted}\n"))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema != SCHEMA {
            bail!("unsupported config schema {}", self.schema);
        }
        check_minutes("focusMinutes", self.focus_minutes)?;
        check_minutes("breakMinutes", self.break_minutes)?;
        if self.tick_interval_ms == 0 || self.reload_interval_ms == 0 {
            bail!("intervals must be positive");
        }
        Ok(())
    }

    pub fn durations(&self) -> TimerDurations {
        TimerDurations::from_minutes(self.focus_minutes, self.break_minutes)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_millis(self.reload_interval_ms)
    }
}

fn check_minutes(name: &str, minutes: u32) -> Result<()> {
    if !(MIN_MINUTES..=MAX_MINUTES).contains(&minutes) {
        bail!("{name} must be between {MIN_MINUTES} and {MAX_MINUTES}, got {minutes}");
    }
    Ok(())
}
