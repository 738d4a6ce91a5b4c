use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use cadence_core::ReminderPolicy;
use cadence_sweep::SweepConfig;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::state::ensure_cadence_home;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub schedule: ScheduleSection,
    pub sweep: SweepSection,
    pub notifications: NotificationSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSection {
    /// IANA timezone reminders fire in.
    pub timezone: String,
    pub fire_hour: u32,
    pub fire_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSection {
    pub interval_minutes: u64,
    pub catch_up_limit: u32,
    pub delivery_timeout_secs: u64,
    /// "console" or "webhook".
    pub channel: String,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSection {
    pub max_retries: u32,
    pub max_snoozes: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schedule: ScheduleSection {
                timezone: "America/Chicago".to_string(),
                fire_hour: 9,
                fire_minute: 0,
            },
            sweep: SweepSection {
                interval_minutes: 15,
                catch_up_limit: 30,
                delivery_timeout_secs: 10,
                channel: "console".to_string(),
                webhook_url: None,
            },
            notifications: NotificationSection {
                max_retries: 3,
                max_snoozes: 3,
            },
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        self.schedule
            .timezone
            .parse()
            .map_err(|_| anyhow!("invalid timezone in config: {:?}", self.schedule.timezone))
    }

    pub fn reminder_policy(&self) -> Result<ReminderPolicy> {
        Ok(ReminderPolicy {
            timezone: self.timezone()?,
            fire_hour: self.schedule.fire_hour,
            fire_minute: self.schedule.fire_minute,
            max_retries: self.notifications.max_retries,
            max_snoozes: self.notifications.max_snoozes,
        })
    }

    pub fn sweep_config(&self) -> Result<SweepConfig> {
        Ok(SweepConfig {
            reminder_policy: self.reminder_policy()?,
            delivery_timeout: Duration::from_secs(self.sweep.delivery_timeout_secs),
            catch_up_limit: self.sweep.catch_up_limit,
        })
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_cadence_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
