use crate::domain::calendar::DayCalendar;
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AllCompletedPolicy {
    /// End the external activity once every task of the day is done.
    #[default]
    End,
    /// Keep the activity running at full progress.
    KeepRunning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub schema: u64,
    pub timezone: String,
    pub completion_delay_ms: u64,
    pub surface_timeout_ms: u64,
    pub live_activity_enabled: bool,
    pub all_completed_policy: AllCompletedPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: SUPPORTED_SCHEMA,
            timezone: "UTC".to_string(),
            completion_delay_ms: 1500,
            surface_timeout_ms: 2000,
            live_activity_enabled: true,
            all_completed_policy: AllCompletedPolicy::End,
        }
    }
}

impl AppConfig {
    pub fn calendar(&self) -> Result<DayCalendar, InfraError> {
        DayCalendar::parse(&self.timezone).map_err(InfraError::InvalidConfig)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }

    pub fn surface_timeout(&self) -> Duration {
        Duration::from_millis(self.surface_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        if self.schema != SUPPORTED_SCHEMA {
            return Err(InfraError::InvalidConfig(format!(
                "unsupported schema {}",
                self.schema
            )));
        }
        self.calendar()?;
        if self.surface_timeout_ms == 0 {
            return Err(InfraError::InvalidConfig(
                "surfaceTimeoutMs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let raw = fs::read_to_string(&path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }

    let config: AppConfig = serde_json::from_value(parsed)?;
    config.validate().map_err(|error| match error {
        InfraError::InvalidConfig(message) => {
            InfraError::InvalidConfig(format!("{message} in {}", path.display()))
        }
        other => other,
    })?;
    Ok(config)
}
