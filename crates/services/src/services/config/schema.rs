use chrono::{FixedOffset, Offset, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const CURRENT_CONFIG_VERSION: &str = "v1";

const JWT_SECRET_LEN: usize = 64;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

fn default_business_name() -> String {
    "PawBook Grooming".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct BusinessConfig {
    pub name: String,
    /// Offset applied to availability windows and slot dates.
    #[serde(alias = "utcOffsetMinutes")]
    pub utc_offset_minutes: i32,
    #[serde(alias = "slotMinutes")]
    pub slot_minutes: i64,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            name: default_business_name(),
            utc_offset_minutes: 0,
            slot_minutes: 30,
        }
    }
}

impl BusinessConfig {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or(Utc.fix())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(alias = "jwtSecret")]
    pub jwt_secret: Option<String>,
    #[serde(alias = "tokenTtlHours")]
    pub token_ttl_hours: i64,
    #[serde(alias = "allowSelfRegistration")]
    pub allow_self_registration: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: 24 * 7,
            allow_self_registration: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct SlaConfig {
    pub enabled: bool,
    #[serde(alias = "sweepIntervalSecs")]
    pub sweep_interval_secs: u64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct UploadConfig {
    #[serde(alias = "maxBytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct AutomationConfig {
    #[serde(alias = "webhookTimeoutSecs")]
    pub webhook_timeout_secs: u64,
    #[serde(alias = "runHistoryLimit")]
    pub run_history_limit: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            webhook_timeout_secs: 10,
            run_history_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "configVersion")]
    pub config_version: String,
    pub business: BusinessConfig,
    pub auth: AuthConfig,
    pub sla: SlaConfig,
    pub uploads: UploadConfig,
    pub automation: AutomationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION.to_string(),
            business: BusinessConfig::default(),
            auth: AuthConfig::default(),
            sla: SlaConfig::default(),
            uploads: UploadConfig::default(),
            automation: AutomationConfig::default(),
        }
    }
}

impl Config {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<Config>(raw_config) {
            Ok(config) => config.normalized(),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.config_version = CURRENT_CONFIG_VERSION.to_string();

        if self.business.name.trim().is_empty() {
            self.business.name = default_business_name();
        }
        if self.business.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            tracing::warn!(
                "UTC offset {} minutes is out of range, resetting to 0",
                self.business.utc_offset_minutes
            );
            self.business.utc_offset_minutes = 0;
        }
        if !(5..=240).contains(&self.business.slot_minutes) {
            self.business.slot_minutes = BusinessConfig::default().slot_minutes;
        }

        if matches!(
            self.auth.jwt_secret.as_deref(),
            Some(secret) if secret.trim().is_empty()
        ) {
            self.auth.jwt_secret = None;
        }
        if self.auth.token_ttl_hours <= 0 {
            self.auth.token_ttl_hours = AuthConfig::default().token_ttl_hours;
        }

        self.sla.sweep_interval_secs = self.sla.sweep_interval_secs.max(10);
        if self.uploads.max_bytes == 0 {
            self.uploads.max_bytes = UploadConfig::default().max_bytes;
        }
        self.automation.webhook_timeout_secs = self.automation.webhook_timeout_secs.clamp(1, 120);
        self.automation.run_history_limit = self.automation.run_history_limit.clamp(1, 1000);

        self
    }

    /// Generates a signing secret when none is stored. Returns `true` when the
    /// config changed and should be saved.
    pub fn ensure_jwt_secret(&mut self) -> bool {
        if self.auth.jwt_secret.is_some() {
            return false;
        }
        let secret: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(JWT_SECRET_LEN)
            .map(char::from)
            .collect();
        self.auth.jwt_secret = Some(secret);
        true
    }
}
