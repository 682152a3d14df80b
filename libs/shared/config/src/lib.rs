use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("start hour {start} must be before end hour {end}")]
    EmptyDay { start: u32, end: u32 },

    #[error("end hour {0} is past midnight")]
    EndHourOutOfRange(u32),

    #[error("slot length must divide 60 minutes, got {0}")]
    InvalidStep(u32),

    #[error("unknown patient overlap policy: {0}")]
    UnknownOverlapPolicy(String),
}

/// Operating hours of the clinic day and the booking horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicHours {
    pub start_hour: u32,
    pub end_hour: u32,
    pub step_minutes: u32,
    pub booking_horizon_days: i64,
}

impl Default for ClinicHours {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
            step_minutes: 30,
            booking_horizon_days: 60,
        }
    }
}

impl ClinicHours {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_hour > 24 {
            return Err(ConfigError::EndHourOutOfRange(self.end_hour));
        }
        if self.start_hour >= self.end_hour {
            return Err(ConfigError::EmptyDay {
                start: self.start_hour,
                end: self.end_hour,
            });
        }
        if self.step_minutes == 0 || 60 % self.step_minutes != 0 {
            return Err(ConfigError::InvalidStep(self.step_minutes));
        }
        Ok(())
    }
}

/// Whether one patient may hold two appointments at the same date and slot
/// with different providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientOverlapPolicy {
    #[default]
    Allow,
    Reject,
}

impl FromStr for PatientOverlapPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::UnknownOverlapPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookingPolicy {
    pub patient_overlap: PatientOverlapPolicy,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub clinic_hours: ClinicHours,
    pub booking_policy: BookingPolicy,
    /// Minutes an open booking wizard survives before it is evicted.
    pub wizard_session_ttl_minutes: i64,
    pub jwt_secret: String,
    pub api_port: u16,
}

pub const DEFAULT_WIZARD_SESSION_TTL_MINUTES: i64 = 30;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            clinic_hours: ClinicHours::default(),
            booking_policy: BookingPolicy::default(),
            wizard_session_ttl_minutes: DEFAULT_WIZARD_SESSION_TTL_MINUTES,
            jwt_secret: String::new(),
            api_port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Missing or unparsable
    /// values fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ClinicHours::default();

        let mut clinic_hours = ClinicHours {
            start_hour: parse_or(&lookup, "CLINIC_START_HOUR", defaults.start_hour),
            end_hour: parse_or(&lookup, "CLINIC_END_HOUR", defaults.end_hour),
            step_minutes: parse_or(&lookup, "CLINIC_SLOT_MINUTES", defaults.step_minutes),
            booking_horizon_days: parse_or(
                &lookup,
                "BOOKING_HORIZON_DAYS",
                defaults.booking_horizon_days,
            ),
        };

        if let Err(e) = clinic_hours.validate() {
            warn!("Invalid clinic hours ({}), using defaults", e);
            clinic_hours = ClinicHours {
                booking_horizon_days: clinic_hours.booking_horizon_days,
                ..defaults
            };
        }

        let patient_overlap = match lookup("PATIENT_OVERLAP_POLICY") {
            Some(raw) => raw.parse().unwrap_or_else(|e: ConfigError| {
                warn!("{}, allowing overlaps", e);
                PatientOverlapPolicy::Allow
            }),
            None => PatientOverlapPolicy::Allow,
        };

        let mut wizard_session_ttl_minutes = parse_or(
            &lookup,
            "WIZARD_SESSION_TTL_MINUTES",
            DEFAULT_WIZARD_SESSION_TTL_MINUTES,
        );
        if wizard_session_ttl_minutes <= 0 {
            warn!(
                "WIZARD_SESSION_TTL_MINUTES must be positive, using {}",
                DEFAULT_WIZARD_SESSION_TTL_MINUTES
            );
            wizard_session_ttl_minutes = DEFAULT_WIZARD_SESSION_TTL_MINUTES;
        }

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, every bearer token will be rejected");
            String::new()
        });

        let config = Self {
            clinic_hours,
            booking_policy: BookingPolicy { patient_overlap },
            wizard_session_ttl_minutes,
            jwt_secret,
            api_port: parse_or(&lookup, "API_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using {}", key, raw, default);
            default
        }),
        None => {
            warn!("{} not set, using default {}", key, default);
            default
        }
    }
}
