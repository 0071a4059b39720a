use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use thiserror::Error;

use crate::providers::{
    nominatim::NOMINATIM_URL, open_meteo::OPEN_METEO_URL, overpass::OVERPASS_URL,
    DEFAULT_USER_AGENT,
};
use crate::{sampler, timeline};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Server settings read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub static_dir: PathBuf,
    pub google_maps_api_key: Option<String>,
    pub provider_timeout: Duration,
    pub sample_step_miles: f64,
    pub poi_radius_miles: f64,
    pub timeline_checkpoints: usize,
    pub overpass_url: String,
    pub nominatim_url: String,
    pub open_meteo_url: String,
    pub user_agent: String,
    /// Serve POIs, place labels and weather from the offline demo providers.
    pub demo_providers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            static_dir: PathBuf::from("public"),
            google_maps_api_key: None,
            provider_timeout: Duration::from_secs(10),
            sample_step_miles: sampler::DEFAULT_STEP_MILES,
            poi_radius_miles: sampler::DEFAULT_RADIUS_MILES,
            timeline_checkpoints: timeline::DEFAULT_CHECKPOINTS,
            overpass_url: OVERPASS_URL.to_string(),
            nominatim_url: NOMINATIM_URL.to_string(),
            open_meteo_url: OPEN_METEO_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            demo_providers: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let timeout_secs: u64 = parse_or(
            &get,
            "PROVIDER_TIMEOUT_SECS",
            defaults.provider_timeout.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(invalid(
                "PROVIDER_TIMEOUT_SECS",
                timeout_secs.to_string(),
                "must be at least 1 second",
            ));
        }
        let config = Self {
            bind_addr: parse_or(&get, "BIND_ADDR", defaults.bind_addr)?,
            port: parse_or(&get, "PORT", defaults.port)?,
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            google_maps_api_key: get("GOOGLE_MAPS_API_KEY"),
            provider_timeout: Duration::from_secs(timeout_secs),
            sample_step_miles: parse_or(&get, "SAMPLE_STEP_MILES", defaults.sample_step_miles)?,
            poi_radius_miles: parse_or(&get, "POI_RADIUS_MILES", defaults.poi_radius_miles)?,
            timeline_checkpoints: parse_or(
                &get,
                "TIMELINE_CHECKPOINTS",
                defaults.timeline_checkpoints,
            )?,
            overpass_url: get("OVERPASS_URL").unwrap_or(defaults.overpass_url),
            nominatim_url: get("NOMINATIM_URL").unwrap_or(defaults.nominatim_url),
            open_meteo_url: get("OPEN_METEO_URL").unwrap_or(defaults.open_meteo_url),
            user_agent: get("HTTP_USER_AGENT").unwrap_or(defaults.user_agent),
            demo_providers: get("DEMO_PROVIDERS")
                .map(|raw| parse_flag("DEMO_PROVIDERS", &raw))
                .transpose()?
                .unwrap_or(defaults.demo_providers),
        };

        if config.timeline_checkpoints < 2 {
            return Err(invalid(
                "TIMELINE_CHECKPOINTS",
                config.timeline_checkpoints.to_string(),
                "at least 2 checkpoints are required",
            ));
        }
        for (key, value) in [
            ("SAMPLE_STEP_MILES", config.sample_step_miles),
            ("POI_RADIUS_MILES", config.poi_radius_miles),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(key, value.to_string(), "must be a positive number"));
            }
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|err: T::Err| invalid(key, raw.clone(), err.to_string())),
        None => Ok(default),
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw.to_string(), "expected true or false")),
    }
}

fn invalid(key: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3000");
        assert_eq!(config.google_maps_api_key, None);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("BIND_ADDR", "127.0.0.1"),
            ("STATIC_DIR", "dist"),
            ("GOOGLE_MAPS_API_KEY", "abc123"),
            ("PROVIDER_TIMEOUT_SECS", "3"),
            ("SAMPLE_STEP_MILES", "60"),
            ("TIMELINE_CHECKPOINTS", "7"),
            ("DEMO_PROVIDERS", "yes"),
        ])
        .unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.static_dir, PathBuf::from("dist"));
        assert_eq!(config.google_maps_api_key.as_deref(), Some("abc123"));
        assert_eq!(config.provider_timeout, Duration::from_secs(3));
        assert_eq!(config.sample_step_miles, 60.0);
        assert_eq!(config.timeline_checkpoints, 7);
        assert!(config.demo_providers);
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = config_from(&[("GOOGLE_MAPS_API_KEY", "   ")]).unwrap();
        assert_eq!(config.google_maps_api_key, None);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            config_from(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
        assert!(matches!(
            config_from(&[("TIMELINE_CHECKPOINTS", "1")]),
            Err(ConfigError::Invalid { key: "TIMELINE_CHECKPOINTS", .. })
        ));
        assert!(matches!(
            config_from(&[("POI_RADIUS_MILES", "-2")]),
            Err(ConfigError::Invalid { key: "POI_RADIUS_MILES", .. })
        ));
        assert!(matches!(
            config_from(&[("PROVIDER_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { key: "PROVIDER_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(
            config_from(&[("DEMO_PROVIDERS", "maybe")]),
            Err(ConfigError::Invalid { key: "DEMO_PROVIDERS", .. })
        ));
    }
}
