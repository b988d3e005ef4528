use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{ClientError, ClientResult};
use crate::models::ride::Coordinate;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub page_size: u32,
    pub nearby_radius_km: f64,
    pub session_dir: PathBuf,
    /// Fixed device position used by the heartbeat; `None` behaves as a denied permission.
    pub device_position: Option<Coordinate>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            request_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            page_size: 10,
            nearby_radius_km: 5.0,
            session_dir: PathBuf::from(".cabride"),
            device_position: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the environment, reading `.env` if present.
    pub fn from_env() -> ClientResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = lookup("CABRIDE_API_URL")
            .unwrap_or(defaults.api_base_url)
            .trim_end_matches('/')
            .to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ClientError::InvalidConfiguration(format!(
                "CABRIDE_API_URL must be an http(s) URL, got {}",
                api_base_url
            )));
        }

        let request_timeout = parse_or(&lookup, "CABRIDE_REQUEST_TIMEOUT_SECS", 10u64)?;
        let heartbeat_secs = parse_or(&lookup, "CABRIDE_HEARTBEAT_SECS", 30u64)?;
        if heartbeat_secs == 0 {
            return Err(ClientError::InvalidConfiguration(
                "CABRIDE_HEARTBEAT_SECS must be positive".to_string(),
            ));
        }

        let page_size = parse_or(&lookup, "CABRIDE_PAGE_SIZE", defaults.page_size)?;
        if page_size == 0 {
            return Err(ClientError::InvalidConfiguration(
                "CABRIDE_PAGE_SIZE must be positive".to_string(),
            ));
        }

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_secs(request_timeout),
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            page_size,
            nearby_radius_km: parse_or(&lookup, "CABRIDE_NEARBY_RADIUS_KM", defaults.nearby_radius_km)?,
            session_dir: lookup("CABRIDE_SESSION_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_dir),
            device_position: lookup("CABRIDE_DEVICE_POSITION")
                .map(|raw| parse_position(&raw))
                .transpose()?,
        })
    }
}

// "lat,lng"
fn parse_position(raw: &str) -> ClientResult<Coordinate> {
    let invalid = || {
        ClientError::InvalidConfiguration(format!(
            "CABRIDE_DEVICE_POSITION must be \"lat,lng\", got {:?}",
            raw
        ))
    };
    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = lng.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid());
    }
    Ok(Coordinate::new(latitude, longitude))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> ClientResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ClientError::InvalidConfiguration(format!("{} must be a number, got {:?}", key, raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.page_size, 10);
        assert_eq!(config.api_base_url, "http://localhost:8080/api");
        assert!(config.device_position.is_none());
    }

    #[test]
    fn test_device_position() {
        let config =
            ClientConfig::from_lookup(lookup(&[("CABRIDE_DEVICE_POSITION", "19.0760, 72.8777")]))
                .unwrap();
        assert_eq!(config.device_position, Some(Coordinate::new(19.0760, 72.8777)));

        for bad in ["19.07", "north,east", "95.0,10.0"] {
            assert!(ClientConfig::from_lookup(lookup(&[("CABRIDE_DEVICE_POSITION", bad)])).is_err());
        }
    }

    #[test]
    fn test_overrides_and_trailing_slash() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CABRIDE_API_URL", "https://rides.example.com/api/"),
            ("CABRIDE_HEARTBEAT_SECS", "5"),
            ("CABRIDE_NEARBY_RADIUS_KM", "2.5"),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url, "https://rides.example.com/api");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.nearby_radius_km, 2.5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("CABRIDE_PAGE_SIZE", "ten")])),
            Err(ClientError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("CABRIDE_HEARTBEAT_SECS", "0")])),
            Err(ClientError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("CABRIDE_API_URL", "localhost")])),
            Err(ClientError::InvalidConfiguration(_))
        ));
    }
}
