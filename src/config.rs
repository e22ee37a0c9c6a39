use crate::error::{Result, UmbrellaError};
use crate::models::{Coordinates, TimeOfDay, DEFAULT_REMINDER_TITLE, UMBRELLA_THRESHOLD};
use dialoguer::{Input, Password};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub openweathermap: OpenWeatherMapConfig,
    #[serde(default)]
    pub location: Option<LocationConfig>,
    #[serde(default)]
    pub reminder: ReminderConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct OpenWeatherMapConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "https://api.openweathermap.org".into()
}

impl std::fmt::Debug for OpenWeatherMapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherMapConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Fixed coordinates used when no device location source is available
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationConfig {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReminderConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub default_time: TimeOfDay,
}

fn default_threshold() -> f64 {
    UMBRELLA_THRESHOLD
}

fn default_title() -> String {
    DEFAULT_REMINDER_TITLE.into()
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            title: default_title(),
            default_time: TimeOfDay::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_refresh_interval_mins")]
    pub refresh_interval_mins: u64,
    #[serde(default = "default_location_interval_secs")]
    pub location_interval_secs: u64,
    #[serde(default = "default_location_distance_m")]
    pub location_distance_m: f64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_delivery_poll_secs")]
    pub delivery_poll_secs: u64,
}

fn default_refresh_interval_mins() -> u64 {
    60
}

fn default_location_interval_secs() -> u64 {
    600
}

fn default_location_distance_m() -> f64 {
    1000.0
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_delivery_poll_secs() -> u64 {
    30
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_interval_mins: default_refresh_interval_mins(),
            location_interval_secs: default_location_interval_secs(),
            location_distance_m: default_location_distance_m(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            delivery_poll_secs: default_delivery_poll_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_mins.max(1) * 60)
    }

    pub fn location_interval(&self) -> Duration {
        Duration::from_secs(self.location_interval_secs.max(1))
    }

    pub fn location_distance_km(&self) -> f64 {
        self.location_distance_m.max(0.0) / 1000.0
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn delivery_poll(&self) -> Duration {
        Duration::from_secs(self.delivery_poll_secs.max(1))
    }
}

impl Config {
    pub fn load(config_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p,
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            return Err(UmbrellaError::Config(format!(
                "Config file not found at {:?}. Run `umbrella init` to set up.",
                config_path
            )));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| UmbrellaError::Config(format!("Failed to read config: {}", e)))?;

        Self::parse(&config_str)
    }

    /// Parse YAML after substituting `${VAR}` placeholders from the environment
    pub fn parse(content: &str) -> Result<Self> {
        let content = Self::substitute_env_vars(content);

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| UmbrellaError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.openweathermap.api_key.trim().is_empty() {
            return Err(UmbrellaError::Config(
                "openweathermap.api_key must not be empty".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.reminder.threshold) || self.reminder.threshold == 0.0 {
            return Err(UmbrellaError::Config(format!(
                "reminder.threshold must be in (0, 1], got {}",
                self.reminder.threshold
            )));
        }

        if let Some(ref location) = self.location {
            if !location.coordinates().is_valid() {
                return Err(UmbrellaError::Config(format!(
                    "location coordinates out of range: {}",
                    location.coordinates()
                )));
            }
        }

        Ok(())
    }

    /// Search for config.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("umbrella").join("config.yaml");
            if xdg_config.exists() {
                return Ok(xdg_config);
            }
        }

        Self::default_config_path()
    }

    /// Returns true if a config file can be found in any standard location.
    pub fn exists(config_override: Option<&PathBuf>) -> bool {
        match config_override {
            Some(p) => p.exists(),
            None => Self::find_config_path()
                .map(|p| p.exists())
                .unwrap_or(false),
        }
    }

    /// Default path for writing new config files (~/.config/umbrella/config.yaml).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| UmbrellaError::Config("Cannot determine config directory".into()))?
            .join("umbrella");
        Ok(config_dir.join("config.yaml"))
    }

    /// Run interactive setup prompts and write config to disk.
    /// Returns the loaded Config and the path it was written to.
    pub fn setup_interactive(target: Option<PathBuf>) -> Result<(Self, PathBuf)> {
        println!();
        println!("Let's set up umbrella!");
        println!();

        println!("OpenWeatherMap");
        let api_key: String = Password::new()
            .with_prompt("  API key (or ${OPENWEATHERMAP_API_KEY})")
            .interact()
            .map_err(|e| UmbrellaError::Config(format!("Input error: {}", e)))?;

        println!();

        println!("Reminder");
        let default_time: String = Input::new()
            .with_prompt("  Notify at (HH:MM)")
            .default("09:00".into())
            .validate_with(|input: &String| -> std::result::Result<(), String> {
                input
                    .parse::<TimeOfDay>()
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
            .interact_text()
            .map_err(|e| UmbrellaError::Config(format!("Input error: {}", e)))?;
        let default_time: TimeOfDay = default_time.parse()?;

        println!();

        println!("Fixed location (leave latitude blank to rely on location updates)");
        let latitude: String = Input::new()
            .with_prompt("  Latitude")
            .default(String::new())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| UmbrellaError::Config(format!("Input error: {}", e)))?;

        let location = if latitude.trim().is_empty() {
            None
        } else {
            let latitude: f64 = latitude
                .trim()
                .parse()
                .map_err(|_| UmbrellaError::Config(format!("Invalid latitude '{}'", latitude)))?;

            let longitude: f64 = Input::new()
                .with_prompt("  Longitude")
                .interact_text()
                .map_err(|e| UmbrellaError::Config(format!("Input error: {}", e)))?;

            Some(LocationConfig {
                latitude,
                longitude,
            })
        };

        println!();

        let config = Config {
            openweathermap: OpenWeatherMapConfig {
                api_key,
                base_url: default_base_url(),
            },
            location,
            reminder: ReminderConfig {
                default_time,
                ..ReminderConfig::default()
            },
            schedule: ScheduleConfig::default(),
        };
        config.validate()?;

        let config_path = match target {
            Some(p) => p,
            None => Self::default_config_path()?,
        };
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| UmbrellaError::Config(format!("Failed to serialize config: {}", e)))?;

        let content = format!(
            "# umbrella configuration\n# Generated by `umbrella init`\n# Environment variable substitution (${{VAR}}) is supported.\n\n{}",
            yaml
        );
        std::fs::write(&config_path, content)?;

        println!("Configuration saved to {}", config_path.display());
        println!();

        Ok((config, config_path))
    }

    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!("Env substitution disabled: {}", e);
                return result;
            }
        };

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }

    pub fn data_dir(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = data_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        if let Ok(dir) = std::env::var("UMBRELLA_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| UmbrellaError::Config("Cannot determine data directory".into()))?
            .join("umbrella");

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        Ok(Self::data_dir(data_dir_override)?.join("umbrella.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
openweathermap:
  api_key: abc123
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.openweathermap.base_url, "https://api.openweathermap.org");
        assert!(config.location.is_none());
        assert_eq!(config.reminder.threshold, UMBRELLA_THRESHOLD);
        assert_eq!(config.reminder.default_time, TimeOfDay::default());
        assert_eq!(config.schedule.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.schedule.location_interval(), Duration::from_secs(600));
        assert!((config.schedule.location_distance_km() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn full_config_parses() {
        let yaml = r#"
openweathermap:
  api_key: abc123
  base_url: http://localhost:9999
location:
  latitude: 39.83
  longitude: -75.87
reminder:
  threshold: 0.6
  title: Rain ahead
  default_time: "07:30"
schedule:
  refresh_interval_mins: 30
  fetch_timeout_secs: 5
"#;
        let config = Config::parse(yaml).unwrap();
        let location = config.location.unwrap();
        assert_eq!(location.coordinates(), Coordinates::new(39.83, -75.87));
        assert_eq!(config.reminder.title, "Rain ahead");
        assert_eq!(config.reminder.default_time, TimeOfDay::new(7, 30).unwrap());
        assert_eq!(config.schedule.refresh_interval(), Duration::from_secs(1800));
        assert_eq!(config.schedule.fetch_timeout(), Duration::from_secs(5));
        // Unset fields keep their defaults
        assert_eq!(config.schedule.delivery_poll(), Duration::from_secs(30));
    }

    #[test]
    fn env_vars_are_substituted() {
        std::env::set_var("UMBRELLA_TEST_OWM_KEY", "from-env");
        let yaml = "openweathermap:\n  api_key: ${UMBRELLA_TEST_OWM_KEY}\n";
        let config = Config::parse(yaml).unwrap();
        assert_eq!(config.openweathermap.api_key, "from-env");
    }

    #[test]
    fn rejects_empty_api_key() {
        let yaml = "openweathermap:\n  api_key: \"\"\n";
        assert!(matches!(
            Config::parse(yaml),
            Err(UmbrellaError::Config(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_threshold_and_coordinates() {
        let yaml = "openweathermap:\n  api_key: k\nreminder:\n  threshold: 1.5\n";
        assert!(Config::parse(yaml).is_err());

        let yaml = "openweathermap:\n  api_key: k\nlocation:\n  latitude: 120.0\n  longitude: 0.0\n";
        assert!(Config::parse(yaml).is_err());
    }

    #[test]
    fn load_reads_file_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = Config::load(Some(path.clone())).unwrap();
        assert_eq!(config.openweathermap.api_key, "abc123");
        assert!(Config::exists(Some(&path)));

        let missing = dir.path().join("nope.yaml");
        assert!(!Config::exists(Some(&missing)));
        assert!(matches!(
            Config::load(Some(missing)),
            Err(UmbrellaError::Config(_))
        ));
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let config = Config::parse(MINIMAL).unwrap();
        let debug = format!("{:?}", config.openweathermap);
        assert!(!debug.contains("abc123"));
        assert!(debug.contains("REDACTED"));
    }
}
