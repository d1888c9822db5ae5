//! Configuration types for httpvcr

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::cassette::Cassette;
use crate::censor::{CensorElement, Censors, DEFAULT_CENSOR_TEXT};
use crate::expiration::{check_compatible, ExpirationAction, TimeFrame};
use crate::matching::{MatchRule, MatchRules};
use crate::{Result, VcrError};

/// Environment variable overriding the configured mode
pub const MODE_ENV_VAR: &str = "HTTPVCR_MODE";

/// Operating mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Perform real requests and store them
    Record,
    /// Serve only from recordings
    Replay,
    /// Replay when a recording exists, record otherwise
    Auto,
    /// Pass through to the network, no cassette access
    #[default]
    Bypass,
}

impl FromStr for Mode {
    type Err = VcrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "record" => Ok(Self::Record),
            "replay" => Ok(Self::Replay),
            "auto" => Ok(Self::Auto),
            "bypass" => Ok(Self::Bypass),
            other => Err(VcrError::Configuration(format!("Unknown mode: {other}"))),
        }
    }
}

impl Mode {
    /// Apply an environment override to a configured mode
    ///
    /// A configured `Bypass` always wins. Unknown override values are ignored.
    #[must_use]
    pub fn resolve(configured: Self, env_value: Option<&str>) -> Self {
        if configured == Self::Bypass {
            return Self::Bypass;
        }
        env_value
            .and_then(|value| value.parse().ok())
            .unwrap_or(configured)
    }

    /// Resolve against the current value of [`MODE_ENV_VAR`]
    #[must_use]
    pub fn from_env(configured: Self) -> Self {
        let value = std::env::var(MODE_ENV_VAR).ok();
        Self::resolve(configured, value.as_deref())
    }
}

/// Artificial latency applied when serving a recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayDelay {
    /// Serve immediately
    #[default]
    None,
    /// Wait as long as the original request took
    Recorded,
    /// Wait a fixed amount of time
    Manual(Duration),
}

impl ReplayDelay {
    /// How long to wait before serving an interaction that took `recorded_ms`
    #[must_use]
    pub fn for_recorded(self, recorded_ms: u64) -> Option<Duration> {
        let delay = match self {
            Self::None => return None,
            Self::Recorded => Duration::from_millis(recorded_ms),
            Self::Manual(delay) => delay,
        };
        (!delay.is_zero()).then_some(delay)
    }
}

/// Matching, censoring, delay and expiration settings shared by every
/// connection a [`crate::Vcr`] hands out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Rules deciding which recording answers a request
    pub match_rules: MatchRules,
    /// Redaction applied before anything is written or compared
    pub censors: Censors,
    /// Latency applied on replay
    pub delay: ReplayDelay,
    /// How long a recording stays fresh
    pub time_frame: TimeFrame,
    /// What to do with a stale recording
    pub when_expired: ExpirationAction,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            match_rules: MatchRules::regular(),
            censors: Censors::default(),
            delay: ReplayDelay::None,
            time_frame: TimeFrame::FOREVER,
            when_expired: ExpirationAction::Warn,
        }
    }
}

impl Settings {
    /// Replace the match rules
    #[must_use]
    pub fn with_match_rules(mut self, match_rules: MatchRules) -> Self {
        self.match_rules = match_rules;
        self
    }

    /// Replace the censors
    #[must_use]
    pub fn with_censors(mut self, censors: Censors) -> Self {
        self.censors = censors;
        self
    }

    /// Replace the replay delay
    #[must_use]
    pub fn with_delay(mut self, delay: ReplayDelay) -> Self {
        self.delay = delay;
        self
    }

    /// Replace the freshness window
    #[must_use]
    pub fn with_time_frame(mut self, time_frame: TimeFrame) -> Self {
        self.time_frame = time_frame;
        self
    }

    /// Replace the stale-recording action
    #[must_use]
    pub fn with_when_expired(mut self, when_expired: ExpirationAction) -> Self {
        self.when_expired = when_expired;
        self
    }
}

/// On-disk configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcrConfig {
    /// Operating mode
    pub mode: Mode,
    /// Directory holding cassette files
    pub cassette_dir: PathBuf,
    /// Cassette name (file stem)
    pub cassette: String,
    /// Redaction configuration
    #[serde(default)]
    pub censor: CensorConfig,
    /// Matching configuration
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Expiration configuration
    #[serde(default)]
    pub expiration: ExpirationConfig,
    /// Replay delay configuration
    #[serde(default)]
    pub delay: DelayConfig,
}

/// Redaction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensorConfig {
    /// Replacement text
    #[serde(default = "default_censor_text")]
    pub text: String,
    /// Header names to redact
    #[serde(default)]
    pub headers: Vec<String>,
    /// Query parameter keys to redact
    #[serde(default)]
    pub query_parameters: Vec<String>,
    /// JSON body keys to redact
    #[serde(default)]
    pub body_elements: Vec<String>,
    /// Regex patterns redacted from host and path
    #[serde(default)]
    pub path_patterns: Vec<String>,
    /// Whether key comparisons are case-sensitive
    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_censor_text() -> String {
    DEFAULT_CENSOR_TEXT.to_string()
}

impl Default for CensorConfig {
    fn default() -> Self {
        Self {
            text: default_censor_text(),
            headers: Vec::new(),
            query_parameters: Vec::new(),
            body_elements: Vec::new(),
            path_patterns: Vec::new(),
            case_sensitive: false,
        }
    }
}

/// Matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Rules, evaluated in order
    #[serde(default = "default_rules")]
    pub rules: Vec<MatchRule>,
}

fn default_rules() -> Vec<MatchRule> {
    MatchRules::regular().rules().to_vec()
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

/// Expiration configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpirationConfig {
    /// Freshness window
    #[serde(default)]
    pub time_frame: TimeFrame,
    /// Stale-recording action
    #[serde(default)]
    pub when_expired: ExpirationAction,
}

/// Replay delay kind as written in the config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayKind {
    /// No delay
    #[default]
    None,
    /// Recorded duration
    Recorded,
    /// Fixed `millis`
    Manual,
}

/// Replay delay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Delay kind
    #[serde(default)]
    pub kind: DelayKind,
    /// Fixed delay for `manual`
    #[serde(default)]
    pub millis: u64,
}

impl VcrConfig {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VcrError::Configuration(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| VcrError::Configuration(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.cassette.is_empty() {
            return Err(VcrError::Configuration(
                "Cassette name cannot be empty".to_string(),
            ));
        }

        if self.delay.kind == DelayKind::Manual && self.delay.millis == 0 {
            return Err(VcrError::Configuration(
                "Manual delay requires millis > 0".to_string(),
            ));
        }

        for pattern in &self.censor.path_patterns {
            CensorElement::regex(pattern.as_str(), self.censor.case_sensitive)?;
        }
        for rule in &self.matching.rules {
            if let MatchRule::Body { ignored } = rule {
                for element in ignored {
                    element.validate()?;
                }
            }
        }

        check_compatible(self.expiration.when_expired, self.mode)
    }

    /// Build runtime settings
    ///
    /// # Errors
    ///
    /// Returns error if a path pattern is not a valid regex
    pub fn into_settings(self) -> Result<Settings> {
        let censor = self.censor;
        let case_sensitive = censor.case_sensitive;
        let censors = Censors::new(censor.text)
            .censor_headers_by_keys(censor.headers, case_sensitive)
            .censor_query_parameters_by_keys(censor.query_parameters, case_sensitive)
            .censor_body_elements_by_keys(censor.body_elements, case_sensitive)
            .censor_path_elements_by_pattern(censor.path_patterns, case_sensitive)?;

        let delay = match self.delay.kind {
            DelayKind::None => ReplayDelay::None,
            DelayKind::Recorded => ReplayDelay::Recorded,
            DelayKind::Manual => ReplayDelay::Manual(Duration::from_millis(self.delay.millis)),
        };

        Ok(Settings {
            match_rules: MatchRules::from_rules(self.matching.rules),
            censors,
            delay,
            time_frame: self.expiration.time_frame,
            when_expired: self.expiration.when_expired,
        })
    }

    /// Cassette described by this configuration
    ///
    /// # Errors
    ///
    /// Returns error if the cassette name is not a safe file name
    pub fn cassette(&self) -> Result<Cassette> {
        Cassette::new(&self.cassette_dir, &self.cassette)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"
        mode = "auto"
        cassette_dir = "/tmp/cassettes"
        cassette = "my_test"

        [censor]
        text = "[gone]"
        headers = ["Authorization"]
        query_parameters = ["api_key"]
        body_elements = ["password"]
        path_patterns = ["\\d{6}"]

        [matching]
        rules = [{ rule = "method" }, { rule = "base_url" }]

        [expiration]
        time_frame = { days = 30 }
        when_expired = "throw_exception"

        [delay]
        kind = "manual"
        millis = 200
    "#;

    #[test]
    fn test_mode_parse_case_insensitive() {
        assert_eq!("REPLAY".parse::<Mode>().unwrap(), Mode::Replay);
        assert_eq!("Auto".parse::<Mode>().unwrap(), Mode::Auto);
        assert!("sometimes".parse::<Mode>().is_err());
    }

    #[test]
    fn test_mode_resolve() {
        assert_eq!(Mode::resolve(Mode::Record, Some("replay")), Mode::Replay);
        assert_eq!(Mode::resolve(Mode::Record, None), Mode::Record);
        assert_eq!(Mode::resolve(Mode::Record, Some("bogus")), Mode::Record);
        assert_eq!(Mode::resolve(Mode::Bypass, Some("record")), Mode::Bypass);
        assert_eq!(Mode::resolve(Mode::Auto, Some("bypass")), Mode::Bypass);
    }

    #[test]
    fn test_delay_for_recorded() {
        assert_eq!(ReplayDelay::None.for_recorded(500), None);
        assert_eq!(
            ReplayDelay::Recorded.for_recorded(500),
            Some(Duration::from_millis(500))
        );
        assert_eq!(ReplayDelay::Recorded.for_recorded(0), None);
        assert_eq!(
            ReplayDelay::Manual(Duration::from_millis(200)).for_recorded(5),
            Some(Duration::from_millis(200))
        );
    }

    #[test]
    fn test_settings_default_uses_regular_rules() {
        let settings = Settings::default();
        assert_eq!(settings.match_rules, MatchRules::regular());
        assert_eq!(settings.time_frame, TimeFrame::FOREVER);
        assert_eq!(settings.when_expired, ExpirationAction::Warn);
    }

    #[test]
    fn test_config_parse() {
        let config: VcrConfig = toml::from_str(FULL_CONFIG).unwrap();
        assert_eq!(config.mode, Mode::Auto);
        assert_eq!(config.cassette, "my_test");
        assert_eq!(config.censor.text, "[gone]");
        assert_eq!(config.matching.rules, vec![MatchRule::Method, MatchRule::BaseUrl]);
        assert_eq!(config.expiration.time_frame, TimeFrame::new(30, 0, 0, 0));
        assert_eq!(
            config.expiration.when_expired,
            ExpirationAction::ThrowException
        );
        assert_eq!(config.delay.kind, DelayKind::Manual);

        let settings = config.into_settings().unwrap();
        assert_eq!(settings.delay, ReplayDelay::Manual(Duration::from_millis(200)));
        assert_eq!(settings.censors.censor_text(), "[gone]");
    }

    #[test]
    fn test_config_defaults() {
        let config: VcrConfig = toml::from_str(
            r#"
            mode = "replay"
            cassette_dir = "/tmp"
            cassette = "defaults"
        "#,
        )
        .unwrap();
        assert_eq!(config.censor.text, DEFAULT_CENSOR_TEXT);
        assert_eq!(config.expiration.time_frame, TimeFrame::FOREVER);

        let settings = config.into_settings().unwrap();
        assert_eq!(settings.match_rules, MatchRules::regular());
        assert_eq!(settings.delay, ReplayDelay::None);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let config = VcrConfig::from_file(file.path()).unwrap();
        assert_eq!(config.mode, Mode::Auto);
        let cassette = config.cassette().unwrap();
        assert_eq!(cassette.name(), "my_test");
    }

    #[test]
    fn test_invalid_config_record_again_with_replay() {
        let config: VcrConfig = toml::from_str(
            r#"
            mode = "replay"
            cassette_dir = "/tmp"
            cassette = "stale"

            [expiration]
            time_frame = "never"
            when_expired = "record_again"
        "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(VcrError::Configuration(_))));
    }

    #[test]
    fn test_invalid_config_bad_pattern() {
        let config: VcrConfig = toml::from_str(
            r#"
            mode = "record"
            cassette_dir = "/tmp"
            cassette = "broken"

            [censor]
            path_patterns = ["(unclosed"]
        "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(VcrError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_invalid_config_empty_cassette() {
        let config: VcrConfig = toml::from_str(
            r#"
            mode = "record"
            cassette_dir = "/tmp"
            cassette = ""
        "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
