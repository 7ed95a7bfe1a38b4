//! Loading the safety configuration from JSON.

use std::io::Read;

use skyscale_logic::config::{ConfigError, SafetyConfiguration};

/// Parse and validate a configuration document.
///
/// Missing fields take their defaults, so `{}` is a valid document.
pub fn load_configuration<R: Read>(reader: R) -> Result<SafetyConfiguration, SettingsError> {
    let config: SafetyConfiguration = serde_json::from_reader(reader)?;
    config.validate()?;
    Ok(config)
}

/// Same as [`load_configuration`] for an in-memory string.
pub fn parse_configuration(json: &str) -> Result<SafetyConfiguration, SettingsError> {
    load_configuration(json.as_bytes())
}

/// Render a configuration as pretty-printed JSON.
pub fn configuration_to_json(config: &SafetyConfiguration) -> Result<String, SettingsError> {
    Ok(serde_json::to_string_pretty(config)?)
}

/// Errors that can occur while loading settings
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(ConfigError),
}

impl From<std::io::Error> for SettingsError {
    fn from(e: std::io::Error) -> Self {
        SettingsError::Io(e)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Json(e)
    }
}

impl From<ConfigError> for SettingsError {
    fn from(e: ConfigError) -> Self {
        SettingsError::Invalid(e)
    }
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::Json(e) => write!(f, "JSON error: {}", e),
            SettingsError::Invalid(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = parse_configuration("{}").expect("defaults");
        assert_eq!(config, SafetyConfiguration::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config =
            parse_configuration(r#"{ "max_g_force": 12.5, "consensus": { "absolute_tolerance": 3.0 } }"#)
                .expect("valid");
        assert_eq!(config.max_g_force, 12.5);
        assert_eq!(config.consensus.absolute_tolerance, 3.0);
        assert_eq!(config.consensus.relative_tolerance, 1e-3);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = parse_configuration(r#"{ "min_scale_factor": 5.0, "max_scale_factor": 1.0 }"#)
            .expect_err("inverted range");
        assert!(matches!(err, SettingsError::Invalid(_)));

        let err = parse_configuration("{ not json").expect_err("syntax");
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn json_round_trip() {
        let config = SafetyConfiguration {
            verbose_logging: true,
            ..Default::default()
        };
        let json = configuration_to_json(&config).expect("serialize");
        assert_eq!(parse_configuration(&json).expect("parse"), config);
    }

    #[test]
    fn shipped_defaults_parse() {
        let shipped = include_str!("../../../data/safety_config.json");
        assert_eq!(
            parse_configuration(shipped).expect("shipped config"),
            SafetyConfiguration::default()
        );
    }
}
