//! Option maps and their typed, validated form.
//!
//! Callers hand a benchmark an [`Options`] map. [`configure`] deserializes a
//! clone of it into the variant's config struct, whose `Default` supplies the
//! documented defaults for missing keys, and then runs the variant's range
//! checks. Unknown keys are rejected.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::benchmark::Difficulty;
use crate::error::ConfigError;

/// Raw option name to value mapping.
pub type Options = serde_json::Map<String, Value>;

/// Default seed for task generation.
pub const DEFAULT_SEED: u64 = 42;

/// Default per-prompt time limit, in seconds.
pub const DEFAULT_TIME_LIMIT: f64 = 300.0;

/// A typed benchmark configuration.
pub trait BenchmarkConfig: DeserializeOwned + Serialize + Default {
    /// Name used in error messages.
    const BENCHMARK: &'static str;

    /// Range and membership checks that serde cannot express.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Merges `options` over the defaults of `C` and validates the result.
///
/// `options` is left untouched.
pub fn configure<C: BenchmarkConfig>(options: &Options) -> Result<C, ConfigError> {
    let config: C = serde_json::from_value(Value::Object(options.clone())).map_err(|e| {
        ConfigError::Malformed {
            benchmark: C::BENCHMARK.to_string(),
            message: e.to_string(),
        }
    })?;
    config.validate()?;
    Ok(config)
}

/// Renders a configuration back into an option map.
pub fn to_options<C: BenchmarkConfig>(config: &C) -> Options {
    match serde_json::to_value(config) {
        Ok(Value::Object(map)) => map,
        _ => Options::new(),
    }
}

pub(crate) fn require_non_empty<T>(option: &str, values: &[T]) -> Result<(), ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::invalid(option, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn require_positive(option: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(option, "must be a positive integer"));
    }
    Ok(())
}

/// Every entry of a list of counts must be positive.
pub(crate) fn require_all_positive(option: &str, values: &[u32]) -> Result<(), ConfigError> {
    for &value in values {
        require_positive(option, u64::from(value))?;
    }
    Ok(())
}

/// No entry may appear twice.
pub(crate) fn require_distinct<T: PartialEq + fmt::Debug>(
    option: &str,
    values: &[T],
) -> Result<(), ConfigError> {
    for (i, value) in values.iter().enumerate() {
        if values[..i].contains(value) {
            return Err(ConfigError::invalid(
                option,
                format!("duplicate value {:?}", value),
            ));
        }
    }
    Ok(())
}

pub(crate) fn require_positive_seconds(option: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(
            option,
            format!("must be a positive number of seconds, got {}", value),
        ));
    }
    Ok(())
}

/// Every entry must be one of `known`, each at most once.
pub(crate) fn require_known(
    option: &str,
    values: &[String],
    known: &[&str],
) -> Result<(), ConfigError> {
    require_non_empty(option, values)?;
    require_distinct(option, values)?;
    if let Some(unknown) = values.iter().find(|v| !known.contains(&v.as_str())) {
        return Err(ConfigError::invalid(
            option,
            format!("unknown value '{}', expected one of {}", unknown, known.join(", ")),
        ));
    }
    Ok(())
}

pub(crate) fn default_difficulties() -> Vec<Difficulty> {
    Difficulty::ALL.to_vec()
}

/// Collapses duplicate list entries, keeping first occurrences.
pub(crate) fn dedup<T: PartialEq + Clone>(values: &[T]) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(value) {
            unique.push(value.clone());
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(default, deny_unknown_fields)]
    struct SampleConfig {
        span: u32,
        names: Vec<String>,
        time_limit: f64,
    }

    impl Default for SampleConfig {
        fn default() -> Self {
            Self {
                span: 10,
                names: vec!["a".to_string(), "b".to_string()],
                time_limit: DEFAULT_TIME_LIMIT,
            }
        }
    }

    impl BenchmarkConfig for SampleConfig {
        const BENCHMARK: &'static str = "sample";

        fn validate(&self) -> Result<(), ConfigError> {
            require_positive("span", u64::from(self.span))?;
            require_known("names", &self.names, &["a", "b", "c"])?;
            require_positive_seconds("time_limit", self.time_limit)
        }
    }

    fn options(value: Value) -> Options {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_keys_only() {
        let supplied = options(json!({"span": 3}));
        let config: SampleConfig = configure(&supplied).unwrap();

        assert_eq!(config.span, 3);
        assert_eq!(config.names, vec!["a", "b"]);
        assert_eq!(config.time_limit, 300.0);
        // The caller's map is not modified.
        assert_eq!(supplied, options(json!({"span": 3})));
    }

    #[test]
    fn test_range_violation() {
        let err = configure::<SampleConfig>(&options(json!({"span": 0}))).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { ref option, .. } if option == "span"));
    }

    #[test]
    fn test_type_violation() {
        let err = configure::<SampleConfig>(&options(json!({"span": -1}))).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = configure::<SampleConfig>(&options(json!({"spna": 3}))).unwrap_err();
        assert!(err.to_string().contains("spna"));
    }

    #[test]
    fn test_unknown_list_value_rejected() {
        let err = configure::<SampleConfig>(&options(json!({"names": ["z"]}))).unwrap_err();
        assert!(err.to_string().contains("'z'"));
    }

    #[test]
    fn test_duplicate_list_value_rejected() {
        let err = configure::<SampleConfig>(&options(json!({"names": ["a", "b", "a"]}))).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { ref option, .. } if option == "names"));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_require_distinct_and_all_positive() {
        assert!(require_distinct("levels", &[Difficulty::Easy, Difficulty::Hard]).is_ok());
        assert!(require_distinct("levels", &[Difficulty::Easy, Difficulty::Easy]).is_err());
        assert!(require_distinct::<u32>("empty", &[]).is_ok());
        assert!(require_all_positive("delays", &[1, 5, 10]).is_ok());
        assert!(require_all_positive("delays", &[1, 0]).is_err());
    }

    #[test]
    fn test_to_options_round_trip() {
        let config = SampleConfig::default();
        let rendered = to_options(&config);
        assert_eq!(configure::<SampleConfig>(&rendered).unwrap(), config);
    }

    #[test]
    fn test_dedup_keeps_order() {
        assert_eq!(dedup(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
