use std::{fs::File, io, io::BufReader, path::Path};

use serde::Deserialize;
use thiserror::Error;

/// Default number of items fetched from the bulk generator per refill.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Default length of exponentiation pipes.
pub const DEFAULT_EXP_PIPE_LENGTH: usize = 200;

/// Default number of pending openings that forces a MAC check.
pub const DEFAULT_OPENED_VALUE_THRESHOLD: usize = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least two parties are required, got {0}")]
    TooFewParties(usize),

    #[error("party ID {party_id} is outside 1..={num_parties}")]
    InvalidPartyId { party_id: usize, num_parties: usize },

    #[error("batch size must be positive")]
    ZeroBatchSize,

    #[error("exponentiation pipe length must be positive")]
    ZeroPipeLength,

    #[error("opened value threshold must be positive")]
    ZeroThreshold,

    #[error("configured modulus bit length {configured} does not match field with {field} bits")]
    ModulusBitLength { configured: u32, field: u32 },

    #[error("external preprocessing selected, a generator factory must be supplied")]
    ExternalPreprocessing,

    #[error("network of party {network_party_id} of {network_num_parties} given to party {party_id} of {num_parties}")]
    NetworkMismatch {
        party_id: usize,
        num_parties: usize,
        network_party_id: usize,
        network_num_parties: usize,
    },

    #[error("could not read configuration: {0}")]
    Io(#[from] io::Error),

    #[error("could not parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where preprocessed material comes from.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessingStrategy {
    /// Insecure local simulation, every party uses the same seed.
    Fake { seed: u8 },
    /// A caller-provided generator factory.
    External,
}

impl Default for PreprocessingStrategy {
    fn default() -> Self {
        Self::Fake { seed: 0 }
    }
}

/// Configuration of a SPDZ run, fixed at party context construction.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpdzConfig {
    pub batch_size: usize,
    pub exp_pipe_length: usize,
    pub opened_value_threshold: usize,
    pub modulus_bit_length: Option<u32>,
    pub preprocessing: PreprocessingStrategy,
}

impl Default for SpdzConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            exp_pipe_length: DEFAULT_EXP_PIPE_LENGTH,
            opened_value_threshold: DEFAULT_OPENED_VALUE_THRESHOLD,
            modulus_bit_length: None,
            preprocessing: PreprocessingStrategy::default(),
        }
    }
}

impl SpdzConfig {
    /// Load configuration from JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Parse configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Check the configuration for a party before any network interaction.
    pub fn validate(
        &self,
        num_parties: usize,
        party_id: usize,
        field_bits: u32,
    ) -> Result<(), ConfigError> {
        if num_parties < 2 {
            return Err(ConfigError::TooFewParties(num_parties));
        }
        if party_id == 0 || party_id > num_parties {
            return Err(ConfigError::InvalidPartyId {
                party_id,
                num_parties,
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.exp_pipe_length == 0 {
            return Err(ConfigError::ZeroPipeLength);
        }
        if self.opened_value_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        match self.modulus_bit_length {
            Some(configured) if configured != field_bits => Err(ConfigError::ModulusBitLength {
                configured,
                field: field_bits,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        assert_eq!(SpdzConfig::from_json("{}").unwrap(), SpdzConfig::default());
    }

    #[test]
    fn test_parse() {
        let config = SpdzConfig::from_json(
            r#"{
                "batch_size": 4,
                "modulus_bit_length": 61,
                "preprocessing": { "fake": { "seed": 9 } }
            }"#,
        )
        .unwrap();
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.exp_pipe_length, DEFAULT_EXP_PIPE_LENGTH);
        assert_eq!(config.preprocessing, PreprocessingStrategy::Fake { seed: 9 });
        assert!(config.validate(3, 2, 61).is_ok());

        let config = SpdzConfig::from_json(r#"{ "preprocessing": "external" }"#).unwrap();
        assert_eq!(config.preprocessing, PreprocessingStrategy::External);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        assert!(matches!(
            SpdzConfig::from_json(r#"{ "batchsize": 4 }"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_validate() {
        let config = SpdzConfig::default();
        assert!(matches!(
            config.validate(1, 1, 61),
            Err(ConfigError::TooFewParties(1))
        ));
        assert!(matches!(
            config.validate(2, 0, 61),
            Err(ConfigError::InvalidPartyId { .. })
        ));
        assert!(matches!(
            config.validate(2, 3, 61),
            Err(ConfigError::InvalidPartyId { .. })
        ));

        let config = SpdzConfig {
            batch_size: 0,
            ..SpdzConfig::default()
        };
        assert!(matches!(
            config.validate(2, 1, 61),
            Err(ConfigError::ZeroBatchSize)
        ));

        let config = SpdzConfig {
            modulus_bit_length: Some(127),
            ..SpdzConfig::default()
        };
        assert!(matches!(
            config.validate(2, 1, 61),
            Err(ConfigError::ModulusBitLength {
                configured: 127,
                field: 61
            })
        ));
        assert!(config.validate(2, 1, 127).is_ok());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            SpdzConfig::load("/nonexistent/spdz.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
