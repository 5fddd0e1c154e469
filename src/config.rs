//! Engine defaults shared by every request created from one [`Context`](crate::Context).
//!
//! ```toml
//! random_seed = 1234
//! full_range_max_width = 12
//! random_mutations = 50
//! long_string_lengths = [128, 256, 1024]
//! max_repeat = 256
//! ```

use crate::error::SpecError;
use crate::library::DEFAULT_LONG_STRING_LENGTHS;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Base seed for random primitives; each field mixes in its own id.
    pub random_seed: u64,
    /// Widest bit field for which `full_range` enumerates every value.
    pub full_range_max_width: u32,
    /// Default number of payloads for random primitives.
    pub random_mutations: u64,
    /// Lengths of the long single-unit runs in the string corpus.
    pub long_string_lengths: Vec<usize>,
    /// Ceiling on a variable-driven repeat count when the repeat sets no `max_reps`.
    pub max_repeat: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            random_seed: 0x5EED_F00D,
            full_range_max_width: 16,
            random_mutations: 25,
            long_string_lengths: DEFAULT_LONG_STRING_LENGTHS.to_vec(),
            max_repeat: 1024,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, SpecError> {
        toml::from_str(raw).map_err(|e| SpecError::invalid(format!("engine config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = EngineConfig::from_toml_str("random_seed = 7\nfull_range_max_width = 8\n").unwrap();
        assert_eq!(cfg.random_seed, 7);
        assert_eq!(cfg.full_range_max_width, 8);
        assert_eq!(cfg.random_mutations, 25);
        assert_eq!(cfg.long_string_lengths, DEFAULT_LONG_STRING_LENGTHS.to_vec());
        assert_eq!(cfg.max_repeat, 1024);
    }

    #[test]
    fn max_repeat_from_toml() {
        let cfg = EngineConfig::from_toml_str("max_repeat = 8").unwrap();
        assert_eq!(cfg.max_repeat, 8);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("seed = 1"),
            Err(SpecError::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }
}
