use serde::Deserialize;

use crate::errors::ConfigError;

/// Controls how much semi-structured data the transformer materializes per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Standard,
    Full,
}

impl std::str::FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Profile::Standard),
            "full" => Ok(Profile::Full),
            other => Err(ConfigError::Invalid(format!("unknown profile '{other}'"))),
        }
    }
}

/// Comment types retained under the standard profile (§4.1).
pub const STANDARD_COMMENT_TYPES: &[&str] = &["function", "disease", "subcellular location"];
