//! Model selector and CPU architecture types
//!
//! The transcription function is parameterized by a model-size selector that must be
//! one of the model tiers the bundled speech model actually ships. Anything else is a
//! configuration error and is rejected before any build or deploy step runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Model tier selector for the transcription function.
///
/// Mirrors the tiers published by the speech-recognition model family. The enum is
/// closed on purpose: an unrecognized tier would only be discovered at function cold
/// start, long after the image was built and published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelSize {
    Tiny,
    TinyEn,
    Base,
    BaseEn,
    Small,
    SmallEn,
    Medium,
    MediumEn,
    Large,
    LargeV2,
    LargeV3,
}

impl ModelSize {
    /// All accepted selector strings, in the order they are documented.
    pub const ALL: [ModelSize; 11] = [
        ModelSize::Tiny,
        ModelSize::TinyEn,
        ModelSize::Base,
        ModelSize::BaseEn,
        ModelSize::Small,
        ModelSize::SmallEn,
        ModelSize::Medium,
        ModelSize::MediumEn,
        ModelSize::Large,
        ModelSize::LargeV2,
        ModelSize::LargeV3,
    ];

    /// The wire/env-var form of the selector (e.g. `tiny.en`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::TinyEn => "tiny.en",
            ModelSize::Base => "base",
            ModelSize::BaseEn => "base.en",
            ModelSize::Small => "small",
            ModelSize::SmallEn => "small.en",
            ModelSize::Medium => "medium",
            ModelSize::MediumEn => "medium.en",
            ModelSize::Large => "large",
            ModelSize::LargeV2 => "large-v2",
            ModelSize::LargeV3 => "large-v3",
        }
    }
}

impl Default for ModelSize {
    fn default() -> Self {
        ModelSize::TinyEn
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelSize::ALL
            .iter()
            .find(|m| m.as_str() == s)
            .copied()
            .ok_or_else(|| ConfigError::InvalidModelSize {
                value: s.to_string(),
                allowed: ModelSize::ALL.map(|m| m.as_str()).join(", "),
            })
    }
}

impl TryFrom<String> for ModelSize {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelSize> for String {
    fn from(value: ModelSize) -> Self {
        value.as_str().to_string()
    }
}

/// Target CPU architecture for the container image and the function binding.
///
/// The image build is pinned to exactly one platform; the function binding declares
/// the same value so a mismatched image can never be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    #[default]
    X86_64,
    Arm64,
}

impl Architecture {
    /// The `--platform` value passed to the container toolchain.
    pub fn platform(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "linux/amd64",
            Architecture::Arm64 => "linux/arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86_64 => f.write_str("x86_64"),
            Architecture::Arm64 => f.write_str("arm64"),
        }
    }
}

impl FromStr for Architecture {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" | "amd64" => Ok(Architecture::X86_64),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            other => Err(ConfigError::InvalidArchitecture(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_documented_tier() {
        for tier in ModelSize::ALL {
            let parsed: ModelSize = tier.as_str().parse().unwrap();
            assert_eq!(parsed, tier);
        }
    }

    #[test]
    fn rejects_unknown_tier() {
        let err = "huge".parse::<ModelSize>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidModelSize { .. }));
        assert!(err.to_string().contains("huge"));
    }

    #[test]
    fn rejects_case_mismatch() {
        // Selector strings are exact; the function's env contract is case-sensitive.
        assert!("Tiny.En".parse::<ModelSize>().is_err());
    }

    #[test]
    fn architecture_platform_pinning() {
        assert_eq!(Architecture::X86_64.platform(), "linux/amd64");
        assert_eq!("aarch64".parse::<Architecture>().unwrap(), Architecture::Arm64);
        assert!("sparc".parse::<Architecture>().is_err());
    }
}
