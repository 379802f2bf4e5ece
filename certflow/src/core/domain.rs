//! Certification domains.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// The certification category a workflow belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Core platform components.
    Core,
    /// Transport and logistics systems.
    Transport,
    /// Banking and payment systems.
    Banking,
    /// Healthcare systems.
    Healthcare,
}

impl Domain {
    /// All domains.
    pub const ALL: [Self; 4] = [Self::Core, Self::Transport, Self::Banking, Self::Healthcare];

    /// Returns the wire name of the domain.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Transport => "transport",
            Self::Banking => "banking",
            Self::Healthcare => "healthcare",
        }
    }

    /// Returns the stages run for this domain when a request names none.
    #[must_use]
    pub fn default_stages(&self) -> &'static [&'static str] {
        match self {
            Self::Core => &["code_quality", "security", "functional"],
            Self::Transport => &["code_quality", "security", "functional", "performance"],
            Self::Banking => &["code_quality", "security", "compliance", "functional", "e2e"],
            Self::Healthcare => &["code_quality", "security", "compliance", "functional", "soak"],
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(Self::Core),
            "transport" => Ok(Self::Transport),
            "banking" => Ok(Self::Banking),
            "healthcare" => Ok(Self::Healthcare),
            other => Err(ValidationError::new(format!("Unrecognized domain: {other}"))
                .with_field("domain")),
        }
    }
}
