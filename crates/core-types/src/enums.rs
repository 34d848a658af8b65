use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The trading environment a decision was made in.
///
/// Stored as lowercase text in the ledger and encoded the same way on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Testnet,
    Mainnet,
}

impl Environment {
    pub const ALL: [Environment; 2] = [Environment::Testnet, Environment::Mainnet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Testnet => "testnet",
            Environment::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" => Ok(Environment::Testnet),
            "mainnet" => Ok(Environment::Mainnet),
            other => Err(CoreError::InvalidInput("environment".to_string(), other.to_string())),
        }
    }
}

/// The four attribution axes a set of trades can be broken down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    Symbol,
    Strategy,
    TriggerType,
    Operation,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Symbol,
        Dimension::Strategy,
        Dimension::TriggerType,
        Dimension::Operation,
    ];

    /// The path segment used by the HTTP API (`/by-<segment>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Symbol => "symbol",
            Dimension::Strategy => "strategy",
            Dimension::TriggerType => "trigger-type",
            Dimension::Operation => "operation",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "symbol" => Ok(Dimension::Symbol),
            "strategy" => Ok(Dimension::Strategy),
            "trigger-type" | "trigger" => Ok(Dimension::TriggerType),
            "operation" => Ok(Dimension::Operation),
            other => Err(CoreError::InvalidInput("dimension".to_string(), other.to_string())),
        }
    }
}
