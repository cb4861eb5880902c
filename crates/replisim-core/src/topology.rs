//! Geography and accelerator definitions.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Geography a replica lives in or a request originates from.
///
/// Informational only: no policy routes on location today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Us,
    Asia,
}

impl Region {
    /// Parse a configuration name, ignoring case.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "us" => Ok(Region::Us),
            "asia" => Ok(Region::Asia),
            _ => Err(ConfigError::UnknownRegion(name.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Asia => "asia",
        }
    }
}

/// Accelerator hardware. Each type fixes the compute units per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcceleratorType {
    A100,
    T4,
}

impl AcceleratorType {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.to_ascii_uppercase().as_str() {
            "A100" => Ok(AcceleratorType::A100),
            "T4" => Ok(AcceleratorType::T4),
            _ => Err(ConfigError::UnknownAccelerator(name.to_string())),
        }
    }

    /// Compute units this accelerator applies per tick.
    pub fn capacity(&self) -> u64 {
        match self {
            AcceleratorType::A100 => 10,
            AcceleratorType::T4 => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcceleratorType::A100 => "A100",
            AcceleratorType::T4 => "T4",
        }
    }
}
