//! Strategy configurations as stored in the catalog

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use syncstream_util::StrategyId;

/// Loosely-typed strategy parameters, interpreted only by the matching
/// strategy implementation.
pub type StrategyParameters = BTreeMap<String, serde_json::Value>;

/// Decision produced by a strategy for one track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyAction {
    Keep,
    Skip,
}

/// A persisted strategy configuration.
///
/// `is_active` is catalog-level enablement; which strategy is currently
/// enforced is decided by the separate active pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub id: StrategyId,
    pub name: String,
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub parameters: StrategyParameters,
}

fn default_true() -> bool {
    true
}

impl StrategyConfig {
    pub fn new(
        id: impl Into<StrategyId>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            is_active: true,
            parameters: StrategyParameters::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.is_active = false;
        self
    }
}
