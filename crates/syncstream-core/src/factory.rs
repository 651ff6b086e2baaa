//! Strategy factory

use std::collections::HashMap;
use syncstream_api::{StrategyConfig, StrategyParameters};
use syncstream_util::StrategyId;

use crate::{CoreError, CoreResult, EnergyFloor, FocusGuard, Strategy, VibeShift};

/// Builds a strategy from its stored parameters
pub type StrategyConstructor = fn(&StrategyParameters) -> Box<dyn Strategy>;

/// Maps strategy ids to their implementations.
///
/// Adding a policy means registering one more constructor here; the engine
/// and catalog only ever see `dyn Strategy`.
#[derive(Clone)]
pub struct StrategyFactory {
    constructors: HashMap<StrategyId, StrategyConstructor>,
}

impl Default for StrategyFactory {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StrategyFactory {
    /// Factory with no registered strategies
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Factory with the reference strategies registered
    pub fn builtin() -> Self {
        let mut factory = Self::empty();
        factory.register("focus", |p| Box::new(FocusGuard::from_parameters(p)));
        factory.register("energy", |p| Box::new(EnergyFloor::from_parameters(p)));
        factory.register("vibe", |p| Box::new(VibeShift::from_parameters(p)));
        factory
    }

    pub fn register(&mut self, id: impl Into<StrategyId>, constructor: StrategyConstructor) {
        self.constructors.insert(id.into(), constructor);
    }

    pub fn supports(&self, id: &StrategyId) -> bool {
        self.constructors.contains_key(id)
    }

    /// Registered ids, sorted
    pub fn known_ids(&self) -> Vec<StrategyId> {
        let mut ids: Vec<_> = self.constructors.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Build the executable strategy for a stored config
    pub fn make(&self, config: &StrategyConfig) -> CoreResult<Box<dyn Strategy>> {
        let constructor = self.constructors.get(&config.id).ok_or_else(|| {
            CoreError::InvalidArgument(format!(
                "No implementation found for strategy: {}",
                config.id
            ))
        })?;
        Ok(constructor(&config.parameters))
    }
}
