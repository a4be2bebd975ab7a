use serde_json::Value;
use strata_types::Attributes;

use crate::{Entity, Options};

/// Optional hooks for an entity kind.
///
/// Kinds without a behavior never fail validation, parse nothing and have
/// no initializer. Implement this only for what a kind needs:
/// - Validation gating `set`, `save` and collection adds
/// - Reshaping raw input or backend responses into attributes
/// - Setup after construction
pub trait EntityBehavior {
    /// Checks the full prospective attribute bag.
    /// Return `Some(error)` to reject the change.
    fn validate(&self, attrs: &Attributes, options: &Options) -> Option<Value> {
        let _ = (attrs, options);
        None
    }

    /// Turns raw input into the value to set as attributes.
    fn parse(&self, response: Value, options: &Options) -> Value {
        let _ = options;
        response
    }

    /// Runs once at the end of construction.
    fn initialize(&self, entity: &Entity, options: &Options) {
        let _ = (entity, options);
    }
}
