//! Migration rules: the typed rule model, the backend location-code table and the YAML loader.

mod error;
mod loader;
pub mod location;
mod model;

pub use error::{Result, RulesError};
pub use loader::{load_rules, LoadedRules, RuleLoader, SkippedFile};
pub use location::{location_code, location_name, LocationKind};
pub use model::{
    Annotated, AnnotatedElement, Condition, JavaDependency, JavaReferenced, Rule, When,
};
