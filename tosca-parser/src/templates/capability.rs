//! Materialized capabilities
//!
//! A capability instance composes the capability type's property defaults
//! with the template's overrides.

use crate::context::ParseContext;
use crate::templates::property::Property;
use crate::types::EntityType;
use indexmap::IndexMap;
use tosca_core::value::Value;

/// A capability instantiated on a node template
#[derive(Debug, Clone)]
pub struct Capability {
    /// Symbolic name of the capability
    pub name: String,
    /// The resolved capability type
    pub type_def: Option<EntityType>,
    /// Materialized properties (defaults overlaid with assignments)
    pub properties: IndexMap<String, Property>,
}

impl Capability {
    /// The capability type's name
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_def.as_ref().map(EntityType::type_name)
    }

    /// True if the capability's type is, or derives from, the named type
    #[must_use]
    pub fn is_derived_from(&self, ctx: &ParseContext, type_name: &str) -> bool {
        self.type_def
            .as_ref()
            .is_some_and(|def| def.is_derived_from(ctx, type_name))
    }

    /// The value of a property, if materialized
    #[must_use]
    pub fn property_value(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).map(|property| &property.value)
    }

    /// Validate every materialized property value
    pub fn validate(&self, ctx: &ParseContext) {
        for property in self.properties.values() {
            property.validate(ctx);
        }
    }
}
