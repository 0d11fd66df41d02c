//! Resolution of polymorphic foreign keys.
//!
//! When a relationship targets an entity inside a hierarchical bag, the
//! referenced row may belong to any entity of the tree. The resolver
//! determines the most specific concrete entity: by reading the
//! discriminator column for table-per-hierarchy, or by walking the bag
//! deepest-first and probing each entity's own table for the key. The two
//! physical-table patterns (table-per-type, table-per-concrete-type) share
//! one lookup walk; only table-per-hierarchy short-circuits through the
//! discriminator.

pub mod errors;


use log::debug;

use crate::datasource::{SourceCatalog, SqlValue};
use crate::schema_model::{EntityId, HierarchicalBag, InheritancePattern, SchemaModel};

pub use errors::ResolveError;

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The concrete entity the referenced row belongs to.
    Entity(EntityId),
    /// No row of any entity in the bag carries this key.
    NotFound,
    /// At least one key component is null: the relationship is simply not
    /// populated for this row. Not an error.
    KeyNotPopulated,
}

pub struct HierarchyResolver<'a> {
    schema: &'a SchemaModel,
    catalog: &'a dyn SourceCatalog,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(schema: &'a SchemaModel, catalog: &'a dyn SourceCatalog) -> Self {
        HierarchyResolver { schema, catalog }
    }

    /// Finds the concrete entity of the row identified by `key_values`
    /// within `bag`. `key_values` are positionally matched against each
    /// candidate entity's own primary-key attributes (key columns may be
    /// renamed across the tree, the shape is identical).
    pub fn resolve_concrete_entity(
        &self,
        bag: &HierarchicalBag,
        key_values: &[SqlValue],
    ) -> Result<Resolution, ResolveError> {
        if key_values.iter().any(SqlValue::is_null) {
            return Ok(Resolution::KeyNotPopulated);
        }

        match bag.pattern {
            InheritancePattern::PerHierarchy => self.resolve_by_discriminator(bag, key_values),
            InheritancePattern::PerType | InheritancePattern::PerConcreteType => {
                self.resolve_by_physical_lookup(bag, key_values)
            }
        }
    }

    /// One lookup against the shared table; the discriminator column names
    /// the concrete entity.
    fn resolve_by_discriminator(
        &self,
        bag: &HierarchicalBag,
        key_values: &[SqlValue],
    ) -> Result<Resolution, ResolveError> {
        let discriminator = bag.discriminator_column.as_deref().ok_or_else(|| {
            ResolveError::MissingDiscriminatorColumn {
                bag: bag.name.clone(),
            }
        })?;

        let root = self.schema.entity(bag.root);
        let row = self.catalog.lookup_by_key(
            &root.physical_table,
            &root.primary_key.attributes,
            key_values,
        )?;
        let Some(row) = row else {
            return Ok(Resolution::NotFound);
        };

        let value = row
            .get(discriminator)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        match bag
            .entity_for_discriminator(&value)
            .and_then(|name| self.schema.entity_by_name(name))
        {
            Some(id) => Ok(Resolution::Entity(id)),
            None => Err(ResolveError::UnmappedDiscriminator {
                bag: bag.name.clone(),
                value,
            }),
        }
    }

    /// Deepest-first walk probing each entity's own table; the first hit
    /// is the concrete entity. O(depth) point lookups per resolution.
    fn resolve_by_physical_lookup(
        &self,
        bag: &HierarchicalBag,
        key_values: &[SqlValue],
    ) -> Result<Resolution, ResolveError> {
        for entity_id in bag.entities_deepest_first() {
            let entity = self.schema.entity(entity_id);
            let row = self.catalog.lookup_by_key(
                &entity.physical_table,
                &entity.primary_key.attributes,
                key_values,
            )?;
            if row.is_some() {
                debug!(
                    "key resolved to `{}` in hierarchy `{}`",
                    entity.name, bag.name
                );
                return Ok(Resolution::Entity(entity_id));
            }
        }
        Ok(Resolution::NotFound)
    }
}
