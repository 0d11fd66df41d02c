//! In-memory model of the relational source schema.
//!
//! All objects live in arenas owned by [`SchemaModel`] and refer to each
//! other through index newtypes ([`EntityId`], [`RelationshipId`],
//! [`BagId`]). Entities are found by case-insensitive name. The model is
//! built once from raw catalog records and is read-only afterwards.

pub mod entity;
pub mod errors;
pub mod hierarchy;
pub mod relationship;


use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::MigrationConfig;
use crate::datasource::{EntityDef, ForeignKeyDef};

pub use entity::{Attribute, Entity, ForeignKey, PrimaryKey};
pub use errors::SchemaModelError;
pub use hierarchy::{HierarchicalBag, InheritancePattern};
pub use relationship::{CanonicalRelationship, Direction, LogicalRelationship, Relationship};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BagId(pub usize);

#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
    bags: Vec<HierarchicalBag>,
    /// Lowercased entity name -> id.
    name_index: HashMap<String, EntityId>,
}

impl SchemaModel {
    /// Builds the model from raw catalog records: creates the entity arena,
    /// wires canonical relationships from declared foreign keys, logical
    /// relationships from configured edges without a physical key, groups
    /// inheritance trees into hierarchical bags, and flags aggregable join
    /// tables.
    pub fn from_defs(
        defs: Vec<EntityDef>,
        config: &MigrationConfig,
    ) -> Result<Self, SchemaModelError> {
        let mut model = SchemaModel::default();

        for def in &defs {
            let id = EntityId(model.entities.len());
            model.entities.push(Entity::from_def(def));
            model.name_index.insert(def.name.to_lowercase(), id);
        }

        model.wire_hierarchies(&defs)?;
        model.wire_canonical_relationships(&defs, config)?;
        model.wire_logical_relationships(config)?;
        model.detect_join_tables();

        debug!(
            "schema model built: {} entities, {} relationships, {} hierarchical bags",
            model.entities.len(),
            model.relationships.len(),
            model.bags.len()
        );
        Ok(model)
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    /// Case-insensitive lookup by table name.
    pub fn entity_by_name(&self, name: &str) -> Option<EntityId> {
        self.name_index.get(&name.to_lowercase()).copied()
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().enumerate().map(|(i, e)| (EntityId(i), e))
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship(&self, id: RelationshipId) -> &Relationship {
        &self.relationships[id.0]
    }

    pub fn relationships(&self) -> impl Iterator<Item = (RelationshipId, &Relationship)> {
        self.relationships
            .iter()
            .enumerate()
            .map(|(i, r)| (RelationshipId(i), r))
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn bag(&self, id: BagId) -> &HierarchicalBag {
        &self.bags[id.0]
    }

    pub fn bags(&self) -> impl Iterator<Item = (BagId, &HierarchicalBag)> {
        self.bags.iter().enumerate().map(|(i, b)| (BagId(i), b))
    }

    /// The physical table holding an entity's rows. Differs from the entity
    /// name only for table-per-hierarchy subclasses, which share the root's
    /// table.
    pub fn physical_table(&self, id: EntityId) -> &str {
        &self.entity(id).physical_table
    }

    fn wire_canonical_relationships(
        &mut self,
        defs: &[EntityDef],
        config: &MigrationConfig,
    ) -> Result<(), SchemaModelError> {
        for def in defs {
            let Some(foreign_id) = self.entity_by_name(&def.name) else {
                continue;
            };
            for fk in &def.foreign_keys {
                let parent_id = self.resolve_fk_target(&def.name, fk)?;
                if fk.columns.len() != fk.referenced_columns.len() {
                    return Err(SchemaModelError::ForeignKeyArity {
                        entity: def.name.clone(),
                        foreign_key: fk.name.clone(),
                    });
                }

                let directive =
                    config.edge_for_foreign_key(&def.name, &fk.columns);
                let direction = directive
                    .map(|d| d.direction.into())
                    .unwrap_or(Direction::Direct);
                let name = directive
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| default_relationship_name(fk));

                let rel_id = RelationshipId(self.relationships.len());
                self.relationships
                    .push(Relationship::Canonical(CanonicalRelationship {
                        name,
                        foreign_entity: foreign_id,
                        parent_entity: parent_id,
                        from_columns: fk.columns.clone(),
                        to_columns: fk.referenced_columns.clone(),
                        direction,
                    }));
                self.entities[foreign_id.0].out_relationships.push(rel_id);
                self.entities[parent_id.0].in_relationships.push(rel_id);
            }
        }
        Ok(())
    }

    fn resolve_fk_target(
        &self,
        entity: &str,
        fk: &ForeignKeyDef,
    ) -> Result<EntityId, SchemaModelError> {
        self.entity_by_name(&fk.referenced_table).ok_or_else(|| {
            SchemaModelError::UnknownReferencedTable {
                entity: entity.to_string(),
                foreign_key: fk.name.clone(),
                table: fk.referenced_table.clone(),
            }
        })
    }

    fn wire_logical_relationships(
        &mut self,
        config: &MigrationConfig,
    ) -> Result<(), SchemaModelError> {
        for directive in config.logical_edges() {
            let from_table = directive.from_table.as_deref().unwrap_or_default();
            let to_table = directive.to_table.as_deref().unwrap_or_default();
            let foreign_id = self.entity_by_name(from_table).ok_or_else(|| {
                SchemaModelError::UnknownConfiguredTable {
                    edge: directive.name.clone(),
                    table: from_table.to_string(),
                }
            })?;
            let parent_id = self.entity_by_name(to_table).ok_or_else(|| {
                SchemaModelError::UnknownConfiguredTable {
                    edge: directive.name.clone(),
                    table: to_table.to_string(),
                }
            })?;

            let rel_id = RelationshipId(self.relationships.len());
            self.relationships
                .push(Relationship::Logical(LogicalRelationship {
                    name: directive.name.clone(),
                    foreign_entity: foreign_id,
                    parent_entity: parent_id,
                    from_columns: directive.from_columns.clone(),
                    to_columns: directive.to_columns.clone(),
                    direction: directive.direction.into(),
                }));
            self.entities[foreign_id.0].out_relationships.push(rel_id);
            self.entities[parent_id.0].in_relationships.push(rel_id);
        }
        Ok(())
    }

    fn wire_hierarchies(&mut self, defs: &[EntityDef]) -> Result<(), SchemaModelError> {
        // Parent links first.
        for def in defs {
            if let Some(inheritance) = &def.inheritance {
                let Some(child) = self.entity_by_name(&def.name) else {
                    continue;
                };
                let parent = self.entity_by_name(&inheritance.parent).ok_or_else(|| {
                    SchemaModelError::UnknownParentTable {
                        entity: def.name.clone(),
                        parent: inheritance.parent.clone(),
                    }
                })?;
                self.entities[child.0].parent_entity = Some(parent);
            }
        }

        // Depth by walking the parent chain; a revisit means a cycle.
        for i in 0..self.entities.len() {
            let mut level = 0u32;
            let mut cursor = self.entities[i].parent_entity;
            while let Some(parent) = cursor {
                level += 1;
                if level as usize > self.entities.len() {
                    return Err(SchemaModelError::InheritanceCycle {
                        entity: self.entities[i].name.clone(),
                    });
                }
                cursor = self.entities[parent.0].parent_entity;
            }
            self.entities[i].inheritance_level = level;
        }

        // Group every entity that participates in inheritance under its
        // root, in catalog declaration order.
        let mut roots: Vec<EntityId> = Vec::new();
        for (i, def) in defs.iter().enumerate() {
            let id = EntityId(i);
            let is_member = def.inheritance.is_some()
                || defs.iter().any(|d| {
                    d.inheritance
                        .as_ref()
                        .is_some_and(|h| h.parent.eq_ignore_ascii_case(&def.name))
                });
            if is_member {
                let root = self.root_of(id);
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
        }

        for root in roots {
            self.build_bag(root, defs)?;
        }
        Ok(())
    }

    fn root_of(&self, mut id: EntityId) -> EntityId {
        while let Some(parent) = self.entities[id.0].parent_entity {
            id = parent;
        }
        id
    }

    fn build_bag(&mut self, root: EntityId, defs: &[EntityDef]) -> Result<(), SchemaModelError> {
        let bag_id = BagId(self.bags.len());
        let root_name = self.entities[root.0].name.clone();
        let root_def = &defs[root.0];

        let members: Vec<EntityId> = (0..self.entities.len())
            .map(EntityId)
            .filter(|&e| self.root_of(e) == root)
            .collect();

        // The pattern is declared on the subclasses; all of them must agree.
        let mut pattern: Option<InheritancePattern> = None;
        for &member in &members {
            if let Some(inh) = &defs[member.0].inheritance {
                match pattern {
                    None => pattern = Some(inh.pattern),
                    Some(p) if p == inh.pattern => {}
                    Some(p) => {
                        return Err(SchemaModelError::MixedInheritancePatterns {
                            root: root_name,
                            first: p,
                            second: inh.pattern,
                        })
                    }
                }
            }
        }
        let pattern = pattern.unwrap_or(InheritancePattern::PerType);

        if pattern == InheritancePattern::PerHierarchy && root_def.discriminator_column.is_none() {
            return Err(SchemaModelError::MissingDiscriminatorColumn { root: root_name });
        }

        // Every member keys on the same primary-key shape as the root
        // (possibly renamed).
        let root_pk_len = self.entities[root.0].primary_key.attributes.len();
        for &member in &members {
            let pk_len = self.entities[member.0].primary_key.attributes.len();
            if pk_len != root_pk_len {
                return Err(SchemaModelError::PrimaryKeyShapeMismatch {
                    entity: self.entities[member.0].name.clone(),
                    root: root_name,
                });
            }
        }

        let max_depth = members
            .iter()
            .map(|&m| self.entities[m.0].inheritance_level)
            .max()
            .unwrap_or(0);
        let mut depth_levels: Vec<Vec<EntityId>> = vec![Vec::new(); max_depth as usize + 1];
        for &member in &members {
            let depth = self.entities[member.0].inheritance_level as usize;
            depth_levels[depth].push(member);
            self.entities[member.0].bag = Some(bag_id);
            if pattern == InheritancePattern::PerHierarchy {
                self.entities[member.0].physical_table = root_def.name.clone();
            }
        }

        let mut discriminator_values = HashMap::new();
        for &member in &members {
            if let Some(value) = &defs[member.0].discriminator_value {
                discriminator_values
                    .insert(self.entities[member.0].name.clone(), value.clone());
            }
        }

        self.bags.push(HierarchicalBag {
            name: root_name,
            root,
            pattern,
            depth_levels,
            discriminator_column: root_def.discriminator_column.clone(),
            discriminator_values,
        });
        Ok(())
    }

    /// An entity is an aggregable join table when it has exactly two
    /// foreign keys whose combined columns cover its whole primary key,
    /// neither referenced entity is itself such a candidate, and it does
    /// not participate in an inheritance tree.
    fn detect_join_tables(&mut self) {
        let candidate = |e: &Entity| -> bool {
            if e.bag.is_some() || e.foreign_keys.len() != 2 {
                return false;
            }
            let mut fk_columns: Vec<&str> = e
                .foreign_keys
                .iter()
                .flat_map(|fk| fk.from_columns.iter().map(String::as_str))
                .collect();
            fk_columns.sort_unstable();
            fk_columns.dedup();
            let mut pk_columns: Vec<&str> =
                e.primary_key.attributes.iter().map(String::as_str).collect();
            pk_columns.sort_unstable();
            fk_columns == pk_columns
        };

        let shape_candidates: Vec<bool> = self.entities.iter().map(candidate).collect();
        for (i, &shaped) in shape_candidates.iter().enumerate() {
            self.entities[i].has_join_table_shape = shaped;
        }
        for i in 0..self.entities.len() {
            if !shape_candidates[i] {
                continue;
            }
            let targets_join_table = self.entities[i].foreign_keys.iter().any(|fk| {
                self.entity_by_name(&fk.referenced_entity)
                    .is_some_and(|t| shape_candidates[t.0])
            });
            if targets_join_table {
                debug!(
                    "`{}` looks like a join table but references one; imported as a vertex",
                    self.entities[i].name
                );
                continue;
            }
            self.entities[i].is_aggregable_join_table = true;
        }
    }
}

/// Default relationship naming: FK columns `AUTHOR` give `has_author`,
/// which the name resolver turns into the edge class `HasAuthor`.
fn default_relationship_name(fk: &ForeignKeyDef) -> String {
    let joined = fk
        .columns
        .iter()
        .map(|c| c.to_lowercase())
        .collect::<Vec<_>>()
        .join("_");
    format!("has_{joined}")
}
