//! Maps the relational schema model to the target graph model.
//!
//! One vertex type per entity, one edge type per relationship, with three
//! structural rewrites on top: join-table aggregation (the join entity
//! disappears into an edge type), entity splitting (one entity fans out
//! into several vertex types joined by splitting edges) and hierarchy
//! mirroring (inheritance trees become vertex-type hierarchies, with
//! parent-link edges only for the table-per-type pattern).
//!
//! Emission order is deterministic: entities and relationships are walked
//! in catalog declaration order, so repeated builds over an unchanged
//! schema produce identical models.

pub mod errors;
mod splitting;


use std::collections::HashMap;

use log::{debug, warn};

use crate::context::MigrationContext;
use crate::datasource::IdentifierKind;
use crate::graph_model::{
    EdgeKind, EdgeType, GraphModel, ModelProperty, PropertyType, VertexType, VertexTypeId,
};
use crate::schema_model::{
    Direction, Entity, EntityId, InheritancePattern, Relationship, SchemaModel,
};

pub use errors::ModelBuilderError;

pub struct GraphModelBuilder;

impl GraphModelBuilder {
    pub fn build(
        schema: &SchemaModel,
        ctx: &MigrationContext,
    ) -> Result<GraphModel, ModelBuilderError> {
        let mut state = BuildState {
            schema,
            ctx,
            model: GraphModel::default(),
            built: HashMap::new(),
        };

        state.build_vertices()?;
        state.build_relationship_edges()?;
        state.build_aggregation_edges()?;

        {
            let mut stats = ctx.statistics_mut();
            stats.detected_entities = schema.entity_count() as u64;
            stats.detected_relationships = schema.relationship_count() as u64;
            stats.built_vertex_types = state.model.vertex_count() as u64;
            stats.built_edge_types = state.model.edge_count() as u64;
        }
        log::info!(
            "graph model built: {} vertex types, {} edge types",
            state.model.vertex_count(),
            state.model.edge_count()
        );
        Ok(state.model)
    }
}

struct BuildState<'a> {
    schema: &'a SchemaModel,
    ctx: &'a MigrationContext,
    model: GraphModel,
    /// Entities whose vertex types have been emitted (or deliberately
    /// suppressed, for aggregated join tables).
    built: HashMap<EntityId, ()>,
}

impl BuildState<'_> {
    fn build_vertices(&mut self) -> Result<(), ModelBuilderError> {
        for (id, _) in self.schema.entities() {
            self.ensure_vertices(id)?;
        }
        Ok(())
    }

    /// Emits the vertex types of one entity, building its hierarchy parent
    /// first so `parent_type` ids exist.
    fn ensure_vertices(&mut self, id: EntityId) -> Result<(), ModelBuilderError> {
        if self.built.contains_key(&id) {
            return Ok(());
        }
        self.built.insert(id, ());

        let entity = self.schema.entity(id);
        if entity.is_aggregable_join_table {
            debug!("`{}` aggregates into an edge type; no vertex emitted", entity.name);
            return Ok(());
        }

        if let Some(parent) = entity.parent_entity {
            self.ensure_vertices(parent)?;
        }

        if self.ctx.config.is_split_table(&entity.name) {
            splitting::build_split_vertices(self, id)?;
        } else {
            self.build_plain_vertex(id)?;
        }
        Ok(())
    }

    fn build_plain_vertex(&mut self, id: EntityId) -> Result<(), ModelBuilderError> {
        let entity = self.schema.entity(id);
        let name = match self.ctx.config.vertex_rename(&entity.name) {
            Some(directive) => directive.name.clone(),
            None => self
                .ctx
                .name_resolver
                .resolve(&entity.name, IdentifierKind::VertexClass),
        };

        let parent_type = entity
            .parent_entity
            .map(|p| self.model.vertices_for_entity(p)[0]);

        // Subtypes extend the parent's property set through type
        // inheritance; only attributes the parent does not already carry
        // become own properties.
        let parent_entity = entity.parent_entity.map(|p| self.schema.entity(p));
        let inherited = |attr_name: &str| {
            parent_entity.is_some_and(|p| p.attribute(attr_name).is_some())
        };

        let mut properties = Vec::new();
        for attr in &entity.attributes {
            if inherited(&attr.name) {
                continue;
            }
            if let Some(property) = self.map_property(entity, &attr.name, properties.len())? {
                properties.push(property);
            }
        }

        let external_key = self.key_property_names(entity, &properties)?;
        self.model.add_vertex(VertexType {
            name,
            properties,
            external_key,
            parent_type,
            inheritance_level: entity.inheritance_level,
            is_from_join_table: entity.has_join_table_shape,
            analyzed_in_last_migration: false,
            source_entity: Some(id),
        });
        Ok(())
    }

    /// Builds the property for one attribute, honoring configured
    /// include/rename/mandatory/read-only/not-null flags. Primary-key
    /// attributes are always included: the external key depends on them.
    fn map_property(
        &self,
        entity: &Entity,
        column: &str,
        ordinal: usize,
    ) -> Result<Option<ModelProperty>, ModelBuilderError> {
        let attr = entity
            .attribute(column)
            .ok_or_else(|| ModelBuilderError::UnknownColumn {
                entity: entity.name.clone(),
                column: column.to_string(),
            })?;
        let directive = self.ctx.config.property_directive(&entity.name, column);
        let is_key = entity.is_key_attribute(column);

        if let Some(d) = directive {
            if !d.include && !is_key {
                return Ok(None);
            }
        }

        let name = directive
            .and_then(|d| d.rename.clone())
            .unwrap_or_else(|| {
                self.ctx
                    .name_resolver
                    .resolve(&attr.name, IdentifierKind::Property)
            });
        Ok(Some(ModelProperty {
            name,
            ordinal_position: ordinal,
            source_column: attr.name.clone(),
            source_type: attr.data_type.clone(),
            property_type: PropertyType::from_sql_type(&attr.data_type),
            is_from_primary_key: is_key,
            mandatory: directive.is_some_and(|d| d.mandatory),
            read_only: directive.is_some_and(|d| d.read_only),
            not_null: directive.is_some_and(|d| d.not_null),
        }))
    }

    /// Primary-key attributes translated to property names, preserving key
    /// order. For subtypes the key attributes may live on the parent type.
    fn key_property_names(
        &self,
        entity: &Entity,
        own_properties: &[ModelProperty],
    ) -> Result<Vec<String>, ModelBuilderError> {
        let mut names = Vec::with_capacity(entity.primary_key.attributes.len());
        for key_attr in &entity.primary_key.attributes {
            let from_own = own_properties
                .iter()
                .find(|p| p.source_column.eq_ignore_ascii_case(key_attr))
                .map(|p| p.name.clone());
            let name = match from_own {
                Some(n) => n,
                None => self.inherited_key_property(entity, key_attr)?,
            };
            names.push(name);
        }
        Ok(names)
    }

    fn inherited_key_property(
        &self,
        entity: &Entity,
        key_attr: &str,
    ) -> Result<String, ModelBuilderError> {
        let mut cursor = entity.parent_entity;
        while let Some(parent_id) = cursor {
            let parent = self.schema.entity(parent_id);
            if let Some(vertex_id) = self.model.vertices_for_entity(parent_id).first() {
                if let Some(p) = self.model.vertex(*vertex_id).property_for_column(key_attr) {
                    return Ok(p.name.clone());
                }
            }
            cursor = parent.parent_entity;
        }
        Err(ModelBuilderError::UnknownColumn {
            entity: entity.name.clone(),
            column: key_attr.to_string(),
        })
    }

    fn build_relationship_edges(&mut self) -> Result<(), ModelBuilderError> {
        for (rel_id, rel) in self.schema.relationships() {
            let foreign = self.schema.entity(rel.foreign_entity());
            let parent = self.schema.entity(rel.parent_entity());

            // Join tables are replayed as aggregation edges instead.
            if foreign.is_aggregable_join_table || parent.is_aggregable_join_table {
                continue;
            }

            let kind = match self.hierarchy_link_pattern(foreign, rel) {
                Some(InheritancePattern::PerType) => EdgeKind::HierarchyLink,
                Some(_) => {
                    // Table-per-hierarchy and table-per-concrete-type
                    // express the subtype link through type inheritance
                    // alone.
                    continue;
                }
                None => EdgeKind::Relationship,
            };

            let Some(out_vertex) =
                self.pick_binding(rel.foreign_entity(), rel.from_columns())
            else {
                continue;
            };
            let Some(in_vertex) = self.pick_binding(rel.parent_entity(), rel.to_columns())
            else {
                continue;
            };
            let (out_vertex, in_vertex) = match rel.direction() {
                Direction::Direct => (out_vertex, in_vertex),
                Direction::Inverse => (in_vertex, out_vertex),
            };

            self.model.add_edge(EdgeType {
                name: self.edge_class_name(rel),
                out_vertex,
                in_vertex,
                properties: Vec::new(),
                kind,
                source_relationship: Some(rel_id),
                source_entity: None,
            });
        }
        Ok(())
    }

    /// Whether `rel` is the parent link of `foreign` inside its hierarchy,
    /// and under which pattern.
    fn hierarchy_link_pattern(
        &self,
        foreign: &Entity,
        rel: &Relationship,
    ) -> Option<InheritancePattern> {
        let bag = foreign.bag?;
        if foreign.parent_entity != Some(rel.parent_entity()) {
            return None;
        }
        Some(self.schema.bag(bag).pattern)
    }

    fn edge_class_name(&self, rel: &Relationship) -> String {
        match rel {
            Relationship::Canonical(r) => {
                let foreign_name = &self.schema.entity(r.foreign_entity).name;
                match self
                    .ctx
                    .config
                    .edge_for_foreign_key(foreign_name, &r.from_columns)
                {
                    // Configured names are final.
                    Some(directive) => directive.name.clone(),
                    None => self
                        .ctx
                        .name_resolver
                        .resolve(&r.name, IdentifierKind::EdgeClass),
                }
            }
            Relationship::Logical(r) => r.name.clone(),
        }
    }

    fn build_aggregation_edges(&mut self) -> Result<(), ModelBuilderError> {
        for (id, entity) in self.schema.entities() {
            if !entity.is_aggregable_join_table {
                continue;
            }
            if !entity.in_relationships.is_empty() {
                // The aggregated table has no vertex; foreign keys pointing
                // at it have nothing to connect to.
                warn!(
                    "`{}` aggregates into an edge; {} foreign key(s) referencing it are dropped",
                    entity.name,
                    entity.in_relationships.len()
                );
                self.ctx.statistics_mut().warnings += entity.in_relationships.len() as u64;
            }
            let fk_out = &entity.foreign_keys[0];
            let fk_in = &entity.foreign_keys[1];

            let out_entity = self
                .schema
                .entity_by_name(&fk_out.referenced_entity)
                .ok_or_else(|| ModelBuilderError::MissingVertex {
                    entity: fk_out.referenced_entity.clone(),
                })?;
            let in_entity = self
                .schema
                .entity_by_name(&fk_in.referenced_entity)
                .ok_or_else(|| ModelBuilderError::MissingVertex {
                    entity: fk_in.referenced_entity.clone(),
                })?;

            let out_vertex = self
                .pick_binding(out_entity, &fk_out.to_columns)
                .ok_or_else(|| ModelBuilderError::MissingVertex {
                    entity: fk_out.referenced_entity.clone(),
                })?;
            let in_vertex = self
                .pick_binding(in_entity, &fk_in.to_columns)
                .ok_or_else(|| ModelBuilderError::MissingVertex {
                    entity: fk_in.referenced_entity.clone(),
                })?;

            let directive = self.ctx.config.edge_for_join_table(&entity.name);
            let (out_vertex, in_vertex) = match directive.map(|d| d.direction.into()) {
                Some(Direction::Inverse) => (in_vertex, out_vertex),
                _ => (out_vertex, in_vertex),
            };
            let name = directive.map(|d| d.name.clone()).unwrap_or_else(|| {
                self.ctx
                    .name_resolver
                    .resolve(&entity.name, IdentifierKind::EdgeClass)
            });

            // Non-key columns of the join table travel on the edge.
            let mut properties = Vec::new();
            for attr in &entity.attributes {
                if entity.is_key_attribute(&attr.name) {
                    continue;
                }
                if let Some(d) = self.ctx.config.edge_property_directive(&entity.name, &attr.name)
                {
                    if !d.include {
                        continue;
                    }
                }
                let rename = self
                    .ctx
                    .config
                    .edge_property_directive(&entity.name, &attr.name)
                    .and_then(|d| d.rename.clone());
                properties.push(ModelProperty {
                    name: rename.unwrap_or_else(|| {
                        self.ctx
                            .name_resolver
                            .resolve(&attr.name, IdentifierKind::Property)
                    }),
                    ordinal_position: properties.len(),
                    source_column: attr.name.clone(),
                    source_type: attr.data_type.clone(),
                    property_type: PropertyType::from_sql_type(&attr.data_type),
                    is_from_primary_key: false,
                    mandatory: false,
                    read_only: false,
                    not_null: false,
                });
            }

            self.model.add_edge(EdgeType {
                name,
                out_vertex,
                in_vertex,
                properties,
                kind: EdgeKind::JoinTable,
                source_relationship: None,
                source_entity: Some(id),
            });
        }
        Ok(())
    }

    /// The vertex type of `entity` that claims the given source columns.
    /// Relevant for split entities; everything else has a single binding.
    fn pick_binding(&self, entity: EntityId, columns: &[String]) -> Option<VertexTypeId> {
        let bindings = self.model.vertices_for_entity(entity);
        match bindings {
            [] => None,
            [single] => Some(*single),
            several => several
                .iter()
                .copied()
                .find(|&v| self.model.vertex(v).claims_columns(columns))
                .or(Some(several[0])),
        }
    }
}
