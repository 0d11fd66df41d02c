//! Replays source rows through the graph model.
//!
//! One run is a fixed phase progression: hierarchical bags first (deepest
//! entities before their ancestors), then plain and split entities, then
//! the rows of aggregated join tables as edges. Hierarchies go first
//! because plain-entity foreign keys may target hierarchy vertices.
//!
//! Every vertex write is an upsert keyed on the type's external key, so
//! re-importing a row, or meeting a parent key before the parent row, can
//! never duplicate a vertex. The pipeline is synchronous and
//! single-threaded; cancellation is cooperative and checked between rows.

pub mod errors;

#[cfg(test)]
mod engine_tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;

use crate::context::MigrationContext;
use crate::datasource::{GraphStore, Row, SourceCatalog, SqlValue, VertexHandle};
use crate::graph_model::{EdgeKind, EdgeType, GraphModel, ModelProperty, VertexTypeId};
use crate::hierarchy_resolver::{HierarchyResolver, Resolution, ResolveError};
use crate::schema_model::{BagId, Entity, EntityId, HierarchicalBag, InheritancePattern, SchemaModel};

pub use errors::ImportError;

/// Phases of one migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Idle,
    ImportingHierarchies,
    ImportingPlainEntities,
    ImportingJoinEdges,
    Done,
    Failed,
}

pub struct ImportEngine<'a> {
    schema: &'a SchemaModel,
    graph: &'a mut GraphModel,
    ctx: &'a MigrationContext,
    catalog: &'a dyn SourceCatalog,
    store: &'a dyn GraphStore,
    phase: ImportPhase,
    cancel: Arc<AtomicBool>,
}

impl<'a> ImportEngine<'a> {
    pub fn new(
        schema: &'a SchemaModel,
        graph: &'a mut GraphModel,
        ctx: &'a MigrationContext,
        catalog: &'a dyn SourceCatalog,
        store: &'a dyn GraphStore,
    ) -> Self {
        ImportEngine {
            schema,
            graph,
            ctx,
            catalog,
            store,
            phase: ImportPhase::Idle,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase
    }

    /// Replaces the internal cancellation flag with one the caller owns.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag checked between rows; setting it halts the run at the next row
    /// boundary.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn run(&mut self) -> Result<(), ImportError> {
        match self.run_phases() {
            Ok(()) => {
                self.phase = ImportPhase::Done;
                info!("import finished");
                Ok(())
            }
            Err(e) => {
                self.phase = ImportPhase::Failed;
                log::error!("import failed: {e}");
                Err(e)
            }
        }
    }

    fn run_phases(&mut self) -> Result<(), ImportError> {
        self.phase = ImportPhase::ImportingHierarchies;
        info!("importing hierarchical entities");
        self.import_hierarchies()?;

        self.phase = ImportPhase::ImportingPlainEntities;
        info!("importing plain entities");
        self.import_plain_entities()?;

        self.phase = ImportPhase::ImportingJoinEdges;
        info!("importing join-table edges");
        self.import_join_edges()?;
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), ImportError> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(ImportError::Cancelled { phase: self.phase })
        } else {
            Ok(())
        }
    }

    // ---- phase 1: hierarchies ------------------------------------------

    fn import_hierarchies(&mut self) -> Result<(), ImportError> {
        let bag_ids: Vec<_> = self.schema.bags().map(|(id, _)| id).collect();
        for bag_id in bag_ids {
            let bag = self.schema.bag(bag_id);
            for entity_id in bag.entities_deepest_first() {
                self.import_hierarchical_entity(bag, entity_id)?;
            }
        }
        Ok(())
    }

    fn import_hierarchical_entity(
        &mut self,
        bag: &HierarchicalBag,
        entity_id: EntityId,
    ) -> Result<(), ImportError> {
        let entity = self.schema.entity(entity_id);
        let vertex_id = self.binding_or_err(entity_id)?;
        let vertex = self.graph.vertex(vertex_id).clone();
        if vertex.analyzed_in_last_migration {
            info!("`{}` already analyzed, skipping", vertex.name);
            return Ok(());
        }

        let mut cursor = match bag.pattern {
            InheritancePattern::PerHierarchy => {
                let Some(value) = bag.discriminator_value_of(&entity.name) else {
                    // No discriminator value means no selectable rows
                    // (abstract member of the tree).
                    debug!("`{}` has no discriminator value, nothing to import", entity.name);
                    self.mark_analyzed(&[vertex_id]);
                    return Ok(());
                };
                let column = bag.discriminator_column.as_deref().ok_or(
                    ResolveError::MissingDiscriminatorColumn {
                        bag: bag.name.clone(),
                    },
                )?;
                self.catalog.stream_rows_where(
                    &entity.physical_table,
                    column,
                    &Value::String(value.to_string()),
                )?
            }
            _ => self.catalog.stream_rows(&entity.physical_table)?,
        };

        // A hierarchy member's row carries inherited columns too (always
        // for the shared-table and concrete-table patterns), so coercion
        // runs over the full property chain, not just the own set.
        let properties = self.graph.property_chain(vertex_id);
        while let Some(row) = cursor.next_row()? {
            self.check_cancelled()?;
            self.ctx.statistics_mut().scanned_rows += 1;

            let key_values = key_values_for(entity, &row);
            let Some(handle) = self.upsert_row_vertex(&vertex, &properties, &key_values, &row)?
            else {
                continue;
            };
            self.connect_relationships(entity_id, &row, &[(vertex_id, handle)])?;
        }
        drop(cursor);

        self.mark_analyzed(&[vertex_id]);
        info!("finished hierarchy member `{}`", entity.name);
        Ok(())
    }

    // ---- phase 2: plain and split entities -----------------------------

    fn import_plain_entities(&mut self) -> Result<(), ImportError> {
        let plain: Vec<EntityId> = self
            .schema
            .entities()
            .filter(|(_, e)| e.bag.is_none() && !e.is_aggregable_join_table)
            .map(|(id, _)| id)
            .collect();

        for entity_id in plain {
            let bindings = self.graph.vertices_for_entity(entity_id).to_vec();
            if bindings.is_empty() {
                continue;
            }
            if bindings
                .iter()
                .all(|&v| self.graph.vertex(v).analyzed_in_last_migration)
            {
                info!(
                    "`{}` already analyzed, skipping",
                    self.schema.entity(entity_id).name
                );
                continue;
            }
            if bindings.len() == 1 {
                self.import_plain_entity(entity_id, bindings[0])?;
            } else {
                self.import_split_entity(entity_id, &bindings)?;
            }
            self.mark_analyzed(&bindings);
        }
        Ok(())
    }

    fn import_plain_entity(
        &mut self,
        entity_id: EntityId,
        vertex_id: VertexTypeId,
    ) -> Result<(), ImportError> {
        let entity = self.schema.entity(entity_id);
        let vertex = self.graph.vertex(vertex_id).clone();

        let mut cursor = self.catalog.stream_rows(&entity.physical_table)?;
        while let Some(row) = cursor.next_row()? {
            self.check_cancelled()?;
            self.ctx.statistics_mut().scanned_rows += 1;

            let key_values = key_values_for(entity, &row);
            let Some(handle) =
                self.upsert_row_vertex(&vertex, &vertex.properties, &key_values, &row)?
            else {
                continue;
            };
            self.connect_relationships(entity_id, &row, &[(vertex_id, handle)])?;
        }
        info!("finished entity `{}`", entity.name);
        Ok(())
    }

    /// One source row replicates into one vertex per partition plus the
    /// splitting edges between them.
    fn import_split_entity(
        &mut self,
        entity_id: EntityId,
        bindings: &[VertexTypeId],
    ) -> Result<(), ImportError> {
        let entity = self.schema.entity(entity_id);
        let vertices: Vec<_> = bindings
            .iter()
            .map(|&v| (v, self.graph.vertex(v).clone()))
            .collect();
        let splitting_edges: Vec<EdgeType> = self
            .graph
            .edges_for_entity(entity_id, EdgeKind::Splitting)
            .map(|(_, e)| e.clone())
            .collect();

        let mut cursor = self.catalog.stream_rows(&entity.physical_table)?;
        'rows: while let Some(row) = cursor.next_row()? {
            self.check_cancelled()?;
            self.ctx.statistics_mut().scanned_rows += 1;
            let key_values = key_values_for(entity, &row);

            // Coerce everything up front so a malformed row is skipped
            // before any write happens.
            let mut planned = Vec::with_capacity(vertices.len());
            for (vertex_id, vertex) in &vertices {
                match self.build_props(&vertex.name, &vertex.properties, &row)? {
                    Some(props) => planned.push((*vertex_id, vertex, props)),
                    None => {
                        self.ctx.statistics_mut().skipped_rows += 1;
                        continue 'rows;
                    }
                }
            }
            let mut edge_props = Vec::with_capacity(splitting_edges.len());
            for edge in &splitting_edges {
                match self.build_props(&edge.name, &edge.properties, &row)? {
                    Some(props) => edge_props.push(props),
                    None => {
                        self.ctx.statistics_mut().skipped_rows += 1;
                        continue 'rows;
                    }
                }
            }

            let mut handles = Vec::with_capacity(planned.len());
            for (vertex_id, vertex, props) in planned {
                let key_props = zip_props(&vertex.external_key, &key_values);
                let upsert = self.store.upsert_vertex(&vertex.name, &key_props, &props)?;
                let mut stats = self.ctx.statistics_mut();
                if upsert.created {
                    stats.created_vertices += 1;
                } else {
                    stats.existing_vertices += 1;
                    stats.duplicate_key_hits += 1;
                }
                drop(stats);
                handles.push((vertex_id, upsert.handle));
            }

            for (edge, props) in splitting_edges.iter().zip(edge_props) {
                let out = handle_for(&handles, edge.out_vertex);
                let target = handle_for(&handles, edge.in_vertex);
                if let (Some(out), Some(target)) = (out, target) {
                    if self.store.upsert_edge(&edge.name, out, target, &props)? {
                        self.ctx.statistics_mut().created_edges += 1;
                    }
                }
            }

            self.connect_relationships(entity_id, &row, &handles)?;
        }
        info!("finished split entity `{}`", entity.name);
        Ok(())
    }

    // ---- phase 3: join edges -------------------------------------------

    fn import_join_edges(&mut self) -> Result<(), ImportError> {
        let join_tables: Vec<EntityId> = self
            .schema
            .entities()
            .filter(|(_, e)| e.is_aggregable_join_table)
            .map(|(id, _)| id)
            .collect();

        for entity_id in join_tables {
            let entity = self.schema.entity(entity_id);
            let edge = self
                .graph
                .edges_for_entity(entity_id, EdgeKind::JoinTable)
                .map(|(_, e)| e.clone())
                .next()
                .ok_or_else(|| ImportError::UnmappedJoinTable {
                    entity: entity.name.clone(),
                })?;
            let inverse = self
                .ctx
                .config
                .edge_for_join_table(&entity.name)
                .is_some_and(|d| d.direction == crate::config::EdgeDirection::Inverse);

            let fk_out = &entity.foreign_keys[0];
            let fk_in = &entity.foreign_keys[1];
            let out_entity = self.schema.entity_by_name(&fk_out.referenced_entity);
            let in_entity = self.schema.entity_by_name(&fk_in.referenced_entity);
            let (Some(out_entity), Some(in_entity)) = (out_entity, in_entity) else {
                return Err(ImportError::UnmappedJoinTable {
                    entity: entity.name.clone(),
                });
            };

            let mut cursor = self.catalog.stream_rows(&entity.physical_table)?;
            while let Some(row) = cursor.next_row()? {
                self.check_cancelled()?;
                self.ctx.statistics_mut().scanned_rows += 1;

                let out_key = column_values(&fk_out.from_columns, &row);
                let in_key = column_values(&fk_in.from_columns, &row);
                if out_key.iter().any(Value::is_null) || in_key.iter().any(Value::is_null) {
                    warn!(
                        "join row of `{}` has a null foreign key, skipped",
                        entity.name
                    );
                    self.ctx.statistics_mut().skipped_rows += 1;
                    continue;
                }

                let Some(props) = self.build_props(&edge.name, &edge.properties, &row)? else {
                    self.ctx.statistics_mut().skipped_rows += 1;
                    continue;
                };

                let Some(out_handle) =
                    self.upsert_reference_target(out_entity, &fk_out.to_columns, &out_key)?
                else {
                    continue;
                };
                let Some(in_handle) =
                    self.upsert_reference_target(in_entity, &fk_in.to_columns, &in_key)?
                else {
                    continue;
                };

                let (out_handle, in_handle) = if inverse {
                    (in_handle, out_handle)
                } else {
                    (out_handle, in_handle)
                };
                if self
                    .store
                    .upsert_edge(&edge.name, out_handle, in_handle, &props)?
                {
                    self.ctx.statistics_mut().created_edges += 1;
                }
            }
            info!("finished join table `{}`", entity.name);
        }
        Ok(())
    }

    // ---- shared row machinery ------------------------------------------

    /// Upserts the vertex for one row, coercing over `properties` (the own
    /// set, or the full inheritance chain for hierarchy members). Returns
    /// `None` when the row was skipped over a recoverable coercion failure.
    fn upsert_row_vertex(
        &self,
        vertex: &crate::graph_model::VertexType,
        properties: &[ModelProperty],
        key_values: &[SqlValue],
        row: &Row,
    ) -> Result<Option<VertexHandle>, ImportError> {
        let Some(props) = self.build_props(&vertex.name, properties, row)? else {
            self.ctx.statistics_mut().skipped_rows += 1;
            return Ok(None);
        };
        let key_props = zip_props(&vertex.external_key, key_values);
        let upsert = self.store.upsert_vertex(&vertex.name, &key_props, &props)?;
        let mut stats = self.ctx.statistics_mut();
        if upsert.created {
            stats.created_vertices += 1;
        } else {
            stats.existing_vertices += 1;
        }
        Ok(Some(upsert.handle))
    }

    /// Coerces the row into the property set of one type. `Ok(None)` means
    /// a recoverable coercion failure (logged here, counted by the
    /// caller); a null in a mandatory/not-null property is fatal.
    fn build_props(
        &self,
        type_name: &str,
        properties: &[ModelProperty],
        row: &Row,
    ) -> Result<Option<Vec<(String, SqlValue)>>, ImportError> {
        let mut props = Vec::with_capacity(properties.len());
        for property in properties {
            let Some(raw) = row_value(row, &property.source_column) else {
                // The row does not carry the column at all: normal for an
                // inherited property whose value lives in another physical
                // table.
                continue;
            };
            let value = match property.property_type.coerce(raw) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        "skipping row of `{type_name}`: property `{}`: {e}",
                        property.name
                    );
                    self.ctx.statistics_mut().warnings += 1;
                    return Ok(None);
                }
            };
            if value.is_null() {
                if property.mandatory || property.not_null {
                    return Err(ImportError::NullMandatoryProperty {
                        vertex: type_name.to_string(),
                        property: property.name.clone(),
                    });
                }
                continue;
            }
            props.push((property.name.clone(), value));
        }
        Ok(Some(props))
    }

    /// Connects every outgoing relationship of `entity_id` for one row.
    /// `handles` are the vertices this row was upserted into (one entry,
    /// or one per partition for a split entity).
    fn connect_relationships(
        &self,
        entity_id: EntityId,
        row: &Row,
        handles: &[(VertexTypeId, VertexHandle)],
    ) -> Result<(), ImportError> {
        let entity = self.schema.entity(entity_id);
        for &rel_id in &entity.out_relationships {
            let Some(edge_id) = self.graph.edge_for_relationship(rel_id) else {
                continue;
            };
            let edge = self.graph.edge(edge_id);
            let rel = self.schema.relationship(rel_id);

            let key_values = column_values(rel.from_columns(), row);
            if key_values.iter().any(Value::is_null) {
                // Partially-null key: the relationship is not populated
                // for this row.
                continue;
            }

            let parent_id = rel.parent_entity();
            let parent = self.schema.entity(parent_id);
            // The parent link inside a hierarchy is not polymorphic; only
            // references into a bag from outside resolve to a concrete
            // type.
            let target = match parent.bag {
                Some(bag_id) if edge.kind != EdgeKind::HierarchyLink => {
                    match self.resolve_polymorphic_target(bag_id, &key_values)? {
                        Some(concrete) => concrete,
                        None => continue,
                    }
                }
                _ => parent_id,
            };

            let Some(in_handle) =
                self.upsert_reference_target(target, rel.to_columns(), &key_values)?
            else {
                continue;
            };

            let Some(out_handle) = handles
                .iter()
                .find(|(v, _)| self.graph.vertex(*v).claims_columns(rel.from_columns()))
                .or_else(|| handles.first())
                .map(|(_, h)| *h)
            else {
                continue;
            };

            // Relationship edges are oriented at build time; recover which
            // end the row side is.
            let row_side_is_out = self
                .graph
                .vertices_for_entity(entity_id)
                .contains(&edge.out_vertex);
            let (out, target_handle) = if row_side_is_out {
                (out_handle, in_handle)
            } else {
                (in_handle, out_handle)
            };
            if self.store.upsert_edge(&edge.name, out, target_handle, &[])? {
                self.ctx.statistics_mut().created_edges += 1;
            }
        }
        Ok(())
    }

    /// Resolves a foreign key into a hierarchical bag to the concrete
    /// entity of the referenced row. `None` means the edge is omitted
    /// (resolution miss) or the key is simply unpopulated.
    fn resolve_polymorphic_target(
        &self,
        bag_id: BagId,
        key_values: &[SqlValue],
    ) -> Result<Option<EntityId>, ImportError> {
        let bag = self.schema.bag(bag_id);
        let resolver = HierarchyResolver::new(self.schema, self.catalog);
        match resolver.resolve_concrete_entity(bag, key_values) {
            Ok(Resolution::Entity(concrete)) => Ok(Some(concrete)),
            Ok(Resolution::KeyNotPopulated) => Ok(None),
            Ok(Resolution::NotFound) => {
                warn!(
                    "no row of hierarchy `{}` carries the referenced key; edge omitted",
                    bag.name
                );
                let mut stats = self.ctx.statistics_mut();
                stats.unresolved_relationships += 1;
                stats.warnings += 1;
                Ok(None)
            }
            Err(e) if e.is_recoverable() => {
                warn!("resolution failed: {e}; edge omitted");
                let mut stats = self.ctx.statistics_mut();
                stats.unresolved_relationships += 1;
                stats.warnings += 1;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Upserts the referenced end of a relationship by its natural key,
    /// creating a placeholder if the referenced row has not been imported
    /// yet.
    fn upsert_reference_target(
        &self,
        target: EntityId,
        to_columns: &[String],
        key_values: &[SqlValue],
    ) -> Result<Option<VertexHandle>, ImportError> {
        let bindings = self.graph.vertices_for_entity(target);
        let vertex_id = match bindings {
            [] => return Ok(None),
            [single] => *single,
            several => several
                .iter()
                .copied()
                .find(|&v| self.graph.vertex(v).claims_columns(to_columns))
                .unwrap_or(several[0]),
        };
        let vertex = self.graph.vertex(vertex_id);
        let key_props = zip_props(&vertex.external_key, key_values);
        let upsert = self
            .store
            .upsert_vertex(&vertex.name, &key_props, &key_props)?;
        if upsert.created {
            self.ctx.statistics_mut().created_vertices += 1;
        }
        Ok(Some(upsert.handle))
    }

    fn binding_or_err(&self, entity_id: EntityId) -> Result<VertexTypeId, ImportError> {
        self.graph
            .vertices_for_entity(entity_id)
            .first()
            .copied()
            .ok_or_else(|| ImportError::UnmappedEntity {
                entity: self.schema.entity(entity_id).name.clone(),
            })
    }

    fn mark_analyzed(&mut self, vertex_ids: &[VertexTypeId]) {
        for &id in vertex_ids {
            self.graph.vertex_mut(id).analyzed_in_last_migration = true;
        }
    }
}

fn key_values_for(entity: &Entity, row: &Row) -> Vec<SqlValue> {
    column_values(&entity.primary_key.attributes, row)
}

fn column_values(columns: &[String], row: &Row) -> Vec<SqlValue> {
    columns
        .iter()
        .map(|c| row_value(row, c).cloned().unwrap_or(Value::Null))
        .collect()
}

fn row_value<'r>(row: &'r Row, column: &str) -> Option<&'r SqlValue> {
    row.get(column)
        .or_else(|| row.iter().find(|(k, _)| k.eq_ignore_ascii_case(column)).map(|(_, v)| v))
}

fn zip_props(names: &[String], values: &[SqlValue]) -> Vec<(String, SqlValue)> {
    names
        .iter()
        .cloned()
        .zip(values.iter().cloned())
        .collect()
}

fn handle_for(
    handles: &[(VertexTypeId, VertexHandle)],
    vertex: VertexTypeId,
) -> Option<VertexHandle> {
    handles.iter().find(|(v, _)| *v == vertex).map(|(_, h)| *h)
}
