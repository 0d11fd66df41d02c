//! Entity splitting: one source table materializing as several vertex
//! types joined by splitting edges.
//!
//! Each configured partition claims a disjoint column subset and repeats
//! the table's primary key; columns no partition claims travel on the
//! splitting edges. The builder emits N vertex types and exactly N-1
//! splitting edges; any other count is fatal before a single row is read.

use log::debug;

use super::{BuildState, ModelBuilderError};
use crate::datasource::IdentifierKind;
use crate::graph_model::{EdgeKind, EdgeType, ModelProperty, PropertyType, VertexType};
use crate::schema_model::EntityId;

pub(super) fn build_split_vertices(
    state: &mut BuildState,
    id: EntityId,
) -> Result<(), ModelBuilderError> {
    let entity = state.schema.entity(id);
    let directives = state.ctx.config.vertex_directives_for_table(&entity.name);

    let mut partitions = Vec::new();
    for directive in &directives {
        let Some(columns) = &directive.columns else {
            return Err(ModelBuilderError::InvalidSplitting {
                entity: entity.name.clone(),
                reason: format!(
                    "partition `{}` declares no columns while the table is split",
                    directive.name
                ),
            });
        };
        partitions.push((directive.name.clone(), columns.clone()));
    }

    // Every partition repeats the key prefix; non-key columns may be
    // claimed by at most one partition.
    let mut claimed_non_key: Vec<String> = Vec::new();
    for (name, columns) in &partitions {
        for key_attr in &entity.primary_key.attributes {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(key_attr)) {
                return Err(ModelBuilderError::InvalidSplitting {
                    entity: entity.name.clone(),
                    reason: format!("partition `{name}` is missing key column `{key_attr}`"),
                });
            }
        }
        for column in columns {
            if entity.attribute(column).is_none() {
                return Err(ModelBuilderError::UnknownColumn {
                    entity: entity.name.clone(),
                    column: column.clone(),
                });
            }
            if entity.is_key_attribute(column) {
                continue;
            }
            if claimed_non_key.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                return Err(ModelBuilderError::InvalidSplitting {
                    entity: entity.name.clone(),
                    reason: format!("column `{column}` is claimed by two partitions"),
                });
            }
            claimed_non_key.push(column.clone());
        }
    }

    // Vertex types, in directive order.
    let mut vertex_ids = Vec::with_capacity(partitions.len());
    for (name, columns) in &partitions {
        let mut properties = Vec::new();
        for attr in &entity.attributes {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(&attr.name)) {
                continue;
            }
            if let Some(property) = state.map_property(entity, &attr.name, properties.len())? {
                properties.push(property);
            }
        }
        let external_key = state.key_property_names(entity, &properties)?;
        vertex_ids.push(state.model.add_vertex(VertexType {
            name: name.clone(),
            properties,
            external_key,
            parent_type: None,
            inheritance_level: 0,
            is_from_join_table: entity.has_join_table_shape,
            analyzed_in_last_migration: false,
            source_entity: Some(id),
        }));
    }

    // Columns no partition claims become splitting-edge properties.
    let mut edge_properties = Vec::new();
    for attr in &entity.attributes {
        if entity.is_key_attribute(&attr.name)
            || claimed_non_key.iter().any(|c| c.eq_ignore_ascii_case(&attr.name))
        {
            continue;
        }
        if let Some(d) = state.ctx.config.edge_property_directive(&entity.name, &attr.name) {
            if !d.include {
                continue;
            }
        }
        let rename = state
            .ctx
            .config
            .edge_property_directive(&entity.name, &attr.name)
            .and_then(|d| d.rename.clone());
        edge_properties.push(ModelProperty {
            name: rename.unwrap_or_else(|| {
                state
                    .ctx
                    .name_resolver
                    .resolve(&attr.name, IdentifierKind::Property)
            }),
            ordinal_position: edge_properties.len(),
            source_column: attr.name.clone(),
            source_type: attr.data_type.clone(),
            property_type: PropertyType::from_sql_type(&attr.data_type),
            is_from_primary_key: false,
            mandatory: false,
            read_only: false,
            not_null: false,
        });
    }

    // One splitting edge from the first partition to every other one.
    let explicit = state.ctx.config.splitting_edges_for_table(&entity.name);
    if !explicit.is_empty() && explicit.len() != vertex_ids.len() - 1 {
        return Err(ModelBuilderError::SplittingEdgeCountMismatch {
            entity: entity.name.clone(),
            vertices: vertex_ids.len(),
            edges: explicit.len(),
        });
    }
    for directive in &explicit {
        let target = directive.to_vertex.as_deref().unwrap_or_default();
        if !partitions.iter().skip(1).any(|(name, _)| name == target) {
            return Err(ModelBuilderError::InvalidDirective {
                name: directive.name.clone(),
                reason: format!("`{target}` is not a non-primary partition of `{}`", entity.name),
            });
        }
    }

    let mut edges_built = 0usize;
    for (i, &target) in vertex_ids.iter().enumerate().skip(1) {
        let target_name = state.model.vertex(target).name.clone();
        let name = explicit
            .iter()
            .find(|d| d.to_vertex.as_deref() == Some(target_name.as_str()))
            .map(|d| d.name.clone())
            .unwrap_or_else(|| {
                state
                    .ctx
                    .name_resolver
                    .resolve(&format!("has_{target_name}"), IdentifierKind::EdgeClass)
            });
        debug!(
            "splitting edge `{name}` for `{}` partition {}",
            entity.name, i
        );
        state.model.add_edge(EdgeType {
            name,
            out_vertex: vertex_ids[0],
            in_vertex: target,
            properties: edge_properties.clone(),
            kind: EdgeKind::Splitting,
            source_relationship: None,
            source_entity: Some(id),
        });
        edges_built += 1;
    }

    if edges_built != vertex_ids.len() - 1 {
        return Err(ModelBuilderError::SplittingEdgeCountMismatch {
            entity: entity.name.clone(),
            vertices: vertex_ids.len(),
            edges: edges_built,
        });
    }
    Ok(())
}
