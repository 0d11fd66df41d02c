use super::*;

#[test]
fn empty_document_is_valid() {
    let config = MigrationConfig::from_json_str("{}").unwrap();
    assert!(config.vertices.is_empty());
    assert!(config.edges.is_empty());
}

#[test]
fn parses_vertex_directives_with_property_flags() -> anyhow::Result<()> {
    let config = MigrationConfig::from_json_str(
        r#"{
            "vertices": [{
                "name": "Writer",
                "source_table": "AUTHOR",
                "properties": {
                    "NAME": {"rename": "fullName", "mandatory": true},
                    "SSN": {"include": false},
                    "BORN": {"not_null": true, "read_only": true}
                }
            }]
        }"#,
    )?;

    let directive = config.vertex_rename("author").unwrap();
    assert_eq!(directive.name, "Writer");

    let name = config.property_directive("AUTHOR", "name").unwrap();
    assert_eq!(name.rename.as_deref(), Some("fullName"));
    assert!(name.mandatory);
    assert!(name.include);

    let ssn = config.property_directive("AUTHOR", "SSN").unwrap();
    assert!(!ssn.include);

    let born = config.property_directive("AUTHOR", "BORN").unwrap();
    assert!(born.not_null);
    assert!(born.read_only);
    assert!(!born.mandatory);

    assert!(config.property_directive("AUTHOR", "OTHER").is_none());
    assert!(config.property_directive("BOOK", "NAME").is_none());
    Ok(())
}

#[test]
fn empty_names_fail_validation() {
    let err = MigrationConfig::from_json_str(
        r#"{"vertices": [{"name": "", "source_table": "AUTHOR"}]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));

    let err = MigrationConfig::from_json_str(r#"{"vertices": [{"name": "Writer"}]}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn edge_shape_selects_meaning() -> anyhow::Result<()> {
    let config = MigrationConfig::from_json_str(
        r#"{"edges": [
            {"name": "WrittenBy", "source_table": "BOOK",
             "from_columns": ["AUTHOR_ID"], "to_columns": ["ID"], "direction": "inverse"},
            {"name": "Performs", "source_table": "ACTOR_FILM"},
            {"name": "HasAddress", "source_table": "PERSON", "to_vertex": "Address"},
            {"name": "Knows", "from_table": "PERSON", "to_table": "PERSON",
             "from_columns": ["FRIEND_ID"], "to_columns": ["ID"]}
        ]}"#,
    )?;

    let fk_override = config
        .edge_for_foreign_key("book", &["author_id".to_string()])
        .unwrap();
    assert_eq!(fk_override.name, "WrittenBy");
    assert_eq!(fk_override.direction, EdgeDirection::Inverse);
    assert!(config
        .edge_for_foreign_key("BOOK", &["EDITOR_ID".to_string()])
        .is_none());

    assert_eq!(config.edge_for_join_table("actor_film").unwrap().name, "Performs");
    assert!(config.edge_for_join_table("BOOK").is_none());

    let splitting = config.splitting_edges_for_table("PERSON");
    assert_eq!(splitting.len(), 1);
    assert_eq!(splitting[0].to_vertex.as_deref(), Some("Address"));

    let logical: Vec<_> = config.logical_edges().collect();
    assert_eq!(logical.len(), 1);
    assert_eq!(logical[0].name, "Knows");
    Ok(())
}

#[test]
fn logical_edges_need_both_tables_and_matching_columns() {
    let err = MigrationConfig::from_json_str(
        r#"{"edges": [{"name": "Knows", "from_table": "PERSON",
            "from_columns": ["FRIEND_ID"], "to_columns": ["ID"]}]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Inconsistent { .. }));

    let err = MigrationConfig::from_json_str(
        r#"{"edges": [{"name": "Knows", "from_table": "PERSON", "to_table": "PERSON",
            "from_columns": ["FRIEND_ID"], "to_columns": []}]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Inconsistent { .. }));
}

#[test]
fn an_edge_needs_a_source() {
    let err = MigrationConfig::from_json_str(r#"{"edges": [{"name": "Loose"}]}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Inconsistent { .. }));
}

#[test]
fn splitting_needs_at_least_two_partitions() {
    let err = MigrationConfig::from_json_str(
        r#"{"vertices": [{"name": "Person", "source_table": "PERSON", "columns": ["ID"]}]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Inconsistent { .. }));

    let config = MigrationConfig::from_json_str(
        r#"{"vertices": [
            {"name": "Person", "source_table": "PERSON", "columns": ["ID", "NAME"]},
            {"name": "Address", "source_table": "PERSON", "columns": ["ID", "STREET"]}
        ]}"#,
    )
    .unwrap();
    assert!(config.is_split_table("person"));
    assert!(config.vertex_rename("PERSON").is_none());
    assert_eq!(config.vertex_directives_for_table("PERSON").len(), 2);
}
