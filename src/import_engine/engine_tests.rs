use serde_json::json;

use super::*;
use crate::config::MigrationConfig;
use crate::datasource::graph_store::MockGraphStore;
use crate::datasource::testing::{row, InMemoryCatalog, InMemoryGraphStore};
use crate::datasource::{
    ColumnDef, EntityDef, ForeignKeyDef, InheritanceDef, StoreError, VertexUpsert,
};
use crate::model_builder::GraphModelBuilder;

fn col(name: &str, data_type: &str) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        data_type: data_type.to_string(),
    }
}

fn table(name: &str, columns: &[(&str, &str)], primary_key: &[&str]) -> EntityDef {
    EntityDef {
        name: name.to_string(),
        columns: columns.iter().map(|(n, t)| col(n, t)).collect(),
        primary_key: primary_key.iter().map(|k| k.to_string()).collect(),
        foreign_keys: vec![],
        inheritance: None,
        discriminator_column: None,
        discriminator_value: None,
    }
}

fn fk(name: &str, columns: &[&str], to_table: &str, to_columns: &[&str]) -> ForeignKeyDef {
    ForeignKeyDef {
        name: name.to_string(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
        referenced_table: to_table.to_string(),
        referenced_columns: to_columns.iter().map(|c| c.to_string()).collect(),
    }
}

struct Fixture {
    schema: SchemaModel,
    ctx: MigrationContext,
    graph: GraphModel,
}

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fixture(defs: Vec<EntityDef>, config: MigrationConfig) -> Fixture {
    init_logs();
    let schema = SchemaModel::from_defs(defs, &config).unwrap();
    let ctx = MigrationContext::with_config(config);
    let graph = GraphModelBuilder::build(&schema, &ctx).unwrap();
    Fixture { schema, ctx, graph }
}

fn run(fixture: &mut Fixture, catalog: &InMemoryCatalog, store: &dyn GraphStore) -> ImportPhase {
    let mut engine = ImportEngine::new(
        &fixture.schema,
        &mut fixture.graph,
        &fixture.ctx,
        catalog,
        store,
    );
    engine.run().unwrap();
    engine.phase()
}

fn library_defs() -> Vec<EntityDef> {
    let author = table("AUTHOR", &[("ID", "INTEGER"), ("NAME", "VARCHAR")], &["ID"]);
    let mut book = table(
        "BOOK",
        &[("ID", "INTEGER"), ("TITLE", "VARCHAR"), ("AUTHOR_ID", "INTEGER")],
        &["ID"],
    );
    book.foreign_keys = vec![fk("FK_BOOK_AUTHOR", &["AUTHOR_ID"], "AUTHOR", &["ID"])];
    vec![author, book]
}

fn library_catalog(defs: Vec<EntityDef>) -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new(defs);
    catalog.insert_rows(
        "AUTHOR",
        vec![row(&[("ID", json!(1)), ("NAME", json!("Calvino"))])],
    );
    catalog.insert_rows(
        "BOOK",
        vec![
            row(&[
                ("ID", json!(10)),
                ("TITLE", json!("Invisible Cities")),
                ("AUTHOR_ID", json!(1)),
            ]),
            row(&[
                ("ID", json!(11)),
                ("TITLE", json!("Marcovaldo")),
                ("AUTHOR_ID", json!(1)),
            ]),
        ],
    );
    catalog
}

#[test]
fn imports_rows_and_connects_foreign_keys() {
    let mut f = fixture(library_defs(), MigrationConfig::default());
    let catalog = library_catalog(library_defs());
    let store = InMemoryGraphStore::new();

    let phase = run(&mut f, &catalog, &store);
    assert_eq!(phase, ImportPhase::Done);

    assert_eq!(store.count_vertices("Author"), 1);
    assert_eq!(store.count_vertices("Book"), 2);
    assert_eq!(store.count_edges("HasAuthorId"), 2);

    let author = store
        .find_vertex("Author", &[("id".to_string(), json!(1))])
        .unwrap();
    assert_eq!(author.props.get("name"), Some(&json!("Calvino")));

    let stats = f.ctx.statistics();
    assert_eq!(stats.scanned_rows, 3);
    assert_eq!(stats.created_vertices, 3);
    assert_eq!(stats.created_edges, 2);
    assert_eq!(stats.skipped_rows, 0);
}

#[test]
fn rerun_against_the_same_store_is_idempotent() {
    let store = InMemoryGraphStore::new();
    let catalog = library_catalog(library_defs());

    let mut first = fixture(library_defs(), MigrationConfig::default());
    run(&mut first, &catalog, &store);

    let mut second = fixture(library_defs(), MigrationConfig::default());
    run(&mut second, &catalog, &store);

    assert_eq!(store.vertex_count(), 3);
    assert_eq!(store.edge_count(), 2);
    let stats = second.ctx.statistics();
    assert_eq!(stats.created_vertices, 0);
    assert_eq!(stats.existing_vertices, 3);
    assert_eq!(stats.created_edges, 0);
}

#[test]
fn forward_references_create_placeholders_filled_later() {
    // Books are imported before their author exists in the store.
    let defs = {
        let mut defs = library_defs();
        defs.reverse();
        defs
    };
    let mut f = fixture(defs.clone(), MigrationConfig::default());
    let catalog = library_catalog(defs);
    let store = InMemoryGraphStore::new();

    run(&mut f, &catalog, &store);

    assert_eq!(store.count_vertices("Author"), 1);
    let author = store
        .find_vertex("Author", &[("id".to_string(), json!(1))])
        .unwrap();
    // The placeholder held only the key; the author row filled the rest.
    assert_eq!(author.props.get("name"), Some(&json!("Calvino")));

    let stats = f.ctx.statistics();
    assert_eq!(stats.created_vertices, 3);
    assert_eq!(stats.existing_vertices, 1);
    assert_eq!(store.count_edges("HasAuthorId"), 2);
}

#[test]
fn rerun_over_an_analyzed_graph_skips_entities() {
    let mut f = fixture(library_defs(), MigrationConfig::default());
    let catalog = library_catalog(library_defs());
    let store = InMemoryGraphStore::new();

    run(&mut f, &catalog, &store);
    let scanned_once = f.ctx.statistics().scanned_rows;

    // Same graph model, same context: every vertex type is marked.
    run(&mut f, &catalog, &store);
    assert_eq!(f.ctx.statistics().scanned_rows, scanned_once);
    assert_eq!(store.vertex_count(), 3);
}

fn employee_defs() -> Vec<EntityDef> {
    let employee = table(
        "EMPLOYEE",
        &[("EID", "INTEGER"), ("NAME", "VARCHAR")],
        &["EID"],
    );
    let mut regular = table(
        "REGULAR_EMPLOYEE",
        &[("EID", "INTEGER"), ("BONUS", "DECIMAL")],
        &["EID"],
    );
    regular.foreign_keys = vec![fk("FK_RE_E", &["EID"], "EMPLOYEE", &["EID"])];
    regular.inheritance = Some(InheritanceDef {
        parent: "EMPLOYEE".into(),
        pattern: InheritancePattern::PerType,
    });
    let mut contract = table(
        "CONTRACT_EMPLOYEE",
        &[("EID", "INTEGER"), ("RATE", "DECIMAL")],
        &["EID"],
    );
    contract.foreign_keys = vec![fk("FK_CE_E", &["EID"], "EMPLOYEE", &["EID"])];
    contract.inheritance = Some(InheritanceDef {
        parent: "EMPLOYEE".into(),
        pattern: InheritancePattern::PerType,
    });
    vec![employee, regular, contract]
}

#[test]
fn per_type_hierarchy_imports_deepest_first_and_links_parents() {
    let mut f = fixture(employee_defs(), MigrationConfig::default());
    let mut catalog = InMemoryCatalog::new(employee_defs());
    catalog.insert_rows(
        "EMPLOYEE",
        vec![
            row(&[("EID", json!(1)), ("NAME", json!("Ada"))]),
            row(&[("EID", json!(2)), ("NAME", json!("Bo"))]),
        ],
    );
    catalog.insert_rows(
        "REGULAR_EMPLOYEE",
        vec![row(&[("EID", json!(1)), ("BONUS", json!(100))])],
    );
    catalog.insert_rows(
        "CONTRACT_EMPLOYEE",
        vec![row(&[("EID", json!(2)), ("RATE", json!(80))])],
    );
    let store = InMemoryGraphStore::new();

    run(&mut f, &catalog, &store);

    assert_eq!(store.count_vertices("RegularEmployee"), 1);
    assert_eq!(store.count_vertices("ContractEmployee"), 1);
    assert_eq!(store.count_vertices("Employee"), 2);
    assert_eq!(store.count_edges("HasEid"), 2);

    let stats = f.ctx.statistics();
    assert_eq!(stats.scanned_rows, 4);
    // Two subclass rows, two parent placeholders.
    assert_eq!(stats.created_vertices, 4);
    // The root rows landed on the placeholders.
    assert_eq!(stats.existing_vertices, 2);
}

#[test]
fn hierarchy_imports_issue_one_store_write_per_row() {
    let mut f = fixture(employee_defs(), MigrationConfig::default());
    let mut catalog = InMemoryCatalog::new(employee_defs());
    catalog.insert_rows(
        "EMPLOYEE",
        vec![
            row(&[("EID", json!(1)), ("NAME", json!("Ada"))]),
            row(&[("EID", json!(2)), ("NAME", json!("Bo"))]),
        ],
    );
    catalog.insert_rows(
        "REGULAR_EMPLOYEE",
        vec![row(&[("EID", json!(1)), ("BONUS", json!(100))])],
    );
    catalog.insert_rows(
        "CONTRACT_EMPLOYEE",
        vec![row(&[("EID", json!(2)), ("RATE", json!(80))])],
    );

    // Four rows plus two parent-link placeholders: six vertex upserts and
    // nothing else touches the store besides the two link edges.
    let next = std::sync::atomic::AtomicU64::new(0);
    let mut store = MockGraphStore::new();
    store.expect_upsert_vertex().times(6).returning(move |_, _, _| {
        Ok(VertexUpsert {
            handle: VertexHandle(next.fetch_add(1, Ordering::Relaxed)),
            created: true,
        })
    });
    store.expect_upsert_edge().times(2).returning(|_, _, _, _| Ok(true));

    let phase = run(&mut f, &catalog, &store);
    assert_eq!(phase, ImportPhase::Done);
}

fn person_hierarchy_defs() -> Vec<EntityDef> {
    let mut person = table(
        "PERSON",
        &[("ID", "INTEGER"), ("NAME", "VARCHAR"), ("KIND", "VARCHAR")],
        &["ID"],
    );
    person.discriminator_column = Some("KIND".into());
    let mut student = table("STUDENT", &[("ID", "INTEGER")], &["ID"]);
    student.inheritance = Some(InheritanceDef {
        parent: "PERSON".into(),
        pattern: InheritancePattern::PerHierarchy,
    });
    student.discriminator_value = Some("S".into());
    let mut teacher = table("TEACHER", &[("ID", "INTEGER")], &["ID"]);
    teacher.inheritance = Some(InheritanceDef {
        parent: "PERSON".into(),
        pattern: InheritancePattern::PerHierarchy,
    });
    teacher.discriminator_value = Some("T".into());
    vec![person, student, teacher]
}

#[test]
fn per_hierarchy_rows_are_selected_by_discriminator() {
    let mut f = fixture(person_hierarchy_defs(), MigrationConfig::default());
    let mut catalog = InMemoryCatalog::new(person_hierarchy_defs());
    catalog.insert_rows(
        "PERSON",
        vec![
            row(&[("ID", json!(1)), ("NAME", json!("Nia")), ("KIND", json!("S"))]),
            row(&[("ID", json!(2)), ("NAME", json!("Omar")), ("KIND", json!("T"))]),
            row(&[("ID", json!(3)), ("NAME", json!("Pat")), ("KIND", json!("X"))]),
        ],
    );
    let store = InMemoryGraphStore::new();

    run(&mut f, &catalog, &store);

    assert_eq!(store.count_vertices("Student"), 1);
    assert_eq!(store.count_vertices("Teacher"), 1);
    // No member claims `X`, and the abstract root selects nothing.
    assert_eq!(store.count_vertices("Person"), 0);
    assert_eq!(f.ctx.statistics().scanned_rows, 2);
}

#[test]
fn shared_table_rows_keep_inherited_property_values() {
    let mut f = fixture(person_hierarchy_defs(), MigrationConfig::default());
    let mut catalog = InMemoryCatalog::new(person_hierarchy_defs());
    catalog.insert_rows(
        "PERSON",
        vec![
            row(&[("ID", json!(1)), ("NAME", json!("Nia")), ("KIND", json!("S"))]),
            row(&[("ID", json!(2)), ("NAME", json!("Omar")), ("KIND", json!("T"))]),
        ],
    );
    let store = InMemoryGraphStore::new();

    run(&mut f, &catalog, &store);

    // The subtypes declare no columns of their own; the shared table's
    // values land on them through the inherited properties.
    let student = store
        .find_vertex("Student", &[("id".to_string(), json!(1))])
        .unwrap();
    assert_eq!(student.props.get("name"), Some(&json!("Nia")));
    let teacher = store
        .find_vertex("Teacher", &[("id".to_string(), json!(2))])
        .unwrap();
    assert_eq!(teacher.props.get("name"), Some(&json!("Omar")));
}

#[test]
fn concrete_table_rows_keep_parent_named_columns() {
    // Table-per-concrete-type: the subclass table repeats the parent's
    // columns and every row is complete.
    let employee = table(
        "EMPLOYEE",
        &[("EID", "INTEGER"), ("NAME", "VARCHAR")],
        &["EID"],
    );
    let mut contractor = table(
        "CONTRACTOR",
        &[("EID", "INTEGER"), ("NAME", "VARCHAR"), ("RATE", "DECIMAL")],
        &["EID"],
    );
    contractor.inheritance = Some(InheritanceDef {
        parent: "EMPLOYEE".into(),
        pattern: InheritancePattern::PerConcreteType,
    });
    let defs = vec![employee, contractor];

    let mut f = fixture(defs.clone(), MigrationConfig::default());
    let mut catalog = InMemoryCatalog::new(defs);
    catalog.insert_rows("EMPLOYEE", vec![row(&[("EID", json!(1)), ("NAME", json!("Ada"))])]);
    catalog.insert_rows(
        "CONTRACTOR",
        vec![row(&[("EID", json!(2)), ("NAME", json!("Bo")), ("RATE", json!(90))])],
    );
    let store = InMemoryGraphStore::new();

    run(&mut f, &catalog, &store);

    let contractor = store
        .find_vertex("Contractor", &[("eid".to_string(), json!(2))])
        .unwrap();
    assert_eq!(contractor.props.get("name"), Some(&json!("Bo")));
    assert_eq!(contractor.props.get("rate"), Some(&json!(90)));
}

#[test]
fn external_references_resolve_to_the_concrete_type() {
    let mut defs = person_hierarchy_defs();
    let mut review = table(
        "REVIEW",
        &[("ID", "INTEGER"), ("PERSON_ID", "INTEGER"), ("STARS", "INTEGER")],
        &["ID"],
    );
    review.foreign_keys = vec![fk("FK_REVIEW_PERSON", &["PERSON_ID"], "PERSON", &["ID"])];
    defs.push(review);

    let mut f = fixture(defs.clone(), MigrationConfig::default());
    let mut catalog = InMemoryCatalog::new(defs);
    catalog.insert_rows(
        "PERSON",
        vec![
            row(&[("ID", json!(1)), ("NAME", json!("Nia")), ("KIND", json!("S"))]),
            row(&[("ID", json!(2)), ("NAME", json!("Pat")), ("KIND", json!("X"))]),
        ],
    );
    catalog.insert_rows(
        "REVIEW",
        vec![
            row(&[("ID", json!(100)), ("PERSON_ID", json!(1)), ("STARS", json!(5))]),
            row(&[("ID", json!(101)), ("PERSON_ID", json!(2)), ("STARS", json!(3))]),
        ],
    );
    let store = InMemoryGraphStore::new();

    run(&mut f, &catalog, &store);

    // Both reviews import; only the resolvable reference becomes an edge.
    assert_eq!(store.count_vertices("Review"), 2);
    assert_eq!(store.count_edges("HasPersonId"), 1);
    let edges = store.edges_of("HasPersonId");
    assert_eq!(store.vertex_at(edges[0].r#in).class, "Student");

    let stats = f.ctx.statistics();
    assert_eq!(stats.unresolved_relationships, 1);
    assert!(stats.warnings >= 1);
}

#[test]
fn split_rows_fan_out_with_splitting_edges() {
    let config = MigrationConfig::from_json_str(
        r#"{"vertices": [
            {"name": "Person", "source_table": "PERSON", "columns": ["ID", "NAME"]},
            {"name": "Address", "source_table": "PERSON", "columns": ["ID", "STREET"]}
        ]}"#,
    )
    .unwrap();
    let defs = vec![table(
        "PERSON",
        &[
            ("ID", "INTEGER"),
            ("NAME", "VARCHAR"),
            ("STREET", "VARCHAR"),
            ("NOTES", "VARCHAR"),
        ],
        &["ID"],
    )];
    let mut f = fixture(defs.clone(), config);
    let mut catalog = InMemoryCatalog::new(defs);
    catalog.insert_rows(
        "PERSON",
        vec![
            row(&[
                ("ID", json!(1)),
                ("NAME", json!("Nia")),
                ("STREET", json!("Elm St 4")),
                ("NOTES", json!("moved twice")),
            ]),
            row(&[
                ("ID", json!(2)),
                ("NAME", json!("Omar")),
                ("STREET", json!("Oak Ave 9")),
                ("NOTES", json!("none")),
            ]),
            // Same natural key again: the partitions collapse onto the
            // vertices already created.
            row(&[
                ("ID", json!(1)),
                ("NAME", json!("Nia")),
                ("STREET", json!("Elm St 4")),
                ("NOTES", json!("moved twice")),
            ]),
        ],
    );
    let store = InMemoryGraphStore::new();

    run(&mut f, &catalog, &store);

    assert_eq!(store.count_vertices("Person"), 2);
    assert_eq!(store.count_vertices("Address"), 2);
    assert_eq!(store.count_edges("HasAddress"), 2);
    let edges = store.edges_of("HasAddress");
    assert_eq!(edges[0].props.get("notes"), Some(&json!("moved twice")));

    let stats = f.ctx.statistics();
    assert_eq!(stats.scanned_rows, 3);
    assert_eq!(stats.created_vertices, 4);
    assert_eq!(stats.created_edges, 2);
    assert_eq!(stats.duplicate_key_hits, 2);
}

fn film_defs() -> Vec<EntityDef> {
    let actor = table("ACTOR", &[("ID", "INTEGER"), ("NAME", "VARCHAR")], &["ID"]);
    let film = table("FILM", &[("ID", "INTEGER"), ("TITLE", "VARCHAR")], &["ID"]);
    let mut actor_film = table(
        "ACTOR_FILM",
        &[
            ("ACTOR_ID", "INTEGER"),
            ("FILM_ID", "INTEGER"),
            ("PAYMENT", "DECIMAL(10,2)"),
        ],
        &["ACTOR_ID", "FILM_ID"],
    );
    actor_film.foreign_keys = vec![
        fk("FK_AF_ACTOR", &["ACTOR_ID"], "ACTOR", &["ID"]),
        fk("FK_AF_FILM", &["FILM_ID"], "FILM", &["ID"]),
    ];
    vec![actor, film, actor_film]
}

#[test]
fn join_rows_replay_as_edges() {
    let config = MigrationConfig::from_json_str(
        r#"{"edges": [{"name": "Performs", "source_table": "ACTOR_FILM"}]}"#,
    )
    .unwrap();
    let mut f = fixture(film_defs(), config);
    let mut catalog = InMemoryCatalog::new(film_defs());
    for id in 1..=3 {
        catalog.insert_rows(
            "ACTOR",
            vec![row(&[("ID", json!(id)), ("NAME", json!(format!("actor {id}")))])],
        );
        catalog.insert_rows(
            "FILM",
            vec![row(&[("ID", json!(id)), ("TITLE", json!(format!("film {id}")))])],
        );
    }
    let mut join_rows = Vec::new();
    for actor in 1..=3 {
        for film in 1..=3 {
            join_rows.push(row(&[
                ("ACTOR_ID", json!(actor)),
                ("FILM_ID", json!(film)),
                ("PAYMENT", json!(1000 + actor * film)),
            ]));
        }
    }
    // A row with a null foreign key cannot become an edge.
    join_rows.push(row(&[
        ("ACTOR_ID", json!(1)),
        ("FILM_ID", serde_json::Value::Null),
        ("PAYMENT", json!(0)),
    ]));
    catalog.insert_rows("ACTOR_FILM", join_rows);
    let store = InMemoryGraphStore::new();

    run(&mut f, &catalog, &store);

    assert_eq!(store.count_vertices("Actor"), 3);
    assert_eq!(store.count_vertices("Film"), 3);
    assert_eq!(store.count_vertices("ActorFilm"), 0);
    assert_eq!(store.count_edges("Performs"), 9);
    let edges = store.edges_of("Performs");
    assert!(edges.iter().all(|e| e.props.contains_key("payment")));

    let stats = f.ctx.statistics();
    assert_eq!(stats.scanned_rows, 16);
    assert_eq!(stats.skipped_rows, 1);
    assert_eq!(stats.created_edges, 9);
}

#[test]
fn malformed_rows_are_skipped_and_counted() {
    let mut f = fixture(library_defs(), MigrationConfig::default());
    let mut catalog = InMemoryCatalog::new(library_defs());
    catalog.insert_rows(
        "AUTHOR",
        vec![row(&[("ID", json!(1)), ("NAME", json!("Calvino"))])],
    );
    catalog.insert_rows(
        "BOOK",
        vec![
            row(&[
                ("ID", json!("not a number")),
                ("TITLE", json!("Broken")),
                ("AUTHOR_ID", json!(1)),
            ]),
            row(&[
                ("ID", json!(11)),
                ("TITLE", json!("Marcovaldo")),
                ("AUTHOR_ID", json!(1)),
            ]),
        ],
    );
    let store = InMemoryGraphStore::new();

    run(&mut f, &catalog, &store);

    assert_eq!(store.count_vertices("Book"), 1);
    let stats = f.ctx.statistics();
    assert_eq!(stats.skipped_rows, 1);
    assert!(stats.warnings >= 1);
}

#[test]
fn null_mandatory_property_aborts_the_run() {
    let config = MigrationConfig::from_json_str(
        r#"{"vertices": [{"name": "Book", "source_table": "BOOK",
            "properties": {"TITLE": {"mandatory": true}}}]}"#,
    )
    .unwrap();
    let mut f = fixture(library_defs(), config);
    let mut catalog = InMemoryCatalog::new(library_defs());
    catalog.insert_rows(
        "BOOK",
        vec![row(&[
            ("ID", json!(10)),
            ("TITLE", serde_json::Value::Null),
            ("AUTHOR_ID", json!(1)),
        ])],
    );
    let store = InMemoryGraphStore::new();

    let mut engine = ImportEngine::new(&f.schema, &mut f.graph, &f.ctx, &catalog, &store);
    let err = engine.run().unwrap_err();
    assert!(matches!(err, ImportError::NullMandatoryProperty { .. }));
    assert_eq!(engine.phase(), ImportPhase::Failed);
}

#[test]
fn store_failures_abort_the_run() {
    let mut f = fixture(library_defs(), MigrationConfig::default());
    let catalog = library_catalog(library_defs());

    let mut store = MockGraphStore::new();
    store.expect_upsert_vertex().returning(|_, _, _| {
        Err(StoreError::Backend {
            message: "connection reset".into(),
        })
    });

    let mut engine = ImportEngine::new(&f.schema, &mut f.graph, &f.ctx, &catalog, &store);
    let err = engine.run().unwrap_err();
    assert!(matches!(err, ImportError::Store(_)));
    assert_eq!(engine.phase(), ImportPhase::Failed);
}

#[test]
fn cancellation_stops_at_the_next_row() {
    let mut f = fixture(library_defs(), MigrationConfig::default());
    let catalog = library_catalog(library_defs());
    let store = InMemoryGraphStore::new();

    let mut engine = ImportEngine::new(&f.schema, &mut f.graph, &f.ctx, &catalog, &store);
    engine.cancel_flag().store(true, Ordering::Relaxed);
    let err = engine.run().unwrap_err();
    assert!(matches!(
        err,
        ImportError::Cancelled {
            phase: ImportPhase::ImportingPlainEntities
        }
    ));
    assert_eq!(engine.phase(), ImportPhase::Failed);
    assert_eq!(store.edge_count(), 0);
}
