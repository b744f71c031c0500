#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use penumbra::graph::GraphMetadataEntry;
use penumbra::{
    Direction, EdgeFilter, Element, FetchHints, GraphError, GraphEvent, Metadata, PropertyValue,
    RelatedEdge, Result,
};
use serde_json::json;

use common::{auths, open_graph, vis};

#[test]
fn saved_vertex_round_trips_properties() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    graph
        .prepare_vertex(Some("v1"), Some(1_000), vis(""))
        .set_property("name", "Paris", vis(""))
        .add_property("k2", "name", "Lutetia", vis(""))
        .set_property("population", 2_000_000i64, vis(""))
        .save(&a)?;

    let vertex = graph.get_vertex("v1", FetchHints::ALL, &a)?.expect("vertex");
    assert_eq!(vertex.timestamp(), 1_000);
    assert_eq!(vertex.properties_named("name")?.len(), 2);
    assert_eq!(
        vertex.property_value("population")?,
        Some(&PropertyValue::Int(2_000_000))
    );
    Ok(())
}

#[test]
fn none_hint_never_exposes_properties() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    graph
        .prepare_vertex(Some("v1"), None, vis(""))
        .set_property("name", "Paris", vis(""))
        .save(&a)?;

    let bare = graph.get_vertex("v1", FetchHints::NONE, &a)?.expect("vertex");
    assert!(matches!(
        bare.properties(),
        Err(GraphError::MissingFetchHint { hint: "PROPERTIES" })
    ));
    assert!(bare.edge_infos(Direction::Out).is_err());
    Ok(())
}

#[test]
fn vertices_in_order_follow_input_and_skip_missing() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    for id in ["v1", "v2", "v3"] {
        graph.add_vertex(Some(id), vis(""), &a)?;
    }
    graph.delete_vertex("v1", &a)?;

    let ordered = graph.get_vertices_in_order(["v3", "v1", "v2"], FetchHints::NONE, &a)?;
    let ids: Vec<&str> = ordered.iter().map(|v| v.id()).collect();
    assert_eq!(ids, vec!["v3", "v2"]);
    Ok(())
}

#[test]
fn batch_existence_matches_single_lookups() -> Result<()> {
    let graph = open_graph();
    let public = auths(&["public"]);
    graph.add_vertex(Some("a"), vis(""), &public)?;
    graph.add_vertex(Some("b"), vis("public"), &public)?;

    let nobody = auths(&[]);
    let ids = ["a", "b", "missing"];
    let batch = graph.do_vertices_exist(ids, &nobody)?;
    assert_eq!(batch.len(), 3);
    for id in ids {
        assert_eq!(batch[id], graph.does_vertex_exist(id, &nobody)?, "{id}");
    }
    assert!(batch["a"]);
    assert!(!batch["b"]);
    assert!(!batch["missing"]);
    Ok(())
}

#[test]
fn deleting_a_vertex_removes_its_edges_and_emits_events() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    graph.add_event_listener(Arc::new(move |event: &GraphEvent| sink.lock().push(event.clone())));

    graph.add_vertex(Some("a"), vis(""), &a)?;
    graph.add_vertex(Some("b"), vis(""), &a)?;
    graph.add_edge(Some("e1"), "a", "b", "knows", vis(""), &a)?;
    graph.delete_vertex("a", &a)?;

    assert!(graph.get_edge("e1", FetchHints::NONE, &a)?.is_none());
    assert_eq!(graph.get_edge_count(&a)?, 0);
    let b = graph.get_vertex("b", FetchHints::EDGE_REFS, &a)?.expect("b");
    assert!(b.edge_ids(Direction::Both)?.is_empty());

    let events = events.lock();
    assert!(events.contains(&GraphEvent::DeleteEdge { edge_id: "e1".into() }));
    assert_eq!(
        events.last(),
        Some(&GraphEvent::DeleteVertex { vertex_id: "a".into() })
    );
    Ok(())
}

#[test]
fn deleting_an_unresolvable_element_is_a_no_op() -> Result<()> {
    let graph = open_graph();
    let secret = auths(&["secret"]);
    graph.add_vertex(Some("s"), vis("secret"), &secret)?;

    graph.delete_vertex("s", &auths(&[]))?;
    graph.delete_vertex("missing", &secret)?;
    assert!(graph.does_vertex_exist("s", &secret)?);
    Ok(())
}

#[test]
fn soft_delete_hides_from_now_but_not_from_the_past() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    graph.prepare_vertex(Some("v"), Some(100), vis("")).save(&a)?;
    graph.soft_delete_vertex("v", Some(200), &a)?;

    assert!(graph.get_vertex("v", FetchHints::NONE, &a)?.is_none());
    assert!(graph
        .get_vertex_as_of("v", FetchHints::NONE, Some(150), &a)?
        .is_some());
    assert!(graph
        .get_vertex_as_of("v", FetchHints::NONE, Some(250), &a)?
        .is_none());
    Ok(())
}

#[test]
fn related_edges_stay_inside_the_requested_set() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    for id in ["A", "B", "C"] {
        graph.add_vertex(Some(id), vis(""), &a)?;
    }
    graph.add_edge(Some("ac"), "A", "C", "links", vis(""), &a)?;

    let ab = graph.find_related_edge_summary(&["A".into(), "B".into()], None, &a)?;
    assert!(ab.is_empty());

    let ac = graph.find_related_edge_summary(&["A".into(), "C".into()], None, &a)?;
    assert_eq!(ac, vec![RelatedEdge::new("ac", "links", "A", "C")]);
    assert_eq!(
        graph.find_related_edge_ids(&["C".into(), "A".into()], None, &a)?,
        vec!["ac".to_owned()]
    );
    Ok(())
}

#[test]
fn property_counts_fold_case() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    for (id, city) in [("1", "Paris"), ("2", "paris"), ("3", "Lyon")] {
        graph
            .prepare_vertex(Some(id), None, vis(""))
            .set_property("city", city, vis(""))
            .save(&a)?;
    }
    let counts = graph.get_vertex_property_count_by_value("city", &a)?;
    assert_eq!(counts[&PropertyValue::from("paris")], 2);
    assert_eq!(counts[&PropertyValue::from("lyon")], 1);
    Ok(())
}

#[test]
fn edge_ids_filter_by_token_mentions() -> Result<()> {
    let graph = open_graph();
    let a = auths(&["audit", "pii"]);
    graph.add_vertex(Some("a"), vis(""), &a)?;
    graph.add_vertex(Some("b"), vis(""), &a)?;
    graph.add_edge(Some("plain"), "a", "b", "knows", vis(""), &a)?;
    graph.add_edge(Some("audited"), "a", "b", "knows", vis("audit"), &a)?;
    graph
        .prepare_edge(Some("tagged"), "a", "b", "knows", None, vis(""))
        .add_property_with_metadata(
            "",
            "note",
            "x",
            Metadata::new().with("source", "y", vis("audit")),
            vis("pii"),
        )
        .save(&a)?;

    let ids = ["plain", "audited", "tagged"];
    assert_eq!(
        graph.filter_edge_ids_by_authorization(ids, "audit", &[EdgeFilter::Edge], &a)?,
        vec!["audited".to_owned()]
    );
    let mut by_metadata =
        graph.filter_edge_ids_by_authorization(ids, "audit", &EdgeFilter::ALL, &a)?;
    by_metadata.sort();
    assert_eq!(by_metadata, vec!["audited".to_owned(), "tagged".to_owned()]);
    assert_eq!(
        graph.filter_edge_ids_by_authorization(ids, "pii", &[EdgeFilter::Property], &a)?,
        vec!["tagged".to_owned()]
    );
    Ok(())
}

#[test]
fn removed_properties_disappear_on_update() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    graph
        .prepare_vertex(Some("v"), None, vis(""))
        .set_property("name", "Paris", vis(""))
        .set_property("nickname", "City of Light", vis(""))
        .save(&a)?;
    graph
        .prepare_vertex(Some("v"), None, vis(""))
        .remove_property("", "nickname")
        .save(&a)?;

    let vertex = graph.get_vertex("v", FetchHints::PROPERTIES, &a)?.expect("vertex");
    assert!(vertex.property_value("nickname")?.is_none());
    assert!(vertex.property_value("name")?.is_some());
    Ok(())
}

#[test]
fn generated_ids_and_prefix_scans() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    let first = graph.add_vertex(None, vis(""), &a)?;
    let second = graph.add_vertex(None, vis(""), &a)?;
    assert_ne!(first.id(), second.id());

    let builders = vec![
        graph.prepare_vertex(Some("city:paris"), None, vis("")),
        graph.prepare_vertex(Some("city:lyon"), None, vis("")),
        graph.prepare_vertex(Some("person:ada"), None, vis("")),
    ];
    graph.add_vertices(builders, &a)?;

    let cities: Vec<String> = graph
        .get_vertices_with_prefix("city:", FetchHints::NONE, &a)?
        .map(|v| v.map(|v| v.id().to_owned()))
        .collect::<Result<_>>()?;
    assert_eq!(cities, vec!["city:lyon".to_owned(), "city:paris".to_owned()]);
    assert_eq!(graph.get_vertex_count(&a)?, 5);
    Ok(())
}

#[test]
fn graph_metadata_round_trips_json() -> Result<()> {
    let graph = open_graph();
    graph.set_metadata("schema.version", &3u32)?;
    graph.set_metadata("schema.owner", &"ops")?;
    graph.set_metadata("other", &json!({"a": 1}))?;

    assert_eq!(graph.get_metadata::<u32>("schema.version")?, Some(3));
    assert_eq!(graph.get_metadata::<u32>("missing")?, None);
    assert!(graph.get_metadata::<u32>("schema.owner").is_err());
    assert_eq!(
        graph.get_metadata_with_prefix("schema."),
        vec![
            GraphMetadataEntry {
                key: "schema.owner".into(),
                value: json!("ops")
            },
            GraphMetadataEntry {
                key: "schema.version".into(),
                value: json!(3)
            },
        ]
    );
    assert_eq!(graph.get_metadata_entries().len(), 3);
    Ok(())
}

#[test]
fn authorizations_merge_without_duplicates() {
    let graph = open_graph();
    let base = graph.create_authorizations(["a", "b"]);
    let merged = graph.create_authorizations_with(&base, ["b", "c"]);
    assert_eq!(merged.tokens().collect::<Vec<_>>(), vec!["a", "b", "c"]);
}
