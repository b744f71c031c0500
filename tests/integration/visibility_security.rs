#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use penumbra::{
    Compare, Direction, Element, ElementKind, FetchHints, GraphError, GraphEvent, Metadata,
    PropertyValue, Result, Visibility,
};

use common::{auths, open_graph, open_search_graph, vis};

#[test]
fn unreadable_and_missing_look_identical() -> Result<()> {
    let graph = open_graph();
    let secret = auths(&["secret"]);
    graph.add_vertex(Some("hidden"), vis("secret"), &secret)?;

    let outsider = auths(&["public"]);
    let unreadable = graph.get_vertex("hidden", FetchHints::ALL, &outsider)?;
    let missing = graph.get_vertex("nope", FetchHints::ALL, &outsider)?;
    assert_eq!(unreadable, missing);
    assert!(unreadable.is_none());
    assert!(graph.get_vertex("hidden", FetchHints::ALL, &secret)?.is_some());
    Ok(())
}

#[test]
fn writers_cannot_use_visibilities_they_cannot_satisfy() -> Result<()> {
    let graph = open_graph();
    let public = auths(&["public"]);

    let err = graph
        .add_vertex(Some("v"), vis("secret"), &public)
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidVisibility(_)));

    let err = graph
        .prepare_vertex(Some("v"), None, vis("public"))
        .set_property("name", "x", vis("public&secret"))
        .save(&public)
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidVisibility(_)));
    assert!(!graph.does_vertex_exist("v", &public)?);
    Ok(())
}

#[test]
fn malformed_expressions_are_rejected() {
    for expression in ["a&", "(a|b", "a&|b", "a b"] {
        assert!(
            matches!(Visibility::parse(expression), Err(GraphError::InvalidVisibility(_))),
            "{expression}"
        );
    }
}

#[test]
fn properties_and_metadata_are_redacted_per_reader() -> Result<()> {
    let graph = open_graph();
    let writer = auths(&["a", "b"]);
    graph
        .prepare_vertex(Some("v"), None, vis(""))
        .add_property_with_metadata(
            "",
            "name",
            "public name",
            Metadata::new()
                .with("source", "open", vis(""))
                .with("confidence", 0.9, vis("b")),
            vis(""),
        )
        .add_property("", "name", "code name", vis("a"))
        .add_property("", "rank", 3i64, vis("a&b"))
        .save(&writer)?;

    let only_a = auths(&["a"]);
    let vertex = graph.get_vertex("v", FetchHints::ALL, &only_a)?.expect("vertex");
    let names: Vec<&str> = vertex
        .properties_named("name")?
        .into_iter()
        .filter_map(|p| p.value().as_str())
        .collect();
    assert_eq!(names, vec!["public name", "code name"]);
    assert!(vertex.property_value("rank")?.is_none());

    let public_name = vertex.property("", "name")?.expect("name");
    let metadata = public_name.metadata()?;
    assert!(metadata.get("source").is_some());
    assert!(metadata.get("confidence").is_none());

    let without_metadata = graph.get_vertex("v", FetchHints::PROPERTIES, &only_a)?.expect("vertex");
    let property = without_metadata.property("", "name")?.expect("name");
    assert!(matches!(
        property.metadata(),
        Err(GraphError::MissingFetchHint { .. })
    ));
    Ok(())
}

#[test]
fn edge_references_respect_edge_visibility() -> Result<()> {
    let graph = open_graph();
    let writer = auths(&["secret"]);
    graph.add_vertex(Some("a"), vis(""), &writer)?;
    graph.add_vertex(Some("b"), vis(""), &writer)?;
    graph.add_edge(Some("open"), "a", "b", "knows", vis(""), &writer)?;
    graph.add_edge(Some("covert"), "a", "b", "handles", vis("secret"), &writer)?;

    let public = auths(&[]);
    let a = graph.get_vertex("a", FetchHints::EDGE_REFS, &public)?.expect("a");
    assert_eq!(a.edge_ids(Direction::Out)?, vec!["open"]);
    assert_eq!(graph.get_edge_count(&public)?, 1);

    let a = graph.get_vertex("a", FetchHints::EDGE_REFS, &writer)?.expect("a");
    assert_eq!(a.edge_ids(Direction::Out)?.len(), 2);
    Ok(())
}

#[test]
fn hidden_marks_apply_only_to_readers_of_the_hiding_visibility() -> Result<()> {
    let graph = open_graph();
    let admin = auths(&["admin"]);
    graph.add_vertex(Some("a"), vis(""), &admin)?;
    graph.add_vertex(Some("b"), vis(""), &admin)?;
    graph.add_edge(Some("ab"), "a", "b", "knows", vis(""), &admin)?;

    graph.mark_vertex_hidden("a", &vis("admin"), &admin)?;

    assert!(graph.get_vertex("a", FetchHints::ALL, &admin)?.is_none());
    assert!(graph.get_edge("ab", FetchHints::ALL, &admin)?.is_none());
    let hidden = graph
        .get_vertex("a", FetchHints::ALL_INCLUDING_HIDDEN, &admin)?
        .expect("hidden vertex");
    assert!(hidden.is_hidden());

    let everyone = auths(&[]);
    let visible = graph.get_vertex("a", FetchHints::ALL, &everyone)?.expect("vertex");
    assert!(!visible.is_hidden());

    graph.mark_vertex_visible("a", &vis("admin"), &admin)?;
    assert!(graph.get_vertex("a", FetchHints::ALL, &admin)?.is_some());
    assert!(graph.get_edge("ab", FetchHints::ALL, &admin)?.is_some());
    Ok(())
}

#[test]
fn edge_hidden_marks_are_independent() -> Result<()> {
    let graph = open_graph();
    let admin = auths(&["admin"]);
    graph.add_vertex(Some("a"), vis(""), &admin)?;
    graph.add_vertex(Some("b"), vis(""), &admin)?;
    graph.add_edge(Some("ab"), "a", "b", "knows", vis(""), &admin)?;

    graph.mark_edge_hidden("ab", &vis("admin"), &admin)?;
    assert!(graph.get_edge("ab", FetchHints::NONE, &admin)?.is_none());
    assert!(graph.get_vertex("a", FetchHints::NONE, &admin)?.is_some());
    graph.mark_edge_visible("ab", &vis("admin"), &admin)?;
    assert!(graph.get_edge("ab", FetchHints::NONE, &admin)?.is_some());
    Ok(())
}

#[test]
fn saves_cannot_take_over_unreadable_ids() -> Result<()> {
    let graph = open_graph();
    let secret = auths(&["secret"]);
    let outsider = auths(&[]);
    graph
        .prepare_vertex(Some("v1"), None, vis("secret"))
        .set_property("name", "Paris", vis(""))
        .save(&secret)?;
    graph.add_vertex(Some("a"), vis(""), &secret)?;
    graph.add_vertex(Some("b"), vis(""), &secret)?;
    graph.add_edge(Some("e"), "a", "b", "knows", vis("secret"), &secret)?;

    let err = graph
        .prepare_vertex(Some("v1"), None, vis(""))
        .set_property("note", "mine", vis(""))
        .save(&outsider)
        .unwrap_err();
    assert!(matches!(
        err,
        GraphError::NotFoundOrUnauthorized { kind: ElementKind::Vertex, ref id } if id == "v1"
    ));
    let err = graph
        .add_edge(Some("e"), "a", "b", "knows", vis(""), &outsider)
        .unwrap_err();
    assert!(matches!(err, GraphError::NotFoundOrUnauthorized { kind: ElementKind::Edge, .. }));

    assert!(graph.get_vertex("v1", FetchHints::ALL, &outsider)?.is_none());
    assert!(graph.get_edge("e", FetchHints::ALL, &outsider)?.is_none());
    let kept = graph.get_vertex("v1", FetchHints::ALL, &secret)?.expect("v1");
    assert_eq!(kept.visibility(), &vis("secret"));
    assert_eq!(kept.property_value("name")?, Some(&PropertyValue::from("Paris")));
    assert_eq!(kept.property_value("note")?, None);
    Ok(())
}

#[test]
fn removals_only_touch_variants_the_writer_can_read() -> Result<()> {
    let (graph, _index) = open_search_graph();
    let secret = auths(&["secret"]);
    let outsider = auths(&[]);
    graph
        .prepare_vertex(Some("v1"), None, vis(""))
        .set_property("code", "X1", vis("secret"))
        .save(&secret)?;

    graph
        .prepare_vertex(Some("v1"), None, vis(""))
        .remove_property("", "code")
        .save(&outsider)?;

    let stored = graph.get_vertex("v1", FetchHints::ALL, &secret)?.expect("v1");
    assert_eq!(stored.property_value("code")?, Some(&PropertyValue::from("X1")));
    let find = |auths: &penumbra::Authorizations| -> Result<Vec<String>> {
        graph
            .query(auths)
            .has("code", Compare::Equal, "X1")
            .vertices(FetchHints::NONE)?
            .map(|v| v.map(|v| v.id().to_owned()))
            .collect()
    };
    assert_eq!(find(&secret)?, vec!["v1"]);

    graph
        .prepare_vertex(Some("v1"), None, vis(""))
        .remove_property("", "code")
        .save(&secret)?;
    assert!(find(&secret)?.is_empty());
    Ok(())
}

#[test]
fn deleting_a_vertex_spares_edges_the_caller_cannot_read() -> Result<()> {
    let (graph, index) = open_search_graph();
    let secret = auths(&["secret"]);
    let outsider = auths(&[]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    graph.add_event_listener(Arc::new(move |event: &GraphEvent| sink.lock().push(event.clone())));

    graph.add_vertex(Some("a"), vis(""), &secret)?;
    graph.add_vertex(Some("b"), vis(""), &secret)?;
    graph.add_edge(Some("e"), "a", "b", "knows", vis("secret"), &secret)?;
    assert_eq!(index.document_count("penumbra"), Some(3));
    events.lock().clear();

    graph.delete_vertex("a", &outsider)?;

    assert!(graph.get_vertex("a", FetchHints::NONE, &secret)?.is_none());
    let edge = graph.get_edge("e", FetchHints::ALL, &secret)?.expect("edge survives");
    assert_eq!(edge.out_vertex_id(), "a");
    let b = graph.get_vertex("b", FetchHints::EDGE_REFS, &secret)?.expect("b");
    assert_eq!(b.edge_ids(Direction::In)?, vec!["e"]);
    assert_eq!(index.document_count("penumbra"), Some(2));
    assert_eq!(
        *events.lock(),
        vec![GraphEvent::DeleteVertex { vertex_id: "a".into() }]
    );
    Ok(())
}
