#![allow(missing_docs)]

mod common;

use penumbra::{ElementKind, GraphError, ProgressStep, Result};

use common::{auths, open_graph, vis};

fn ids(path: &penumbra::Path) -> Vec<&str> {
    path.vertex_ids().iter().map(String::as_str).collect()
}

#[test]
fn finds_every_simple_path_within_the_hop_limit() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    for id in ["A", "B", "C", "D"] {
        graph.add_vertex(Some(id), vis(""), &a)?;
    }
    graph.add_edge(Some("ab"), "A", "B", "x", vis(""), &a)?;
    graph.add_edge(Some("bd"), "B", "D", "x", vis(""), &a)?;
    graph.add_edge(Some("ca"), "C", "A", "x", vis(""), &a)?;
    graph.add_edge(Some("cd"), "C", "D", "x", vis(""), &a)?;

    let mut paths: Vec<Vec<&str>> = Vec::new();
    let found = graph.find_paths("A", "D", 2, &a)?;
    paths.extend(found.iter().map(ids));
    paths.sort();
    assert_eq!(paths, vec![vec!["A", "B", "D"], vec!["A", "C", "D"]]);

    assert!(graph.find_paths("A", "D", 1, &a)?.is_empty());
    Ok(())
}

#[test]
fn edges_are_traversed_in_both_directions() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    for id in ["A", "B"] {
        graph.add_vertex(Some(id), vis(""), &a)?;
    }
    graph.add_edge(Some("ba"), "B", "A", "x", vis(""), &a)?;

    let found = graph.find_paths("A", "B", 1, &a)?;
    assert_eq!(found.len(), 1);
    assert_eq!(ids(&found[0]), vec!["A", "B"]);
    Ok(())
}

#[test]
fn cycles_terminate_without_paths() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    for id in ["A", "B", "C"] {
        graph.add_vertex(Some(id), vis(""), &a)?;
    }
    graph.add_edge(Some("ab"), "A", "B", "x", vis(""), &a)?;
    graph.add_edge(Some("ba"), "B", "A", "x", vis(""), &a)?;

    assert!(graph.find_paths("A", "C", 3, &a)?.is_empty());
    Ok(())
}

#[test]
fn unresolvable_endpoints_are_reported_as_not_found() -> Result<()> {
    let graph = open_graph();
    let secret = auths(&["secret"]);
    graph.add_vertex(Some("A"), vis(""), &secret)?;
    graph.add_vertex(Some("S"), vis("secret"), &secret)?;

    let outsider = auths(&[]);
    let err = graph.find_paths("A", "S", 2, &outsider).unwrap_err();
    assert!(matches!(
        err,
        GraphError::NotFoundOrUnauthorized { kind: ElementKind::Vertex, ref id } if id == "S"
    ));
    let err = graph.find_paths("missing", "A", 2, &secret).unwrap_err();
    assert!(matches!(err, GraphError::NotFoundOrUnauthorized { .. }));
    Ok(())
}

#[test]
fn invisible_edges_are_not_traversed() -> Result<()> {
    let graph = open_graph();
    let secret = auths(&["secret"]);
    for id in ["A", "B"] {
        graph.add_vertex(Some(id), vis(""), &secret)?;
    }
    graph.add_edge(Some("ab"), "A", "B", "x", vis("secret"), &secret)?;

    assert_eq!(graph.find_paths("A", "B", 2, &secret)?.len(), 1);
    assert!(graph.find_paths("A", "B", 2, &auths(&[]))?.is_empty());
    Ok(())
}

#[test]
fn progress_is_reported_from_start_to_completion() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);
    for id in ["A", "B", "C"] {
        graph.add_vertex(Some(id), vis(""), &a)?;
    }
    graph.add_edge(Some("ab"), "A", "B", "x", vis(""), &a)?;
    graph.add_edge(Some("ac"), "A", "C", "x", vis(""), &a)?;

    let mut steps = Vec::new();
    let mut record = |percent: f64, step: ProgressStep| steps.push((percent, step));
    graph.find_paths_with_progress("A", "C", 2, &mut record, &a)?;

    assert_eq!(steps.first().map(|s| s.1), Some(ProgressStep::FindingPath));
    assert_eq!(steps.last(), Some(&(1.0, ProgressStep::Complete)));
    let searching = steps
        .iter()
        .filter(|(_, step)| matches!(step, ProgressStep::SearchingEdges { vertex_count: 2, .. }))
        .count();
    assert_eq!(searching, 2);
    assert!(steps.windows(2).all(|w| w[0].0 <= w[1].0));
    Ok(())
}
