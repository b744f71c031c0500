#![allow(missing_docs)]

mod common;

use std::fs;

use penumbra::graph::{id_generator_for, IdGenerator};
use penumbra::{
    ConfigError, Element, Graph, GraphConfig, GraphError, IdGeneratorKind, InMemoryBackend, Result,
};
use tempfile::tempdir;

use common::{init_tracing, vis};

#[test]
fn config_round_trips_through_a_file() -> Result<()> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("graph.toml");
    let config = GraphConfig::default()
        .id_generator(IdGeneratorKind::Random)
        .index_name("cities")
        .evaluate_query_string(true)
        .default_limit(25)
        .default_authorization_tokens("public, internal");
    config.persist(&path)?;

    let loaded = GraphConfig::load(&path)?;
    assert_eq!(loaded, config);
    let defaults = loaded.default_authorizations();
    assert_eq!(defaults.tokens().collect::<Vec<_>>(), vec!["internal", "public"]);
    Ok(())
}

#[test]
fn partial_files_fill_in_defaults() -> Result<()> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("graph.toml");
    fs::write(&path, "[search]\nindex_name = \"cities\"\n").expect("write config");

    let loaded = GraphConfig::load(&path)?;
    assert_eq!(loaded.search.index_name, "cities");
    assert_eq!(loaded.search.default_limit, 100);
    assert_eq!(loaded.id_generator, IdGeneratorKind::Sequential);
    Ok(())
}

#[test]
fn load_failures_name_the_file() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("missing.toml");
    let err = GraphConfig::load(&missing).unwrap_err();
    assert!(matches!(err, ConfigError::Read { ref path, .. } if *path == missing));

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "search = [").expect("write config");
    let err = GraphConfig::load(&broken).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { ref path, .. } if *path == broken));
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
fn invalid_values_are_rejected_on_load_and_open() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("graph.toml");
    fs::write(&path, "[search]\nindex_name = \"  \"\n").expect("write config");
    let err = GraphConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "search.index_name", .. }));

    init_tracing();
    let config = GraphConfig::default().default_limit(0);
    let err = Graph::open(InMemoryBackend::from_config(&config), config).unwrap_err();
    assert!(matches!(
        err,
        GraphError::Config(ConfigError::Invalid {
            field: "search.default_limit",
            ..
        })
    ));
}

#[test]
fn id_generator_setting_drives_generated_ids() -> Result<()> {
    init_tracing();
    let config = GraphConfig::default().id_generator(IdGeneratorKind::Random);
    let graph = Graph::open(InMemoryBackend::from_config(&config), config)?;
    let auths = graph.config().default_authorizations();
    let vertex = graph.add_vertex(None, vis(""), &auths)?;
    assert_eq!(vertex.id().len(), 32);
    assert!(vertex.id().chars().all(|c| c.is_ascii_hexdigit()));

    let sequential = id_generator_for(IdGeneratorKind::Sequential);
    let first: u64 = sequential.next_id().parse().expect("decimal id");
    let second: u64 = sequential.next_id().parse().expect("decimal id");
    assert!(second > first);
    Ok(())
}
