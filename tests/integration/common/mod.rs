#![allow(dead_code)]

use std::sync::{Arc, Once};

use penumbra::search::MemorySearchIndex;
use penumbra::{Authorizations, Graph, GraphConfig, InMemoryBackend, Visibility};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("penumbra=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

pub fn open_graph() -> Graph<InMemoryBackend> {
    init_tracing();
    let config = GraphConfig::default();
    Graph::open(InMemoryBackend::from_config(&config), config).expect("open graph")
}

pub fn open_search_graph() -> (Graph<InMemoryBackend>, Arc<MemorySearchIndex>) {
    init_tracing();
    let config = GraphConfig::default();
    let index = Arc::new(MemorySearchIndex::new(config.search.index_name.clone()));
    let graph = Graph::open(InMemoryBackend::from_config(&config), config)
        .expect("open graph")
        .with_search_index(index.clone());
    (graph, index)
}

pub fn vis(expression: &str) -> Visibility {
    Visibility::parse(expression).expect("valid visibility")
}

pub fn auths(tokens: &[&str]) -> Authorizations {
    Authorizations::new(tokens.iter().copied())
}
