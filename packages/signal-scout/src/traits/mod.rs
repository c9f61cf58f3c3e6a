//! Trait seams between the engine and its collaborators.
//!
//! Production implementations live in `fetchers`, `stores`, `seeds` and
//! `enrichment`; test doubles live in `testing`.

pub mod enricher;
pub mod fetcher;
pub mod registry;
pub mod searcher;
