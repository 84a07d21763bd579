//! # Larder Core
//!
//! Storage-agnostic building blocks for Larder, a goal-driven recipe
//! retrieval engine.
//!
//! This crate holds the domain types, traits, and pipeline logic with no
//! database or HTTP dependencies:
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Recipes, vector records, goals, and filters |
//! | [`normalize`] | Provider payload → canonical [`Recipe`](models::Recipe) |
//! | [`document`] | Embedding text construction |
//! | [`embedding`] | [`Embedder`](embedding::Embedder) trait, hash embedder, vector utilities |
//! | [`source`] | [`RecipeSource`](source::RecipeSource) provider trait |
//! | [`store`] | [`Corpus`](store::Corpus) and [`VectorIndex`](store::VectorIndex) traits + in-memory impls |
//! | [`ingest`] | Fetch → normalize → Corpus → index pipeline |
//! | [`search`] | Goal-driven retrieval with allergen exclusion |
//! | [`audit`] | Cross-store consistency reports |
//!
//! The `larder` application crate supplies SQLite stores, HTTP providers,
//! and the CLI on top of these.

pub mod audit;
pub mod document;
pub mod embedding;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod search;
pub mod source;
pub mod store;
