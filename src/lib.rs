//! # Larder
//!
//! A local-first recipe retrieval engine: goal-driven semantic search over
//! a recipe corpus, with nutrition filtering and allergen exclusion.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Providers  │──▶│  Normalize   │──▶│    Corpus    │  (recipes.sqlite)
//! │ Spoon/Edam  │   │   + Embed    │──▶│ Vector Index │  (index.sqlite)
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!                          ┌──────────────────┤
//!                          ▼                  ▼
//!                     ┌──────────┐      ┌──────────┐
//!                     │  search  │      │  audit   │
//!                     └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! larder init                              # create both databases
//! larder ingest --goal build-muscle --cuisine Thai
//! larder search --goal build-muscle --allergen peanut
//! larder audit --ids
//! ```
//!
//! Domain logic lives in `larder-core`; this crate supplies the SQLite
//! stores, HTTP providers, embedding backends, and CLI commands.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite Corpus and Vector Index |
//! | [`embedding`] | Embedding providers |
//! | [`connector_spoonacular`] | Spoonacular recipe provider |
//! | [`connector_edamam`] | Edamam recipe provider |
//! | [`sources`] | Provider registry |
//! | [`ingest`] | `ingest` and `seed` commands |
//! | [`search`] | `search` command |
//! | [`get`] | `get` command |
//! | [`track`] | `track` command |
//! | [`audit`] | `audit` command |
//! | [`embed_cmd`] | `embed rebuild` command |

pub mod audit;
pub mod config;
pub mod connector_edamam;
pub mod connector_spoonacular;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod sources;
pub mod sqlite_store;
pub mod track;
