//! # Larder CLI (`larder`)
//!
//! ## Usage
//!
//! ```bash
//! larder --config ./config/larder.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `larder init` | Create both SQLite databases and run schema migrations |
//! | `larder sources` | List recipe providers and credential status |
//! | `larder ingest --goal G` | Fetch, normalize, and index recipes for a goal |
//! | `larder seed` | Ingest every goal × configured cuisine |
//! | `larder search --goal G` | Goal-driven recipe search |
//! | `larder get <id>` | Print one recipe |
//! | `larder track <id>…` | Record recipe usage |
//! | `larder audit` | Compare Corpus and Vector Index |
//! | `larder embed rebuild` | Regenerate all vectors from the Corpus |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use larder::{audit, config, embed_cmd, get, ingest, migrate, search, sources, track};
use larder_core::models::Goal;

#[derive(Parser)]
#[command(
    name = "larder",
    about = "Larder: goal-driven recipe retrieval over a local recipe corpus",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./config/larder.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG wins.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create both databases and run migrations.
    Init,

    /// List recipe providers and whether their credentials are set.
    Sources,

    /// Fetch recipes for a goal and write them to both stores.
    Ingest {
        #[arg(long)]
        goal: Goal,

        #[arg(long)]
        cuisine: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Ingest every goal × configured cuisine.
    Seed,

    /// Search recipes for a goal.
    Search {
        #[arg(long)]
        goal: Goal,

        /// Preferred cuisine (repeatable).
        #[arg(long = "cuisine")]
        cuisines: Vec<String>,

        /// Allergen to exclude (repeatable).
        #[arg(long = "allergen")]
        allergens: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Print one recipe from the Corpus.
    Get {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Increment the popularity of one or more recipes.
    Track {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Compare Corpus and Vector Index.
    Audit {
        /// Also list ids present in only one store.
        #[arg(long)]
        ids: bool,

        #[arg(long)]
        json: bool,
    },

    /// Embedding maintenance.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Clear the Vector Index and re-embed every Corpus recipe.
    Rebuild {
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,sqlx=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Databases initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Ingest {
            goal,
            cuisine,
            limit,
        } => {
            ingest::run_ingest(&cfg, goal, cuisine, limit).await?;
        }
        Commands::Seed => {
            ingest::run_seed(&cfg).await?;
        }
        Commands::Search {
            goal,
            cuisines,
            allergens,
            limit,
            json,
        } => {
            search::run_search(&cfg, goal, cuisines, allergens, limit, json).await?;
        }
        Commands::Get { id, json } => {
            get::run_get(&cfg, &id, json).await?;
        }
        Commands::Track { ids } => {
            track::run_track(&cfg, &ids).await?;
        }
        Commands::Audit { ids, json } => {
            audit::run_audit(&cfg, ids, json).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Rebuild { batch_size } => {
                embed_cmd::run_embed_rebuild(&cfg, batch_size).await?;
            }
        },
    }

    Ok(())
}
