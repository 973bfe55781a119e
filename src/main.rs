//! # doccat CLI
//!
//! The `doccat` binary catalogs engineering documents for one owner at a
//! time. The owner comes from `DOCCAT_OWNER` or `[session] owner` in the
//! config file.
//!
//! ## Usage
//!
//! ```bash
//! doccat --config ./config/doccat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `doccat init` | Create the SQLite database and the storage root |
//! | `doccat upload <file>` | Catalog one file, stopping on possible duplicates |
//! | `doccat check <file>` | Report duplicates without storing anything |
//! | `doccat ingest <paths>...` | Bulk ingest, skipping exact duplicates |
//! | `doccat list` / `show <id>` | Browse the catalog |
//! | `doccat edit <id>` | Change metadata fields |
//! | `doccat replace <id> <file>` | Swap the stored content of an entry |
//! | `doccat delete <id>` | Remove an entry and its object |
//! | `doccat export` / `stats` | JSON export and summary |
//!
//! ## Examples
//!
//! ```bash
//! doccat init
//! DOCCAT_OWNER=alice doccat upload pump.pdf --doc-type manual
//! DOCCAT_OWNER=alice doccat upload pump-v2.pdf --doc-type manual --on-conflict keep-both
//! DOCCAT_OWNER=alice doccat ingest ./datasheets --doc-type datasheet --quick
//! ```

use std::io;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use doccat::app::App;
use doccat::config;
use doccat::entries::{self, EntryEdit};
use doccat::export;
use doccat::ingest::{self, IngestMode, IngestOptions};
use doccat::migrate;
use doccat::progress::ProgressMode;
use doccat::resolution::OnConflict;
use doccat::stats;
use doccat::storage;
use doccat::upload;

/// doccat: engineering document catalog with duplicate detection.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/doccat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "doccat",
    about = "Engineering document catalog with content-hash duplicate detection",
    version,
    long_about = "doccat stores manuals, datasheets, drawings and norms per owner. \
    Every file is hashed before it is stored; identical content is never catalogued twice \
    for the same owner, and similarly named entries are reported before upload."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/doccat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and the storage root.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Catalog a single file.
    ///
    /// Exact and similar-name duplicates are reported first. Without
    /// `--on-conflict` the command stops and nothing is stored.
    Upload {
        file: PathBuf,

        /// Declared document type (manual, datasheet, drawing, norm, ...).
        #[arg(long, default_value = "document")]
        doc_type: String,

        /// What to do when duplicates are found.
        #[arg(long, value_enum, default_value = "ask")]
        on_conflict: ConflictArg,

        #[command(flatten)]
        fields: FieldArgs,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Report exact and similar-name duplicates of a file.
    Check {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Bulk ingest files and directories.
    ///
    /// Directories are walked using `[ingest] include_globs` and
    /// `exclude_globs`. Exact duplicates are skipped, files are processed in
    /// batches, and one failing file never stops the run.
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(long, default_value = "document")]
        doc_type: String,

        /// Tag applied to every ingested entry. Repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Skip metadata extraction; titles come from file names.
        #[arg(long)]
        quick: bool,

        /// Progress output on stderr. Defaults to human on a TTY, off otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },

    /// List catalog entries, newest first.
    List {
        #[arg(long)]
        doc_type: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show one entry.
    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Change metadata fields of an entry. Pass an empty value to clear a field.
    Edit {
        id: String,

        #[arg(long)]
        doc_type: Option<String>,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Replace the stored content of an entry, keeping id and metadata.
    Replace { id: String, file: PathBuf },

    /// Delete an entry and its stored object.
    Delete { id: String },

    /// Export the catalog as JSON.
    Export {
        /// Output file. Defaults to stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show catalog statistics.
    Stats,

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Metadata flags shared by `upload` and `edit`.
#[derive(Args)]
struct FieldArgs {
    #[arg(long)]
    title: Option<String>,
    /// Tag for the entry. Repeatable; replaces the existing list.
    #[arg(long = "tag")]
    tags: Option<Vec<String>>,
    #[arg(long)]
    equipment_model: Option<String>,
    #[arg(long)]
    manufacturer: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    norm_source: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    serial_number: Option<String>,
    #[arg(long)]
    plant_unit: Option<String>,
    #[arg(long)]
    system_area: Option<String>,
    #[arg(long)]
    revision_version: Option<String>,
}

impl FieldArgs {
    fn into_edit(self, doc_type: Option<String>) -> EntryEdit {
        EntryEdit {
            title: self.title,
            doc_type,
            tags: self.tags,
            equipment_model: self.equipment_model,
            manufacturer: self.manufacturer,
            year: self.year,
            norm_source: self.norm_source,
            description: self.description,
            serial_number: self.serial_number,
            plant_unit: self.plant_unit,
            system_area: self.system_area,
            revision_version: self.revision_version,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ConflictArg {
    Ask,
    Replace,
    KeepBoth,
    Cancel,
}

impl From<ConflictArg> for OnConflict {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Ask => OnConflict::Ask,
            ConflictArg::Replace => OnConflict::Replace,
            ConflictArg::KeepBoth => OnConflict::KeepBoth,
            ConflictArg::Cancel => OnConflict::Cancel,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "doccat", &mut io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        storage::open_object_store(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let app = App::open(cfg).await?;

    match cli.command {
        Commands::Upload {
            file,
            doc_type,
            on_conflict,
            fields,
            json,
        } => {
            upload::run_upload(
                &app,
                &file,
                &doc_type,
                fields.into_edit(None),
                on_conflict.into(),
                json,
            )
            .await?;
        }
        Commands::Check { file, json } => {
            upload::run_check(&app, &file, json).await?;
        }
        Commands::Ingest {
            paths,
            doc_type,
            tags,
            quick,
            progress,
        } => {
            let mode = if quick || !app.config.extraction.is_enabled() {
                IngestMode::Quick
            } else {
                IngestMode::Assisted
            };
            let options = IngestOptions {
                doc_type,
                mode,
                tags,
            };
            let progress = progress
                .map(ProgressMode::from)
                .unwrap_or_else(ProgressMode::default_for_tty);
            let summary = ingest::run_ingest(&app, &paths, options, progress).await?;
            if summary.failed > 0 {
                std::process::exit(2);
            }
        }
        Commands::List { doc_type, json } => {
            entries::run_list(&app, doc_type.as_deref(), json).await?;
        }
        Commands::Show { id, json } => {
            entries::run_show(&app, &id, json).await?;
        }
        Commands::Edit {
            id,
            doc_type,
            fields,
        } => {
            entries::run_edit(&app, &id, fields.into_edit(doc_type)).await?;
        }
        Commands::Replace { id, file } => {
            upload::run_replace(&app, &id, &file).await?;
        }
        Commands::Delete { id } => {
            entries::run_delete(&app, &id).await?;
        }
        Commands::Export { output } => {
            let owner = app.session.require_owner()?;
            export::run_export(&app.catalog, owner, output.as_deref()).await?;
        }
        Commands::Stats => {
            let owner = app.session.require_owner()?;
            stats::run_stats(&app.catalog, owner).await?;
        }
        Commands::Init | Commands::Completions { .. } => {
            // Handled above
        }
    }

    Ok(())
}
