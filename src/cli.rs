use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pagecard::{category::Category, greeting::CardStyle};

#[derive(Debug, Parser)]
#[command(
    name = "pagecard",
    about = "Find document pages showing people together and turn them \
             into holiday cards"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Person snapshot to load instead of <data-dir>/persons.json
    #[arg(long, global = true)]
    pub persons: Option<PathBuf>,

    /// Prefix for page image URLs
    #[arg(long, global = true)]
    pub image_base_url: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Rank pages on which the given persons appear
    Match(MatchArgs),
    /// List persons from the snapshot
    Persons(PersonsArgs),
    /// List categories present in the snapshot
    Categories {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Draft a card for one or more persons
    Card(CardArgs),
    /// Build the person snapshot from a raw detection export
    Ingest(IngestArgs),
    /// Manage saved cards
    Gallery {
        #[command(subcommand)]
        action: GalleryAction,
    },
    /// Manage persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show resolved settings and data statistics
    Status(StatusArgs),
    /// Start MCP server for AI agent integration
    Mcp,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Serve page images from this directory under /pages
    #[arg(long)]
    pub pages_dir: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct MatchArgs {
    /// Person ids
    #[arg(required = true)]
    pub person_ids: Vec<String>,

    /// Number of pages to show
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct PersonsArgs {
    /// Case-insensitive name filter
    #[arg(short, long)]
    pub search: Option<String>,

    /// Restrict to one category
    #[arg(short, long, value_parser = parse_category)]
    pub category: Option<Category>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct CardArgs {
    /// Person ids to feature on the card
    #[arg(required = true)]
    pub person_ids: Vec<String>,

    /// Card style
    #[arg(
        short,
        long,
        default_value = "traditional",
        value_parser = parse_style
    )]
    pub style: CardStyle,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// Raw detection export (JSON)
    pub raw: PathBuf,

    /// Where to write the snapshot (default: the configured persons path)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON table of category name to person names (default: built in)
    #[arg(long)]
    pub categories: Option<PathBuf>,

    /// Leading path removed from every appearance file
    #[arg(long)]
    pub strip_prefix: Option<String>,

    /// Source recorded in the snapshot (default: the export path)
    #[arg(long)]
    pub source: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum GalleryAction {
    /// List saved cards, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one saved card
    Show {
        /// Card id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a saved card
    Remove {
        /// Card id
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show resolved and persisted settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a setting in config.redb
    Set {
        /// Setting key (image_base_url, bind, persons_path, pages_dir)
        key: String,
        value: String,
    },
    /// Remove a persisted setting
    Clear {
        /// Setting key
        key: String,
    },
}

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "pagecard",
            &mut std::io::stdout(),
        );
    }
}

fn parse_category(name: &str) -> Result<Category, String> {
    name.parse().map_err(|e: pagecard::Error| e.to_string())
}

fn parse_style(name: &str) -> Result<CardStyle, String> {
    CardStyle::ALL
        .into_iter()
        .find(|s| s.as_str().eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            let names: Vec<_> =
                CardStyle::ALL.iter().map(|s| s.as_str()).collect();
            format!(
                "unknown style '{name}' (expected one of: {})",
                names.join(", ")
            )
        })
}
