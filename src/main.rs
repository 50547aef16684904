use std::path::PathBuf;

use clap::Parser;
use pagecard::{
    ConfigDb,
    DataDir,
    Error,
    Gallery,
    PersonStore,
    Result,
    category::CategoryTable,
    gallery::Card,
    greeting::{self, CardDraft},
    ingestion::{self, IngestOptions},
    matching,
    mcp,
    server,
    settings::{self, Overrides, Settings},
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ConfigAction, GalleryAction};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("PAGECARD_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;
    let mut overrides = Overrides {
        image_base_url: cli.image_base_url,
        persons: cli.persons,
        ..Overrides::default()
    };

    let resolve = |overrides: &Overrides| {
        Settings::resolve(overrides, &config_db, &data_dir)
    };

    match cli.command {
        Command::Serve(args) => {
            overrides.bind = args.bind;
            overrides.pages_dir = args.pages_dir;
            let settings = resolve(&overrides)?;
            server::run_server(&settings, &data_dir)?;
        }
        Command::Match(args) => {
            let settings = resolve(&overrides)?;
            let store = PersonStore::load(&settings.persons_path)?;
            let mut report = matching::find_matching_pages(
                &store,
                &settings.image_base_url,
                &args.person_ids,
            )?;

            if args.json {
                if let Some(count) = args.count {
                    report.limit_pages(count);
                }
                matching::format_json(&report)?;
            } else {
                matching::format_human(&report, args.count);
            }
        }
        Command::Persons(args) => {
            let settings = resolve(&overrides)?;
            let store = PersonStore::load(&settings.persons_path)?;
            cmd_persons(&store, &args)?;
        }
        Command::Categories { json } => {
            let settings = resolve(&overrides)?;
            let store = PersonStore::load(&settings.persons_path)?;
            cmd_categories(&store, json)?;
        }
        Command::Card(args) => {
            let settings = resolve(&overrides)?;
            let store = PersonStore::load(&settings.persons_path)?;
            let persons = greeting::resolve_persons(&store, &args.person_ids)?;
            let draft = CardDraft::new(&persons, args.style);
            print_draft(&draft, args.json)?;
        }
        Command::Ingest(args) => {
            let settings = resolve(&overrides)?;
            cmd_ingest(&settings, args)?;
        }
        Command::Gallery { action } => {
            let gallery = Gallery::open(data_dir.gallery_dir()?)?;
            match action {
                GalleryAction::List { json } => gallery_list(&gallery, json)?,
                GalleryAction::Show { id, json } => {
                    let card = gallery.get(&id)?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&card)?);
                    } else {
                        print_card(&card);
                    }
                }
                GalleryAction::Remove { id } => {
                    gallery.delete(&id)?;
                    println!("Removed card {id}");
                }
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Show { json } => {
                let settings = resolve(&overrides)?;
                config_show(&config_db, &settings, json)?;
            }
            ConfigAction::Set { key, value } => {
                settings::validate_key(&key)?;
                config_db.set_setting(&key, &value)?;
                println!("Set {key} = {value}");
            }
            ConfigAction::Clear { key } => {
                settings::validate_key(&key)?;
                if config_db.remove_setting(&key)? {
                    println!("Cleared {key}");
                } else {
                    println!("{key} was not set");
                }
            }
        },
        Command::Status(args) => {
            let settings = resolve(&overrides)?;
            cmd_status(&data_dir, &settings, args.json)?;
        }
        Command::Mcp => {
            let settings = resolve(&overrides)?;
            mcp::run_mcp(&settings)?;
        }
        Command::Completions(args) => args.generate(),
    }

    Ok(())
}

fn cmd_persons(store: &PersonStore, args: &cli::PersonsArgs) -> Result<()> {
    let persons = store.filter_persons(args.search.as_deref(), args.category);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&persons)?);
        return Ok(());
    }

    if persons.is_empty() {
        eprintln!("No persons found.");
        return Ok(());
    }
    for p in &persons {
        println!(
            "{:<32} {:<32} {:<13} {}",
            p.id,
            p.name,
            p.category,
            p.appearances.len()
        );
    }
    eprintln!("{} of {} persons", persons.len(), store.list_persons().len());
    Ok(())
}

fn cmd_categories(store: &PersonStore, json: bool) -> Result<()> {
    let categories = store.list_categories();

    if json {
        println!("{}", serde_json::to_string(categories)?);
        return Ok(());
    }

    for category in categories {
        let count = store.filter_persons(None, Some(*category)).len();
        println!("{category}: {count}");
    }
    Ok(())
}

fn print_draft(draft: &CardDraft, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(draft)?);
        return Ok(());
    }

    println!("Card {} ({})", draft.id, draft.style);
    println!("Featuring: {}", greeting::join_names(&draft.person_names));
    println!("\n{}\n", draft.greeting);
    println!("Image prompt:\n{}", draft.prompt);
    Ok(())
}

fn cmd_ingest(settings: &Settings, args: cli::IngestArgs) -> Result<()> {
    let categories = match &args.categories {
        Some(path) => CategoryTable::load(path)?,
        None => CategoryTable::builtin()?,
    };
    if categories.is_empty() {
        tracing::warn!("category table is empty, every person is 'Other'");
    }

    let options = IngestOptions {
        strip_prefix: args.strip_prefix,
        categories,
        source: Some(
            args.source
                .unwrap_or_else(|| args.raw.display().to_string()),
        ),
    };
    let output: PathBuf =
        args.output.unwrap_or_else(|| settings.persons_path.clone());

    let summary = ingestion::ingest_file(&args.raw, &output, &options)?;

    println!("Wrote {}", output.display());
    println!(
        "Persons: {}, appearances: {}",
        summary.total_persons, summary.total_appearances
    );
    for (category, count) in &summary.by_category {
        println!("  {category}: {count}");
    }
    Ok(())
}

fn gallery_list(gallery: &Gallery, json: bool) -> Result<()> {
    let cards = gallery.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cards)?);
        return Ok(());
    }

    if cards.is_empty() {
        eprintln!("No saved cards.");
        return Ok(());
    }
    for card in &cards {
        println!(
            "{}  {}  {:<11} {}",
            card.id,
            card.created_at.format("%Y-%m-%d %H:%M"),
            card.style,
            card.person_names.join(", ")
        );
    }
    Ok(())
}

fn print_card(card: &Card) {
    println!("Card {}", card.id);
    println!("Created: {}", card.created_at.to_rfc3339());
    println!("Style: {}", card.style);
    println!("Persons: {}", card.person_names.join(", "));
    if let Some(greeting) = &card.greeting {
        println!("Greeting: {greeting}");
    }
    println!("Image: {}", card.image_path);
}

fn config_show(
    config_db: &ConfigDb,
    settings: &Settings,
    json: bool,
) -> Result<()> {
    let stored = config_db.list_settings()?;
    let resolved = serde_json::json!({
        (settings::IMAGE_BASE_URL): settings.image_base_url,
        (settings::BIND): settings.bind.to_string(),
        (settings::PERSONS_PATH): settings.persons_path.display().to_string(),
        (settings::PAGES_DIR): settings
            .pages_dir
            .as_ref()
            .map(|p| p.display().to_string()),
    });

    if json {
        let stored: serde_json::Map<String, serde_json::Value> = stored
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "resolved": resolved,
                "stored": stored,
            }))?
        );
        return Ok(());
    }

    println!("Resolved:");
    if let Some(map) = resolved.as_object() {
        for (key, value) in map {
            let value = value.as_str().unwrap_or("(unset)");
            println!("  {key} = {value}");
        }
    }
    println!("Stored:");
    if stored.is_empty() {
        println!("  (none)");
    }
    for (key, value) in &stored {
        println!("  {key} = {value}");
    }
    Ok(())
}

fn cmd_status(
    data_dir: &DataDir,
    settings: &Settings,
    json: bool,
) -> Result<()> {
    let store = match PersonStore::load(&settings.persons_path) {
        Ok(store) => Some(store),
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };
    let cards = Gallery::open(data_dir.gallery_dir()?)?.list()?.len();

    let persons = store.as_ref().map(|s| s.list_persons().len());
    let appearances = store.as_ref().map(PersonStore::total_appearances);
    let last_updated = store.as_ref().and_then(|s| s.last_updated());

    if json {
        let status = serde_json::json!({
            "dataDir": data_dir.root().display().to_string(),
            "personsPath": settings.persons_path.display().to_string(),
            "persons": persons,
            "appearances": appearances,
            "lastUpdated": last_updated,
            "cards": cards,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Data directory: {}", data_dir.root().display());
    println!("Person snapshot: {}", settings.persons_path.display());
    match (persons, appearances) {
        (Some(persons), Some(appearances)) => {
            println!("Persons: {persons}");
            println!("Appearances: {appearances}");
            println!("Last updated: {}", last_updated.unwrap_or("unknown"));
        }
        _ => println!("Persons: not ingested yet (run `pagecard ingest`)"),
    }
    println!("Saved cards: {cards}");
    Ok(())
}
