//! pagecard - find document pages where people appear together and turn
//! them into holiday cards.
//!
//! A person snapshot (built by `pagecard ingest` from a face-detection
//! export) lists every detection of each person as a document page. Given a
//! set of persons, [`matching::find_matching_pages`] ranks the pages that
//! show most of them together. The HTTP server, CLI and MCP server are thin
//! surfaces over that engine, the card [`greeting`] helpers and the file
//! backed card [`gallery`].
//!
//! # Quick start
//!
//! ```no_run
//! use pagecard::{ConfigDb, DataDir, PersonStore};
//! use pagecard::matching;
//! use pagecard::settings::{Overrides, Settings};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let config_db = ConfigDb::open(&data_dir.config_db()).unwrap();
//! let settings =
//!     Settings::resolve(&Overrides::default(), &config_db, &data_dir)
//!         .unwrap();
//!
//! let store = PersonStore::load(&settings.persons_path).unwrap();
//! let report = matching::find_matching_pages(
//!     &store,
//!     &settings.image_base_url,
//!     &["ada-lovelace", "alan-turing"],
//! )
//! .unwrap();
//!
//! for page in &report.pages {
//!     println!("{} {}/{} ({})", page.rank, page.file, page.page, page.score);
//! }
//! ```

pub mod category;
pub mod config_db;
pub mod data_dir;
pub mod error;
pub mod gallery;
pub mod greeting;
pub mod ingestion;
pub mod matching;
pub mod mcp;
pub mod page_image;
pub mod person_id;
pub mod server;
pub mod settings;
pub mod store;

pub use category::Category;
pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use gallery::Gallery;
pub use person_id::PersonId;
pub use store::{PersonStore, StoreHandle};
