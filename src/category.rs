//! Person categories and the name lookup table used to assign them.

use std::{collections::HashMap, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Closed set of person categories.
///
/// Variant order is the display order used for listings and for sorting
/// persons in a snapshot.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
pub enum Category {
    Primary,
    Political,
    Royalty,
    Business,
    Entertainment,
    Science,
    Legal,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Primary,
        Category::Political,
        Category::Royalty,
        Category::Business,
        Category::Entertainment,
        Category::Science,
        Category::Legal,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Primary => "Primary",
            Category::Political => "Political",
            Category::Royalty => "Royalty",
            Category::Business => "Business",
            Category::Entertainment => "Entertainment",
            Category::Science => "Science",
            Category::Legal => "Legal",
            Category::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::NotFound {
                kind: "category",
                name: s.to_string(),
            })
    }
}

const BUILTIN_TABLE: &str = include_str!("categories.json");

/// Maps display names to categories by exact, case-insensitive match.
///
/// Loaded from a JSON object of category name to list of person names:
///
/// ```json
/// { "Science": ["Ada Lovelace"], "Legal": ["Ruth Bader Ginsburg"] }
/// ```
///
/// A name listed under several categories resolves to the one that comes
/// first in display order.
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    by_name: HashMap<String, Category>,
}

impl CategoryTable {
    pub fn new(entries: HashMap<Category, Vec<String>>) -> Self {
        let mut by_name = HashMap::new();
        for category in Category::ALL {
            let Some(names) = entries.get(&category) else {
                continue;
            };
            for name in names {
                by_name.entry(name.to_lowercase()).or_insert(category);
            }
        }
        Self { by_name }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// The table compiled into the binary, used when `pagecard ingest` is
    /// not given one.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_TABLE)
    }

    fn parse(contents: &str) -> Result<Self> {
        let entries: HashMap<Category, Vec<String>> =
            serde_json::from_str(contents)?;
        Ok(Self::new(entries))
    }

    pub fn classify(&self, name: &str) -> Category {
        self.by_name
            .get(&name.to_lowercase())
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
