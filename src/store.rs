//! The immutable person/appearance table.

use std::{collections::HashMap, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    category::Category,
    error::{Error, Result},
};

/// One detection of a person on a document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    /// Cleaned document path without extension.
    #[serde(rename = "file")]
    pub document_id: String,
    /// 1-based page number.
    #[serde(rename = "page")]
    pub page_number: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub image: Option<String>,
    /// Sorted by descending confidence.
    #[serde(default)]
    pub appearances: Vec<Appearance>,
}

/// On-disk layout of `persons.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_processed_at: Option<serde_json::Value>,
    #[serde(default)]
    pub total_persons: usize,
    #[serde(default)]
    pub categories: Vec<Category>,
    pub persons: Vec<Person>,
}

/// Read-only lookup over every known person.
#[derive(Debug, Clone)]
pub struct PersonStore {
    persons: Vec<Person>,
    by_id: HashMap<String, usize>,
    categories: Vec<Category>,
    last_updated: Option<String>,
}

impl PersonStore {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        let store = Self::from_snapshot(snapshot);
        tracing::info!(
            path = %path.display(),
            persons = store.persons.len(),
            "loaded person snapshot"
        );
        Ok(store)
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut store = Self::from_persons(snapshot.persons);
        store.last_updated = snapshot.last_updated;
        store
    }

    pub fn from_persons(persons: Vec<Person>) -> Self {
        let mut by_id = HashMap::with_capacity(persons.len());
        for (idx, person) in persons.iter().enumerate() {
            // First entry wins when a snapshot repeats an id.
            by_id.entry(person.id.clone()).or_insert(idx);
        }

        let mut categories: Vec<Category> =
            persons.iter().map(|p| p.category).collect();
        categories.sort();
        categories.dedup();

        Self {
            persons,
            by_id,
            categories,
            last_updated: None,
        }
    }

    pub fn get_person(&self, id: &str) -> Option<&Person> {
        self.by_id.get(id).map(|&idx| &self.persons[idx])
    }

    pub fn list_persons(&self) -> &[Person] {
        &self.persons
    }

    /// Distinct categories present, in display order.
    pub fn list_categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    pub fn total_appearances(&self) -> usize {
        self.persons.iter().map(|p| p.appearances.len()).sum()
    }

    /// Persons whose name contains `search` (case-insensitive) and, when
    /// given, whose category equals `category`.
    pub fn filter_persons(
        &self,
        search: Option<&str>,
        category: Option<Category>,
    ) -> Vec<&Person> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        self.persons
            .iter()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .filter(|p| {
                needle
                    .as_deref()
                    .is_none_or(|n| p.name.to_lowercase().contains(n))
            })
            .collect()
    }
}

/// Outcome of loading the person store at startup.
///
/// A failed load leaves the process running; every caller that needs
/// person data gets [`Error::StoreUnavailable`] instead.
#[derive(Debug, Clone)]
pub enum StoreHandle {
    Ready(Arc<PersonStore>),
    Unavailable(Arc<str>),
}

impl StoreHandle {
    pub fn load(path: &Path) -> Self {
        match PersonStore::load(path) {
            Ok(store) => StoreHandle::Ready(Arc::new(store)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "could not load person snapshot"
                );
                StoreHandle::Unavailable(
                    format!("{}: {e}", path.display()).into(),
                )
            }
        }
    }

    pub fn get(&self) -> Result<&PersonStore> {
        match self {
            StoreHandle::Ready(store) => Ok(store),
            StoreHandle::Unavailable(reason) => {
                Err(Error::StoreUnavailable(reason.to_string()))
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, StoreHandle::Ready(_))
    }
}

impl From<PersonStore> for StoreHandle {
    fn from(store: PersonStore) -> Self {
        StoreHandle::Ready(Arc::new(store))
    }
}
