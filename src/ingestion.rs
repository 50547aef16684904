//! Build the person snapshot from a raw face-detection export.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::Path,
};

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;

use crate::{
    category::{Category, CategoryTable},
    error::Result,
    person_id::PersonId,
    store::{Appearance, Person, Snapshot},
};

/// Export produced by the detection pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExport {
    #[serde(default)]
    pub unique_celebrities: Vec<String>,
    #[serde(default)]
    pub celebrity_appearances: HashMap<String, Vec<RawAppearance>>,
    #[serde(default)]
    pub processed_at: Option<serde_json::Value>,
    #[serde(default)]
    pub total_images: Option<u64>,
    #[serde(default)]
    pub images_with_celebrities: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAppearance {
    pub file: String,
    pub page: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Leading path removed from every appearance file.
    pub strip_prefix: Option<String>,
    pub categories: CategoryTable,
    /// Recorded verbatim as the snapshot's `source`.
    pub source: Option<String>,
}

/// Counts reported after writing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub total_persons: usize,
    pub total_appearances: usize,
    pub by_category: BTreeMap<Category, usize>,
}

/// Turn an export file path into a document id.
///
/// Removes `strip_prefix` when the path starts with it, then any leading
/// `/` and a trailing `.pdf`.
pub fn clean_document_path(path: &str, strip_prefix: Option<&str>) -> String {
    let path = strip_prefix
        .and_then(|prefix| path.strip_prefix(prefix))
        .unwrap_or(path);
    let path = path.trim_start_matches('/');
    path.strip_suffix(".pdf").unwrap_or(path).to_string()
}

pub fn build_snapshot(raw: RawExport, options: &IngestOptions) -> Snapshot {
    let mut seen = HashSet::new();
    let mut appearances_by_name = raw.celebrity_appearances;

    let mut persons: Vec<Person> = raw
        .unique_celebrities
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .map(|name| {
            let mut appearances: Vec<Appearance> = appearances_by_name
                .remove(&name)
                .unwrap_or_default()
                .into_iter()
                .map(|a| Appearance {
                    document_id: clean_document_path(
                        &a.file,
                        options.strip_prefix.as_deref(),
                    ),
                    page_number: a.page,
                    confidence: a.confidence,
                })
                .collect();
            appearances
                .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

            Person {
                id: PersonId::from_name(&name).to_string(),
                category: options.categories.classify(&name),
                name,
                image: None,
                appearances,
            }
        })
        .collect();

    persons.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut categories: Vec<Category> =
        persons.iter().map(|p| p.category).collect();
    categories.sort();
    categories.dedup();

    Snapshot {
        last_updated: Some(
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
        source: options.source.clone(),
        source_processed_at: raw.processed_at,
        total_persons: persons.len(),
        categories,
        persons,
    }
}

/// Read a raw export and write the snapshot to `output`.
pub fn ingest_file(
    raw_path: &Path,
    output: &Path,
    options: &IngestOptions,
) -> Result<IngestSummary> {
    let contents = std::fs::read_to_string(raw_path)?;
    let raw: RawExport = serde_json::from_str(&contents)?;

    tracing::info!(
        path = %raw_path.display(),
        total_images = raw.total_images,
        images_with_persons = raw.images_with_celebrities,
        unique_persons = raw.unique_celebrities.len(),
        "read detection export"
    );

    let snapshot = build_snapshot(raw, options);

    let mut by_category = BTreeMap::new();
    for person in &snapshot.persons {
        *by_category.entry(person.category).or_insert(0) += 1;
    }
    let summary = IngestSummary {
        total_persons: snapshot.total_persons,
        total_appearances: snapshot
            .persons
            .iter()
            .map(|p| p.appearances.len())
            .sum(),
        by_category,
    };

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = output.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(&snapshot)?)?;
    std::fs::rename(&tmp, output)?;

    for (category, count) in &summary.by_category {
        tracing::debug!(%category, count, "category breakdown");
    }
    tracing::info!(
        path = %output.display(),
        persons = summary.total_persons,
        appearances = summary.total_appearances,
        "wrote person snapshot"
    );

    Ok(summary)
}
