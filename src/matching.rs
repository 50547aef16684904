//! Page matching and ranking.
//!
//! Given a set of person ids, every document page that mentions at least one
//! of them is scored and ranked. Pages mentioning more of the requested
//! persons always rank above pages mentioning fewer; within the same match
//! count, first pages and confident detections are preferred while deep
//! pages, contact-sheet style grids and crowded pages are pushed down.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::{
    error::{Error, Result},
    page_image::page_image_url,
    store::{Person, PersonStore},
};

/// Weight of the cubed match count. Dominates every other adjustment.
const MATCH_WEIGHT: i64 = 10_000;
const FIRST_PAGE_BONUS: i64 = 100;
const LATE_PAGE: u32 = 10;
const LATE_PAGE_PENALTY: i64 = 20;
const DEEP_PAGE: u32 = 20;
const DEEP_PAGE_PENALTY: i64 = 50;
const TOP_CONFIDENCE: f64 = 99.9;
const TOP_CONFIDENCE_BONUS: i64 = 30;
const HIGH_CONFIDENCE: f64 = 99.0;
const HIGH_CONFIDENCE_BONUS: i64 = 15;
const GRID_PENALTY: i64 = 200;
/// A lone person detected this many times on one page marks a grid.
const GRID_SINGLE_PERSON_HITS: usize = 3;
const CROWDED_PAGE_HITS: usize = 6;
const CROWDED_PAGE_PENALTY: i64 = 20;
/// Keeps the lower tiers well below the smallest tier-one gap (70 000).
const MAX_CROWDED_PENALTY: i64 = 5_000;

/// Identity of a document page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey<'a> {
    pub document_id: &'a str,
    pub page_number: u32,
}

/// Facts about one page that feed its score.
#[derive(Debug, Clone, Copy)]
pub struct PageEvidence<'a> {
    /// Page number of the representative appearance.
    pub page_number: u32,
    /// Confidence of the representative appearance.
    pub confidence: f64,
    /// Number of raw detections for each distinct matched person.
    pub hits_per_person: &'a [usize],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageScore {
    pub score: i64,
    pub is_grid_layout: bool,
}

/// A ranked page in the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPage {
    pub rank: usize,
    pub image_url: String,
    pub matched_persons: Vec<String>,
    pub match_count: usize,
    pub confidence: f64,
    pub score: i64,
    pub is_grid_layout: bool,
    pub file: String,
    pub page: u32,
}

/// Every ranked page for one request, plus diagnostic counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMatchReport {
    pub pages: Vec<MatchedPage>,
    pub total_pages: usize,
    /// Number of ids in the request as sent, unknown ones included.
    pub total_requested: usize,
    /// Requested persons that exist and have at least one appearance.
    pub resolved_persons: usize,
    /// Match count of the top page, 0 when nothing matched.
    pub best_match_count: usize,
}

impl PageMatchReport {
    fn empty(total_requested: usize, resolved_persons: usize) -> Self {
        Self {
            pages: Vec::new(),
            total_pages: 0,
            total_requested,
            resolved_persons,
            best_match_count: 0,
        }
    }

    /// Keep only the first `limit` pages. `total_pages` follows, so it
    /// always counts the pages actually returned.
    pub fn limit_pages(&mut self, limit: usize) {
        self.pages.truncate(limit);
        self.total_pages = self.pages.len();
    }
}

#[derive(Debug, Clone, Copy)]
struct PageHit<'a> {
    person_name: &'a str,
    confidence: f64,
}

#[derive(Debug)]
struct PageGroup<'a> {
    key: PageKey<'a>,
    person_names: Vec<&'a str>,
    hits: Vec<PageHit<'a>>,
}

impl<'a> PageGroup<'a> {
    fn new(key: PageKey<'a>) -> Self {
        Self {
            key,
            person_names: Vec::new(),
            hits: Vec::new(),
        }
    }

    fn push(&mut self, person_name: &'a str, confidence: f64) {
        if !self.person_names.contains(&person_name) {
            self.person_names.push(person_name);
        }
        self.hits.push(PageHit {
            person_name,
            confidence,
        });
    }

    /// Highest-confidence detection; the earliest one wins ties.
    fn representative(&self) -> PageHit<'a> {
        self.hits
            .iter()
            .copied()
            .reduce(|best, hit| {
                if hit.confidence > best.confidence { hit } else { best }
            })
            .unwrap_or(PageHit {
                person_name: "",
                confidence: 0.0,
            })
    }

    fn hits_per_person(&self) -> Vec<usize> {
        self.person_names
            .iter()
            .map(|name| {
                self.hits.iter().filter(|h| h.person_name == *name).count()
            })
            .collect()
    }
}

/// Find and rank every page mentioning any of `person_ids`.
///
/// 1. Resolve ids against the store, dropping unknown ids, repeated ids and
///    persons without appearances
/// 2. Group all appearances of the resolved persons by page
/// 3. Score each page (see [`score_page`])
/// 4. Sort by score descending; equal scores keep discovery order
///
/// An empty id list is an [`Error::InvalidRequest`]. A list where nothing
/// resolves produces an empty report.
pub fn find_matching_pages<S: AsRef<str>>(
    store: &PersonStore,
    image_base_url: &str,
    person_ids: &[S],
) -> Result<PageMatchReport> {
    if person_ids.is_empty() {
        return Err(Error::InvalidRequest("personIds required".to_string()));
    }

    let persons = resolve_persons(store, person_ids);
    if persons.is_empty() {
        tracing::debug!(
            requested = person_ids.len(),
            "no requested person has appearances"
        );
        return Ok(PageMatchReport::empty(person_ids.len(), 0));
    }

    let groups = group_pages(&persons);

    let mut pages: Vec<MatchedPage> = groups
        .iter()
        .map(|group| {
            let representative = group.representative();
            let hits_per_person = group.hits_per_person();
            let PageScore {
                score,
                is_grid_layout,
            } = score_page(&PageEvidence {
                page_number: group.key.page_number,
                confidence: representative.confidence,
                hits_per_person: &hits_per_person,
            });

            MatchedPage {
                rank: 0, // Set after sorting
                image_url: page_image_url(
                    image_base_url,
                    group.key.document_id,
                    group.key.page_number,
                ),
                matched_persons: group
                    .person_names
                    .iter()
                    .map(|n| n.to_string())
                    .collect(),
                match_count: group.person_names.len(),
                confidence: representative.confidence,
                score,
                is_grid_layout,
                file: group.key.document_id.to_string(),
                page: group.key.page_number,
            }
        })
        .collect();

    // `sort_by` is stable, so ties stay in discovery order.
    pages.sort_by(|a, b| b.score.cmp(&a.score));
    for (i, page) in pages.iter_mut().enumerate() {
        page.rank = i + 1;
    }

    let mut breakdown: BTreeMap<usize, usize> = BTreeMap::new();
    for page in &pages {
        *breakdown.entry(page.match_count).or_default() += 1;
    }
    tracing::info!(
        pages = pages.len(),
        requested = person_ids.len(),
        resolved = persons.len(),
        "ranked matching pages"
    );
    tracing::debug!(?breakdown, "pages by match count");

    Ok(PageMatchReport {
        total_pages: pages.len(),
        total_requested: person_ids.len(),
        resolved_persons: persons.len(),
        best_match_count: pages.first().map_or(0, |p| p.match_count),
        pages,
    })
}

fn resolve_persons<'a, S: AsRef<str>>(
    store: &'a PersonStore,
    person_ids: &[S],
) -> Vec<&'a Person> {
    let mut seen = HashSet::new();
    person_ids
        .iter()
        .map(AsRef::as_ref)
        .filter(|id| seen.insert(*id))
        .filter_map(|id| store.get_person(id))
        .filter(|person| !person.appearances.is_empty())
        .collect()
}

fn group_pages<'a>(persons: &[&'a Person]) -> Vec<PageGroup<'a>> {
    let mut index: HashMap<PageKey<'a>, usize> = HashMap::new();
    let mut groups: Vec<PageGroup<'a>> = Vec::new();

    for person in persons {
        for appearance in &person.appearances {
            let key = PageKey {
                document_id: &appearance.document_id,
                page_number: appearance.page_number,
            };
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(PageGroup::new(key));
                groups.len() - 1
            });
            groups[slot].push(&person.name, appearance.confidence);
        }
    }

    groups
}

/// Score one page.
///
/// Tiers, highest first:
/// 1. `match_count³ × 10000`
/// 2. +100 on page 1; −50 from page 20, else −20 from page 10;
///    +30 above 99.9 confidence, else +15 above 99
/// 3. −200 for grid layouts: one person detected 3+ times, or two or more
///    persons each detected 2+ times
/// 4. −20 per detection beyond 6, capped at 5000
///
/// The cap departs from a plain `20 × (detections − 6)` only past 256
/// detections on one page. Without it such a page could sink below a page
/// with one fewer matched person, which would break tier one.
///
/// # Examples
///
/// ```
/// use pagecard::matching::{PageEvidence, score_page};
///
/// let score = score_page(&PageEvidence {
///     page_number: 1,
///     confidence: 99.95,
///     hits_per_person: &[1, 1],
/// });
/// assert_eq!(score.score, 80_130);
/// assert!(!score.is_grid_layout);
/// ```
pub fn score_page(evidence: &PageEvidence<'_>) -> PageScore {
    let match_count = evidence.hits_per_person.len() as i64;
    let total_hits: usize = evidence.hits_per_person.iter().sum();

    let mut score = match_count.pow(3) * MATCH_WEIGHT;

    if evidence.page_number == 1 {
        score += FIRST_PAGE_BONUS;
    }
    if evidence.page_number >= DEEP_PAGE {
        score -= DEEP_PAGE_PENALTY;
    } else if evidence.page_number >= LATE_PAGE {
        score -= LATE_PAGE_PENALTY;
    }

    if evidence.confidence > TOP_CONFIDENCE {
        score += TOP_CONFIDENCE_BONUS;
    } else if evidence.confidence > HIGH_CONFIDENCE {
        score += HIGH_CONFIDENCE_BONUS;
    }

    let is_grid_layout = match evidence.hits_per_person {
        [only] => *only >= GRID_SINGLE_PERSON_HITS,
        many => many.iter().filter(|&&hits| hits >= 2).count() >= 2,
    };
    if is_grid_layout {
        score -= GRID_PENALTY;
    }

    if total_hits > CROWDED_PAGE_HITS {
        let extra = (total_hits - CROWDED_PAGE_HITS) as i64;
        score -= extra
            .saturating_mul(CROWDED_PAGE_PENALTY)
            .min(MAX_CROWDED_PENALTY);
    }

    PageScore {
        score,
        is_grid_layout,
    }
}

/// Format a report for human-readable terminal output.
///
/// `limit` caps the number of pages printed; the totals always describe the
/// full report.
pub fn format_human(report: &PageMatchReport, limit: Option<usize>) {
    if report.pages.is_empty() {
        println!(
            "No pages found ({} of {} requested persons have appearances).",
            report.resolved_persons, report.total_requested
        );
        return;
    }

    let shown = limit.unwrap_or(report.pages.len());
    for p in report.pages.iter().take(shown) {
        let grid = if p.is_grid_layout { " grid" } else { "" };
        println!(
            "{:>3}. [{}] {}/{} {} p.{}{}",
            p.rank,
            p.score,
            p.match_count,
            report.resolved_persons,
            p.file,
            p.page,
            grid
        );
        println!("     {}", p.matched_persons.join(", "));
        println!("     {}", p.image_url);
    }
    println!(
        "\n{} page(s), best match {} of {} requested",
        report.total_pages, report.best_match_count, report.total_requested
    );
}

/// Format a report as JSON output.
pub fn format_json(report: &PageMatchReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
