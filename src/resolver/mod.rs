//! Layered resolution of logical column names to live database columns.
//!
//! Questionnaire catalogs are written against export definitions that have
//! drifted from the warehouse: the catalog says `usubjid`, the table says
//! `usubjid_v2`; the catalog says `age`, the SQL template aliased
//! `pat_age AS age`. Resolution tries progressively looser strategies and
//! records how each hit was derived so downstream layers can log and
//! degrade instead of failing:
//!
//! 1. catalog/alias mapping reconciled against the live column set
//! 2. direct case-insensitive match
//! 3. subject-identifier containment (`usubjid` matches `usubjid_v2`)
//! 4. substring containment in either direction
//! 5. fuzzy similarity above a fixed threshold
//!
//! A name that survives none of these is *unresolved* - tracked, reported,
//! and rendered as null, never an error.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::TableDescriptor;

/// Similarity floor for fuzzy lookups of requested/filter columns.
pub const FUZZY_LOOKUP_THRESHOLD: f64 = 0.6;
/// Stricter floor when reconciling catalog names against mined SQL aliases.
pub const ALIAS_RECONCILE_THRESHOLD: f64 = 0.7;

/// Subject identifiers are extraction-critical and must resolve even with
/// naming drift, so any live column containing this token matches it.
const SUBJECT_ID_TOKEN: &str = "usubjid";

/// A live database column as reported by schema introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveColumn {
    pub name: String,
    pub data_type: String,
}

impl LiveColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// How a resolution was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Identity,
    Exact,
    PartialContain,
    Fuzzy,
}

/// One resolved column with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMatch {
    pub db_name: String,
    pub confidence: f64,
    pub kind: MatchKind,
}

/// Result of resolving a set of requested names against a live table.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Requested name -> match, in request order
    pub resolved: Vec<(String, ColumnMatch)>,
    /// Requested names with no database counterpart, in request order
    pub unresolved: Vec<String>,
}

impl Resolution {
    /// Distinct db column names in first-resolved order (two requested names
    /// may resolve to the same live column).
    pub fn db_columns(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for (_, m) in &self.resolved {
            if !seen.contains(&m.db_name) {
                seen.push(m.db_name.clone());
            }
        }
        seen
    }

    pub fn get(&self, requested: &str) -> Option<&ColumnMatch> {
        self.resolved
            .iter()
            .find(|(name, _)| name == requested)
            .map(|(_, m)| m)
    }
}

/// Normalized string similarity in [0, 1], case-insensitive.
///
/// Indel-based normalized similarity - the same longest-common-subsequence
/// family as a sequence-matcher ratio, which is what the matching thresholds
/// were tuned against.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    rapidfuzz::distance::indel::normalized_similarity(a.chars(), b.chars())
}

/// Resolver for one catalog table against one live column set.
pub struct ColumnResolver<'a> {
    table: &'a TableDescriptor,
    catalog_mapping: BTreeMap<String, ColumnMatch>,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(table: &'a TableDescriptor) -> Self {
        let catalog_mapping = build_catalog_mapping(table);
        Self {
            table,
            catalog_mapping,
        }
    }

    /// The catalog-name -> db-name mapping seeded from the table definition
    /// and its mined SQL aliases (lowercase keys).
    pub fn catalog_mapping(&self) -> &BTreeMap<String, ColumnMatch> {
        &self.catalog_mapping
    }

    /// Resolve every requested name against the live column set.
    ///
    /// Deterministic: live columns are scanned in enumeration order and
    /// fuzzy ties break toward the first-encountered column.
    pub fn resolve(&self, live: &[LiveColumn], requested: &[String]) -> Resolution {
        let mut resolution = Resolution::default();
        for name in requested {
            match self.find_matching_column(name, live) {
                Some(m) => resolution.resolved.push((name.clone(), m)),
                None => {
                    log::info!(
                        "Column '{}' not found in table '{}'; it will be returned as null",
                        name,
                        self.table.name
                    );
                    resolution.unresolved.push(name.clone());
                }
            }
        }
        resolution
    }

    /// Resolve a single ad-hoc name (also used for filter keys).
    pub fn find_matching_column(&self, name: &str, live: &[LiveColumn]) -> Option<ColumnMatch> {
        let lower = name.to_lowercase();

        // Strategy 1: catalog mapping, if its db-side name exists live.
        // An identity mapping that lands on a live column is an exact hit.
        if let Some(mapped) = self.catalog_mapping.get(&lower) {
            if let Some(col) = find_live(live, &mapped.db_name) {
                let kind = match mapped.kind {
                    MatchKind::Identity => MatchKind::Exact,
                    other => other,
                };
                return Some(ColumnMatch {
                    db_name: col.name.clone(),
                    confidence: mapped.confidence,
                    kind,
                });
            }
        }

        // Strategy 2: direct case-insensitive match
        if let Some(col) = find_live(live, &lower) {
            return Some(ColumnMatch {
                db_name: col.name.clone(),
                confidence: 1.0,
                kind: MatchKind::Exact,
            });
        }

        // Strategy 3: containment scan in enumeration order
        for col in live {
            let col_lower = col.name.to_lowercase();

            // Subject identifiers resolve on containment alone, whatever
            // the similarity score says
            if lower == SUBJECT_ID_TOKEN && col_lower.contains(SUBJECT_ID_TOKEN) {
                return Some(ColumnMatch {
                    db_name: col.name.clone(),
                    confidence: similarity(&lower, &col_lower),
                    kind: MatchKind::PartialContain,
                });
            }

            if col_lower.contains(&lower) || lower.contains(&col_lower) {
                return Some(ColumnMatch {
                    db_name: col.name.clone(),
                    confidence: similarity(&lower, &col_lower),
                    kind: MatchKind::PartialContain,
                });
            }
        }

        // Strategy 4: fuzzy fallback over every live column
        let mut best: Option<(&LiveColumn, f64)> = None;
        for col in live {
            let score = similarity(&lower, &col.name);
            // Strictly-greater keeps ties on the first-encountered column
            if score > FUZZY_LOOKUP_THRESHOLD && best.map_or(true, |(_, b)| score > b) {
                best = Some((col, score));
            }
        }
        if let Some((col, score)) = best {
            log::info!(
                "Fuzzy matched '{}' to '{}' with score {:.2}",
                name,
                col.name,
                score
            );
            return Some(ColumnMatch {
                db_name: col.name.clone(),
                confidence: score,
                kind: MatchKind::Fuzzy,
            });
        }

        None
    }
}

fn find_live<'l>(live: &'l [LiveColumn], name: &str) -> Option<&'l LiveColumn> {
    live.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Seed the catalog-name -> db-name mapping for a table.
///
/// Every catalog column starts as an identity mapping; when the table
/// shipped a SQL template, its mined aliases refine the db-side names:
/// exact alias hit, then containment, then fuzzy above the (stricter)
/// alias-reconciliation threshold.
fn build_catalog_mapping(table: &TableDescriptor) -> BTreeMap<String, ColumnMatch> {
    let mut mapping = BTreeMap::new();

    for col in &table.columns {
        mapping.insert(
            col.name.to_lowercase(),
            ColumnMatch {
                db_name: col.name.clone(),
                confidence: 1.0,
                kind: MatchKind::Identity,
            },
        );
    }

    if table.aliases.is_empty() {
        return mapping;
    }

    for (catalog_name, entry) in mapping.iter_mut() {
        // Exact alias hit (keys are lowercased at mining time)
        if table.aliases.contains_key(catalog_name) {
            entry.db_name = catalog_name.clone();
            entry.kind = MatchKind::Exact;
            continue;
        }

        // Containment in either direction
        if let Some(alias) = table
            .aliases
            .keys()
            .find(|a| catalog_name.contains(a.as_str()) || a.contains(catalog_name.as_str()))
        {
            entry.db_name = alias.clone();
            entry.confidence = similarity(catalog_name, alias);
            entry.kind = MatchKind::PartialContain;
            continue;
        }

        // Fuzzy reconciliation, stricter than ad-hoc lookups
        let mut best: Option<(&String, f64)> = None;
        for alias in table.aliases.keys() {
            let score = similarity(catalog_name, alias);
            if score > ALIAS_RECONCILE_THRESHOLD && best.map_or(true, |(_, b)| score > b) {
                best = Some((alias, score));
            }
        }
        if let Some((alias, score)) = best {
            entry.db_name = alias.clone();
            entry.confidence = score;
            entry.kind = MatchKind::Fuzzy;
        }
    }

    mapping
}
