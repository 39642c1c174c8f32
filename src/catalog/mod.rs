//! Static study/table/column catalog.
//!
//! The catalog is loaded once at startup from a directory of YAML
//! descriptors (see [`config`]) and is read-only afterwards; handlers share
//! it behind an `Arc`. A study whose files fail to load is quarantined
//! rather than taking the whole process down: lookups against it surface a
//! [`CatalogError::StudyLoadFailure`] while every other study stays
//! servable.

pub mod alias_mining;
pub mod config;
pub mod errors;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub use config::StudyMetadata;
pub use errors::CatalogError;

use config::{StudyDefinition, StudyRegistryFile, TableFile};

/// A single catalog-declared column: logical name plus the semantic type
/// declared by the questionnaire definition (`integer`, `text`, ...).
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    pub description: Option<String>,
}

/// One questionnaire table within a study.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub name: String,
    pub description: String,
    /// Database schema holding the live table
    pub schema: String,
    pub columns: Vec<ColumnDescriptor>,
    /// Lowercase alias -> source expression, mined from the SQL template
    pub aliases: BTreeMap<String, String>,
}

impl TableDescriptor {
    /// Schema-qualified, quoted identifier for SQL generation.
    pub fn qualified_name(&self) -> String {
        format!("{}.\"{}\"", self.schema, self.name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A study and its table descriptors, immutable after load.
#[derive(Debug, Clone)]
pub struct StudyEntry {
    pub study_id: String,
    pub title: String,
    pub description: String,
    pub schema: String,
    pub metadata: StudyMetadata,
    pub last_updated: Option<String>,
    pub tables: Vec<TableDescriptor>,
}

impl StudyEntry {
    /// Case-insensitive table lookup.
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// Process-wide registry of studies keyed by study id.
#[derive(Debug, Default)]
pub struct StudyCatalog {
    studies: BTreeMap<String, StudyEntry>,
    load_failures: BTreeMap<String, String>,
}

impl StudyCatalog {
    /// Load the catalog from a directory containing `studies.yml` and one
    /// subdirectory of table definitions per study.
    ///
    /// A missing or malformed `studies.yml` is fatal. A broken individual
    /// study is recorded as a load failure and skipped.
    pub fn load(dir: &Path) -> Result<Self, CatalogError> {
        let registry_path = dir.join("studies.yml");
        let raw = fs::read_to_string(&registry_path)
            .map_err(|e| CatalogError::read_error(&registry_path, e))?;
        let registry: StudyRegistryFile =
            serde_yaml::from_str(&raw).map_err(|e| CatalogError::parse_error(&registry_path, e))?;

        let mut catalog = StudyCatalog::default();
        for definition in registry.studies {
            let study_id = definition.study_id.clone();
            match load_study(dir, definition) {
                Ok(entry) => {
                    catalog.studies.insert(study_id, entry);
                }
                Err(e) => {
                    log::error!("Failed to load study '{}': {}", study_id, e);
                    catalog.load_failures.insert(study_id, e.to_string());
                }
            }
        }

        log::info!(
            "Catalog loaded: {} studies, {} failed",
            catalog.studies.len(),
            catalog.load_failures.len()
        );
        Ok(catalog)
    }

    /// Build a catalog from already-constructed entries (used by tests).
    pub fn from_entries(entries: Vec<StudyEntry>) -> Self {
        let mut catalog = StudyCatalog::default();
        for entry in entries {
            catalog.studies.insert(entry.study_id.clone(), entry);
        }
        catalog
    }

    pub fn studies(&self) -> impl Iterator<Item = &StudyEntry> {
        self.studies.values()
    }

    pub fn study(&self, study_id: &str) -> Result<&StudyEntry, CatalogError> {
        if let Some(entry) = self.studies.get(study_id) {
            return Ok(entry);
        }
        if let Some(detail) = self.load_failures.get(study_id) {
            return Err(CatalogError::StudyLoadFailure {
                study_id: study_id.to_string(),
                detail: detail.clone(),
            });
        }
        Err(CatalogError::StudyNotFound {
            study_id: study_id.to_string(),
        })
    }

    pub fn list_tables(&self, study_id: &str) -> Result<&[TableDescriptor], CatalogError> {
        Ok(&self.study(study_id)?.tables)
    }

    pub fn table(&self, study_id: &str, table: &str) -> Result<&TableDescriptor, CatalogError> {
        let study = self.study(study_id)?;
        study
            .table(table)
            .ok_or_else(|| CatalogError::TableNotFound {
                study_id: study_id.to_string(),
                table: table.to_string(),
            })
    }
}

fn load_study(dir: &Path, definition: StudyDefinition) -> Result<StudyEntry, CatalogError> {
    let study_dir = dir.join(&definition.study_id);
    let mut tables = Vec::new();

    if study_dir.is_dir() {
        let entries =
            fs::read_dir(&study_dir).map_err(|e| CatalogError::read_error(&study_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CatalogError::read_error(&study_dir, e))?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if !is_yaml {
                continue;
            }
            tables.push(load_table(&path, &definition.schema)?);
        }
    } else {
        log::warn!(
            "Study '{}' has no table definition directory at {}",
            definition.study_id,
            study_dir.display()
        );
    }

    // Directory iteration order is platform-dependent
    tables.sort_by(|a, b| a.name.cmp(&b.name));

    let last_updated = definition
        .last_updated
        .as_deref()
        .and_then(config::normalize_last_updated);

    Ok(StudyEntry {
        study_id: definition.study_id,
        title: definition.title,
        description: definition.description,
        schema: definition.schema,
        metadata: definition.metadata,
        last_updated,
        tables,
    })
}

fn load_table(path: &Path, schema: &str) -> Result<TableDescriptor, CatalogError> {
    let raw = fs::read_to_string(path).map_err(|e| CatalogError::read_error(path, e))?;
    let file: TableFile =
        serde_yaml::from_str(&raw).map_err(|e| CatalogError::parse_error(path, e))?;

    let model = file
        .models
        .into_iter()
        .next()
        .ok_or_else(|| CatalogError::ConfigParseError {
            error: format!("{}: no models defined", path.display()),
        })?;

    // Companion SQL template next to the YAML file, if the export shipped one
    let sql_path = path.with_extension("sql");
    let aliases = match fs::read_to_string(&sql_path) {
        Ok(sql) => alias_mining::mine_aliases(&sql),
        Err(_) => BTreeMap::new(),
    };

    let columns = model
        .columns
        .into_iter()
        .map(|c| ColumnDescriptor {
            name: c.name,
            data_type: c.data_type,
            description: c.description,
        })
        .collect();

    Ok(TableDescriptor {
        name: model.name,
        description: model.description,
        schema: schema.to_string(),
        columns,
        aliases,
    })
}
