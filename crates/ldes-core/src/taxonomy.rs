//! Closed reference taxonomy of storage technologies and market players.
//!
//! Loaded once per process and shared behind an `Arc`; nothing mutates it
//! after construction.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

const BUILTIN_COMPANIES: &str = include_str!("../data/companies.json");
const BUILTIN_TECHNOLOGIES: &str = include_str!("../data/technologies.json");

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Malformed taxonomy: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Duplicate taxonomy id: {0}")]
    DuplicateId(String),
    #[error("Empty canonical name for id: {0}")]
    EmptyName(String),
}

pub type TaxonomyResult<T> = Result<T, TaxonomyError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    Company,
    Technology,
}

impl EntityClass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Technology => "technology",
        }
    }
}

impl std::fmt::Display for EntityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityClass {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company" => Ok(Self::Company),
            "technology" => Ok(Self::Technology),
            _ => Err(crate::Error::InvalidEntityClass(s.to_string())),
        }
    }
}

/// One canonical identity with its known surface forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl CanonicalEntity {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            aliases: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Canonical name followed by every alias.
    pub fn surface_forms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

pub type CanonicalCompany = CanonicalEntity;
pub type CanonicalTechnology = CanonicalEntity;

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    entries: Vec<CanonicalEntity>,
}

#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    companies: Vec<CanonicalCompany>,
    technologies: Vec<CanonicalTechnology>,
}

impl Taxonomy {
    pub fn new(
        companies: Vec<CanonicalCompany>,
        technologies: Vec<CanonicalTechnology>,
    ) -> TaxonomyResult<Self> {
        check_entries(&companies)?;
        check_entries(&technologies)?;
        Ok(Self {
            companies,
            technologies,
        })
    }

    /// The taxonomy bundled with the crate.
    pub fn builtin() -> TaxonomyResult<Self> {
        Self::from_json(BUILTIN_COMPANIES, BUILTIN_TECHNOLOGIES)
    }

    pub fn from_json(companies: &str, technologies: &str) -> TaxonomyResult<Self> {
        let companies: TaxonomyFile = serde_json::from_str(companies)?;
        let technologies: TaxonomyFile = serde_json::from_str(technologies)?;
        Self::new(companies.entries, technologies.entries)
    }

    /// Load from files, falling back to the bundled list for any path not given.
    pub fn load(companies: Option<&Path>, technologies: Option<&Path>) -> TaxonomyResult<Self> {
        let companies = match companies {
            Some(p) => read(p)?,
            None => BUILTIN_COMPANIES.to_string(),
        };
        let technologies = match technologies {
            Some(p) => read(p)?,
            None => BUILTIN_TECHNOLOGIES.to_string(),
        };
        Self::from_json(&companies, &technologies)
    }

    #[must_use]
    pub fn entries(&self, class: EntityClass) -> &[CanonicalEntity] {
        match class {
            EntityClass::Company => &self.companies,
            EntityClass::Technology => &self.technologies,
        }
    }

    #[must_use]
    pub fn get(&self, class: EntityClass, id: &str) -> Option<&CanonicalEntity> {
        self.entries(class).iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.companies.len() + self.technologies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read(path: &Path) -> TaxonomyResult<String> {
    std::fs::read_to_string(path).map_err(|source| TaxonomyError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn check_entries(entries: &[CanonicalEntity]) -> TaxonomyResult<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.name.trim().is_empty() {
            return Err(TaxonomyError::EmptyName(entry.id.clone()));
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(TaxonomyError::DuplicateId(entry.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_loads() {
        let taxonomy = Taxonomy::builtin().unwrap();

        assert!(!taxonomy.entries(EntityClass::Company).is_empty());
        assert!(taxonomy.get(EntityClass::Technology, "iron-air").is_some());
        assert!(taxonomy.get(EntityClass::Company, "form-energy").is_some());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = Taxonomy::new(
            vec![
                CanonicalEntity::new("acme", "Acme Storage Inc."),
                CanonicalEntity::new("acme", "Acme Power"),
            ],
            vec![],
        );
        assert!(matches!(result, Err(TaxonomyError::DuplicateId(id)) if id == "acme"));
    }

    #[test]
    fn test_surface_forms() {
        let entity = CanonicalEntity::new("caes", "Compressed air (CAES)")
            .with_aliases(["CAES", "compressed air energy storage"]);
        let forms: Vec<&str> = entity.surface_forms().collect();
        assert_eq!(forms, vec!["Compressed air (CAES)", "CAES", "compressed air energy storage"]);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Taxonomy::load(Some(Path::new("/nonexistent/companies.json")), None);
        assert!(matches!(result, Err(TaxonomyError::Read { .. })));
    }

    #[test]
    fn test_entity_class_parse() {
        assert_eq!("company".parse::<EntityClass>().unwrap(), EntityClass::Company);
        assert!("person".parse::<EntityClass>().is_err());
    }
}
