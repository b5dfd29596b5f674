/// Static career datasets compiled into the binary.
///
/// The bundled catalog is the last source in the resolver chain. The transition seed is a
/// separate curated list used only to refill empty transition buckets; the two are
/// versioned independently.
use std::collections::HashSet;

use serde::Deserialize;
use tracing::{error, warn};

use crate::model::CareerRecord;

const BUNDLED_CATALOG: &str = include_str!("../data/bundled_catalog.json");
const TRANSITION_SEED: &str = include_str!("../data/transition_seed.json");

#[derive(Deserialize)]
struct DatasetFile {
    version: u32,
    careers: Vec<CareerRecord>,
}

/// A named, versioned, immutable set of career records.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: &'static str,
    version: u32,
    records: Vec<CareerRecord>,
}

/// The bundled fallback catalog.
pub type BundledCatalog = Dataset;

/// The curated transition fallback list.
pub type SeedDataset = Dataset;

impl Dataset {
    pub fn bundled_catalog() -> BundledCatalog {
        Self::parse("bundled_catalog", BUNDLED_CATALOG)
    }

    pub fn transition_seed() -> SeedDataset {
        Self::parse("transition_seed", TRANSITION_SEED)
    }

    pub fn from_records(name: &'static str, version: u32, records: Vec<CareerRecord>) -> Self {
        Self {
            name,
            version,
            records: dedup_by_id(name, records),
        }
    }

    /// A dataset that fails to parse is treated as empty.
    fn parse(name: &'static str, raw: &str) -> Self {
        match serde_json::from_str::<DatasetFile>(raw) {
            Ok(file) => Self::from_records(name, file.version, file.careers),
            Err(e) => {
                error!(dataset = name, error = %e, "failed to parse embedded dataset");
                Self::from_records(name, 0, Vec::new())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn records(&self) -> &[CareerRecord] {
        &self.records
    }
}

fn dedup_by_id(name: &str, records: Vec<CareerRecord>) -> Vec<CareerRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            let fresh = seen.insert(r.id.clone());
            if !fresh {
                warn!(dataset = name, id = %r.id, "duplicate career id dropped");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::record;
    use crate::model::Level;

    fn assert_well_formed(dataset: &Dataset) {
        assert!(dataset.version() >= 1, "{} has no version", dataset.name());
        assert!(!dataset.records().is_empty(), "{} is empty", dataset.name());

        let ids: HashSet<&str> = dataset.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), dataset.records().len());

        for level in Level::ALL {
            assert!(
                dataset.records().iter().any(|r| r.level == level),
                "{} has no {level} record",
                dataset.name()
            );
        }
    }

    #[test]
    fn bundled_catalog_is_well_formed() {
        let catalog = Dataset::bundled_catalog();
        assert_well_formed(&catalog);
        assert!(catalog.records().iter().all(|r| !r.skills.is_empty()));
        assert!(catalog.records().iter().all(|r| !r.industry_tag.is_empty()));
    }

    #[test]
    fn transition_seed_is_well_formed_and_disjoint() {
        let seed = Dataset::transition_seed();
        assert_well_formed(&seed);

        let catalog = Dataset::bundled_catalog();
        let catalog_ids: HashSet<&str> = catalog.records().iter().map(|r| r.id.as_str()).collect();
        assert!(seed.records().iter().all(|r| !catalog_ids.contains(r.id.as_str())));
    }

    #[test]
    fn malformed_dataset_is_empty() {
        let dataset = Dataset::parse("broken", "{\"version\": 1, \"careers\": [");
        assert!(dataset.records().is_empty());
        assert_eq!(dataset.version(), 0);
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let dataset = Dataset::from_records(
            "test",
            1,
            vec![
                record("a", "First", Level::Entry, &[]),
                record("a", "Second", Level::Expert, &[]),
            ],
        );
        assert_eq!(dataset.records().len(), 1);
        assert_eq!(dataset.records()[0].title, "First");
    }
}
