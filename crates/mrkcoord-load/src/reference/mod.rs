//! Reference datastore access
//!
//! The QC checks never query the database one record at a time. Everything
//! they need is fetched up front through a [`ReferenceStore`] and indexed in
//! a run-scoped [`ReferenceIndex`], which is read-only once built.

pub mod memory;
pub mod postgres;

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use mrkcoord_common::Result;
use tracing::{debug, info};

use crate::record::CoordinateRecord;

pub use memory::MemoryReferenceStore;
pub use postgres::PgReferenceStore;

/// Logical database of MGI accession IDs
pub const MGI_LOGICAL_DB: i32 = 1;
/// Logical database of miRBase accession IDs
pub const MIRBASE_LOGICAL_DB: i32 = 83;
/// MGI type of markers
pub const MARKER_MGI_TYPE: i32 = 2;
/// MGI type of annotation evidence, which shares IDs with markers
pub const EVIDENCE_MGI_TYPE: i32 = 25;
/// MGI types an input ID may belong to without being a non-marker object
pub const MARKER_LIKE_MGI_TYPES: [i32; 2] = [MARKER_MGI_TYPE, EVIDENCE_MGI_TYPE];
/// Marker statuses a coordinate may be loaded for: official and interim
pub const LOADABLE_STATUS_KEYS: [i32; 2] = [1, 3];
pub const MOUSE_ORGANISM_KEY: i32 = 1;
/// Chromosome label meaning "unknown", never a valid feature chromosome
pub const UNKNOWN_CHROMOSOME: &str = "UN";
/// Feature type expected for markers carrying miRBase IDs
pub const MIRNA_FEATURE_TYPE: &str = "miRNA gene";

/// Any accession row matching an input identifier
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AccessionRow {
    pub acc_id: String,
    pub mgi_type_key: i32,
    /// Name of the MGI type, e.g. `Marker` or `Reference`
    pub mgi_type: String,
    pub logical_db_key: i32,
    pub object_key: i32,
    pub preferred: bool,
}

/// An MGI marker accession with the marker it identifies
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MarkerRow {
    pub acc_id: String,
    pub preferred: bool,
    pub marker_key: i32,
    pub symbol: String,
    pub chromosome: String,
    pub status_key: i32,
    pub status: String,
    /// Preferred MGI ID of the marker
    pub primary_id: Option<String>,
}

/// Feature type (MCV term) of a marker
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FeatureTypeRow {
    pub acc_id: String,
    pub term: String,
}

/// A miRBase ID currently associated with an input marker
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AssociationRow {
    pub mgi_id: String,
    pub marker_key: i32,
    pub symbol: String,
    pub external_id: String,
    pub accession_key: i32,
}

/// A marker currently associated with an input miRBase ID
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OwnerRow {
    pub external_id: String,
    pub mgi_id: String,
}

/// A coordinate collection known to the datastore
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CollectionRow {
    pub name: String,
    pub abbreviation: String,
}

impl CollectionRow {
    /// `name/abbreviation` key matching [`CoordinateRecord::source_display`]
    pub fn source_display(&self) -> String {
        format!("{}/{}", self.name, self.abbreviation)
    }
}

/// One miRBase association to remove in a live run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AssociationDeletion {
    pub accession_key: i32,
    pub mgi_id: String,
    pub external_id: String,
}

/// Read (and, for live runs, delete) access to the reference datastore
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Accession rows of any type for the given IDs
    async fn accessions(&self, ids: &[String]) -> Result<Vec<AccessionRow>>;

    /// MGI marker accessions (preferred or not) for the given IDs
    async fn markers(&self, ids: &[String]) -> Result<Vec<MarkerRow>>;

    /// Feature types of the markers whose preferred IDs are given
    async fn feature_types(&self, ids: &[String]) -> Result<Vec<FeatureTypeRow>>;

    /// Valid mouse chromosomes, without the unknown sentinel
    async fn chromosomes(&self) -> Result<Vec<String>>;

    /// miRBase associations of the official/interim mouse markers given
    async fn marker_associations(&self, ids: &[String]) -> Result<Vec<AssociationRow>>;

    /// Markers the datastore associates with the given miRBase IDs
    async fn association_owners(&self, external_ids: &[String]) -> Result<Vec<OwnerRow>>;

    async fn collections(&self) -> Result<Vec<CollectionRow>>;

    /// Genome builds of the coordinate maps already loaded
    async fn builds(&self) -> Result<Vec<String>>;

    /// Remove associations in a single unit of work
    ///
    /// Every deletion is attempted. When any of them fails nothing is kept
    /// and an error is returned. Returns the number of accessions removed.
    async fn delete_associations(&self, deletions: &[AssociationDeletion]) -> Result<u64>;
}

/// Current miRBase associations of one marker
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkerAssociations {
    pub marker_key: i32,
    pub symbol: String,
    /// Associated external ID to its accession key
    pub external_ids: HashMap<String, i32>,
}

impl MarkerAssociations {
    pub fn ids(&self) -> BTreeSet<String> {
        self.external_ids.keys().cloned().collect()
    }
}

/// Run-scoped, read-only index over the reference data a run needs
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    accessions: HashMap<String, Vec<AccessionRow>>,
    markers: HashMap<String, MarkerRow>,
    feature_types: HashMap<String, Vec<String>>,
    chromosomes: BTreeSet<String>,
    associations: HashMap<String, MarkerAssociations>,
    owners: HashMap<String, BTreeSet<String>>,
    collections: BTreeSet<String>,
    builds: BTreeSet<String>,
}

impl ReferenceIndex {
    /// Fetch everything the checks need for `records`
    ///
    /// All queries are independent and run concurrently.
    pub async fn load(store: &dyn ReferenceStore, records: &[CoordinateRecord]) -> Result<Self> {
        let ids: Vec<String> = records
            .iter()
            .map(|r| r.mgi_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let external_ids: Vec<String> = records
            .iter()
            .flat_map(|r| r.external_ids.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        debug!(
            identifiers = ids.len(),
            external_ids = external_ids.len(),
            "Loading reference data"
        );

        let (accessions, markers, feature_types, chromosomes, associations, owners, collections, builds) =
            tokio::try_join!(
                store.accessions(&ids),
                store.markers(&ids),
                store.feature_types(&ids),
                store.chromosomes(),
                store.marker_associations(&ids),
                store.association_owners(&external_ids),
                store.collections(),
                store.builds(),
            )?;

        let index = Self::from_rows(ReferenceRows {
            accessions,
            markers,
            feature_types,
            chromosomes,
            associations,
            owners,
            collections,
            builds,
        });

        info!(
            accessions = index.accessions.len(),
            markers = index.markers.len(),
            chromosomes = index.chromosomes.len(),
            associated_markers = index.associations.len(),
            collections = index.collections.len(),
            builds = index.builds.len(),
            "Reference data loaded"
        );
        Ok(index)
    }

    fn from_rows(rows: ReferenceRows) -> Self {
        let mut index = Self::default();

        for row in rows.accessions {
            index.accessions.entry(row.acc_id.clone()).or_default().push(row);
        }
        for row in rows.markers {
            index.markers.entry(row.acc_id.clone()).or_insert(row);
        }
        for row in rows.feature_types {
            index.feature_types.entry(row.acc_id).or_default().push(row.term);
        }
        index.chromosomes = rows.chromosomes.into_iter().collect();
        for row in rows.associations {
            let entry = index
                .associations
                .entry(row.mgi_id)
                .or_insert_with(|| MarkerAssociations {
                    marker_key: row.marker_key,
                    symbol: row.symbol.clone(),
                    external_ids: HashMap::new(),
                });
            entry.external_ids.insert(row.external_id, row.accession_key);
        }
        for row in rows.owners {
            index.owners.entry(row.external_id).or_default().insert(row.mgi_id);
        }
        index.collections = rows.collections.iter().map(CollectionRow::source_display).collect();
        index.builds = rows.builds.into_iter().collect();

        index
    }

    /// Accession rows of every kind for `id`
    pub fn accessions(&self, id: &str) -> &[AccessionRow] {
        self.accessions.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Marker identified (preferred or secondary) by `id`
    pub fn marker(&self, id: &str) -> Option<&MarkerRow> {
        self.markers.get(id)
    }

    /// Marker for which `id` is the preferred MGI ID
    pub fn preferred_marker(&self, id: &str) -> Option<&MarkerRow> {
        self.markers.get(id).filter(|m| m.preferred)
    }

    pub fn feature_types(&self, id: &str) -> &[String] {
        self.feature_types.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_valid_chromosome(&self, chromosome: &str) -> bool {
        chromosome != UNKNOWN_CHROMOSOME && self.chromosomes.contains(chromosome)
    }

    pub fn associations(&self, id: &str) -> Option<&MarkerAssociations> {
        self.associations.get(id)
    }

    /// Preferred MGI IDs the datastore associates with `external_id`
    pub fn owners(&self, external_id: &str) -> Option<&BTreeSet<String>> {
        self.owners.get(external_id)
    }

    pub fn has_collection(&self, source_display: &str) -> bool {
        self.collections.contains(source_display)
    }

    pub fn has_build(&self, build: &str) -> bool {
        self.builds.contains(build)
    }
}

/// Raw query results an index is built from
struct ReferenceRows {
    accessions: Vec<AccessionRow>,
    markers: Vec<MarkerRow>,
    feature_types: Vec<FeatureTypeRow>,
    chromosomes: Vec<String>,
    associations: Vec<AssociationRow>,
    owners: Vec<OwnerRow>,
    collections: Vec<CollectionRow>,
    builds: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(line: &str) -> CoordinateRecord {
        CoordinateRecord::from_line(line, 2).unwrap()
    }

    fn store() -> MemoryReferenceStore {
        MemoryReferenceStore::new()
            .with_marker("MGI:303", 303, "Mir303", "5", 1)
            .with_secondary_id("MGI:3030", 303)
            .with_association("MGI:303", "X1")
            .with_association("MGI:303", "X2")
            .with_chromosomes(["1", "5", "X", "UN"])
            .with_collection("NCBI", "NCBI Gene")
            .with_build("GRCm38")
    }

    #[tokio::test]
    async fn test_load_indexes_everything() {
        let records = vec![
            record("MGI:303\t5\t1\t2\t+\tNCBI\tNCBI Gene\tX1,X3"),
            record("MGI:3030\t5\t1\t2\t+\tNCBI\tNCBI Gene\t"),
        ];
        let index = ReferenceIndex::load(&store(), &records).await.unwrap();

        let marker = index.preferred_marker("MGI:303").unwrap();
        assert_eq!(marker.symbol, "Mir303");
        assert!(index.preferred_marker("MGI:3030").is_none());
        assert_eq!(
            index.marker("MGI:3030").unwrap().primary_id.as_deref(),
            Some("MGI:303")
        );

        let associations = index.associations("MGI:303").unwrap();
        assert_eq!(
            associations.ids(),
            BTreeSet::from(["X1".to_string(), "X2".to_string()])
        );
        assert_eq!(
            index.owners("X1").unwrap(),
            &BTreeSet::from(["MGI:303".to_string()])
        );
        assert!(index.owners("X3").is_none());

        assert!(index.is_valid_chromosome("5"));
        assert!(!index.is_valid_chromosome("UN"));
        assert!(!index.is_valid_chromosome("Z"));
        assert!(index.has_collection("NCBI/NCBI Gene"));
        assert!(index.has_build("GRCm38"));
        assert!(!index.has_build("GRCm39"));
    }

    #[tokio::test]
    async fn test_unknown_identifier_has_no_rows() {
        let records = vec![record("MGI:999\t1\t1\t2\t+")];
        let index = ReferenceIndex::load(&store(), &records).await.unwrap();
        assert!(index.accessions("MGI:999").is_empty());
        assert!(index.marker("MGI:999").is_none());
        assert!(index.feature_types("MGI:999").is_empty());
    }
}
