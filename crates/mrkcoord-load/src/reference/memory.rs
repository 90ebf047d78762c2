//! In-memory reference store
//!
//! Holds a small, hand-built slice of the MGD schema. Used by tests and for
//! QC runs against fixture data.

use std::collections::BTreeSet;

use async_trait::async_trait;
use mrkcoord_common::{MrkCoordError, Result};
use tokio::sync::Mutex;

use super::{
    AccessionRow, AssociationDeletion, AssociationRow, CollectionRow, FeatureTypeRow, MarkerRow,
    OwnerRow, ReferenceStore, LOADABLE_STATUS_KEYS, MARKER_MGI_TYPE, MGI_LOGICAL_DB,
    MIRBASE_LOGICAL_DB, UNKNOWN_CHROMOSOME,
};

#[derive(Debug, Clone)]
struct Marker {
    key: i32,
    symbol: String,
    chromosome: String,
    status_key: i32,
}

#[derive(Debug, Clone)]
struct Accession {
    key: i32,
    acc_id: String,
    mgi_type_key: i32,
    mgi_type: String,
    logical_db_key: i32,
    object_key: i32,
    preferred: bool,
}

impl Accession {
    fn is_mgi_marker_id(&self) -> bool {
        self.logical_db_key == MGI_LOGICAL_DB && self.mgi_type_key == MARKER_MGI_TYPE
    }

    fn is_mirbase_id(&self) -> bool {
        self.logical_db_key == MIRBASE_LOGICAL_DB && self.mgi_type_key == MARKER_MGI_TYPE
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    markers: Vec<Marker>,
    accessions: Vec<Accession>,
    feature_types: Vec<(i32, String)>,
    chromosomes: Vec<String>,
    collections: Vec<CollectionRow>,
    builds: Vec<String>,
    next_accession_key: i32,
}

impl State {
    fn marker(&self, key: i32) -> Option<&Marker> {
        self.markers.iter().find(|m| m.key == key)
    }

    fn preferred_id(&self, marker_key: i32) -> Option<&str> {
        self.accessions
            .iter()
            .find(|a| a.is_mgi_marker_id() && a.preferred && a.object_key == marker_key)
            .map(|a| a.acc_id.as_str())
    }

    fn add_accession(
        &mut self,
        acc_id: &str,
        mgi_type_key: i32,
        mgi_type: &str,
        logical_db_key: i32,
        object_key: i32,
        preferred: bool,
    ) {
        self.next_accession_key += 1;
        self.accessions.push(Accession {
            key: self.next_accession_key,
            acc_id: acc_id.to_string(),
            mgi_type_key,
            mgi_type: mgi_type.to_string(),
            logical_db_key,
            object_key,
            preferred,
        });
    }
}

fn status_name(status_key: i32) -> &'static str {
    match status_key {
        1 => "official",
        2 => "withdrawn",
        3 => "interim",
        _ => "reserved",
    }
}

/// Fixture-backed [`ReferenceStore`]
#[derive(Debug, Default)]
pub struct MemoryReferenceStore {
    state: Mutex<State>,
    /// External IDs whose deletion fails
    failing_deletions: BTreeSet<String>,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mouse marker with its preferred MGI ID
    pub fn with_marker(
        mut self,
        mgi_id: &str,
        marker_key: i32,
        symbol: &str,
        chromosome: &str,
        status_key: i32,
    ) -> Self {
        let state = self.state.get_mut();
        state.markers.push(Marker {
            key: marker_key,
            symbol: symbol.to_string(),
            chromosome: chromosome.to_string(),
            status_key,
        });
        state.add_accession(mgi_id, MARKER_MGI_TYPE, "Marker", MGI_LOGICAL_DB, marker_key, true);
        self
    }

    /// Add a secondary (non-preferred) MGI ID for an existing marker
    pub fn with_secondary_id(mut self, mgi_id: &str, marker_key: i32) -> Self {
        self.state.get_mut().add_accession(
            mgi_id,
            MARKER_MGI_TYPE,
            "Marker",
            MGI_LOGICAL_DB,
            marker_key,
            false,
        );
        self
    }

    /// Add an MGI ID belonging to some other kind of object
    pub fn with_object_id(mut self, mgi_id: &str, mgi_type_key: i32, mgi_type: &str) -> Self {
        self.state
            .get_mut()
            .add_accession(mgi_id, mgi_type_key, mgi_type, MGI_LOGICAL_DB, 0, true);
        self
    }

    /// Set the feature type of a marker
    pub fn with_feature_type(mut self, marker_key: i32, term: &str) -> Self {
        self.state
            .get_mut()
            .feature_types
            .push((marker_key, term.to_string()));
        self
    }

    /// Associate a miRBase ID with the marker whose preferred ID is `mgi_id`
    pub fn with_association(mut self, mgi_id: &str, external_id: &str) -> Self {
        let state = self.state.get_mut();
        let marker_key = state
            .accessions
            .iter()
            .find(|a| a.is_mgi_marker_id() && a.acc_id == mgi_id)
            .map(|a| a.object_key);
        if let Some(marker_key) = marker_key {
            state.add_accession(
                external_id,
                MARKER_MGI_TYPE,
                "Marker",
                MIRBASE_LOGICAL_DB,
                marker_key,
                true,
            );
        }
        self
    }

    pub fn with_chromosomes<I, S>(mut self, chromosomes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .get_mut()
            .chromosomes
            .extend(chromosomes.into_iter().map(Into::into));
        self
    }

    pub fn with_collection(mut self, name: &str, abbreviation: &str) -> Self {
        self.state.get_mut().collections.push(CollectionRow {
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
        });
        self
    }

    pub fn with_build(mut self, build: &str) -> Self {
        self.state.get_mut().builds.push(build.to_string());
        self
    }

    /// Make the deletion of `external_id` fail
    pub fn with_failing_deletion(mut self, external_id: &str) -> Self {
        self.failing_deletions.insert(external_id.to_string());
        self
    }

    /// miRBase IDs currently associated with the marker identified by `mgi_id`
    pub async fn associated_ids(&self, mgi_id: &str) -> BTreeSet<String> {
        let state = self.state.lock().await;
        let Some(marker_key) = state
            .accessions
            .iter()
            .find(|a| a.is_mgi_marker_id() && a.acc_id == mgi_id)
            .map(|a| a.object_key)
        else {
            return BTreeSet::new();
        };
        state
            .accessions
            .iter()
            .filter(|a| a.is_mirbase_id() && a.object_key == marker_key)
            .map(|a| a.acc_id.clone())
            .collect()
    }
}

fn wanted(ids: &[String], id: &str) -> bool {
    ids.iter().any(|i| i == id)
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn accessions(&self, ids: &[String]) -> Result<Vec<AccessionRow>> {
        let state = self.state.lock().await;
        Ok(state
            .accessions
            .iter()
            .filter(|a| wanted(ids, &a.acc_id))
            .map(|a| AccessionRow {
                acc_id: a.acc_id.clone(),
                mgi_type_key: a.mgi_type_key,
                mgi_type: a.mgi_type.clone(),
                logical_db_key: a.logical_db_key,
                object_key: a.object_key,
                preferred: a.preferred,
            })
            .collect())
    }

    async fn markers(&self, ids: &[String]) -> Result<Vec<MarkerRow>> {
        let state = self.state.lock().await;
        Ok(state
            .accessions
            .iter()
            .filter(|a| a.is_mgi_marker_id() && wanted(ids, &a.acc_id))
            .filter_map(|a| {
                let marker = state.marker(a.object_key)?;
                Some(MarkerRow {
                    acc_id: a.acc_id.clone(),
                    preferred: a.preferred,
                    marker_key: marker.key,
                    symbol: marker.symbol.clone(),
                    chromosome: marker.chromosome.clone(),
                    status_key: marker.status_key,
                    status: status_name(marker.status_key).to_string(),
                    primary_id: state.preferred_id(marker.key).map(str::to_string),
                })
            })
            .collect())
    }

    async fn feature_types(&self, ids: &[String]) -> Result<Vec<FeatureTypeRow>> {
        let state = self.state.lock().await;
        let mut rows = Vec::new();
        for accession in state
            .accessions
            .iter()
            .filter(|a| a.is_mgi_marker_id() && a.preferred && wanted(ids, &a.acc_id))
        {
            for (marker_key, term) in &state.feature_types {
                if *marker_key == accession.object_key {
                    rows.push(FeatureTypeRow {
                        acc_id: accession.acc_id.clone(),
                        term: term.clone(),
                    });
                }
            }
        }
        Ok(rows)
    }

    async fn chromosomes(&self) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .chromosomes
            .iter()
            .filter(|c| c.as_str() != UNKNOWN_CHROMOSOME)
            .cloned()
            .collect())
    }

    async fn marker_associations(&self, ids: &[String]) -> Result<Vec<AssociationRow>> {
        let state = self.state.lock().await;
        let mut rows = Vec::new();
        for accession in state
            .accessions
            .iter()
            .filter(|a| a.is_mgi_marker_id() && wanted(ids, &a.acc_id))
        {
            let Some(marker) = state.marker(accession.object_key) else {
                continue;
            };
            if !LOADABLE_STATUS_KEYS.contains(&marker.status_key) {
                continue;
            }
            for association in state
                .accessions
                .iter()
                .filter(|a| a.is_mirbase_id() && a.object_key == marker.key)
            {
                rows.push(AssociationRow {
                    mgi_id: accession.acc_id.clone(),
                    marker_key: marker.key,
                    symbol: marker.symbol.clone(),
                    external_id: association.acc_id.clone(),
                    accession_key: association.key,
                });
            }
        }
        Ok(rows)
    }

    async fn association_owners(&self, external_ids: &[String]) -> Result<Vec<OwnerRow>> {
        let state = self.state.lock().await;
        Ok(state
            .accessions
            .iter()
            .filter(|a| a.is_mirbase_id() && wanted(external_ids, &a.acc_id))
            .filter_map(|a| {
                Some(OwnerRow {
                    external_id: a.acc_id.clone(),
                    mgi_id: state.preferred_id(a.object_key)?.to_string(),
                })
            })
            .collect())
    }

    async fn collections(&self) -> Result<Vec<CollectionRow>> {
        Ok(self.state.lock().await.collections.clone())
    }

    async fn builds(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().await.builds.clone())
    }

    async fn delete_associations(&self, deletions: &[AssociationDeletion]) -> Result<u64> {
        let mut state = self.state.lock().await;
        let snapshot = state.clone();

        let mut deleted = 0;
        let mut failed = Vec::new();
        for deletion in deletions {
            if self.failing_deletions.contains(&deletion.external_id) {
                failed.push(deletion.external_id.clone());
                continue;
            }
            let before = state.accessions.len();
            state.accessions.retain(|a| a.key != deletion.accession_key);
            deleted += (before - state.accessions.len()) as u64;
        }

        if !failed.is_empty() {
            *state = snapshot;
            return Err(MrkCoordError::Database(format!(
                "{} of {} association deletions failed: {}",
                failed.len(),
                deletions.len(),
                failed.join(", ")
            )));
        }
        Ok(deleted)
    }
}
