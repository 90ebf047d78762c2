//! PostgreSQL reference store over the MGD schema

use async_trait::async_trait;
use mrkcoord_common::{MrkCoordError, Result};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, info, warn};

use super::{
    AccessionRow, AssociationDeletion, AssociationRow, CollectionRow, FeatureTypeRow, MarkerRow,
    OwnerRow, ReferenceStore, LOADABLE_STATUS_KEYS, MARKER_MGI_TYPE, MGI_LOGICAL_DB,
    MIRBASE_LOGICAL_DB, MOUSE_ORGANISM_KEY, UNKNOWN_CHROMOSOME,
};
use crate::db::DbError;
use crate::delete::FeatureStore;

/// [`ReferenceStore`] backed by an MGD database
#[derive(Clone)]
pub struct PgReferenceStore {
    pool: PgPool,
}

impl PgReferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn delete_one(
        tx: &mut Transaction<'_, Postgres>,
        deletion: &AssociationDeletion,
    ) -> std::result::Result<u64, sqlx::Error> {
        sqlx::query("DELETE FROM acc_accessionreference WHERE _accession_key = $1")
            .bind(deletion.accession_key)
            .execute(&mut **tx)
            .await?;

        let result = sqlx::query(
            r#"
            DELETE FROM acc_accession
            WHERE _accession_key = $1
              AND _logicaldb_key = $2
              AND _mgitype_key = $3
            "#,
        )
        .bind(deletion.accession_key)
        .bind(MIRBASE_LOGICAL_DB)
        .bind(MARKER_MGI_TYPE)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }
}

fn db_error(err: sqlx::Error) -> MrkCoordError {
    DbError::from(err).into()
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn accessions(&self, ids: &[String]) -> Result<Vec<AccessionRow>> {
        sqlx::query_as::<_, AccessionRow>(
            r#"
            SELECT a.accid AS acc_id,
                   a._mgitype_key AS mgi_type_key,
                   t.name AS mgi_type,
                   a._logicaldb_key AS logical_db_key,
                   a._object_key AS object_key,
                   a.preferred = 1 AS preferred
            FROM acc_accession a
            JOIN acc_mgitype t ON t._mgitype_key = a._mgitype_key
            WHERE a.accid = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn markers(&self, ids: &[String]) -> Result<Vec<MarkerRow>> {
        sqlx::query_as::<_, MarkerRow>(
            r#"
            SELECT a.accid AS acc_id,
                   a.preferred = 1 AS preferred,
                   m._marker_key AS marker_key,
                   m.symbol,
                   m.chromosome,
                   m._marker_status_key AS status_key,
                   s.status,
                   p.accid AS primary_id
            FROM acc_accession a
            JOIN mrk_marker m ON m._marker_key = a._object_key
            JOIN mrk_status s ON s._marker_status_key = m._marker_status_key
            LEFT JOIN acc_accession p
                   ON p._object_key = m._marker_key
                  AND p._mgitype_key = $2
                  AND p._logicaldb_key = $3
                  AND p.preferred = 1
            WHERE a.accid = ANY($1)
              AND a._mgitype_key = $2
              AND a._logicaldb_key = $3
            ORDER BY a.accid
            "#,
        )
        .bind(ids)
        .bind(MARKER_MGI_TYPE)
        .bind(MGI_LOGICAL_DB)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn feature_types(&self, ids: &[String]) -> Result<Vec<FeatureTypeRow>> {
        sqlx::query_as::<_, FeatureTypeRow>(
            r#"
            SELECT a.accid AS acc_id, c.term
            FROM acc_accession a
            JOIN mrk_mcv_cache c ON c._marker_key = a._object_key
            WHERE a.accid = ANY($1)
              AND a._mgitype_key = $2
              AND a._logicaldb_key = $3
              AND a.preferred = 1
              AND c.qualifier = 'D'
            "#,
        )
        .bind(ids)
        .bind(MARKER_MGI_TYPE)
        .bind(MGI_LOGICAL_DB)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn chromosomes(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT chromosome
            FROM mrk_chromosome
            WHERE _organism_key = $1
              AND chromosome != $2
            "#,
        )
        .bind(MOUSE_ORGANISM_KEY)
        .bind(UNKNOWN_CHROMOSOME)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn marker_associations(&self, ids: &[String]) -> Result<Vec<AssociationRow>> {
        sqlx::query_as::<_, AssociationRow>(
            r#"
            SELECT a.accid AS mgi_id,
                   m._marker_key AS marker_key,
                   m.symbol,
                   mb.accid AS external_id,
                   mb._accession_key AS accession_key
            FROM acc_accession a
            JOIN mrk_marker m ON m._marker_key = a._object_key
            JOIN acc_accession mb
                 ON mb._object_key = m._marker_key
                AND mb._mgitype_key = $2
                AND mb._logicaldb_key = $4
            WHERE a.accid = ANY($1)
              AND a._mgitype_key = $2
              AND a._logicaldb_key = $3
              AND a.prefixpart = 'MGI:'
              AND m._organism_key = $5
              AND m._marker_status_key = ANY($6)
            "#,
        )
        .bind(ids)
        .bind(MARKER_MGI_TYPE)
        .bind(MGI_LOGICAL_DB)
        .bind(MIRBASE_LOGICAL_DB)
        .bind(MOUSE_ORGANISM_KEY)
        .bind(&LOADABLE_STATUS_KEYS[..])
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn association_owners(&self, external_ids: &[String]) -> Result<Vec<OwnerRow>> {
        sqlx::query_as::<_, OwnerRow>(
            r#"
            SELECT DISTINCT mb.accid AS external_id, a.accid AS mgi_id
            FROM acc_accession mb
            JOIN mrk_marker m ON m._marker_key = mb._object_key
            JOIN mrk_location_cache lc ON lc._marker_key = m._marker_key
            JOIN acc_accession a
                 ON a._object_key = m._marker_key
                AND a._mgitype_key = $2
                AND a._logicaldb_key = $3
                AND a.prefixpart = 'MGI:'
                AND a.preferred = 1
            WHERE mb.accid = ANY($1)
              AND mb._mgitype_key = $2
              AND mb._logicaldb_key = $4
              AND m._organism_key = $5
            "#,
        )
        .bind(external_ids)
        .bind(MARKER_MGI_TYPE)
        .bind(MGI_LOGICAL_DB)
        .bind(MIRBASE_LOGICAL_DB)
        .bind(MOUSE_ORGANISM_KEY)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn collections(&self) -> Result<Vec<CollectionRow>> {
        sqlx::query_as::<_, CollectionRow>(
            "SELECT DISTINCT name, abbreviation FROM map_coord_collection",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn builds(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT version FROM map_coordinate WHERE version IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn delete_associations(&self, deletions: &[AssociationDeletion]) -> Result<u64> {
        if deletions.is_empty() {
            return Ok(0);
        }
        info!(count = deletions.len(), "Deleting miRBase associations");

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut deleted = 0;
        let mut failures = Vec::new();

        for deletion in deletions {
            // one savepoint per association
            sqlx::query("SAVEPOINT association_savepoint")
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;

            match Self::delete_one(&mut tx, deletion).await {
                Ok(rows) => {
                    sqlx::query("RELEASE SAVEPOINT association_savepoint")
                        .execute(&mut *tx)
                        .await
                        .map_err(db_error)?;
                    debug!(
                        mgi_id = %deletion.mgi_id,
                        external_id = %deletion.external_id,
                        rows,
                        "Deleted association"
                    );
                    deleted += rows;
                },
                Err(e) => {
                    sqlx::query("ROLLBACK TO SAVEPOINT association_savepoint")
                        .execute(&mut *tx)
                        .await
                        .map_err(db_error)?;
                    error!(
                        mgi_id = %deletion.mgi_id,
                        external_id = %deletion.external_id,
                        error = %e,
                        "Failed to delete association"
                    );
                    failures.push(deletion.external_id.clone());
                },
            }
        }

        if !failures.is_empty() {
            tx.rollback().await.map_err(db_error)?;
            warn!(failed = failures.len(), "Association deletions rolled back");
            return Err(MrkCoordError::Database(format!(
                "{} of {} association deletions failed: {}",
                failures.len(),
                deletions.len(),
                failures.join(", ")
            )));
        }

        tx.commit().await.map_err(db_error)?;
        info!(deleted, "miRBase associations deleted");
        Ok(deleted)
    }
}

#[async_trait]
impl FeatureStore for PgReferenceStore {
    async fn features(&self, mgi_id: &str, collection: &str) -> Result<Vec<i32>> {
        sqlx::query_scalar::<_, i32>(
            r#"
            SELECT DISTINCT f._feature_key
            FROM acc_accession a
            JOIN mrk_marker m ON m._marker_key = a._object_key
            JOIN mrk_location_cache l ON l._marker_key = a._object_key
            JOIN map_coord_feature f
                 ON f._object_key = a._object_key
                AND f._mgitype_key = $3
            JOIN map_coordinate mc ON mc._map_key = f._map_key
            JOIN map_coord_collection c ON c._collection_key = mc._collection_key
            WHERE a.accid = $1
              AND a._mgitype_key = $3
              AND a._logicaldb_key = $4
              AND a.preferred = 1
              AND c.name = $2
            ORDER BY f._feature_key
            "#,
        )
        .bind(mgi_id)
        .bind(collection)
        .bind(MARKER_MGI_TYPE)
        .bind(MGI_LOGICAL_DB)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn delete_features(&self, feature_keys: &[i32]) -> Result<u64> {
        if feature_keys.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let result = sqlx::query("DELETE FROM map_coord_feature WHERE _feature_key = ANY($1)")
            .bind(feature_keys)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        info!(deleted = result.rows_affected(), "Coordinate features deleted");
        Ok(result.rows_affected())
    }
}
