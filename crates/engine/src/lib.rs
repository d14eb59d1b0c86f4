//! Estimation engine: domain types, the pure valuation component and the
//! persistence component reconciling records against the database.
//!
//! The in-memory map is the source of truth for reads; the database row is
//! only written through [`Engine::save`]-style guarded updates so an older
//! in-flight save can never clobber a newer one.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, SqlErr,
};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub use comparables::{Comparable, city_key};
pub use error::EngineError;
pub use money::MoneyCents;
pub use record::{
    Characteristics, Condition, EnergyRating, EstimationRecord, EstimationStatus, Identification,
    MarketTension, Milestone, Photo, Photos, PropertyKind, StrategyPitch, TerrainAnalysis,
    Timeline, decode_submitted_section,
};
pub use valuation::{Confidence, MarketContext, PreEstimation, SaleKind, Urgency, estimate};

pub mod comparables;
mod error;
mod money;
pub mod record;
pub mod valuation;

type ResultEngine<T> = Result<T, EngineError>;

#[derive(Debug)]
pub struct Engine {
    records: RwLock<HashMap<Uuid, EstimationRecord>>,
    /// Latest assigned save revision per record. A save whose revision is
    /// stale by commit time is superseded and leaves memory alone.
    revisions: Mutex<HashMap<Uuid, i64>>,
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Creates a record populated from section defaults and persists it.
    pub async fn new_estimation(&self, identification: Identification) -> ResultEngine<Uuid> {
        let record = EstimationRecord::new(identification);
        let id = record.id;

        record.to_active_model(1)?.insert(&self.database).await?;

        self.revisions.lock().await.insert(id, 1);
        self.records.write().await.insert(id, record);
        Ok(id)
    }

    /// Returns a record together with its lifecycle status.
    pub async fn estimation(
        &self,
        id: Uuid,
    ) -> ResultEngine<(EstimationRecord, EstimationStatus)> {
        let records = self.records.read().await;
        match records.get(&id) {
            Some(record) => Ok((record.clone(), record.status)),
            None => Err(EngineError::KeyNotFound("estimation not exists".to_string())),
        }
    }

    /// Lists all records, most recently updated first.
    pub async fn list_estimations(&self) -> Vec<EstimationRecord> {
        let records = self.records.read().await;
        let mut all: Vec<EstimationRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        all
    }

    /// Upserts a record. An id the store has never seen is inserted as a
    /// new row.
    ///
    /// Last-write-wins at the request layer: each save gets a fresh revision
    /// and both the database update and the in-memory apply are guarded by
    /// it, so an older save that commits late is silently superseded.
    ///
    /// On database failure the in-memory sections are left untouched (only
    /// the status flips to `Error`) and the error is surfaced to the caller.
    pub async fn save(&self, mut record: EstimationRecord) -> ResultEngine<EstimationStatus> {
        let known_since = {
            let records = self.records.read().await;
            records.get(&record.id).map(|existing| existing.created_at)
        };
        if let Some(created_at) = known_since {
            // Creation time is immutable.
            record.created_at = created_at;
        }
        record.updated_at = Utc::now();
        record.status = EstimationStatus::Synced;

        let revision = {
            let mut revisions = self.revisions.lock().await;
            let entry = revisions.entry(record.id).or_insert(0);
            *entry += 1;
            *entry
        };

        match self.persist(&record, revision, known_since.is_none()).await {
            Ok(()) => {
                let current = self
                    .revisions
                    .lock()
                    .await
                    .get(&record.id)
                    .copied()
                    .unwrap_or(revision);
                if current == revision {
                    self.records.write().await.insert(record.id, record);
                }
                Ok(EstimationStatus::Synced)
            }
            Err(err) => {
                if let Some(existing) = self.records.write().await.get_mut(&record.id) {
                    existing.status = EstimationStatus::Error;
                }
                Err(err)
            }
        }
    }

    /// Writes a record row, refusing to step on a newer revision.
    async fn persist(
        &self,
        record: &EstimationRecord,
        revision: i64,
        insert: bool,
    ) -> ResultEngine<()> {
        if insert {
            record.to_active_model(revision)?.insert(&self.database).await?;
            return Ok(());
        }

        let mut model = record.to_active_model(revision)?;
        model.id = ActiveValue::NotSet;

        // `rows_affected == 0` means a newer save already landed; that is a
        // success for the caller, the newer state simply wins.
        record::Entity::update_many()
            .set(model)
            .filter(record::Column::Id.eq(record.id.to_string()))
            .filter(record::Column::Revision.lt(revision))
            .exec(&self.database)
            .await?;
        Ok(())
    }

    /// Deletes the whole aggregate, row and memory.
    pub async fn delete_estimation(&self, id: Uuid) -> ResultEngine<()> {
        let result = record::Entity::delete_by_id(id.to_string())
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound("estimation not exists".to_string()));
        }
        self.records.write().await.remove(&id);
        self.revisions.lock().await.remove(&id);
        Ok(())
    }

    /// Recomputes the pre-estimation from the stored characteristics and the
    /// comparable history of the record's city, then persists it.
    pub async fn recalculate(
        &self,
        id: Uuid,
        context: MarketContext,
        sale_kind: SaleKind,
    ) -> ResultEngine<PreEstimation> {
        let (mut record, _) = self.estimation(id).await?;
        let comparables = self.comparables_for(&record.identification.city).await?;

        let pre_estimation = valuation::estimate(
            &record.characteristics,
            &comparables,
            &context,
            sale_kind,
        );

        record.pre_estimation = pre_estimation.clone();
        record.strategy_pitch.sale_kind = sale_kind;
        self.save(record).await?;
        Ok(pre_estimation)
    }

    /// Registers a comparable past sale.
    ///
    /// Duplicate detection rides on the primary key, so two concurrent
    /// inserts of the same id cannot both succeed.
    pub async fn add_comparable(&self, comparable: Comparable) -> ResultEngine<Uuid> {
        let id = comparable.id;
        match comparables::ActiveModel::from(&comparable)
            .insert(&self.database)
            .await
        {
            Ok(_) => Ok(id),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(EngineError::ExistingKey(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the comparables matching a city, newest sale first.
    pub async fn comparables_for(&self, city: &str) -> ResultEngine<Vec<Comparable>> {
        let key = comparables::city_key(city);
        let models = comparables::Entity::find()
            .filter(comparables::Column::CityKey.eq(key))
            .order_by_desc(comparables::Column::SoldAt)
            .order_by_asc(comparables::Column::Id)
            .all(&self.database)
            .await?;

        models.into_iter().map(Comparable::try_from).collect()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`, loading every stored record into memory.
    ///
    /// Rows with an unparsable id are skipped; absent or malformed section
    /// columns are filled from section defaults.
    pub async fn build(self) -> ResultEngine<Engine> {
        let mut records = HashMap::new();
        let mut revisions = HashMap::new();

        let models: Vec<record::Model> = record::Entity::find().all(&self.database).await?;
        for model in models {
            if let Some((record, revision)) = EstimationRecord::from_model(&model) {
                revisions.insert(record.id, revision);
                records.insert(record.id, record);
            }
        }

        Ok(Engine {
            records: RwLock::new(records),
            revisions: Mutex::new(revisions),
            database: self.database,
        })
    }
}
