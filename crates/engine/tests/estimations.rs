use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, Statement,
};
use uuid::Uuid;

use engine::{
    Comparable, Condition, Confidence, Engine, EngineError, EstimationRecord, EstimationStatus,
    Identification, MarketContext, SaleKind, StrategyPitch, record,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn lyon_identification() -> Identification {
    Identification {
        address: "12 rue de la République".to_string(),
        city: "Lyon".to_string(),
        postal_code: "69001".to_string(),
        owner_name: "A. Martin".to_string(),
        ..Identification::default()
    }
}

fn lyon_comparable(price_minor: i64, surface_m2: f64) -> Comparable {
    Comparable::new(
        None,
        "Lyon".to_string(),
        "69001".to_string(),
        surface_m2,
        3,
        price_minor,
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        false,
    )
    .unwrap()
}

#[tokio::test]
async fn new_estimation_is_a_fully_populated_draft() {
    let (engine, _db) = engine_with_db().await;

    let id = engine.new_estimation(lyon_identification()).await.unwrap();
    let (record, status) = engine.estimation(id).await.unwrap();

    assert_eq!(status, EstimationStatus::Draft);
    assert_eq!(record.identification.city, "Lyon");
    assert_eq!(record.characteristics.condition, Condition::Good);
    assert_eq!(record.pre_estimation.confidence, Confidence::Insufficient);
    assert!(record.timeline.milestones.is_empty());
}

#[tokio::test]
async fn load_fills_missing_and_malformed_sections_from_defaults() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    // A row written by an older client: characteristics absent, timeline
    // corrupted, identification intact.
    let id = Uuid::new_v4();
    let identification = lyon_identification();
    let now = Utc::now();
    record::ActiveModel {
        id: ActiveValue::Set(id.to_string()),
        status: ActiveValue::Set("synced".to_string()),
        revision: ActiveValue::Set(1),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
        identification: ActiveValue::Set(Some(
            serde_json::to_string(&identification).unwrap(),
        )),
        characteristics: ActiveValue::Set(None),
        terrain_analysis: ActiveValue::Set(None),
        pre_estimation: ActiveValue::Set(None),
        strategy_pitch: ActiveValue::Set(None),
        timeline: ActiveValue::Set(Some("{definitely not json".to_string())),
        photos: ActiveValue::Set(None),
    }
    .insert(&db)
    .await
    .unwrap();

    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    let (loaded, status) = engine.estimation(id).await.unwrap();

    assert_eq!(status, EstimationStatus::Synced);
    assert_eq!(loaded.identification, identification);
    assert_eq!(loaded.characteristics, engine::Characteristics::default());
    assert!(loaded.timeline.milestones.is_empty());
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let (engine, db) = engine_with_db().await;

    let id = engine.new_estimation(lyon_identification()).await.unwrap();
    let (mut record, _) = engine.estimation(id).await.unwrap();
    record.characteristics.surface_m2 = 80.0;
    record.characteristics.rooms = 3;
    record.characteristics.condition = Condition::Excellent;
    record.strategy_pitch.pitch = "Lumineux, dernier étage".to_string();

    let status = engine.save(record.clone()).await.unwrap();
    assert_eq!(status, EstimationStatus::Synced);

    // A fresh engine sees exactly what was saved.
    let reloaded_engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    let (reloaded, status) = reloaded_engine.estimation(id).await.unwrap();
    assert_eq!(status, EstimationStatus::Synced);
    assert_eq!(reloaded.characteristics, record.characteristics);
    assert_eq!(reloaded.strategy_pitch, record.strategy_pitch);
    assert_eq!(reloaded.identification, record.identification);
}

#[tokio::test]
async fn save_inserts_a_never_seen_record() {
    let (engine, db) = engine_with_db().await;

    let mut record = EstimationRecord::new(lyon_identification());
    record.characteristics.surface_m2 = 64.0;
    let id = record.id;

    assert_eq!(engine.save(record).await.unwrap(), EstimationStatus::Synced);

    let (loaded, status) = engine.estimation(id).await.unwrap();
    assert_eq!(status, EstimationStatus::Synced);
    assert_eq!(loaded.characteristics.surface_m2, 64.0);

    // The insert landed in the store, not just in memory.
    let rebuilt = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    let (reloaded, _) = rebuilt.estimation(id).await.unwrap();
    assert_eq!(reloaded.identification.city, "Lyon");
}

#[tokio::test]
async fn save_failure_leaves_local_state_unchanged() {
    let (engine, db) = engine_with_db().await;

    let id = engine.new_estimation(lyon_identification()).await.unwrap();
    let (loaded, _) = engine.estimation(id).await.unwrap();

    // Break the store out from under the engine.
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(
        backend,
        "DROP TABLE estimations".to_string(),
    ))
    .await
    .unwrap();

    let mut update = loaded.clone();
    update.strategy_pitch.pitch = "never stored".to_string();
    assert!(engine.save(update).await.is_err());

    let (after, status) = engine.estimation(id).await.unwrap();
    assert_eq!(status, EstimationStatus::Error);
    // Sections are exactly the previously loaded ones.
    assert_eq!(after.strategy_pitch, loaded.strategy_pitch);
    assert_eq!(after.characteristics, loaded.characteristics);
}

#[tokio::test]
async fn stale_revision_write_is_ignored_by_the_store() {
    let (engine, db) = engine_with_db().await;

    let id = engine.new_estimation(lyon_identification()).await.unwrap();

    // Simulate a newer save having already landed in the store.
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE estimations SET revision = 100, strategy_pitch = ? WHERE id = ?",
        vec![
            r#"{"pitch":"newer save"}"#.into(),
            id.to_string().into(),
        ],
    ))
    .await
    .unwrap();

    let (mut record, _) = engine.estimation(id).await.unwrap();
    record.strategy_pitch.pitch = "older save".to_string();
    // The superseded save still reports success; the newer state wins.
    assert_eq!(
        engine.save(record).await.unwrap(),
        EstimationStatus::Synced
    );

    let row = record::Entity::find_by_id(id.to_string())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.revision, 100);
    assert!(row.strategy_pitch.unwrap().contains("newer save"));
}

#[tokio::test]
async fn concurrent_saves_converge_on_the_newest_revision() {
    // A single pooled connection keeps every task on the same in-memory
    // SQLite database.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Arc::new(
        Engine::builder()
            .database(db.clone())
            .build()
            .await
            .unwrap(),
    );

    let id = engine.new_estimation(lyon_identification()).await.unwrap();
    let (record, _) = engine.estimation(id).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let engine = Arc::clone(&engine);
        let mut update = record.clone();
        update.strategy_pitch.pitch = format!("save {i}");
        handles.push(tokio::spawn(async move { engine.save(update).await }));
    }
    for handle in handles {
        // Superseded saves still report success.
        assert_eq!(handle.await.unwrap().unwrap(), EstimationStatus::Synced);
    }

    // Whatever the interleaving, the row carries the highest revision and
    // the in-memory record matches it.
    let row = record::Entity::find_by_id(id.to_string())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.revision, 11);

    let (in_memory, status) = engine.estimation(id).await.unwrap();
    assert_eq!(status, EstimationStatus::Synced);
    let stored: StrategyPitch = serde_json::from_str(&row.strategy_pitch.unwrap()).unwrap();
    assert_eq!(in_memory.strategy_pitch, stored);
}

#[tokio::test]
async fn delete_removes_the_whole_aggregate() {
    let (engine, db) = engine_with_db().await;

    let id = engine.new_estimation(lyon_identification()).await.unwrap();
    engine.delete_estimation(id).await.unwrap();

    assert_eq!(
        engine.estimation(id).await.unwrap_err(),
        EngineError::KeyNotFound("estimation not exists".to_string())
    );
    assert_eq!(
        engine.delete_estimation(id).await.unwrap_err(),
        EngineError::KeyNotFound("estimation not exists".to_string())
    );

    let rebuilt = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    assert!(rebuilt.estimation(id).await.is_err());
}

#[tokio::test]
async fn recalculate_uses_the_city_history_and_persists() {
    let (engine, db) = engine_with_db().await;

    let id = engine.new_estimation(lyon_identification()).await.unwrap();
    let (mut record, _) = engine.estimation(id).await.unwrap();
    record.characteristics.surface_m2 = 80.0;
    record.characteristics.rooms = 3;
    engine.save(record).await.unwrap();

    for i in 0..5 {
        engine
            .add_comparable(lyon_comparable(20_000_000 + i * 400_000, 78.0))
            .await
            .unwrap();
    }
    // A sale in another city must not leak into the history.
    engine
        .add_comparable(
            Comparable::new(
                None,
                "Paris".to_string(),
                "75011".to_string(),
                40.0,
                2,
                48_000_000,
                NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
                false,
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let pre = engine
        .recalculate(id, MarketContext::default(), SaleKind::Exclusive)
        .await
        .unwrap();
    assert_eq!(pre.comparable_count, 5);
    assert_eq!(pre.confidence, Confidence::Medium);
    assert!(pre.value_mid_minor > 0);

    let rebuilt = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    let (reloaded, _) = rebuilt.estimation(id).await.unwrap();
    assert_eq!(reloaded.pre_estimation, pre);
    assert_eq!(reloaded.strategy_pitch.sale_kind, SaleKind::Exclusive);
}

#[tokio::test]
async fn comparables_match_on_normalized_city() {
    let (engine, _db) = engine_with_db().await;

    engine
        .add_comparable(
            Comparable::new(
                None,
                "Saint-Étienne".to_string(),
                "42000".to_string(),
                60.0,
                3,
                9_000_000,
                NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
                false,
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let found = engine.comparables_for("saint etienne").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].city, "Saint-Étienne");
}

#[tokio::test]
async fn duplicate_comparable_id_is_rejected() {
    let (engine, _db) = engine_with_db().await;

    let id = Uuid::new_v4();
    let comparable = Comparable::new(
        Some(id),
        "Lyon".to_string(),
        "69003".to_string(),
        70.0,
        3,
        21_000_000,
        NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
        false,
    )
    .unwrap();

    engine.add_comparable(comparable.clone()).await.unwrap();
    assert_eq!(
        engine.add_comparable(comparable).await.unwrap_err(),
        EngineError::ExistingKey(id.to_string())
    );
}
