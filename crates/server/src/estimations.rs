//! Estimation record API endpoints

use api_types::estimation::{
    EstimationCreated, EstimationList, EstimationNew, EstimationSave, EstimationSummary,
    EstimationView,
};
use api_types::valuation::{PreEstimationView, ValuationRequest};
use axum::{
    Json,
    extract::{Path, State},
};
use engine::{EstimationRecord, EstimationStatus, PreEstimation};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

/// Handle requests for creating a new estimation record
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<EstimationNew>,
) -> Result<Json<EstimationCreated>, ServerError> {
    let identification = engine::Identification {
        address: payload.address,
        city: payload.city,
        postal_code: payload.postal_code,
        owner_name: payload.owner_name,
        owner_contact: payload.owner_contact,
        mandate_reference: payload.mandate_reference,
    };

    let id = state.engine.new_estimation(identification).await?;
    Ok(Json(EstimationCreated { id }))
}

/// Handle requests for listing estimation records
pub async fn list(
    State(state): State<ServerState>,
) -> Result<Json<EstimationList>, ServerError> {
    let estimations = state
        .engine
        .list_estimations()
        .await
        .into_iter()
        .map(|record| EstimationSummary {
            id: record.id,
            address: record.identification.address.clone(),
            city: record.identification.city.clone(),
            status: record.status.as_str().to_string(),
            updated_at: record.updated_at,
            value_mid_minor: (record.pre_estimation.value_mid_minor > 0)
                .then_some(record.pre_estimation.value_mid_minor),
        })
        .collect();

    Ok(Json(EstimationList { estimations }))
}

/// Handle requests for loading a single record
pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<ServerState>,
) -> Result<Json<EstimationView>, ServerError> {
    let (record, status) = state.engine.estimation(id).await?;
    Ok(Json(view(&record, status)?))
}

/// Handle requests for saving a record.
///
/// Saving is an upsert: an unknown id creates the record with the submitted
/// sections on top of the defaults. Omitted sections keep their current
/// value; submitted sections are decoded strictly and rejected with 422 when
/// malformed.
pub async fn save(
    Path(id): Path<Uuid>,
    State(state): State<ServerState>,
    Json(payload): Json<EstimationSave>,
) -> Result<Json<EstimationView>, ServerError> {
    let mut record = match state.engine.estimation(id).await {
        Ok((record, _)) => record,
        Err(engine::EngineError::KeyNotFound(_)) => {
            let mut record = EstimationRecord::new(engine::Identification::default());
            record.id = id;
            record
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(value) = payload.identification {
        record.identification = engine::decode_submitted_section("identification", value)?;
    }
    if let Some(value) = payload.characteristics {
        record.characteristics = engine::decode_submitted_section("characteristics", value)?;
    }
    if let Some(value) = payload.terrain_analysis {
        record.terrain_analysis = engine::decode_submitted_section("terrain_analysis", value)?;
    }
    if let Some(value) = payload.strategy_pitch {
        record.strategy_pitch = engine::decode_submitted_section("strategy_pitch", value)?;
    }
    if let Some(value) = payload.timeline {
        record.timeline = engine::decode_submitted_section("timeline", value)?;
    }
    if let Some(value) = payload.photos {
        record.photos = engine::decode_submitted_section("photos", value)?;
    }

    state.engine.save(record).await?;

    let (record, status) = state.engine.estimation(id).await?;
    Ok(Json(view(&record, status)?))
}

/// Handle requests for deleting a whole record
pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<ServerState>,
) -> Result<(), ServerError> {
    state.engine.delete_estimation(id).await?;
    Ok(())
}

/// Handle requests for recomputing the pre-estimation
pub async fn recalculate(
    Path(id): Path<Uuid>,
    State(state): State<ServerState>,
    Json(payload): Json<ValuationRequest>,
) -> Result<Json<PreEstimationView>, ServerError> {
    let context = engine::MarketContext {
        urgency: match payload.urgency {
            api_types::Urgency::Low => engine::Urgency::Low,
            api_types::Urgency::Normal => engine::Urgency::Normal,
            api_types::Urgency::High => engine::Urgency::High,
        },
        trend_bps: payload.trend_bps,
        visibility: payload.visibility,
        lux_mode: payload.lux_mode,
    };
    let sale_kind = match payload.sale_kind {
        api_types::SaleKind::Standard => engine::SaleKind::Standard,
        api_types::SaleKind::Exclusive => engine::SaleKind::Exclusive,
        api_types::SaleKind::OffMarket => engine::SaleKind::OffMarket,
    };

    let pre_estimation = state.engine.recalculate(id, context, sale_kind).await?;
    Ok(Json(pre_estimation_view(pre_estimation)))
}

fn pre_estimation_view(pre_estimation: PreEstimation) -> PreEstimationView {
    PreEstimationView {
        value_low_minor: pre_estimation.value_low_minor,
        value_mid_minor: pre_estimation.value_mid_minor,
        value_high_minor: pre_estimation.value_high_minor,
        price_per_m2_minor: pre_estimation.price_per_m2_minor,
        confidence: pre_estimation.confidence.as_str().to_string(),
        comparable_count: pre_estimation.comparable_count,
        missing_inputs: pre_estimation.missing_inputs,
    }
}

fn view(
    record: &EstimationRecord,
    status: EstimationStatus,
) -> Result<EstimationView, ServerError> {
    Ok(EstimationView {
        id: record.id,
        status: status.as_str().to_string(),
        created_at: record.created_at,
        updated_at: record.updated_at,
        identification: to_value(&record.identification)?,
        characteristics: to_value(&record.characteristics)?,
        terrain_analysis: to_value(&record.terrain_analysis)?,
        pre_estimation: to_value(&record.pre_estimation)?,
        strategy_pitch: to_value(&record.strategy_pitch)?,
        timeline: to_value(&record.timeline)?,
        photos: to_value(&record.photos)?,
    })
}

fn to_value<T: serde::Serialize>(section: &T) -> Result<serde_json::Value, ServerError> {
    serde_json::to_value(section)
        .map_err(|err| ServerError::Generic(format!("unencodable section: {err}")))
}
