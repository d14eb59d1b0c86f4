//! Comparable sales API endpoints

use api_types::comparable::{ComparableCreated, ComparableList, ComparableNew, ComparableView};
use axum::{
    Json,
    extract::{Path, State},
};
use engine::Comparable;

use crate::{ServerError, server::ServerState};

/// Handle requests for registering a comparable past sale
pub async fn add(
    State(state): State<ServerState>,
    Json(payload): Json<ComparableNew>,
) -> Result<Json<ComparableCreated>, ServerError> {
    let comparable = Comparable::new(
        payload.id,
        payload.city,
        payload.postal_code,
        payload.surface_m2,
        payload.rooms,
        payload.sale_price_minor,
        payload.sold_at,
        payload.luxury,
    )?;

    let id = state.engine.add_comparable(comparable).await?;
    Ok(Json(ComparableCreated { id }))
}

/// Handle requests for listing the comparables of a city
pub async fn list(
    Path(city): Path<String>,
    State(state): State<ServerState>,
) -> Result<Json<ComparableList>, ServerError> {
    let comparables = state
        .engine
        .comparables_for(&city)
        .await?
        .into_iter()
        .map(|comparable| ComparableView {
            id: comparable.id,
            city: comparable.city,
            postal_code: comparable.postal_code,
            surface_m2: comparable.surface_m2,
            rooms: comparable.rooms,
            sale_price_minor: comparable.sale_price_minor,
            sold_at: comparable.sold_at,
            luxury: comparable.luxury,
        })
        .collect();

    Ok(Json(ComparableList { comparables }))
}
