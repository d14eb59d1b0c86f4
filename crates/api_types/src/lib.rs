use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// How the property is put on the market.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleKind {
    #[default]
    Standard,
    Exclusive,
    OffMarket,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
}

pub mod estimation {
    use super::*;

    /// Request body for creating a record; everything else starts at its
    /// section default.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct EstimationNew {
        pub address: String,
        pub city: String,
        pub postal_code: String,
        #[serde(default)]
        pub owner_name: String,
        #[serde(default)]
        pub owner_contact: String,
        #[serde(default)]
        pub mandate_reference: Option<String>,
    }

    /// A full record as it travels over the wire.
    ///
    /// Sections are generic JSON values; the engine owns their shape and
    /// validates writes strictly.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct EstimationView {
        pub id: Uuid,
        pub status: String,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
        pub identification: Value,
        pub characteristics: Value,
        pub terrain_analysis: Value,
        pub pre_estimation: Value,
        pub strategy_pitch: Value,
        pub timeline: Value,
        pub photos: Value,
    }

    /// Request body for saving a record. Omitted sections keep their
    /// current value.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct EstimationSave {
        #[serde(default)]
        pub identification: Option<Value>,
        #[serde(default)]
        pub characteristics: Option<Value>,
        #[serde(default)]
        pub terrain_analysis: Option<Value>,
        #[serde(default)]
        pub strategy_pitch: Option<Value>,
        #[serde(default)]
        pub timeline: Option<Value>,
        #[serde(default)]
        pub photos: Option<Value>,
    }

    /// One row of the record list.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct EstimationSummary {
        pub id: Uuid,
        pub address: String,
        pub city: String,
        pub status: String,
        pub updated_at: DateTime<Utc>,
        pub value_mid_minor: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EstimationList {
        pub estimations: Vec<EstimationSummary>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct EstimationCreated {
        pub id: Uuid,
    }
}

pub mod valuation {
    use super::*;

    /// Request body for a valuation run.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ValuationRequest {
        #[serde(default)]
        pub sale_kind: SaleKind,
        #[serde(default)]
        pub urgency: Urgency,
        #[serde(default)]
        pub trend_bps: i64,
        /// Visibility capital, 0 to 100; defaults to neutral.
        #[serde(default = "default_visibility")]
        pub visibility: u8,
        #[serde(default)]
        pub lux_mode: bool,
    }

    fn default_visibility() -> u8 {
        50
    }

    /// The computed pre-estimation.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PreEstimationView {
        pub value_low_minor: i64,
        pub value_mid_minor: i64,
        pub value_high_minor: i64,
        pub price_per_m2_minor: i64,
        pub confidence: String,
        pub comparable_count: u32,
        pub missing_inputs: Vec<String>,
    }
}

pub mod comparable {
    use super::*;

    /// Request body for registering a comparable past sale.
    ///
    /// The optional id makes imports from external datasets idempotent.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ComparableNew {
        #[serde(default)]
        pub id: Option<Uuid>,
        pub city: String,
        pub postal_code: String,
        pub surface_m2: f64,
        pub rooms: u8,
        pub sale_price_minor: i64,
        pub sold_at: NaiveDate,
        #[serde(default)]
        pub luxury: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ComparableView {
        pub id: Uuid,
        pub city: String,
        pub postal_code: String,
        pub surface_m2: f64,
        pub rooms: u8,
        pub sale_price_minor: i64,
        pub sold_at: NaiveDate,
        pub luxury: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ComparableList {
        pub comparables: Vec<ComparableView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ComparableCreated {
        pub id: Uuid,
    }
}
