//! The estimation record aggregate and its sections.
//!
//! A record is always fully populated in memory: every section has a
//! documented default, and rows loaded from the database fill absent or
//! malformed sections from those defaults on a per-section basis instead of
//! rejecting the whole row.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, valuation::PreEstimation, valuation::SaleKind};

/// Lifecycle state of an estimation record.
///
/// `Draft` is a record created locally and never confirmed by a save,
/// `Synced` matches the stored row, `Error` marks a record whose last save
/// attempt failed (its sections are untouched and can be retried).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationStatus {
    #[default]
    Draft,
    Synced,
    Error,
}

impl EstimationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl TryFrom<&str> for EstimationStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, EngineError> {
        match value {
            "draft" => Ok(Self::Draft),
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            other => Err(EngineError::InvalidInput(format!(
                "invalid estimation status: {other}"
            ))),
        }
    }
}

/// Who and where: the property being estimated and its owner.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identification {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub owner_name: String,
    pub owner_contact: String,
    pub mandate_reference: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    #[default]
    Apartment,
    House,
    Studio,
    Loft,
}

/// Overall state of repair, from worst to best.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    ToRenovate,
    ToRefresh,
    #[default]
    Good,
    Excellent,
}

/// French energy-performance rating (DPE), A best to G worst.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyRating {
    A,
    B,
    C,
    #[default]
    D,
    E,
    F,
    G,
}

/// Structured property attributes, the main valuation input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Characteristics {
    pub kind: PropertyKind,
    pub surface_m2: f64,
    pub rooms: u8,
    pub bedrooms: u8,
    /// Floor number; `None` for houses.
    pub floor: Option<i16>,
    pub elevator: bool,
    /// Balcony/terrace/garden surface.
    pub outdoor_m2: f64,
    pub condition: Condition,
    pub energy: EnergyRating,
    pub year_built: Option<i32>,
}

impl Default for Characteristics {
    fn default() -> Self {
        Self {
            kind: PropertyKind::default(),
            surface_m2: 0.0,
            rooms: 0,
            bedrooms: 0,
            floor: None,
            elevator: false,
            outdoor_m2: 0.0,
            condition: Condition::default(),
            energy: EnergyRating::default(),
            year_built: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketTension {
    Buyers,
    #[default]
    Balanced,
    Sellers,
}

/// Local market analysis filled during the visit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainAnalysis {
    pub market_tension: MarketTension,
    /// Perceived demand for this kind of property, 0 to 100.
    pub demand_level: u8,
    pub avg_days_on_market: u32,
    pub notes: String,
}

impl Default for TerrainAnalysis {
    fn default() -> Self {
        Self {
            market_tension: MarketTension::default(),
            demand_level: 50,
            avg_days_on_market: 90,
            notes: String::new(),
        }
    }
}

/// Sales strategy attached to the record once a pre-estimation exists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyPitch {
    pub sale_kind: SaleKind,
    pub recommended_price_minor: Option<i64>,
    pub pitch: String,
    pub visibility_plan: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestone {
    pub label: String,
    pub target_date: Option<NaiveDate>,
    pub done: bool,
}

/// Planned milestones from mandate to sale.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeline {
    pub milestones: Vec<Milestone>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Photo {
    pub url: String,
    pub caption: String,
    pub order: u32,
}

/// Ordered photo references; storage/compression is someone else's job.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Photos {
    pub items: Vec<Photo>,
}

/// A property estimation record.
///
/// The aggregate the whole pipeline revolves around: created with defaults,
/// mutated incrementally, recalculated on input changes and persisted as a
/// whole. It is never partially destroyed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimationRecord {
    pub id: Uuid,
    pub status: EstimationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub identification: Identification,
    pub characteristics: Characteristics,
    pub terrain_analysis: TerrainAnalysis,
    pub pre_estimation: PreEstimation,
    pub strategy_pitch: StrategyPitch,
    pub timeline: Timeline,
    pub photos: Photos,
}

impl EstimationRecord {
    /// Creates a new record with every section at its default.
    pub fn new(identification: Identification) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: EstimationStatus::Draft,
            created_at: now,
            updated_at: now,
            identification,
            characteristics: Characteristics::default(),
            terrain_analysis: TerrainAnalysis::default(),
            pre_estimation: PreEstimation::default(),
            strategy_pitch: StrategyPitch::default(),
            timeline: Timeline::default(),
            photos: Photos::default(),
        }
    }

    /// Rebuilds a record from a stored row.
    ///
    /// Each section column is decoded independently; `NULL` or malformed JSON
    /// falls back to the section default while the other sections are kept.
    /// Returns `None` only when the row id is not a UUID, since no default
    /// can stand in for an identity.
    pub fn from_model(model: &Model) -> Option<(Self, i64)> {
        let id = Uuid::parse_str(&model.id).ok()?;
        let status = EstimationStatus::try_from(model.status.as_str())
            .unwrap_or(EstimationStatus::Synced);

        let record = Self {
            id,
            status,
            created_at: model.created_at,
            updated_at: model.updated_at,
            identification: decode_section(model.identification.as_deref()),
            characteristics: decode_section(model.characteristics.as_deref()),
            terrain_analysis: decode_section(model.terrain_analysis.as_deref()),
            pre_estimation: decode_section(model.pre_estimation.as_deref()),
            strategy_pitch: decode_section(model.strategy_pitch.as_deref()),
            timeline: decode_section(model.timeline.as_deref()),
            photos: decode_section(model.photos.as_deref()),
        };
        Some((record, model.revision))
    }

    /// Encodes the record into an active model at the given revision.
    pub fn to_active_model(&self, revision: i64) -> ResultEngine<ActiveModel> {
        Ok(ActiveModel {
            id: ActiveValue::Set(self.id.to_string()),
            status: ActiveValue::Set(self.status.as_str().to_string()),
            revision: ActiveValue::Set(revision),
            created_at: ActiveValue::Set(self.created_at),
            updated_at: ActiveValue::Set(self.updated_at),
            identification: ActiveValue::Set(Some(encode_section(&self.identification)?)),
            characteristics: ActiveValue::Set(Some(encode_section(&self.characteristics)?)),
            terrain_analysis: ActiveValue::Set(Some(encode_section(&self.terrain_analysis)?)),
            pre_estimation: ActiveValue::Set(Some(encode_section(&self.pre_estimation)?)),
            strategy_pitch: ActiveValue::Set(Some(encode_section(&self.strategy_pitch)?)),
            timeline: ActiveValue::Set(Some(encode_section(&self.timeline)?)),
            photos: ActiveValue::Set(Some(encode_section(&self.photos)?)),
        })
    }
}

fn decode_section<T: DeserializeOwned + Default>(raw: Option<&str>) -> T {
    raw.and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default()
}

fn encode_section<T: Serialize>(section: &T) -> ResultEngine<String> {
    serde_json::to_string(section)
        .map_err(|err| EngineError::InvalidInput(format!("unencodable section: {err}")))
}

/// Decodes a single section submitted by a client.
///
/// Unlike store loads, API writes are strict: a malformed section is an
/// error, not a silent default.
pub fn decode_submitted_section<T: DeserializeOwned>(
    name: &str,
    value: serde_json::Value,
) -> ResultEngine<T> {
    serde_json::from_value(value)
        .map_err(|err| EngineError::InvalidInput(format!("invalid {name} section: {err}")))
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "estimations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub status: String,
    /// Monotonic per-record save counter; guards against out-of-order writes.
    pub revision: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub identification: Option<String>,
    pub characteristics: Option<String>,
    pub terrain_analysis: Option<String>,
    pub pre_estimation: Option<String>,
    pub strategy_pitch: Option<String>,
    pub timeline: Option<String>,
    pub photos: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_have_documented_defaults() {
        let record = EstimationRecord::new(Identification::default());
        assert_eq!(record.status, EstimationStatus::Draft);
        assert_eq!(record.characteristics.condition, Condition::Good);
        assert_eq!(record.characteristics.energy, EnergyRating::D);
        assert_eq!(record.terrain_analysis.demand_level, 50);
        assert_eq!(record.terrain_analysis.avg_days_on_market, 90);
        assert!(record.timeline.milestones.is_empty());
        assert!(record.photos.items.is_empty());
    }

    #[test]
    fn from_model_fills_missing_and_malformed_sections() {
        let record = EstimationRecord::new(Identification {
            city: "Lyon".to_string(),
            ..Identification::default()
        });
        let model = Model {
            id: record.id.to_string(),
            status: "synced".to_string(),
            revision: 1,
            created_at: record.created_at,
            updated_at: record.updated_at,
            identification: Some(
                serde_json::to_string(&record.identification).unwrap(),
            ),
            characteristics: None,
            terrain_analysis: Some(
                serde_json::to_string(&record.terrain_analysis).unwrap(),
            ),
            pre_estimation: Some("{not json".to_string()),
            strategy_pitch: None,
            timeline: None,
            photos: None,
        };

        let (loaded, revision) = EstimationRecord::from_model(&model).unwrap();
        assert_eq!(revision, 1);
        assert_eq!(loaded.identification.city, "Lyon");
        assert_eq!(loaded.characteristics, Characteristics::default());
        assert_eq!(loaded.pre_estimation, crate::PreEstimation::default());
        assert_eq!(loaded.status, EstimationStatus::Synced);
    }

    #[test]
    fn from_model_rejects_only_bad_ids() {
        let model = Model {
            id: "not-a-uuid".to_string(),
            status: "draft".to_string(),
            revision: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            identification: None,
            characteristics: None,
            terrain_analysis: None,
            pre_estimation: None,
            strategy_pitch: None,
            timeline: None,
            photos: None,
        };
        assert!(EstimationRecord::from_model(&model).is_none());
    }

    #[test]
    fn status_string_codec_round_trips() {
        for status in [
            EstimationStatus::Draft,
            EstimationStatus::Synced,
            EstimationStatus::Error,
        ] {
            assert_eq!(EstimationStatus::try_from(status.as_str()), Ok(status));
        }
        assert!(EstimationStatus::try_from("archived").is_err());
    }
}
