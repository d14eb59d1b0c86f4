//! Comparable past sales, the history the valuation is grounded on.
//!
//! Comparables are matched to a record by normalized city name, so "Saint-Étienne"
//! and "saint etienne" land in the same bucket.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// A past transaction usable as a valuation input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparable {
    pub id: Uuid,
    pub city: String,
    pub postal_code: String,
    pub surface_m2: f64,
    pub rooms: u8,
    pub sale_price_minor: i64,
    pub sold_at: NaiveDate,
    /// Marks luxury-segment sales; lux-mode valuations only use these.
    pub luxury: bool,
}

impl Comparable {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Option<Uuid>,
        city: String,
        postal_code: String,
        surface_m2: f64,
        rooms: u8,
        sale_price_minor: i64,
        sold_at: NaiveDate,
        luxury: bool,
    ) -> ResultEngine<Self> {
        if sale_price_minor <= 0 {
            return Err(EngineError::InvalidInput(
                "sale_price_minor must be > 0".to_string(),
            ));
        }
        if !surface_m2.is_finite() || surface_m2 <= 0.0 {
            return Err(EngineError::InvalidInput(
                "surface_m2 must be > 0".to_string(),
            ));
        }
        if city.trim().is_empty() {
            return Err(EngineError::InvalidInput("city is required".to_string()));
        }
        Ok(Self {
            id: id.unwrap_or_else(Uuid::new_v4),
            city,
            postal_code,
            surface_m2,
            rooms,
            sale_price_minor,
            sold_at,
            luxury,
        })
    }

    /// Sale price per square meter, in cents.
    pub fn price_per_m2_minor(&self) -> i64 {
        (self.sale_price_minor as f64 / self.surface_m2).round() as i64
    }
}

/// Normalizes a city name into a lookup key.
///
/// NFKD-decomposes, drops combining marks, lowercases and collapses any
/// non-alphanumeric runs into single spaces.
pub fn city_key(city: &str) -> String {
    city.nfkd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "comparables")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub city: String,
    pub city_key: String,
    pub postal_code: String,
    pub surface_m2: f64,
    pub rooms: i32,
    pub sale_price_minor: i64,
    pub sold_at: Date,
    pub luxury: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Comparable> for ActiveModel {
    fn from(comparable: &Comparable) -> Self {
        Self {
            id: ActiveValue::Set(comparable.id.to_string()),
            city: ActiveValue::Set(comparable.city.clone()),
            city_key: ActiveValue::Set(city_key(&comparable.city)),
            postal_code: ActiveValue::Set(comparable.postal_code.clone()),
            surface_m2: ActiveValue::Set(comparable.surface_m2),
            rooms: ActiveValue::Set(i32::from(comparable.rooms)),
            sale_price_minor: ActiveValue::Set(comparable.sale_price_minor),
            sold_at: ActiveValue::Set(comparable.sold_at),
            luxury: ActiveValue::Set(comparable.luxury),
        }
    }
}

impl TryFrom<Model> for Comparable {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, EngineError> {
        let id = Uuid::parse_str(&model.id)
            .map_err(|_| EngineError::InvalidInput("invalid comparable id".to_string()))?;
        Ok(Self {
            id,
            city: model.city,
            postal_code: model.postal_code,
            surface_m2: model.surface_m2,
            rooms: u8::try_from(model.rooms.clamp(0, 255)).unwrap_or(0),
            sale_price_minor: model.sale_price_minor,
            sold_at: model.sold_at,
            luxury: model.luxury,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_key_folds_accents_case_and_punctuation() {
        assert_eq!(city_key("Saint-Étienne"), "saint etienne");
        assert_eq!(city_key("  saint   etienne "), "saint etienne");
        assert_eq!(city_key("AIX-EN-PROVENCE"), "aix en provence");
        assert_eq!(city_key("Orléans"), city_key("orleans"));
    }

    #[test]
    fn new_rejects_non_positive_price_and_surface() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(
            Comparable::new(None, "Lyon".into(), "69001".into(), 50.0, 2, 0, date, false).is_err()
        );
        assert!(
            Comparable::new(None, "Lyon".into(), "69001".into(), 0.0, 2, 100, date, false)
                .is_err()
        );
        assert!(
            Comparable::new(None, "  ".into(), "69001".into(), 50.0, 2, 100, date, false)
                .is_err()
        );
    }

    #[test]
    fn price_per_m2_rounds_to_cent() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let comparable = Comparable::new(
            None,
            "Lyon".into(),
            "69001".into(),
            80.0,
            3,
            24_000_000,
            date,
            false,
        )
        .unwrap();
        assert_eq!(comparable.price_per_m2_minor(), 300_000);
    }
}
