//! Pure valuation: characteristics + comparables + market context in, a
//! pre-estimation out.
//!
//! [`estimate`] is deterministic and side-effect-free so callers can memoize
//! it against its inputs and run it on every input change. It never fails:
//! missing or unusable inputs degrade the confidence signal instead.
//!
//! The price model works in basis points over a per-square-meter base price:
//! the base comes from the median comparable (or a condition-scaled national
//! baseline when no comparable is usable), and each property/market trait
//! contributes a bounded adjustment. The range spread comes from the median
//! absolute deviation of the comparables.

use serde::{Deserialize, Serialize};

use crate::comparables::Comparable;
use crate::money::MoneyCents;
use crate::record::{Characteristics, Condition, EnergyRating};

/// Fallback base price when no comparable is usable: 2500€/m².
const BASELINE_PER_M2: MoneyCents = MoneyCents::new(250_000);

/// Below this, a surface is treated as not entered.
const MIN_SURFACE_M2: f64 = 5.0;

/// Spread bounds, in basis points of the mid value.
const MIN_SPREAD_BPS: i64 = 500;
const MAX_SPREAD_BPS: i64 = 2_500;

/// Spread used when the comparable set gives no signal at all.
const FALLBACK_SPREAD_BPS: i64 = 2_000;

/// How the property is put on the market.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleKind {
    #[default]
    Standard,
    Exclusive,
    OffMarket,
}

impl SaleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Exclusive => "exclusive",
            Self::OffMarket => "off_market",
        }
    }

    fn adjustment_bps(self) -> i64 {
        match self {
            Self::Standard => 0,
            Self::Exclusive => 300,
            Self::OffMarket => -300,
        }
    }
}

impl TryFrom<&str> for SaleKind {
    type Error = crate::EngineError;

    fn try_from(value: &str) -> Result<Self, crate::EngineError> {
        match value {
            "standard" => Ok(Self::Standard),
            "exclusive" => Ok(Self::Exclusive),
            "off_market" => Ok(Self::OffMarket),
            other => Err(crate::EngineError::InvalidInput(format!(
                "invalid sale kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
}

impl Urgency {
    fn adjustment_bps(self) -> i64 {
        match self {
            // No pressure to sell leaves room to price slightly above market.
            Self::Low => 100,
            Self::Normal => 0,
            Self::High => -500,
        }
    }
}

/// Market-side modifiers for a valuation run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketContext {
    pub urgency: Urgency,
    /// Annual market drift in basis points; applied pro-rated by the mean
    /// age of the comparables.
    pub trend_bps: i64,
    /// Visibility capital of the listing, 0 to 100 (50 is neutral).
    pub visibility: u8,
    /// Restricts comparables to the luxury segment and adds a premium.
    pub lux_mode: bool,
}

impl Default for MarketContext {
    fn default() -> Self {
        Self {
            urgency: Urgency::default(),
            trend_bps: 0,
            visibility: 50,
            lux_mode: false,
        }
    }
}

/// How much the computed range can be trusted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    #[default]
    Insufficient,
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insufficient => "insufficient",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// The computed value estimate, stored as a record section.
///
/// Always present on a record; the default (all-zero, `Insufficient`) marks
/// a record that has never been through a valuation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreEstimation {
    pub value_low_minor: i64,
    pub value_mid_minor: i64,
    pub value_high_minor: i64,
    pub price_per_m2_minor: i64,
    pub confidence: Confidence,
    pub comparable_count: u32,
    /// Names of the inputs that were missing or unusable.
    pub missing_inputs: Vec<String>,
}

fn condition_bps(condition: Condition) -> i64 {
    match condition {
        Condition::ToRenovate => -1_500,
        Condition::ToRefresh => -500,
        Condition::Good => 0,
        Condition::Excellent => 1_000,
    }
}

fn energy_bps(energy: EnergyRating) -> i64 {
    match energy {
        EnergyRating::A => 500,
        EnergyRating::B => 300,
        EnergyRating::C => 100,
        EnergyRating::D => 0,
        EnergyRating::E => -200,
        EnergyRating::F => -500,
        EnergyRating::G => -800,
    }
}

fn floor_bps(characteristics: &Characteristics) -> i64 {
    match characteristics.floor {
        Some(0) => -100,
        Some(floor) if floor >= 2 && characteristics.elevator => 200,
        Some(floor) if floor >= 2 => -300,
        _ => 0,
    }
}

fn outdoor_bps(characteristics: &Characteristics) -> i64 {
    if !characteristics.outdoor_m2.is_finite() || characteristics.outdoor_m2 <= 0.0 {
        return 0;
    }
    // 10 bps per outdoor square meter, capped at 30m².
    (characteristics.outdoor_m2.min(30.0) as i64) * 10
}

fn visibility_bps(visibility: u8) -> i64 {
    (i64::from(visibility.min(100)) - 50) * 4
}

fn median(sorted: &[i64]) -> i64 {
    let n = sorted.len();
    if n == 0 {
        return 0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2
    }
}

/// Median absolute deviation of the samples, same unit as the samples.
fn mad(sorted: &[i64], med: i64) -> i64 {
    let mut deviations: Vec<i64> = sorted.iter().map(|v| (v - med).abs()).collect();
    deviations.sort_unstable();
    median(&deviations)
}

/// Mean age in days of the comparables, relative to the most recent one.
fn mean_age_days(comparables: &[&Comparable]) -> i64 {
    let Some(newest) = comparables.iter().map(|c| c.sold_at).max() else {
        return 0;
    };
    let total: i64 = comparables
        .iter()
        .map(|c| (newest - c.sold_at).num_days())
        .sum();
    total / comparables.len() as i64
}

/// Derives a pre-estimation from characteristics, comparable history and
/// market context.
///
/// Identical inputs produce an identical output. Unusable inputs (missing
/// surface, empty history) yield a baseline-derived estimate flagged
/// `Insufficient` rather than an error.
pub fn estimate(
    characteristics: &Characteristics,
    comparables: &[Comparable],
    context: &MarketContext,
    sale_kind: SaleKind,
) -> PreEstimation {
    let mut missing_inputs = Vec::new();

    let surface_ok =
        characteristics.surface_m2.is_finite() && characteristics.surface_m2 >= MIN_SURFACE_M2;
    if !surface_ok {
        missing_inputs.push("surface_m2".to_string());
    }
    if characteristics.rooms == 0 {
        missing_inputs.push("rooms".to_string());
    }

    let usable: Vec<&Comparable> = comparables
        .iter()
        .filter(|c| c.surface_m2 >= MIN_SURFACE_M2 && c.sale_price_minor > 0)
        .filter(|c| !context.lux_mode || c.luxury)
        .collect();
    if usable.is_empty() {
        missing_inputs.push("comparables".to_string());
    }

    let mut per_m2_samples: Vec<i64> = usable.iter().map(|c| c.price_per_m2_minor()).collect();
    per_m2_samples.sort_unstable();

    let (base_per_m2, spread_bps) = if per_m2_samples.is_empty() {
        // No history: start from the national baseline. Condition is already
        // part of the adjustments below, so the baseline stays flat here.
        (BASELINE_PER_M2, FALLBACK_SPREAD_BPS)
    } else {
        let med = median(&per_m2_samples);
        let deviation = mad(&per_m2_samples, med);
        let ratio_bps = if med > 0 {
            deviation.saturating_mul(10_000) / med
        } else {
            FALLBACK_SPREAD_BPS
        };
        (
            MoneyCents::new(med),
            ratio_bps.clamp(MIN_SPREAD_BPS, MAX_SPREAD_BPS),
        )
    };

    let trend_adjust_bps = if usable.is_empty() {
        0
    } else {
        // Older comparables lag the market; a rising trend pushes them up.
        context.trend_bps.saturating_mul(mean_age_days(&usable)) / 365
    };

    let adjustment_bps = condition_bps(characteristics.condition)
        + energy_bps(characteristics.energy)
        + floor_bps(characteristics)
        + outdoor_bps(characteristics)
        + sale_kind.adjustment_bps()
        + context.urgency.adjustment_bps()
        + visibility_bps(context.visibility)
        + if context.lux_mode { 1_000 } else { 0 }
        + trend_adjust_bps;

    let per_m2 = base_per_m2.scale_bps(10_000 + adjustment_bps);

    let confidence = if !surface_ok || usable.is_empty() {
        Confidence::Insufficient
    } else if usable.len() >= 8 && spread_bps <= 1_000 {
        Confidence::High
    } else if usable.len() >= 3 && spread_bps < MAX_SPREAD_BPS {
        Confidence::Medium
    } else {
        // Too few comparables, or a history dispersed all the way to the
        // clamp.
        Confidence::Low
    };

    // Shaky confidence and lux sales both call for a wider band.
    let mut spread_bps = spread_bps;
    if confidence <= Confidence::Low {
        spread_bps += 500;
    }
    if context.lux_mode {
        spread_bps += 500;
    }
    let spread_bps = spread_bps.min(MAX_SPREAD_BPS + 1_000);

    let (low, mid, high) = if surface_ok {
        let mid = per_m2.times_surface(characteristics.surface_m2);
        (
            mid.scale_bps(10_000 - spread_bps),
            mid,
            mid.scale_bps(10_000 + spread_bps),
        )
    } else {
        // Without a surface only the per-m² figure is meaningful.
        (MoneyCents::ZERO, MoneyCents::ZERO, MoneyCents::ZERO)
    };

    PreEstimation {
        value_low_minor: low.cents(),
        value_mid_minor: mid.cents(),
        value_high_minor: high.cents(),
        price_per_m2_minor: per_m2.cents(),
        confidence,
        comparable_count: usable.len() as u32,
        missing_inputs,
    }
}
