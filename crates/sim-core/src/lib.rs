#![deny(warnings)]

//! Core domain models and invariants for Venture Tycoon.
//!
//! This crate defines the serializable content types (industries, cards,
//! choices), the simulation configuration and the session record shared by
//! the runtime and the persistence layer, together with validation helpers
//! guarding the content invariants.

use chrono::{DateTime, Month, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier for an industry, e.g. "coffee-shop".
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndustryId(pub String);

/// Unique identifier for a card, e.g. "coffee-espresso-machine".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardId(pub String);

impl fmt::Display for IndustryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An industry template a run starts from. Read-only input to a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Industry {
    /// Industry identifier.
    pub id: IndustryId,
    /// Display name.
    pub name: String,
    /// Short pitch shown on the industry picker.
    #[serde(default)]
    pub description: String,
    /// Icon hint for the presentation layer (emoji or asset key).
    #[serde(default)]
    pub icon: String,
    /// Cash on hand at month zero.
    pub starting_cash: Decimal,
    /// Recurring monthly revenue at month zero.
    pub starting_revenue: Decimal,
    /// Recurring monthly expenses at month zero.
    pub starting_expenses: Decimal,
    /// Whether the industry can be picked.
    #[serde(default = "default_true")]
    pub is_available: bool,
}

/// Card categories, listed in the order used for weighted category draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardCategory {
    /// Growth opportunities.
    Opportunity,
    /// Problems that usually cost money.
    Problem,
    /// Market shifts.
    Market,
    /// Good news.
    Happy,
}

impl CardCategory {
    /// All categories in weight order.
    pub const ALL: [CardCategory; 4] = [
        CardCategory::Opportunity,
        CardCategory::Problem,
        CardCategory::Market,
        CardCategory::Happy,
    ];

    /// Fixed selection weight; the four weights sum to 1.
    pub const fn weight(self) -> f64 {
        match self {
            CardCategory::Opportunity => 0.60,
            CardCategory::Problem => 0.20,
            CardCategory::Market => 0.15,
            CardCategory::Happy => 0.05,
        }
    }

    /// Stable lowercase name, used for storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            CardCategory::Opportunity => "opportunity",
            CardCategory::Problem => "problem",
            CardCategory::Market => "market",
            CardCategory::Happy => "happy",
        }
    }

    /// Inverse of [`CardCategory::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// One-time effect range on cash.
///
/// Bounds are whole currency units, or whole percents of the current cash
/// when `is_percent` is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectRange {
    /// Lower bound (inclusive).
    pub min: i64,
    /// Upper bound (inclusive).
    pub max: i64,
    /// Interpret the drawn value as a percentage of the current value.
    #[serde(default)]
    pub is_percent: bool,
}

impl EffectRange {
    /// Flat range with identical bounds.
    pub const fn fixed(v: i64) -> Self {
        Self {
            min: v,
            max: v,
            is_percent: false,
        }
    }
}

/// Effect range on a recurring monthly figure (revenue or expenses).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringRange {
    /// Lower bound (inclusive).
    pub min: i64,
    /// Upper bound (inclusive).
    pub max: i64,
    /// Interpret the drawn value as a percentage of the current value.
    #[serde(default)]
    pub is_percent: bool,
    /// Number of months the effect is felt (>= 1). 1 means one-time.
    #[serde(default = "default_duration")]
    pub duration: u32,
}

impl RecurringRange {
    /// Flat range with identical bounds and the given duration.
    pub const fn fixed(v: i64, duration: u32) -> Self {
        Self {
            min: v,
            max: v,
            is_percent: false,
            duration,
        }
    }
}

/// Effect range on the customer rating. Always a plain integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRange {
    /// Lower bound (inclusive).
    pub min: i32,
    /// Upper bound (inclusive).
    pub max: i32,
}

/// A player decision on a card.
///
/// Every dimension is optional: `None` means the choice leaves that
/// dimension alone (nothing is drawn, nothing is registered in the
/// ledger), while a zero-width range at 0 is a real, zero-valued effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Button label.
    pub label: String,
    /// Longer explanation.
    #[serde(default)]
    pub description: String,
    /// Immediate cash effect.
    #[serde(default)]
    pub cash: Option<EffectRange>,
    /// Change to recurring monthly revenue.
    #[serde(default)]
    pub revenue: Option<RecurringRange>,
    /// Change to recurring monthly expenses.
    #[serde(default)]
    pub expenses: Option<RecurringRange>,
    /// Change to the customer rating.
    #[serde(default)]
    pub customer_rating: Option<RatingRange>,
}

impl Choice {
    /// A choice with a label and no effects.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            cash: None,
            revenue: None,
            expenses: None,
            customer_rating: None,
        }
    }

    /// Duration of the revenue effect, 1 when absent.
    pub fn revenue_duration(&self) -> u32 {
        self.revenue.map_or(1, |r| r.duration)
    }

    /// Duration of the expenses effect, 1 when absent.
    pub fn expenses_duration(&self) -> u32 {
        self.expenses.map_or(1, |r| r.duration)
    }
}

/// A scenario card with eligibility gates and at least two choices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Card identifier.
    pub id: CardId,
    /// Owning industry. Content packs may omit it; the loader stamps it.
    #[serde(default)]
    pub industry_id: IndustryId,
    /// Category used for weighted selection.
    pub category: CardCategory,
    /// Headline.
    pub title: String,
    /// Scenario text.
    #[serde(default)]
    pub description: String,
    /// Earliest month index the card may appear.
    #[serde(default)]
    pub stage_month: Option<u32>,
    /// Card only appears when cash >= this.
    #[serde(default)]
    pub min_cash: Option<Decimal>,
    /// Card only appears when cash <= this.
    #[serde(default)]
    pub max_cash: Option<Decimal>,
    /// Ordered choices.
    pub choices: Vec<Choice>,
}

/// Simulation configuration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Decisions per month before the month closes.
    pub decisions_per_month: u32,
    /// Cash at or above which the run is won.
    pub win_threshold: Decimal,
    /// Month index a run starts at (4 = April).
    pub start_month: u32,
    /// Customer rating at run start.
    pub rating_baseline: i32,
    /// Lowest customer rating.
    pub rating_min: i32,
    /// Highest customer rating.
    pub rating_max: i32,
    /// Close the month automatically once the decision quota is met.
    pub auto_end_month: bool,
    /// Seed for deterministic RNG.
    pub rng_seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            decisions_per_month: 2,
            win_threshold: Decimal::new(100_000, 0),
            start_month: 4,
            rating_baseline: 3,
            rating_min: 0,
            rating_max: 5,
            auto_end_month: true,
            rng_seed: 42,
        }
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Cash reached the win threshold.
    Won,
    /// Cash went negative.
    Lost,
    /// The player abandoned the run.
    Quit,
}

impl Outcome {
    /// Stable lowercase name, used for storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Outcome::Won => "won",
            Outcome::Lost => "lost",
            Outcome::Quit => "quit",
        }
    }

    /// Inverse of [`Outcome::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "won" => Some(Outcome::Won),
            "lost" => Some(Outcome::Lost),
            "quit" => Some(Outcome::Quit),
            _ => None,
        }
    }
}

/// Summary of a finished run, written to the session log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Industry played.
    pub industry_id: IndustryId,
    /// Terminal outcome.
    pub outcome: Outcome,
    /// Cash at the end of the run.
    pub final_cash: Decimal,
    /// Months closed during the run.
    pub months_played: u32,
    /// Cards resolved during the run.
    pub cards_played: u32,
    /// Run start (wall clock).
    pub started_at: DateTime<Utc>,
    /// Run end (wall clock).
    pub ended_at: DateTime<Utc>,
    /// Highest cash observed during the run.
    pub highest_cash: Decimal,
}

/// Calendar name for a 1-based month index, wrapping every 12 months.
pub fn month_name(index: u32) -> &'static str {
    let m = index.saturating_sub(1) % 12 + 1;
    u8::try_from(m)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map_or("Unknown", |m| m.name())
}

/// 1-based simulated year for a 1-based month index.
pub fn year_of(index: u32) -> u32 {
    index.saturating_sub(1) / 12 + 1
}

/// Validation errors for content and configuration invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Names and titles must not be blank.
    #[error("{0} must not be empty")]
    Empty(&'static str),
    /// Starting figures must be non-negative.
    #[error("negative monetary value is invalid")]
    NegativeMoney,
    /// A card needs at least two choices.
    #[error("card {0} has fewer than two choices")]
    TooFewChoices(String),
    /// min > max on an effect range.
    #[error("{0} range has min > max")]
    InvertedRange(&'static str),
    /// Durations are counted in whole months, starting at one.
    #[error("{0} duration must be >= 1")]
    ZeroDuration(&'static str),
    /// min_cash > max_cash on a card.
    #[error("card {0} has min_cash > max_cash")]
    InvertedCashWindow(String),
    /// Month indices are 1-based.
    #[error("card {0} has stage_month 0")]
    ZeroStageMonth(String),
    /// Configuration is internally inconsistent.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Validate an industry template.
pub fn validate_industry(ind: &Industry) -> Result<(), ValidationError> {
    if ind.id.0.trim().is_empty() {
        return Err(ValidationError::Empty("industry id"));
    }
    if ind.name.trim().is_empty() {
        return Err(ValidationError::Empty("industry name"));
    }
    if ind.starting_cash < Decimal::ZERO
        || ind.starting_revenue < Decimal::ZERO
        || ind.starting_expenses < Decimal::ZERO
    {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}

/// Validate a single choice.
pub fn validate_choice(c: &Choice) -> Result<(), ValidationError> {
    if c.label.trim().is_empty() {
        return Err(ValidationError::Empty("choice label"));
    }
    if let Some(r) = c.cash {
        if r.min > r.max {
            return Err(ValidationError::InvertedRange("cash"));
        }
    }
    for (name, range) in [("revenue", c.revenue), ("expenses", c.expenses)] {
        if let Some(r) = range {
            if r.min > r.max {
                return Err(ValidationError::InvertedRange(name));
            }
            if r.duration == 0 {
                return Err(ValidationError::ZeroDuration(name));
            }
        }
    }
    if let Some(r) = c.customer_rating {
        if r.min > r.max {
            return Err(ValidationError::InvertedRange("customer_rating"));
        }
    }
    Ok(())
}

/// Validate a card and all of its choices.
pub fn validate_card(card: &Card) -> Result<(), ValidationError> {
    if card.id.0.trim().is_empty() {
        return Err(ValidationError::Empty("card id"));
    }
    if card.industry_id.0.trim().is_empty() {
        return Err(ValidationError::Empty("card industry"));
    }
    if card.title.trim().is_empty() {
        return Err(ValidationError::Empty("card title"));
    }
    if card.choices.len() < 2 {
        return Err(ValidationError::TooFewChoices(card.id.0.clone()));
    }
    if let (Some(lo), Some(hi)) = (card.min_cash, card.max_cash) {
        if lo > hi {
            return Err(ValidationError::InvertedCashWindow(card.id.0.clone()));
        }
    }
    if card.stage_month == Some(0) {
        return Err(ValidationError::ZeroStageMonth(card.id.0.clone()));
    }
    for c in &card.choices {
        validate_choice(c)?;
    }
    Ok(())
}

/// Validate simulation configuration.
pub fn validate_config(cfg: &SimConfig) -> Result<(), ValidationError> {
    if cfg.decisions_per_month == 0 {
        return Err(ValidationError::InvalidConfig("decisions_per_month must be >= 1"));
    }
    if cfg.win_threshold <= Decimal::ZERO {
        return Err(ValidationError::InvalidConfig("win_threshold must be > 0"));
    }
    if cfg.start_month == 0 {
        return Err(ValidationError::InvalidConfig("start_month must be >= 1"));
    }
    if cfg.rating_min > cfg.rating_max
        || !(cfg.rating_min..=cfg.rating_max).contains(&cfg.rating_baseline)
    {
        return Err(ValidationError::InvalidConfig(
            "rating baseline must lie within [rating_min, rating_max]",
        ));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

fn default_duration() -> u32 {
    1
}
