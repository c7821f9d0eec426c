//! Effect resolution: declared min/max ranges to concrete deltas.

use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sim_core::Choice;
use tracing::warn;

/// Granularity of flat cash/revenue/expense draws.
pub const STEP: i64 = 100;

/// A drawn value before it is applied to the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Amount {
    /// Absolute amount in currency units.
    Flat(i64),
    /// Whole percent of the current value of the same dimension.
    Percent(i64),
}

impl Amount {
    /// Concrete delta for a dimension whose current value is `base`.
    ///
    /// Percent amounts land on the [`STEP`] grid when `base` is on it, and
    /// are rounded to whole currency units otherwise.
    pub fn against(self, base: Decimal) -> Decimal {
        match self {
            Amount::Flat(v) => Decimal::from(v),
            Amount::Percent(p) => {
                let raw = base * Decimal::from(p) / Decimal::ONE_HUNDRED;
                let step = Decimal::from(STEP);
                if (base % step).is_zero() {
                    (raw / step).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                        * step
                } else {
                    raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                }
            }
        }
    }
}

/// Raw outcome of one resolution. `None` marks an untouched dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolledEffect {
    /// Cash draw.
    pub cash: Option<Amount>,
    /// Revenue draw.
    pub revenue: Option<Amount>,
    /// Expenses draw.
    pub expenses: Option<Amount>,
    /// Customer rating delta.
    pub customer_rating: i32,
}

/// Current values percentages are taken against.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    /// Cash on hand.
    pub cash: Decimal,
    /// Monthly revenue.
    pub revenue: Decimal,
    /// Monthly expenses.
    pub expenses: Decimal,
}

/// Concrete deltas ready to be added to the state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectDelta {
    /// Added to cash immediately.
    pub cash: Decimal,
    /// Added to recurring monthly revenue.
    pub revenue: Decimal,
    /// Added to recurring monthly expenses.
    pub expenses: Decimal,
    /// Added to the customer rating before clamping.
    pub customer_rating: i32,
}

impl RolledEffect {
    /// Convert percentages against `base`, taken at resolution time.
    pub fn against(&self, base: &Financials) -> EffectDelta {
        EffectDelta {
            cash: self.cash.map_or(Decimal::ZERO, |a| a.against(base.cash)),
            revenue: self.revenue.map_or(Decimal::ZERO, |a| a.against(base.revenue)),
            expenses: self.expenses.map_or(Decimal::ZERO, |a| a.against(base.expenses)),
            customer_rating: self.customer_rating,
        }
    }
}

/// Draw a multiple of [`STEP`] from `[lo, hi]` widened outward to the step grid.
///
/// `lo == hi` returns `lo` untouched. An inverted range collapses to `lo`.
pub fn draw_stepped<R: Rng + ?Sized>(lo: i64, hi: i64, rng: &mut R) -> i64 {
    if lo >= hi {
        if lo > hi {
            warn!(lo, hi, "inverted effect range, using min");
        }
        return lo;
    }
    let lo_step = lo.div_euclid(STEP);
    let hi_step = hi.div_euclid(STEP) + i64::from(hi.rem_euclid(STEP) != 0);
    rng.gen_range(lo_step..=hi_step).saturating_mul(STEP)
}

/// Draw a plain integer from `[lo, hi]`. An inverted range collapses to `lo`.
pub fn draw_plain<R: Rng + ?Sized>(lo: i64, hi: i64, rng: &mut R) -> i64 {
    if lo >= hi {
        if lo > hi {
            warn!(lo, hi, "inverted effect range, using min");
        }
        return lo;
    }
    rng.gen_range(lo..=hi)
}

fn roll<R: Rng + ?Sized>(min: i64, max: i64, is_percent: bool, rng: &mut R) -> Amount {
    if is_percent {
        Amount::Percent(draw_plain(min, max, rng))
    } else {
        Amount::Flat(draw_stepped(min, max, rng))
    }
}

/// Resolve a choice into raw draws. Every call draws afresh.
pub fn resolve<R: Rng + ?Sized>(choice: &Choice, rng: &mut R) -> RolledEffect {
    let cash = choice.cash.map(|r| roll(r.min, r.max, r.is_percent, rng));
    let revenue = choice
        .revenue
        .map(|r| roll(r.min, r.max, r.is_percent, rng));
    let expenses = choice
        .expenses
        .map(|r| roll(r.min, r.max, r.is_percent, rng));
    let customer_rating = choice.customer_rating.map_or(0, |r| {
        let v = draw_plain(i64::from(r.min), i64::from(r.max), rng);
        i32::try_from(v).unwrap_or(r.min)
    });
    RolledEffect {
        cash,
        revenue,
        expenses,
        customer_rating,
    }
}

/// Resolve a choice and convert percentages against `base` in one step.
pub fn resolve_against<R: Rng + ?Sized>(
    choice: &Choice,
    base: &Financials,
    rng: &mut R,
) -> EffectDelta {
    resolve(choice, rng).against(base)
}
