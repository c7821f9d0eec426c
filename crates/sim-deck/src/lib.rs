#![deny(warnings)]

//! Card selection for Venture Tycoon.
//!
//! Given the current month and cash, filters the remaining card pool by
//! each card's eligibility gates and draws the next card: first a category
//! by fixed weights, then uniformly within it. When nothing is eligible the
//! draw falls back to any card in the pool so a run never stalls; the
//! returned [`Selection`] records which path was taken.

use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{Card, CardCategory};
use tracing::{debug, warn};

/// The slice of state eligibility depends on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionContext {
    /// Current month index.
    pub month: u32,
    /// Current cash.
    pub cash: Decimal,
}

/// How a selection was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionPath {
    /// Eligible card from the rolled category.
    Weighted,
    /// Rolled category had no eligible card; picked among all eligible cards.
    CategoryFallback,
    /// Nothing was eligible; picked among the whole pool.
    AnyCard,
}

/// Result of a draw.
#[derive(Clone, Copy, Debug)]
pub struct Selection<'a> {
    /// The chosen card.
    pub card: &'a Card,
    /// Position of the card in the pool passed in.
    pub index: usize,
    /// Rolled category; `None` on the [`SelectionPath::AnyCard`] path.
    pub category: Option<CardCategory>,
    /// Path taken.
    pub path: SelectionPath,
}

impl Selection<'_> {
    /// True when eligibility gates were ignored to produce this card.
    pub fn is_degenerate(&self) -> bool {
        self.path == SelectionPath::AnyCard
    }
}

/// Whether a card's month and cash gates admit it under `ctx`.
pub fn is_eligible(card: &Card, ctx: &SelectionContext) -> bool {
    card.stage_month.map_or(true, |m| m <= ctx.month)
        && card.min_cash.map_or(true, |lo| ctx.cash >= lo)
        && card.max_cash.map_or(true, |hi| ctx.cash <= hi)
}

/// Draw a category with one uniform sample against cumulative weights.
pub fn roll_category<R: Rng + ?Sized>(rng: &mut R) -> CardCategory {
    let u: f64 = rng.gen();
    let mut acc = 0.0;
    for c in CardCategory::ALL {
        acc += c.weight();
        if u < acc {
            return c;
        }
    }
    CardCategory::Happy
}

/// Select the next card from `pool`. `None` only when the pool is empty.
pub fn select_next<'a, R: Rng + ?Sized>(
    pool: &'a [Card],
    ctx: &SelectionContext,
    rng: &mut R,
) -> Option<Selection<'a>> {
    if pool.is_empty() {
        return None;
    }
    let eligible: Vec<usize> = pool
        .iter()
        .enumerate()
        .filter(|(_, c)| is_eligible(c, ctx))
        .map(|(i, _)| i)
        .collect();

    if eligible.is_empty() {
        let index = rng.gen_range(0..pool.len());
        warn!(
            month = ctx.month,
            cash = %ctx.cash,
            pool = pool.len(),
            card = %pool[index].id,
            "no eligible card, falling back to the whole pool"
        );
        return Some(Selection {
            card: &pool[index],
            index,
            category: None,
            path: SelectionPath::AnyCard,
        });
    }

    let category = roll_category(rng);
    let in_category: Vec<usize> = eligible
        .iter()
        .copied()
        .filter(|&i| pool[i].category == category)
        .collect();
    let (candidates, path) = if in_category.is_empty() {
        debug!(?category, eligible = eligible.len(), "category empty, using all eligible");
        (eligible, SelectionPath::CategoryFallback)
    } else {
        (in_category, SelectionPath::Weighted)
    };
    let index = *candidates.choose(rng)?;
    debug!(card = %pool[index].id, ?category, ?path, "card selected");
    Some(Selection {
        card: &pool[index],
        index,
        category: Some(category),
        path,
    })
}
