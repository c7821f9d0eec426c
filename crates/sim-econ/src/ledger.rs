//! Temporary effect ledger: multi-month revenue/expense modifiers.

use crate::EffectDelta;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An ongoing modifier with a remaining-duration countdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporaryEffect {
    /// Display name, derived from card and choice.
    pub name: String,
    /// Extra monthly revenue while active.
    pub revenue: Decimal,
    /// Extra monthly expenses while active.
    pub expenses: Decimal,
    /// Month-end ticks left before the effect is purged.
    pub months_remaining: u32,
}

impl TemporaryEffect {
    /// Ledger entry for a resolved choice, if any dimension lasts more than a month.
    ///
    /// The first month is part of the immediate delta, so the entry covers
    /// `max(durations) - 1` further months and only carries the dimensions
    /// whose own duration exceeds one.
    pub fn from_choice(
        name: impl Into<String>,
        delta: &EffectDelta,
        revenue_duration: u32,
        expenses_duration: u32,
    ) -> Option<Self> {
        let longest = revenue_duration.max(expenses_duration);
        if longest <= 1 {
            return None;
        }
        Some(Self {
            name: name.into(),
            revenue: if revenue_duration > 1 {
                delta.revenue
            } else {
                Decimal::ZERO
            },
            expenses: if expenses_duration > 1 {
                delta.expenses
            } else {
                Decimal::ZERO
            },
            months_remaining: longest - 1,
        })
    }
}

/// Summed contributions of one month-end tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerTick {
    /// Revenue added this month.
    pub revenue: Decimal,
    /// Expenses added this month.
    pub expenses: Decimal,
    /// Entries that contributed.
    pub applied: usize,
}

/// Active temporary effects in registration order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectLedger {
    entries: Vec<TemporaryEffect>,
}

impl EffectLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Entries with nothing left to run are ignored.
    pub fn register(&mut self, effect: TemporaryEffect) {
        if effect.months_remaining == 0 {
            debug!(name = %effect.name, "skipping exhausted temporary effect");
            return;
        }
        debug!(name = %effect.name, months = effect.months_remaining, "temporary effect registered");
        self.entries.push(effect);
    }

    /// Sum all active contributions, then count every entry down by one.
    pub fn tick(&mut self) -> LedgerTick {
        let mut out = LedgerTick::default();
        for e in self.entries.iter_mut().filter(|e| e.months_remaining > 0) {
            out.revenue += e.revenue;
            out.expenses += e.expenses;
            out.applied += 1;
            e.months_remaining -= 1;
        }
        out
    }

    /// What the next tick would contribute, without counting down.
    pub fn pending(&self) -> LedgerTick {
        self.entries
            .iter()
            .filter(|e| e.months_remaining > 0)
            .fold(LedgerTick::default(), |mut acc, e| {
                acc.revenue += e.revenue;
                acc.expenses += e.expenses;
                acc.applied += 1;
                acc
            })
    }

    /// Drop exhausted entries. Returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.months_remaining > 0);
        before - self.entries.len()
    }

    /// Active entries.
    pub fn iter(&self) -> impl Iterator<Item = &TemporaryEffect> {
        self.entries.iter()
    }

    /// Number of active entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is active.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
