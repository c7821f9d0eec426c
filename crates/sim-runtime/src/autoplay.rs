//! Headless drivers: pick choices without a player.

use crate::{ChoiceOutcome, GameStatus, MonthReport, SimError, SimSnapshot, Simulation};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use sim_core::{Card, Choice};

/// Picks a choice index for a card.
pub trait Policy {
    /// Index into `card.choices`.
    fn pick(&mut self, card: &Card, snapshot: &SimSnapshot) -> usize;
}

/// Uniformly random choices.
pub struct RandomPolicy<R = ChaCha8Rng> {
    rng: R,
}

impl RandomPolicy<ChaCha8Rng> {
    /// Seeded random policy.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> Policy for RandomPolicy<R> {
    fn pick(&mut self, card: &Card, _snapshot: &SimSnapshot) -> usize {
        self.rng.gen_range(0..card.choices.len().max(1))
    }
}

/// Picks the choice with the best expected cash over a horizon.
#[derive(Clone, Copy, Debug)]
pub struct GreedyPolicy {
    /// Months a baseline change is counted for.
    pub horizon_months: u32,
}

impl Default for GreedyPolicy {
    fn default() -> Self {
        Self { horizon_months: 6 }
    }
}

fn midpoint(min: i64, max: i64, is_percent: bool, base: Decimal) -> Decimal {
    let mid = Decimal::from(min.saturating_add(max)) / Decimal::from(2);
    if is_percent {
        base * mid / Decimal::ONE_HUNDRED
    } else {
        mid
    }
}

impl GreedyPolicy {
    /// Expected cash impact of `choice` given the current snapshot.
    pub fn score(&self, choice: &Choice, s: &SimSnapshot) -> Decimal {
        let horizon = Decimal::from(self.horizon_months);
        let cash = choice
            .cash
            .map_or(Decimal::ZERO, |r| midpoint(r.min, r.max, r.is_percent, s.cash));
        let revenue = choice.revenue.map_or(Decimal::ZERO, |r| {
            let m = midpoint(r.min, r.max, r.is_percent, s.revenue);
            m * horizon + m * Decimal::from(r.duration.saturating_sub(1))
        });
        let expenses = choice.expenses.map_or(Decimal::ZERO, |r| {
            let m = midpoint(r.min, r.max, r.is_percent, s.expenses);
            m * horizon + m * Decimal::from(r.duration.saturating_sub(1))
        });
        cash + revenue - expenses
    }
}

impl Policy for GreedyPolicy {
    fn pick(&mut self, card: &Card, snapshot: &SimSnapshot) -> usize {
        card.choices
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| self.score(a, snapshot).cmp(&self.score(b, snapshot)))
            .map_or(0, |(i, _)| i)
    }
}

/// Result of one autoplay step.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// A card was resolved.
    Decided(ChoiceOutcome),
    /// The pool is drained; a month passed without decisions.
    IdleMonth(MonthReport),
    /// The run had already ended.
    Finished(GameStatus),
}

/// Draw a card and resolve it with `policy`, or idle a month when the pool is drained.
pub fn play_turn<R: Rng, P: Policy + ?Sized>(
    sim: &mut Simulation<R>,
    policy: &mut P,
) -> Result<TurnOutcome, SimError> {
    let status = sim.status();
    if status.is_terminal() {
        return Ok(TurnOutcome::Finished(status));
    }
    let snapshot = sim.snapshot();
    let pick = sim.draw_card()?.map(|d| policy.pick(d.card, &snapshot));
    let Some(pick) = pick else {
        return sim.end_month().map(TurnOutcome::IdleMonth);
    };
    sim.apply_choice(pick).map(TurnOutcome::Decided)
}

/// Play until the run ends or `max_months` more months have closed.
pub fn run_game<R: Rng, P: Policy + ?Sized>(
    sim: &mut Simulation<R>,
    policy: &mut P,
    max_months: u32,
) -> Result<SimSnapshot, SimError> {
    let start = sim.state().months_played;
    while !sim.status().is_terminal() && sim.state().months_played - start < max_months {
        play_turn(sim, policy)?;
    }
    Ok(sim.snapshot())
}
