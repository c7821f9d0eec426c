#![deny(warnings)]

//! Run state machine for Venture Tycoon.
//!
//! A [`Simulation`] owns one run: the financial state, the remaining card
//! pool, the card currently on the table and the RNG. The presentation layer
//! drives it through [`Simulation::draw_card`], [`Simulation::apply_choice`],
//! [`Simulation::end_month_if_ready`] and [`Simulation::quit`], and reads it
//! back through [`Simulation::snapshot`]. Once a run is won, lost or quit,
//! every transition is rejected with [`SimError::GameOver`] and nothing is
//! mutated.

mod autoplay;

pub use autoplay::{play_turn, run_game, GreedyPolicy, Policy, RandomPolicy, TurnOutcome};

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{
    month_name, validate_card, validate_config, year_of, Card, CardId, Industry, IndustryId, Outcome,
    SessionRecord, SimConfig, ValidationError,
};
use sim_deck::{select_next, SelectionContext, SelectionPath};
use sim_econ::{resolve_against, EffectDelta, EffectLedger, Financials, LedgerTick, TemporaryEffect};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle of a run. Everything but `Playing` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    /// Decisions are accepted.
    Playing,
    /// Cash reached the win threshold.
    Won,
    /// Cash went negative.
    Lost,
    /// The player abandoned the run.
    Quit,
}

impl GameStatus {
    /// True for `Won`, `Lost` and `Quit`.
    pub fn is_terminal(self) -> bool {
        self != GameStatus::Playing
    }

    /// Session-log outcome, `None` while playing.
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            GameStatus::Playing => None,
            GameStatus::Won => Some(Outcome::Won),
            GameStatus::Lost => Some(Outcome::Lost),
            GameStatus::Quit => Some(Outcome::Quit),
        }
    }
}

/// Errors returned by run transitions.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// The run already ended; nothing was changed.
    #[error("run is over ({0:?})")]
    GameOver(GameStatus),
    /// `apply_choice` was called with no card on the table.
    #[error("no card has been drawn")]
    NoCardDrawn,
    /// The choice index does not exist on the current card.
    #[error("choice {index} out of range for a card with {len} choices")]
    ChoiceOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of choices on the card.
        len: usize,
    },
    /// Configuration failed validation.
    #[error(transparent)]
    InvalidConfig(#[from] ValidationError),
}

/// One line of the run history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum HistoryEntry {
    /// A resolved card.
    Decision {
        /// Month the decision was taken in.
        month: u32,
        /// Resolved card.
        card_id: CardId,
        /// Picked choice.
        choice_label: String,
        /// Realized deltas.
        delta: EffectDelta,
        /// How the card was drawn.
        path: SelectionPath,
    },
    /// A closed month.
    MonthEnd {
        /// Month that was closed.
        month: u32,
        /// Revenue counted, including temporary effects.
        revenue: Decimal,
        /// Expenses counted, including temporary effects.
        expenses: Decimal,
        /// Profit posted to cash.
        profit: Decimal,
        /// Cash after posting.
        cash: Decimal,
    },
}

/// Financial state of a run. Mutated only by [`Simulation`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimState {
    /// Industry the run was seeded from.
    pub industry_id: IndustryId,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Cash on hand.
    pub cash: Decimal,
    /// Recurring monthly revenue baseline.
    pub revenue: Decimal,
    /// Recurring monthly expenses baseline.
    pub expenses: Decimal,
    /// Customer rating within the configured bounds.
    pub customer_rating: i32,
    /// Current month index.
    pub month: u32,
    /// Decisions taken since the last month end.
    pub decisions_this_month: u32,
    /// Months closed so far.
    pub months_played: u32,
    /// Cards resolved so far.
    pub cards_played: u32,
    /// Highest cash seen, for the session log.
    pub highest_cash: Decimal,
    /// Resolved decisions and closed months, oldest first.
    pub history: Vec<HistoryEntry>,
    /// Active temporary effects.
    pub ledger: EffectLedger,
}

impl SimState {
    /// Fresh state from an industry template.
    pub fn new(industry: &Industry, cfg: &SimConfig) -> Self {
        Self {
            industry_id: industry.id.clone(),
            status: GameStatus::Playing,
            cash: industry.starting_cash,
            revenue: industry.starting_revenue,
            expenses: industry.starting_expenses,
            customer_rating: cfg.rating_baseline,
            month: cfg.start_month,
            decisions_this_month: 0,
            months_played: 0,
            cards_played: 0,
            highest_cash: industry.starting_cash,
            history: Vec::new(),
            ledger: EffectLedger::new(),
        }
    }

    /// Values percentages resolve against.
    pub fn financials(&self) -> Financials {
        Financials {
            cash: self.cash,
            revenue: self.revenue,
            expenses: self.expenses,
        }
    }

    fn add_cash(&mut self, amount: Decimal) {
        self.cash += amount;
        if self.cash > self.highest_cash {
            self.highest_cash = self.cash;
        }
    }

    /// Apply `delta` and return the part that landed after floors and clamps.
    fn apply_delta(&mut self, delta: &EffectDelta, cfg: &SimConfig) -> EffectDelta {
        let revenue = (self.revenue + delta.revenue).max(Decimal::ZERO);
        let expenses = (self.expenses + delta.expenses).max(Decimal::ZERO);
        let rating = self
            .customer_rating
            .saturating_add(delta.customer_rating)
            .clamp(cfg.rating_min, cfg.rating_max);
        let realized = EffectDelta {
            cash: delta.cash,
            revenue: revenue - self.revenue,
            expenses: expenses - self.expenses,
            customer_rating: rating - self.customer_rating,
        };
        self.add_cash(delta.cash);
        self.revenue = revenue;
        self.expenses = expenses;
        self.customer_rating = rating;
        realized
    }

    /// Loss is checked before win.
    fn settle(&mut self, cfg: &SimConfig) {
        if self.status != GameStatus::Playing {
            return;
        }
        if self.cash < Decimal::ZERO {
            self.status = GameStatus::Lost;
            info!(cash = %self.cash, month = self.month, "bankrupt, run lost");
        } else if self.cash >= cfg.win_threshold {
            self.status = GameStatus::Won;
            info!(cash = %self.cash, month = self.month, "win threshold reached");
        }
    }
}

/// A card on the table.
#[derive(Clone, Copy, Debug)]
pub struct Draw<'a> {
    /// The card.
    pub card: &'a Card,
    /// How it was drawn.
    pub path: SelectionPath,
}

impl Draw<'_> {
    /// True when eligibility gates were ignored to produce this card.
    pub fn is_degenerate(&self) -> bool {
        self.path == SelectionPath::AnyCard
    }
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    index: usize,
    path: SelectionPath,
}

/// What a month end did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthReport {
    /// Month that was closed.
    pub month: u32,
    /// Temporary effect contributions.
    pub ledger: LedgerTick,
    /// Temporary effects that ran out.
    pub expired: usize,
    /// Revenue counted, including temporary effects.
    pub revenue: Decimal,
    /// Expenses counted, including temporary effects.
    pub expenses: Decimal,
    /// Profit posted to cash.
    pub profit: Decimal,
    /// Cash after posting.
    pub cash: Decimal,
    /// Status after the terminal check.
    pub status: GameStatus,
}

/// What a decision did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOutcome {
    /// Resolved card.
    pub card_id: CardId,
    /// Picked choice.
    pub choice_label: String,
    /// Realized deltas.
    pub delta: EffectDelta,
    /// Whether a temporary effect was registered.
    pub registered_effect: bool,
    /// Month end fired by this decision, if the quota was met.
    pub month_end: Option<MonthReport>,
    /// Status after the decision.
    pub status: GameStatus,
}

/// Read-only view for the HUD.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    /// Lifecycle status.
    pub status: GameStatus,
    /// Industry played.
    pub industry_id: IndustryId,
    /// Cash on hand.
    pub cash: Decimal,
    /// Revenue baseline.
    pub revenue: Decimal,
    /// Expenses baseline.
    pub expenses: Decimal,
    /// Profit the next month end would post, temporary effects included.
    pub projected_profit: Decimal,
    /// Customer rating.
    pub customer_rating: i32,
    /// Current month index.
    pub month: u32,
    /// Calendar name of the current month.
    pub month_name: String,
    /// Simulated year.
    pub year: u32,
    /// Decisions taken this month.
    pub decisions_this_month: u32,
    /// Decisions per month.
    pub decisions_per_month: u32,
    /// Active temporary effects.
    pub active_effects: Vec<TemporaryEffect>,
    /// Cards left in the pool.
    pub cards_remaining: usize,
    /// Card on the table.
    pub current_card: Option<Card>,
    /// Highest cash seen.
    pub highest_cash: Decimal,
    /// Months closed.
    pub months_played: u32,
    /// Cards resolved.
    pub cards_played: u32,
    /// History length.
    pub history_len: usize,
}

/// Serializable save of a run. The pending card and RNG are not kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedGame {
    /// Configuration the run uses.
    pub config: SimConfig,
    /// Financial state.
    pub state: SimState,
    /// Remaining cards.
    pub pool: Vec<Card>,
}

/// Cards that can be resolved. Invalid ones would sit in the pool forever.
fn playable(cards: Vec<Card>) -> Vec<Card> {
    cards
        .into_iter()
        .filter(|c| match validate_card(c) {
            Ok(()) => true,
            Err(e) => {
                warn!(card = %c.id, error = %e, "dropping unplayable card");
                false
            }
        })
        .collect()
}

/// One run of the game.
pub struct Simulation<R = ChaCha8Rng> {
    config: SimConfig,
    state: SimState,
    pool: Vec<Card>,
    pending: Option<Pending>,
    rng: R,
}

impl Simulation<ChaCha8Rng> {
    /// New run seeded from `config.rng_seed`.
    pub fn new(industry: &Industry, cards: Vec<Card>, config: SimConfig) -> Result<Self, SimError> {
        let rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        Self::with_rng(industry, cards, config, rng)
    }
}

impl<R: Rng> Simulation<R> {
    /// New run with a caller-supplied RNG. Cards of other industries are dropped.
    pub fn with_rng(
        industry: &Industry,
        cards: Vec<Card>,
        config: SimConfig,
        rng: R,
    ) -> Result<Self, SimError> {
        validate_config(&config)?;
        let offered = cards.len();
        let pool: Vec<Card> = cards
            .into_iter()
            .filter(|c| c.industry_id == industry.id)
            .collect();
        if pool.len() != offered {
            debug!(dropped = offered - pool.len(), "ignoring cards of other industries");
        }
        let pool = playable(pool);
        info!(industry = %industry.id, cards = pool.len(), cash = %industry.starting_cash, "new run");
        Ok(Self {
            state: SimState::new(industry, &config),
            config,
            pool,
            pending: None,
            rng,
        })
    }

    /// Continue a saved run.
    pub fn resume(saved: SavedGame, rng: R) -> Result<Self, SimError> {
        validate_config(&saved.config)?;
        info!(industry = %saved.state.industry_id, month = saved.state.month, "run resumed");
        Ok(Self {
            config: saved.config,
            state: saved.state,
            pool: playable(saved.pool),
            pending: None,
            rng,
        })
    }

    /// Current state.
    pub fn state(&self) -> &SimState {
        &self.state
    }

    /// Configuration in use.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Lifecycle status.
    pub fn status(&self) -> GameStatus {
        self.state.status
    }

    /// Cards not yet resolved.
    pub fn cards_remaining(&self) -> usize {
        self.pool.len()
    }

    /// Card on the table, if any.
    pub fn current_card(&self) -> Option<&Card> {
        self.pending.and_then(|p| self.pool.get(p.index))
    }

    fn ensure_playing(&self) -> Result<(), SimError> {
        match self.state.status {
            GameStatus::Playing => Ok(()),
            other => {
                debug!(status = ?other, "transition rejected, run is over");
                Err(SimError::GameOver(other))
            }
        }
    }

    /// Put the next card on the table, or return the one already there.
    ///
    /// `Ok(None)` means the pool is drained: there is no more content for
    /// this run, which is not an error.
    pub fn draw_card(&mut self) -> Result<Option<Draw<'_>>, SimError> {
        self.ensure_playing()?;
        let pending = match self.pending {
            Some(p) => p,
            None => {
                let ctx = SelectionContext {
                    month: self.state.month,
                    cash: self.state.cash,
                };
                let Some(sel) = select_next(&self.pool, &ctx, &mut self.rng) else {
                    debug!(month = self.state.month, "card pool exhausted");
                    return Ok(None);
                };
                let p = Pending {
                    index: sel.index,
                    path: sel.path,
                };
                self.pending = Some(p);
                p
            }
        };
        Ok(self.pool.get(pending.index).map(|card| Draw {
            card,
            path: pending.path,
        }))
    }

    /// Resolve choice `choice_index` of the card on the table.
    ///
    /// The card leaves the pool for good. When the monthly decision quota is
    /// met and `auto_end_month` is set, the month closes as part of the call.
    pub fn apply_choice(&mut self, choice_index: usize) -> Result<ChoiceOutcome, SimError> {
        self.ensure_playing()?;
        let pending = self.pending.ok_or(SimError::NoCardDrawn)?;
        let len = self
            .pool
            .get(pending.index)
            .map(|c| c.choices.len())
            .ok_or(SimError::NoCardDrawn)?;
        if choice_index >= len {
            return Err(SimError::ChoiceOutOfRange {
                index: choice_index,
                len,
            });
        }

        self.pending = None;
        let card = self.pool.remove(pending.index);
        let choice = &card.choices[choice_index];
        let rolled = resolve_against(choice, &self.state.financials(), &mut self.rng);
        let delta = self.state.apply_delta(&rolled, &self.config);
        self.state.history.push(HistoryEntry::Decision {
            month: self.state.month,
            card_id: card.id.clone(),
            choice_label: choice.label.clone(),
            delta,
            path: pending.path,
        });
        let effect = TemporaryEffect::from_choice(
            format!("{}: {}", card.title, choice.label),
            &delta,
            choice.revenue_duration(),
            choice.expenses_duration(),
        );
        let registered_effect = effect.is_some();
        if let Some(effect) = effect {
            self.state.ledger.register(effect);
        }
        self.state.cards_played += 1;
        self.state.decisions_this_month += 1;
        debug!(
            card = %card.id,
            choice = %choice.label,
            cash = %delta.cash,
            revenue = %delta.revenue,
            expenses = %delta.expenses,
            rating = delta.customer_rating,
            "choice applied"
        );
        self.state.settle(&self.config);

        let month_end = if self.config.auto_end_month
            && self.state.status == GameStatus::Playing
            && self.state.decisions_this_month >= self.config.decisions_per_month
        {
            Some(self.close_month())
        } else {
            None
        };

        Ok(ChoiceOutcome {
            card_id: card.id.clone(),
            choice_label: choice.label.clone(),
            delta,
            registered_effect,
            month_end,
            status: self.state.status,
        })
    }

    /// Close the month now without waiting for the decision quota.
    ///
    /// For a drained pool, where no decision can be made, and for tooling.
    /// Players close months through [`Simulation::apply_choice`] or
    /// [`Simulation::end_month_if_ready`].
    pub fn end_month(&mut self) -> Result<MonthReport, SimError> {
        self.ensure_playing()?;
        Ok(self.close_month())
    }

    /// Close the month if the decision quota has been met.
    pub fn end_month_if_ready(&mut self) -> Result<Option<MonthReport>, SimError> {
        self.ensure_playing()?;
        if self.state.decisions_this_month >= self.config.decisions_per_month {
            Ok(Some(self.close_month()))
        } else {
            Ok(None)
        }
    }

    /// Abandon the run.
    pub fn quit(&mut self) -> Result<(), SimError> {
        self.ensure_playing()?;
        self.pending = None;
        self.state.status = GameStatus::Quit;
        info!(month = self.state.month, cash = %self.state.cash, "run quit");
        Ok(())
    }

    fn close_month(&mut self) -> MonthReport {
        let tick = self.state.ledger.tick();
        let expired = self.state.ledger.purge_expired();
        let revenue = (self.state.revenue + tick.revenue).max(Decimal::ZERO);
        let expenses = (self.state.expenses + tick.expenses).max(Decimal::ZERO);
        let profit = revenue - expenses;
        self.state.add_cash(profit);

        let month = self.state.month;
        self.state.history.push(HistoryEntry::MonthEnd {
            month,
            revenue,
            expenses,
            profit,
            cash: self.state.cash,
        });
        self.state.month += 1;
        self.state.months_played += 1;
        self.state.settle(&self.config);
        self.state.decisions_this_month = 0;

        info!(
            month = %format!("{} Y{}", month_name(month), year_of(month)),
            profit = %profit,
            cash = %self.state.cash,
            effects = self.state.ledger.len(),
            "month closed"
        );
        MonthReport {
            month,
            ledger: tick,
            expired,
            revenue,
            expenses,
            profit,
            cash: self.state.cash,
            status: self.state.status,
        }
    }

    /// HUD view of the run.
    pub fn snapshot(&self) -> SimSnapshot {
        let pending = self.state.ledger.pending();
        let s = &self.state;
        SimSnapshot {
            status: s.status,
            industry_id: s.industry_id.clone(),
            cash: s.cash,
            revenue: s.revenue,
            expenses: s.expenses,
            projected_profit: (s.revenue + pending.revenue).max(Decimal::ZERO)
                - (s.expenses + pending.expenses).max(Decimal::ZERO),
            customer_rating: s.customer_rating,
            month: s.month,
            month_name: month_name(s.month).to_string(),
            year: year_of(s.month),
            decisions_this_month: s.decisions_this_month,
            decisions_per_month: self.config.decisions_per_month,
            active_effects: s.ledger.iter().cloned().collect(),
            cards_remaining: self.pool.len(),
            current_card: self.current_card().cloned(),
            highest_cash: s.highest_cash,
            months_played: s.months_played,
            cards_played: s.cards_played,
            history_len: s.history.len(),
        }
    }

    /// Save the run. The card on the table is not kept and will be redrawn.
    pub fn save(&self) -> SavedGame {
        SavedGame {
            config: self.config.clone(),
            state: self.state.clone(),
            pool: self.pool.clone(),
        }
    }

    /// Session-log record for a finished run, `None` while playing.
    pub fn session_record(
        &self,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Option<SessionRecord> {
        let outcome = self.state.status.outcome()?;
        Some(SessionRecord {
            industry_id: self.state.industry_id.clone(),
            outcome,
            final_cash: self.state.cash,
            months_played: self.state.months_played,
            cards_played: self.state.cards_played,
            started_at,
            ended_at,
            highest_cash: self.state.highest_cash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sim_core::{CardCategory, Choice, EffectRange, RatingRange, RecurringRange};

    fn industry(cash: i64, revenue: i64, expenses: i64) -> Industry {
        Industry {
            id: IndustryId("bakery".into()),
            name: "Bakery".into(),
            description: String::new(),
            icon: String::new(),
            starting_cash: Decimal::new(cash, 0),
            starting_revenue: Decimal::new(revenue, 0),
            starting_expenses: Decimal::new(expenses, 0),
            is_available: true,
        }
    }

    fn card(id: &str, first: Choice) -> Card {
        Card {
            id: CardId(id.into()),
            industry_id: IndustryId("bakery".into()),
            category: CardCategory::Opportunity,
            title: id.into(),
            description: String::new(),
            stage_month: None,
            min_cash: None,
            max_cash: None,
            choices: vec![first, Choice::labeled("Pass")],
        }
    }

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    fn sim(ind: &Industry, cards: Vec<Card>) -> Simulation {
        Simulation::new(ind, cards, SimConfig::default()).unwrap()
    }

    fn decide(s: &mut Simulation, index: usize) -> ChoiceOutcome {
        s.draw_card().unwrap().expect("card");
        s.apply_choice(index).unwrap()
    }

    #[test]
    fn starts_from_industry_and_config() {
        let s = sim(&industry(10_000, 5_000, 3_000), vec![]);
        let st = s.state();
        assert_eq!(st.status, GameStatus::Playing);
        assert_eq!(st.cash, d(10_000));
        assert_eq!(st.month, 4);
        assert_eq!(st.customer_rating, 3);
        assert_eq!(s.snapshot().month_name, "April");
    }

    #[test]
    fn one_time_choice_hits_cash_and_baseline() {
        let mut c = Choice::labeled("Renovate");
        c.cash = Some(EffectRange::fixed(-3_000));
        c.revenue = Some(RecurringRange::fixed(800, 1));
        let mut s = sim(&industry(10_000, 5_000, 3_000), vec![card("reno", c)]);
        let out = decide(&mut s, 0);
        assert_eq!(s.state().cash, d(7_000));
        assert_eq!(s.state().revenue, d(5_800));
        assert!(s.state().ledger.is_empty());
        assert!(!out.registered_effect);
        assert!(out.month_end.is_none());
    }

    #[test]
    fn multi_month_revenue_keeps_baseline_and_expires_bonus() {
        let mut c = Choice::labeled("Ad campaign");
        c.revenue = Some(RecurringRange::fixed(500, 3));
        let mut s = sim(&industry(10_000, 5_000, 3_000), vec![card("ads", c)]);
        let out = decide(&mut s, 0);
        assert!(out.registered_effect);
        assert_eq!(s.state().revenue, d(5_500));
        let entry = s.state().ledger.iter().next().unwrap();
        assert_eq!(entry.months_remaining, 2);
        assert_eq!(entry.revenue, d(500));

        let m1 = s.end_month().unwrap();
        assert_eq!(m1.revenue, d(6_000));
        assert_eq!(m1.profit, d(3_000));
        assert_eq!(s.state().ledger.len(), 1);

        let m2 = s.end_month().unwrap();
        assert_eq!(m2.profit, d(3_000));
        assert_eq!(m2.expired, 1);
        assert!(s.state().ledger.is_empty());

        let m3 = s.end_month().unwrap();
        assert_eq!(m3.profit, d(2_500));
        assert_eq!(s.state().revenue, d(5_500));
        assert_eq!(s.state().cash, d(18_500));
    }

    #[test]
    fn negative_profit_bankrupts_and_locks_the_run() {
        let mut s = sim(
            &industry(30, 0, 80),
            vec![card("any", Choice::labeled("Go"))],
        );
        let report = s.end_month().unwrap();
        assert_eq!(report.cash, d(-50));
        assert_eq!(report.status, GameStatus::Lost);
        assert_eq!(s.status(), GameStatus::Lost);

        let before = s.state().clone();
        assert_eq!(s.apply_choice(0), Err(SimError::GameOver(GameStatus::Lost)));
        assert_eq!(s.end_month(), Err(SimError::GameOver(GameStatus::Lost)));
        assert!(matches!(s.draw_card(), Err(SimError::GameOver(GameStatus::Lost))));
        assert_eq!(s.end_month_if_ready(), Err(SimError::GameOver(GameStatus::Lost)));
        assert_eq!(s.state(), &before);
        assert_eq!(
            serde_json::to_string(s.state()).unwrap(),
            serde_json::to_string(&before).unwrap()
        );
    }

    #[test]
    fn crossing_threshold_wins_immediately() {
        let mut c = Choice::labeled("Sell franchise");
        c.cash = Some(EffectRange::fixed(7_000));
        let mut s = sim(&industry(95_000, 1_000, 1_000), vec![card("fr", c)]);
        let out = decide(&mut s, 0);
        assert_eq!(out.status, GameStatus::Won);
        assert_eq!(s.state().cash, d(102_000));
        assert_eq!(s.state().months_played, 0);
        assert!(out.month_end.is_none());
        assert_eq!(s.end_month(), Err(SimError::GameOver(GameStatus::Won)));
    }

    #[test]
    fn won_run_rejects_every_transition() {
        let mut c = Choice::labeled("Sell franchise");
        c.cash = Some(EffectRange::fixed(7_000));
        let cards = vec![card("fr", c), card("spare", Choice::labeled("Go"))];
        let mut s = sim(&industry(95_000, 1_000, 1_000), cards);
        let first = s.draw_card().unwrap().unwrap().card.id.clone();
        let index = if first.0 == "fr" { 0 } else { 1 };
        let out = s.apply_choice(index).unwrap();
        if first.0 != "fr" {
            assert_eq!(out.status, GameStatus::Playing);
            decide(&mut s, 0);
        }
        assert_eq!(s.status(), GameStatus::Won);

        let before = s.state().clone();
        let remaining = s.cards_remaining();
        assert!(matches!(s.draw_card(), Err(SimError::GameOver(GameStatus::Won))));
        assert_eq!(s.apply_choice(0), Err(SimError::GameOver(GameStatus::Won)));
        assert_eq!(s.end_month(), Err(SimError::GameOver(GameStatus::Won)));
        assert_eq!(s.end_month_if_ready(), Err(SimError::GameOver(GameStatus::Won)));
        assert_eq!(s.quit(), Err(SimError::GameOver(GameStatus::Won)));
        assert_eq!(s.state(), &before);
        assert_eq!(s.cards_remaining(), remaining);
        assert_eq!(
            s.session_record(Utc::now(), Utc::now()).map(|r| r.outcome),
            Some(Outcome::Won)
        );
    }

    #[test]
    fn revenue_cut_below_zero_records_what_landed() {
        let mut c = Choice::labeled("Close the terrace");
        c.revenue = Some(RecurringRange::fixed(-500, 3));
        let mut s = sim(&industry(10_000, 300, 100), vec![card("terrace", c)]);
        let out = decide(&mut s, 0);
        assert_eq!(s.state().revenue, Decimal::ZERO);
        assert_eq!(out.delta.revenue, d(-300));
        assert!(matches!(
            s.state().history.last(),
            Some(HistoryEntry::Decision { delta, .. }) if delta.revenue == d(-300)
        ));
        let entry = s.state().ledger.iter().next().unwrap();
        assert_eq!(entry.revenue, d(-300));
        assert_eq!(s.snapshot().projected_profit, d(-100));

        let report = s.end_month().unwrap();
        assert_eq!(report.revenue, Decimal::ZERO);
        assert_eq!(report.profit, d(-100));
        assert_eq!(s.state().cash, d(9_900));
    }

    #[test]
    fn clamped_rating_reports_realized_change() {
        let mut c = Choice::labeled("Viral post");
        c.customer_rating = Some(RatingRange { min: 4, max: 4 });
        let mut s = sim(&industry(10_000, 0, 0), vec![card("viral", c)]);
        let out = decide(&mut s, 0);
        assert_eq!(out.delta.customer_rating, 2);
    }

    #[test]
    fn unplayable_cards_never_reach_the_table() {
        let mut empty = card("empty", Choice::labeled("Only"));
        empty.choices.clear();
        let mut s = sim(
            &industry(10_000, 1_000, 500),
            vec![empty.clone(), card("ok", Choice::labeled("Go"))],
        );
        assert_eq!(s.cards_remaining(), 1);
        assert_eq!(s.draw_card().unwrap().unwrap().card.id.0, "ok");
        s.apply_choice(0).unwrap();
        assert!(s.draw_card().unwrap().is_none());

        let mut saved = s.save();
        saved.pool.push(empty);
        let resumed = Simulation::resume(saved, ChaCha8Rng::seed_from_u64(2)).unwrap();
        assert_eq!(resumed.cards_remaining(), 0);
    }

    #[test]
    fn bankruptcy_from_a_decision_is_immediate() {
        let mut c = Choice::labeled("Lawsuit");
        c.cash = Some(EffectRange::fixed(-2_000));
        let mut s = sim(&industry(1_000, 0, 0), vec![card("sued", c)]);
        let out = decide(&mut s, 0);
        assert_eq!(out.status, GameStatus::Lost);
        assert_eq!(s.state().decisions_this_month, 1);
    }

    #[test]
    fn quota_closes_the_month() {
        let cards = vec![
            card("a", Choice::labeled("Go")),
            card("b", Choice::labeled("Go")),
        ];
        let mut s = sim(&industry(10_000, 5_000, 3_000), cards);
        let first = decide(&mut s, 0);
        assert!(first.month_end.is_none());
        assert_eq!(s.end_month_if_ready().unwrap(), None);
        let second = decide(&mut s, 0);
        let report = second.month_end.expect("month closed");
        assert_eq!(report.month, 4);
        assert_eq!(report.profit, d(2_000));
        assert_eq!(s.state().month, 5);
        assert_eq!(s.state().decisions_this_month, 0);
        assert_eq!(s.state().cash, d(12_000));
        assert!(matches!(
            s.state().history.last(),
            Some(HistoryEntry::MonthEnd { month: 4, .. })
        ));
    }

    #[test]
    fn manual_month_end_waits_for_quota() {
        let cfg = SimConfig {
            auto_end_month: false,
            ..SimConfig::default()
        };
        let cards = vec![
            card("a", Choice::labeled("Go")),
            card("b", Choice::labeled("Go")),
        ];
        let mut s = Simulation::new(&industry(10_000, 5_000, 3_000), cards, cfg).unwrap();
        assert!(decide(&mut s, 0).month_end.is_none());
        assert!(decide(&mut s, 0).month_end.is_none());
        assert_eq!(s.state().decisions_this_month, 2);
        let report = s.end_month_if_ready().unwrap().expect("ready");
        assert_eq!(report.month, 4);
        assert_eq!(s.state().month, 5);
    }

    #[test]
    fn cards_never_repeat_within_a_run() {
        let cards: Vec<Card> = (0..9)
            .map(|i| card(&format!("c{i}"), Choice::labeled("Go")))
            .collect();
        let mut s = sim(&industry(50_000, 1_000, 1_000), cards);
        let mut seen = std::collections::BTreeSet::new();
        loop {
            let Some(id) = s.draw_card().unwrap().map(|d| d.card.id.clone()) else {
                break;
            };
            assert!(seen.insert(id.clone()), "repeat {id}");
            s.apply_choice(1).unwrap();
        }
        assert_eq!(seen.len(), 9);
        assert_eq!(s.cards_remaining(), 0);
        assert_eq!(s.state().cards_played, 9);
    }

    #[test]
    fn draw_is_stable_until_resolved() {
        let cards = vec![card("a", Choice::labeled("Go")), card("b", Choice::labeled("Go"))];
        let mut s = sim(&industry(10_000, 0, 0), cards);
        let first = s.draw_card().unwrap().unwrap().card.id.clone();
        let again = s.draw_card().unwrap().unwrap().card.id.clone();
        assert_eq!(first, again);
        assert_eq!(s.current_card().map(|c| c.id.clone()), Some(first));
    }

    #[test]
    fn apply_without_draw_or_bad_index_is_rejected() {
        let mut s = sim(&industry(10_000, 0, 0), vec![card("a", Choice::labeled("Go"))]);
        assert_eq!(s.apply_choice(0), Err(SimError::NoCardDrawn));
        s.draw_card().unwrap();
        assert_eq!(
            s.apply_choice(5),
            Err(SimError::ChoiceOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(s.cards_remaining(), 1);
        assert!(s.apply_choice(1).is_ok());
    }

    #[test]
    fn degenerate_draw_is_flagged() {
        let mut c = card("late", Choice::labeled("Go"));
        c.stage_month = Some(30);
        let mut s = sim(&industry(10_000, 0, 0), vec![c]);
        let draw = s.draw_card().unwrap().unwrap();
        assert!(draw.is_degenerate());
        s.apply_choice(0).unwrap();
        assert!(matches!(
            s.state().history.first(),
            Some(HistoryEntry::Decision {
                path: SelectionPath::AnyCard,
                ..
            })
        ));
    }

    #[test]
    fn drained_pool_is_not_an_error() {
        let mut s = sim(&industry(10_000, 0, 0), vec![]);
        assert!(s.draw_card().unwrap().is_none());
        assert_eq!(s.status(), GameStatus::Playing);
    }

    #[test]
    fn percent_resolves_against_value_at_decision_time() {
        let mut c = Choice::labeled("Invest");
        c.cash = Some(EffectRange {
            min: -10,
            max: -10,
            is_percent: true,
        });
        let mut s = sim(&industry(12_340, 0, 0), vec![card("inv", c)]);
        let out = decide(&mut s, 0);
        assert_eq!(out.delta.cash, d(-1_234));
        assert_eq!(s.state().cash, d(11_106));
    }

    #[test]
    fn rating_is_clamped() {
        let mut c = Choice::labeled("Free samples");
        c.customer_rating = Some(RatingRange { min: 4, max: 4 });
        let mut s = sim(&industry(10_000, 0, 0), vec![card("s", c)]);
        decide(&mut s, 0);
        assert_eq!(s.state().customer_rating, 5);
    }

    #[test]
    fn quit_is_terminal_and_logged() {
        let mut s = sim(&industry(10_000, 0, 0), vec![]);
        let t0 = Utc::now();
        assert!(s.session_record(t0, t0).is_none());
        s.quit().unwrap();
        assert_eq!(s.status(), GameStatus::Quit);
        assert_eq!(s.quit(), Err(SimError::GameOver(GameStatus::Quit)));
        let rec = s.session_record(t0, Utc::now()).unwrap();
        assert_eq!(rec.outcome, Outcome::Quit);
        assert_eq!(rec.final_cash, d(10_000));
    }

    #[test]
    fn save_and_resume_continue_the_run() {
        let cards = vec![card("a", Choice::labeled("Go")), card("b", Choice::labeled("Go"))];
        let mut s = sim(&industry(10_000, 1_000, 500), cards);
        decide(&mut s, 0);
        let json = serde_json::to_string(&s.save()).unwrap();
        let saved: SavedGame = serde_json::from_str(&json).unwrap();
        let mut resumed = Simulation::resume(saved, ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert_eq!(resumed.state(), s.state());
        assert_eq!(resumed.cards_remaining(), 1);
        let out = decide(&mut resumed, 0);
        assert!(out.month_end.is_some());
    }

    #[test]
    fn foreign_cards_are_dropped() {
        let mut other = card("x", Choice::labeled("Go"));
        other.industry_id = IndustryId("gym".into());
        let s = sim(&industry(10_000, 0, 0), vec![other, card("a", Choice::labeled("Go"))]);
        assert_eq!(s.cards_remaining(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = SimConfig {
            decisions_per_month: 0,
            ..SimConfig::default()
        };
        assert!(matches!(
            Simulation::new(&industry(1, 0, 0), vec![], cfg),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn snapshot_projects_profit_with_effects() {
        let mut c = Choice::labeled("Hire");
        c.expenses = Some(RecurringRange::fixed(400, 2));
        let mut s = sim(&industry(10_000, 5_000, 3_000), vec![card("h", c)]);
        decide(&mut s, 0);
        let snap = s.snapshot();
        assert_eq!(snap.expenses, d(3_400));
        assert_eq!(snap.projected_profit, d(1_200));
        assert_eq!(snap.active_effects.len(), 1);
        assert_eq!(snap.history_len, 1);
    }

    proptest! {
        #[test]
        fn at_most_one_terminal_state_and_frozen_after(seed in any::<u64>(), cash in 0i64..20_000) {
            let cards: Vec<Card> = (0..12)
                .map(|i| {
                    let mut c = Choice::labeled("Gamble");
                    c.cash = Some(EffectRange { min: -15_000, max: 15_000, is_percent: false });
                    card(&format!("g{i}"), c)
                })
                .collect();
            let cfg = SimConfig { rng_seed: seed, ..SimConfig::default() };
            let mut s = Simulation::new(&industry(cash, 2_000, 2_500), cards, cfg).unwrap();
            for _ in 0..40 {
                if s.status().is_terminal() {
                    break;
                }
                let drew = s.draw_card().unwrap().is_some();
                if drew {
                    s.apply_choice(0).unwrap();
                } else {
                    s.end_month().unwrap();
                }
                match s.status() {
                    GameStatus::Lost => prop_assert!(s.state().cash < Decimal::ZERO),
                    GameStatus::Won => prop_assert!(s.state().cash >= s.config().win_threshold),
                    GameStatus::Playing => {
                        prop_assert!(s.state().cash >= Decimal::ZERO);
                        prop_assert!(s.state().cash < s.config().win_threshold);
                    }
                    GameStatus::Quit => prop_assert!(false),
                }
            }
            if s.status().is_terminal() {
                let before = s.state().clone();
                prop_assert!(s.end_month().is_err());
                prop_assert!(s.apply_choice(0).is_err());
                prop_assert_eq!(s.state(), &before);
            }
        }
    }
}
