#![deny(warnings)]

//! Minimal Bevy HUD/timeline driving a run headlessly.

use bevy_ecs::prelude::*;
use content::Catalog;
use rust_decimal::Decimal;
use sim_runtime::{play_turn, GreedyPolicy, Simulation, TurnOutcome};
use std::path::PathBuf;

/// The running game and the policy standing in for the player.
#[derive(Resource)]
struct Game {
    sim: Simulation,
    policy: GreedyPolicy,
}

#[derive(Resource, Default)]
struct HudState {
    month_label: String,
    cash: Decimal,
    profit: Decimal,
    rating: i32,
    effects: usize,
    turns: u32,
    finished: bool,
    last_event: String,
}

fn play_turn_system(mut game: ResMut<Game>, mut hud: ResMut<HudState>) {
    let Game { sim, policy } = &mut *game;
    hud.last_event = match play_turn(sim, policy) {
        Ok(TurnOutcome::Decided(out)) => {
            hud.turns += 1;
            format!("{} -> {}", out.card_id, out.choice_label)
        }
        Ok(TurnOutcome::IdleMonth(r)) => format!("quiet month, profit {}", r.profit),
        Ok(TurnOutcome::Finished(status)) => {
            hud.finished = true;
            format!("{status:?}")
        }
        Err(e) => format!("error: {e}"),
    };
}

fn refresh_hud_system(game: Res<Game>, mut hud: ResMut<HudState>) {
    let snap = game.sim.snapshot();
    hud.month_label = format!("{} {}", snap.month_name, snap.year);
    hud.cash = snap.cash;
    hud.profit = snap.projected_profit;
    hud.rating = snap.customer_rating;
    hud.effects = snap.active_effects.len();
    hud.finished |= snap.status.is_terminal();
}

fn build(sim: Simulation) -> (World, Schedule) {
    let mut world = World::new();
    world.insert_resource(Game {
        sim,
        policy: GreedyPolicy::default(),
    });
    world.insert_resource(HudState::default());
    let mut schedule = Schedule::default();
    schedule.add_systems((play_turn_system, refresh_hud_system).chain());
    (world, schedule)
}

fn main() -> anyhow::Result<()> {
    let dir = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("assets/content"), PathBuf::from);
    let catalog = Catalog::load_dir(&dir)?;
    let Some(industry) = catalog.available_industries().first().map(|i| (*i).clone()) else {
        anyhow::bail!("no playable industry in {}", dir.display());
    };
    let cards = catalog.fetch_cards_for_industry(&industry.id)?;
    let sim = Simulation::new(&industry, cards, Default::default())?;
    let (mut world, mut schedule) = build(sim);

    // No run loop: headless demo
    for _ in 0..240 {
        schedule.run(&mut world);
        let s = world.resource::<HudState>();
        println!(
            "[{}] cash ${} | profit ${} | rating {} | effects {} | {}",
            s.month_label, s.cash, s.profit, s.rating, s.effects, s.last_event
        );
        if s.finished {
            break;
        }
    }
    Ok(())
}
