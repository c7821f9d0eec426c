use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use sim_core::{
    Card, CardCategory, CardId, Choice, EffectRange, Industry, IndustryId, RecurringRange,
    SimConfig,
};
use sim_runtime::{run_game, GreedyPolicy, RandomPolicy, Simulation};

fn industry() -> Industry {
    Industry {
        id: IndustryId("bench".into()),
        name: "Bench Corp".into(),
        description: String::new(),
        icon: String::new(),
        starting_cash: Decimal::new(20_000, 0),
        starting_revenue: Decimal::new(6_000, 0),
        starting_expenses: Decimal::new(5_500, 0),
        is_available: true,
    }
}

fn build_deck(n: usize) -> Vec<Card> {
    (0..n)
        .map(|i| {
            let mut grow = Choice::labeled("Grow");
            grow.cash = Some(EffectRange {
                min: -4_000,
                max: -1_000,
                is_percent: false,
            });
            grow.revenue = Some(RecurringRange {
                min: 200,
                max: 900,
                is_percent: false,
                duration: 3,
            });
            let mut save = Choice::labeled("Save");
            save.expenses = Some(RecurringRange {
                min: -10,
                max: -2,
                is_percent: true,
                duration: 2,
            });
            Card {
                id: CardId(format!("b{i}")),
                industry_id: IndustryId("bench".into()),
                category: CardCategory::ALL[i % 4],
                title: format!("Bench card {i}"),
                description: String::new(),
                stage_month: Some((i % 10) as u32 + 4),
                min_cash: None,
                max_cash: None,
                choices: vec![grow, save],
            }
        })
        .collect()
}

fn bench_runs(c: &mut Criterion) {
    let ind = industry();
    let deck = build_deck(120);
    c.bench_function("greedy run 120 cards x 36 months", |b| {
        b.iter(|| {
            let mut sim = Simulation::new(&ind, deck.clone(), SimConfig::default()).unwrap();
            let mut p = GreedyPolicy::default();
            black_box(run_game(&mut sim, &mut p, 36).unwrap())
        })
    });
    c.bench_function("random run 120 cards x 36 months", |b| {
        let mut seed = 0u64;
        b.iter(|| {
            seed += 1;
            let cfg = SimConfig {
                rng_seed: seed,
                ..SimConfig::default()
            };
            let mut sim = Simulation::new(&ind, deck.clone(), cfg).unwrap();
            let mut p = RandomPolicy::seeded(seed);
            black_box(run_game(&mut sim, &mut p, 36).unwrap())
        })
    });
}

criterion_group!(benches, bench_runs);
criterion_main!(benches);
