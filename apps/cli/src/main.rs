#![deny(warnings)]

//! Headless CLI: load content, autoplay one run and report the outcome.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use content::Catalog;
use rust_decimal::Decimal;
use sim_core::{IndustryId, SimConfig};
use sim_runtime::{run_game, GreedyPolicy, Policy, RandomPolicy, Simulation};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Args {
    content: PathBuf,
    industry: Option<String>,
    config: Option<PathBuf>,
    seed: Option<u64>,
    quota: Option<u32>,
    win: Option<Decimal>,
    policy: String,
    max_months: u32,
    db: Option<String>,
    json: bool,
    list: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        content: PathBuf::from("assets/content"),
        industry: None,
        config: None,
        seed: None,
        quota: None,
        win: None,
        policy: "greedy".to_string(),
        max_months: 36,
        db: None,
        json: false,
        list: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--content" => {
                if let Some(v) = it.next() {
                    args.content = PathBuf::from(v);
                }
            }
            "--industry" => args.industry = it.next(),
            "--config" => args.config = it.next().map(PathBuf::from),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--quota" => args.quota = it.next().and_then(|s| s.parse().ok()),
            "--win" => args.win = it.next().and_then(|s| s.parse().ok()),
            "--policy" => {
                if let Some(v) = it.next() {
                    args.policy = v;
                }
            }
            "--max-months" => {
                if let Some(v) = it.next().and_then(|s| s.parse().ok()) {
                    args.max_months = v;
                }
            }
            "--db" => args.db = it.next(),
            "--json" => args.json = true,
            "--list" => args.list = true,
            _ => {}
        }
    }
    args
}

fn load_config(args: &Args) -> Result<SimConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        cfg.rng_seed = seed;
    }
    if let Some(q) = args.quota {
        cfg.decisions_per_month = q;
    }
    if let Some(w) = args.win {
        cfg.win_threshold = w;
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(?args, "starting CLI");
    let catalog = Catalog::load_dir(&args.content)?;

    if args.list {
        for ind in catalog.available_industries() {
            let deck = catalog.fetch_cards_for_industry(&ind.id)?;
            println!(
                "{:<16} {:<24} cash ${} | cards: {}",
                ind.id.0,
                ind.name,
                ind.starting_cash,
                deck.len()
            );
        }
        return Ok(());
    }

    let industry = match &args.industry {
        Some(id) => catalog.fetch_industry(&IndustryId(id.clone()))?.clone(),
        None => match catalog.available_industries().first() {
            Some(ind) => (*ind).clone(),
            None => bail!("no available industry in {}", args.content.display()),
        },
    };
    if !industry.is_available {
        warn!(industry = %industry.id, "industry is not available, playing anyway");
    }
    let cards = catalog.fetch_cards_for_industry(&industry.id)?;
    let cfg = load_config(&args)?;
    let seed = cfg.rng_seed;

    let mut policy: Box<dyn Policy> = match args.policy.as_str() {
        "random" => Box::new(RandomPolicy::seeded(seed)),
        "greedy" => Box::new(GreedyPolicy::default()),
        other => bail!("unknown policy {other:?} (expected random|greedy)"),
    };

    let started_at = Utc::now();
    let mut sim = Simulation::new(&industry, cards, cfg)?;
    let snap = run_game(&mut sim, policy.as_mut(), args.max_months)?;
    let ended_at = Utc::now();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    } else {
        println!(
            "Run | {} | {} {} | status: {:?}",
            industry.name, snap.month_name, snap.year, snap.status
        );
        println!(
            "KPI | months: {} | cards: {} | cash: ${} | peak: ${} | revenue: ${} | expenses: ${} | rating: {} | build: {} ({})",
            snap.months_played,
            snap.cards_played,
            snap.cash,
            snap.highest_cash,
            snap.revenue,
            snap.expenses,
            snap.customer_rating,
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
    }

    if let Some(url) = &args.db {
        // Best-effort: a failing session log never fails the run.
        match sim.session_record(started_at, ended_at) {
            Some(rec) => {
                let logged = async {
                    let pool = persistence::init_db(url).await?;
                    persistence::log_session(&pool, &rec).await
                }
                .await;
                if let Err(e) = logged {
                    warn!(error = %e, url = %url, "session log failed");
                }
            }
            None => info!("run still in progress, not logging a session"),
        }
    }

    Ok(())
}
