#![deny(warnings)]

//! Persistence layer: SQLite content store, session log and save slots.
//!
//! Money is stored as decimal TEXT and timestamps as RFC 3339 TEXT so that
//! values round-trip exactly. Saves are JSON blobs of [`SavedGame`].

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use content::ContentPack;
use rust_decimal::Decimal;
use sim_core::{
    validate_card, Card, CardCategory, CardId, Choice, EffectRange, Industry, IndustryId, Outcome,
    RatingRange, RecurringRange, SessionRecord,
};
use sim_runtime::SavedGame;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/main.db"
}

/// Open (creating if needed) the database at `url` and run migrations.
pub async fn init_db(url: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("bad sqlite url {url}"))?
        .create_if_missing(true)
        .foreign_keys(true);
    let in_memory = url.contains(":memory:");
    // Every in-memory connection is its own database; keep exactly one alive.
    let pool = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?
    } else {
        SqlitePoolOptions::new().connect_with(opts).await?
    };
    sqlx::migrate!("./migrations").run(&pool).await?;
    debug!(url, "database ready");
    Ok(pool)
}

fn dec(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("bad decimal {s:?}"))
}

fn ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("bad timestamp {s:?}"))?
        .with_timezone(&Utc))
}

fn u32_col(row: &SqliteRow, col: &str) -> Result<u32> {
    let v: i64 = row.try_get(col)?;
    u32::try_from(v).with_context(|| format!("{col} out of range: {v}"))
}

/// Insert or replace an industry together with its whole deck.
pub async fn import_pack(pool: &SqlitePool, pack: &ContentPack) -> Result<()> {
    let ind = &pack.industry;
    let mut tx = pool.begin().await?;
    for card in &pack.cards {
        let owner: Option<String> =
            sqlx::query_scalar("SELECT industry_id FROM cards WHERE id = ? AND industry_id <> ?")
                .bind(&card.id.0)
                .bind(&ind.id.0)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(owner) = owner {
            bail!("card id {} in {} is already used by {}", card.id, ind.id, owner);
        }
    }
    sqlx::query(
        r"INSERT INTO industries
          (id, name, description, icon, starting_cash, starting_revenue, starting_expenses, is_available)
          VALUES (?, ?, ?, ?, ?, ?, ?, ?)
          ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            icon = excluded.icon,
            starting_cash = excluded.starting_cash,
            starting_revenue = excluded.starting_revenue,
            starting_expenses = excluded.starting_expenses,
            is_available = excluded.is_available",
    )
    .bind(&ind.id.0)
    .bind(&ind.name)
    .bind(&ind.description)
    .bind(&ind.icon)
    .bind(ind.starting_cash.to_string())
    .bind(ind.starting_revenue.to_string())
    .bind(ind.starting_expenses.to_string())
    .bind(ind.is_available)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM choices WHERE card_id IN (SELECT id FROM cards WHERE industry_id = ?)")
        .bind(&ind.id.0)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM cards WHERE industry_id = ?")
        .bind(&ind.id.0)
        .execute(&mut *tx)
        .await?;

    for card in &pack.cards {
        sqlx::query(
            r"INSERT INTO cards
              (id, industry_id, category, title, description, stage_month, min_cash, max_cash)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&card.id.0)
        .bind(&ind.id.0)
        .bind(card.category.as_str())
        .bind(&card.title)
        .bind(&card.description)
        .bind(card.stage_month.map(i64::from))
        .bind(card.min_cash.map(|d| d.to_string()))
        .bind(card.max_cash.map(|d| d.to_string()))
        .execute(&mut *tx)
        .await?;

        for (pos, ch) in card.choices.iter().enumerate() {
            sqlx::query(
                r"INSERT INTO choices
                  (card_id, position, label, description,
                   cash_min, cash_max, cash_is_percent,
                   revenue_min, revenue_max, revenue_is_percent, revenue_duration,
                   expenses_min, expenses_max, expenses_is_percent, expenses_duration,
                   customer_rating_min, customer_rating_max)
                  VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&card.id.0)
            .bind(pos as i64)
            .bind(&ch.label)
            .bind(&ch.description)
            .bind(ch.cash.map(|r| r.min))
            .bind(ch.cash.map(|r| r.max))
            .bind(ch.cash.is_some_and(|r| r.is_percent))
            .bind(ch.revenue.map(|r| r.min))
            .bind(ch.revenue.map(|r| r.max))
            .bind(ch.revenue.is_some_and(|r| r.is_percent))
            .bind(i64::from(ch.revenue_duration()))
            .bind(ch.expenses.map(|r| r.min))
            .bind(ch.expenses.map(|r| r.max))
            .bind(ch.expenses.is_some_and(|r| r.is_percent))
            .bind(i64::from(ch.expenses_duration()))
            .bind(ch.customer_rating.map(|r| r.min))
            .bind(ch.customer_rating.map(|r| r.max))
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;
    info!(industry = %ind.id, cards = pack.cards.len(), "pack imported");
    Ok(())
}

fn industry_from_row(row: &SqliteRow) -> Result<Industry> {
    Ok(Industry {
        id: IndustryId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        icon: row.try_get("icon")?,
        starting_cash: dec(row.try_get("starting_cash")?)?,
        starting_revenue: dec(row.try_get("starting_revenue")?)?,
        starting_expenses: dec(row.try_get("starting_expenses")?)?,
        is_available: row.try_get("is_available")?,
    })
}

/// Industry template by id, `None` when unknown.
pub async fn fetch_industry(pool: &SqlitePool, id: &IndustryId) -> Result<Option<Industry>> {
    let row = sqlx::query("SELECT * FROM industries WHERE id = ?")
        .bind(&id.0)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(industry_from_row).transpose()
}

/// Industries ordered by name; only pickable ones when `only_available`.
pub async fn list_industries(pool: &SqlitePool, only_available: bool) -> Result<Vec<Industry>> {
    let rows = sqlx::query("SELECT * FROM industries WHERE is_available = 1 OR ? = 0 ORDER BY name")
        .bind(only_available)
        .fetch_all(pool)
        .await?;
    rows.iter().map(industry_from_row).collect()
}

fn pair<T>(min: Option<T>, max: Option<T>) -> Option<(T, T)> {
    Some((min?, max?))
}

fn choice_from_row(row: &SqliteRow) -> Result<Choice> {
    let cash = match pair(row.try_get("cash_min")?, row.try_get("cash_max")?) {
        Some((min, max)) => Some(EffectRange {
            min,
            max,
            is_percent: row.try_get("cash_is_percent")?,
        }),
        None => None,
    };
    let recurring = |prefix: &str| -> Result<Option<RecurringRange>> {
        let Some((min, max)) = pair(
            row.try_get(format!("{prefix}_min").as_str())?,
            row.try_get(format!("{prefix}_max").as_str())?,
        ) else {
            return Ok(None);
        };
        Ok(Some(RecurringRange {
            min,
            max,
            is_percent: row.try_get(format!("{prefix}_is_percent").as_str())?,
            duration: u32_col(row, &format!("{prefix}_duration"))?,
        }))
    };
    let customer_rating = pair(
        row.try_get("customer_rating_min")?,
        row.try_get("customer_rating_max")?,
    )
    .map(|(min, max)| RatingRange { min, max });
    Ok(Choice {
        label: row.try_get("label")?,
        description: row.try_get("description")?,
        cash,
        revenue: recurring("revenue")?,
        expenses: recurring("expenses")?,
        customer_rating,
    })
}

/// The industry's deck, ordered by card id, choices in authored order.
pub async fn fetch_cards_for_industry(pool: &SqlitePool, id: &IndustryId) -> Result<Vec<Card>> {
    let choice_rows = sqlx::query(
        r"SELECT ch.* FROM choices ch
          JOIN cards c ON c.id = ch.card_id
          WHERE c.industry_id = ?
          ORDER BY ch.card_id, ch.position",
    )
    .bind(&id.0)
    .fetch_all(pool)
    .await?;
    let mut choices: BTreeMap<String, Vec<Choice>> = BTreeMap::new();
    for row in &choice_rows {
        let card_id: String = row.try_get("card_id")?;
        choices.entry(card_id).or_default().push(choice_from_row(row)?);
    }

    let rows = sqlx::query("SELECT * FROM cards WHERE industry_id = ? ORDER BY id")
        .bind(&id.0)
        .fetch_all(pool)
        .await?;
    let mut cards: Vec<Card> = Vec::with_capacity(rows.len());
    for row in &rows {
        let card_id: String = row.try_get("id")?;
        let category: String = row.try_get("category")?;
        let stage_month: Option<i64> = row.try_get("stage_month")?;
        let min_cash: Option<String> = row.try_get("min_cash")?;
        let max_cash: Option<String> = row.try_get("max_cash")?;
        cards.push(Card {
            choices: choices.remove(&card_id).unwrap_or_default(),
            id: CardId(card_id),
            industry_id: id.clone(),
            category: CardCategory::parse(&category)
                .ok_or_else(|| anyhow!("unknown card category {category:?}"))?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            stage_month: stage_month.map(u32::try_from).transpose()?,
            min_cash: min_cash.as_deref().map(dec).transpose()?,
            max_cash: max_cash.as_deref().map(dec).transpose()?,
        });
    }
    for card in &cards {
        validate_card(card).with_context(|| format!("stored card {} is unplayable", card.id))?;
    }
    Ok(cards)
}

/// Append a finished run to the session log. Returns the row id.
pub async fn log_session(pool: &SqlitePool, rec: &SessionRecord) -> Result<i64> {
    let res = sqlx::query(
        r"INSERT INTO game_sessions
          (industry_id, outcome, final_cash, months_played, cards_played, started_at, ended_at, highest_cash)
          VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&rec.industry_id.0)
    .bind(rec.outcome.as_str())
    .bind(rec.final_cash.to_string())
    .bind(i64::from(rec.months_played))
    .bind(i64::from(rec.cards_played))
    .bind(rec.started_at.to_rfc3339())
    .bind(rec.ended_at.to_rfc3339())
    .bind(rec.highest_cash.to_string())
    .execute(pool)
    .await?;
    let id = res.last_insert_rowid();
    info!(id, industry = %rec.industry_id, outcome = rec.outcome.as_str(), "session logged");
    Ok(id)
}

/// A logged session with its row id.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredSession {
    pub id: i64,
    pub record: SessionRecord,
}

/// Best runs for an industry by final cash, highest first.
pub async fn top_sessions(
    pool: &SqlitePool,
    industry: &IndustryId,
    limit: u32,
) -> Result<Vec<StoredSession>> {
    let rows = sqlx::query(
        r"SELECT * FROM game_sessions WHERE industry_id = ?
          ORDER BY CAST(final_cash AS REAL) DESC, id ASC
          LIMIT ?",
    )
    .bind(&industry.0)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| {
            let outcome: String = row.try_get("outcome")?;
            Ok(StoredSession {
                id: row.try_get("id")?,
                record: SessionRecord {
                    industry_id: IndustryId(row.try_get("industry_id")?),
                    outcome: Outcome::parse(&outcome)
                        .ok_or_else(|| anyhow!("unknown outcome {outcome:?}"))?,
                    final_cash: dec(row.try_get("final_cash")?)?,
                    months_played: u32_col(row, "months_played")?,
                    cards_played: u32_col(row, "cards_played")?,
                    started_at: ts(row.try_get("started_at")?)?,
                    ended_at: ts(row.try_get("ended_at")?)?,
                    highest_cash: dec(row.try_get("highest_cash")?)?,
                },
            })
        })
        .collect()
}

/// Write `game` to `slot`, replacing any previous save there.
pub async fn save_game(pool: &SqlitePool, slot: &str, game: &SavedGame) -> Result<()> {
    let payload = serde_json::to_string(game)?;
    sqlx::query(
        r"INSERT INTO saves (slot, saved_at, payload) VALUES (?, ?, ?)
          ON CONFLICT (slot) DO UPDATE SET saved_at = excluded.saved_at, payload = excluded.payload",
    )
    .bind(slot)
    .bind(Utc::now().to_rfc3339())
    .bind(&payload)
    .execute(pool)
    .await?;
    debug!(slot, bytes = payload.len(), "game saved");
    Ok(())
}

/// Read the save in `slot`, `None` when the slot is empty.
pub async fn load_game(pool: &SqlitePool, slot: &str) -> Result<Option<SavedGame>> {
    let row = sqlx::query("SELECT payload FROM saves WHERE slot = ?")
        .bind(slot)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else { return Ok(None) };
    let payload: String = row.try_get("payload")?;
    let game = serde_json::from_str(&payload).with_context(|| format!("corrupt save in {slot}"))?;
    Ok(Some(game))
}

/// Save slots with their timestamps, newest first.
pub async fn list_saves(pool: &SqlitePool) -> Result<Vec<(String, DateTime<Utc>)>> {
    let rows = sqlx::query("SELECT slot, saved_at FROM saves ORDER BY saved_at DESC, slot")
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| Ok((row.try_get("slot")?, ts(row.try_get("saved_at")?)?)))
        .collect()
}

/// Remove a save slot. Returns whether anything was deleted.
pub async fn delete_save(pool: &SqlitePool, slot: &str) -> Result<bool> {
    let res = sqlx::query("DELETE FROM saves WHERE slot = ?")
        .bind(slot)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}
