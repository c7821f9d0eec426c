#![deny(warnings)]

use anyhow::Result;
use content::Catalog;
use persistence::default_sqlite_url;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn parse_args() -> (String, Option<String>) {
    let mut db = default_sqlite_url().to_string();
    let mut content = None;
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--db" => {
                if let Some(v) = it.next() {
                    db = v;
                }
            }
            "--content" => content = it.next(),
            _ => {}
        }
    }
    (db, content)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (url, content_dir) = parse_args();
    // Ensure directory exists
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"));
    if let Some(path) = path.filter(|p| !p.contains(":memory:")) {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let pool = persistence::init_db(&url).await?;
    if let Some(dir) = content_dir {
        let catalog = Catalog::load_dir(&dir)?;
        for pack in catalog.packs() {
            persistence::import_pack(&pool, pack).await?;
        }
        info!(dir = %dir, industries = catalog.len(), "content imported");
    }
    println!("DB migrated at {}", url);
    Ok(())
}
