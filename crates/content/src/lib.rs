#![deny(warnings)]

//! YAML content packs: one industry and its card deck per file.
//!
//! A pack directory holds any number of `*.yaml` / `*.yml` files. Each is
//! parsed, stamped with its industry id and validated before it reaches the
//! [`Catalog`], which serves the read-only fetch contracts a run needs.

use serde::{Deserialize, Serialize};
use sim_core::{self as core, Card, CardId, Industry, IndustryId, ValidationError};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("io error: {0}")]
    Io(String),
    #[error("yaml error in {path}: {message}")]
    Yaml { path: String, message: String },
    #[error("invalid {context}: {source}")]
    Invalid {
        context: String,
        #[source]
        source: ValidationError,
    },
    #[error("unknown industry: {0}")]
    UnknownIndustry(String),
    #[error("industry {0} is defined twice")]
    DuplicateIndustry(String),
    #[error("card {card} in pack {industry} belongs to another industry")]
    ForeignCard { industry: String, card: String },
    #[error("card {card} appears twice in industry {industry}")]
    DuplicateCard { industry: String, card: String },
    #[error("card id {card} is used by both {first} and {second}")]
    CardIdTaken {
        card: String,
        first: String,
        second: String,
    },
}

impl From<std::io::Error> for ContentError {
    fn from(e: std::io::Error) -> Self {
        ContentError::Io(e.to_string())
    }
}

/// One industry with its deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPack {
    pub industry: Industry,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl ContentPack {
    /// Stamp card ownership and check every invariant.
    pub fn validated(mut self) -> Result<Self, ContentError> {
        core::validate_industry(&self.industry).map_err(|source| ContentError::Invalid {
            context: format!("industry {}", self.industry.id),
            source,
        })?;
        let mut seen = BTreeSet::new();
        for card in &mut self.cards {
            if card.industry_id.0.is_empty() {
                card.industry_id = self.industry.id.clone();
            }
            if card.industry_id != self.industry.id {
                return Err(ContentError::ForeignCard {
                    industry: self.industry.id.0.clone(),
                    card: card.id.0.clone(),
                });
            }
            if !seen.insert(card.id.clone()) {
                return Err(ContentError::DuplicateCard {
                    industry: self.industry.id.0.clone(),
                    card: card.id.0.clone(),
                });
            }
            core::validate_card(card).map_err(|source| ContentError::Invalid {
                context: format!("card {}", card.id),
                source,
            })?;
        }
        Ok(self)
    }
}

/// Parse and validate a pack from YAML text. `origin` names it in errors.
pub fn parse_pack(text: &str, origin: &str) -> Result<ContentPack, ContentError> {
    let pack: ContentPack = serde_yaml::from_str(text).map_err(|e| ContentError::Yaml {
        path: origin.to_string(),
        message: e.to_string(),
    })?;
    pack.validated()
}

/// Load a single pack file.
pub fn load_pack<P: AsRef<Path>>(path: P) -> Result<ContentPack, ContentError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    parse_pack(&text, &path.display().to_string())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Industries and decks, keyed by industry id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packs: BTreeMap<IndustryId, ContentPack>,
}

impl Catalog {
    /// Build from already-parsed packs. Industry ids and card ids must be unique
    /// across the whole catalog.
    pub fn from_packs(packs: Vec<ContentPack>) -> Result<Self, ContentError> {
        let mut map = BTreeMap::new();
        let mut owners: BTreeMap<CardId, IndustryId> = BTreeMap::new();
        for pack in packs {
            let pack = pack.validated()?;
            let id = pack.industry.id.clone();
            for card in &pack.cards {
                if let Some(first) = owners.insert(card.id.clone(), id.clone()) {
                    if first != id {
                        return Err(ContentError::CardIdTaken {
                            card: card.id.0.clone(),
                            first: first.0,
                            second: id.0.clone(),
                        });
                    }
                }
            }
            if map.insert(id.clone(), pack).is_some() {
                return Err(ContentError::DuplicateIndustry(id.0));
            }
        }
        Ok(Self { packs: map })
    }

    /// Load every YAML pack in `dir`, in file-name order.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ContentError> {
        let mut files: Vec<PathBuf> = Vec::new();
        for ent in fs::read_dir(dir.as_ref())? {
            let ent = ent?;
            let path = ent.path();
            if ent.file_type()?.is_file() && is_yaml(&path) {
                files.push(path);
            } else {
                debug!(path = %path.display(), "skipping non-pack entry");
            }
        }
        files.sort();
        let mut packs = Vec::with_capacity(files.len());
        for f in &files {
            packs.push(load_pack(f)?);
        }
        let catalog = Self::from_packs(packs)?;
        info!(
            dir = %dir.as_ref().display(),
            industries = catalog.packs.len(),
            cards = catalog.packs.values().map(|p| p.cards.len()).sum::<usize>(),
            "content loaded"
        );
        Ok(catalog)
    }

    /// Industry template by id.
    pub fn fetch_industry(&self, id: &IndustryId) -> Result<&Industry, ContentError> {
        self.packs
            .get(id)
            .map(|p| &p.industry)
            .ok_or_else(|| ContentError::UnknownIndustry(id.0.clone()))
    }

    /// A fresh copy of an industry's deck, ready to seed a run.
    pub fn fetch_cards_for_industry(&self, id: &IndustryId) -> Result<Vec<Card>, ContentError> {
        self.packs
            .get(id)
            .map(|p| p.cards.clone())
            .ok_or_else(|| ContentError::UnknownIndustry(id.0.clone()))
    }

    /// Industries a player may pick.
    pub fn available_industries(&self) -> Vec<&Industry> {
        self.packs
            .values()
            .map(|p| &p.industry)
            .filter(|i| i.is_available)
            .collect()
    }

    /// All packs, including unavailable industries.
    pub fn packs(&self) -> impl Iterator<Item = &ContentPack> {
        self.packs.values()
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}
