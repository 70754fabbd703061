//! Read-only content catalog seeding keyword categories and penalties.
//!
//! The seed ships as a compile-time JSON resource; the rest of the system
//! only consumes the lookup/sampling interface below.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

const SEED: &str = include_str!("seed.json");

/// Which game a category belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogGame {
    Quiz,
    Liar,
    Marble,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: u32,
    pub game: CatalogGame,
    pub name: String,
    pub words: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Seed {
    categories: Vec<Category>,
}

/// Summary row returned by category listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category_id: u32,
    pub name: String,
    pub word_count: usize,
}

pub struct Catalog {
    categories: Vec<Category>,
}

impl Catalog {
    /// Parse the embedded seed.
    pub fn embedded() -> Result<Self, serde_json::Error> {
        let seed: Seed = serde_json::from_str(SEED)?;
        Ok(Self {
            categories: seed.categories,
        })
    }

    pub fn list_categories(&self, game: CatalogGame) -> Vec<CategorySummary> {
        self.categories
            .iter()
            .filter(|category| category.game == game)
            .map(|category| CategorySummary {
                category_id: category.id,
                name: category.name.clone(),
                word_count: category.words.len(),
            })
            .collect()
    }

    pub fn category(&self, category_id: u32) -> Option<&Category> {
        self.categories
            .iter()
            .find(|category| category.id == category_id)
    }

    /// Up to `n` randomized rows from the category, `None` when unknown.
    pub fn random_words(&self, category_id: u32, n: usize) -> Option<Vec<String>> {
        let category = self.category(category_id)?;
        let mut words = category.words.clone();
        words.shuffle(&mut rand::rng());
        words.truncate(n);
        Some(words)
    }

    pub fn find_one_penalty_category(&self) -> Option<&Category> {
        self.categories
            .iter()
            .find(|category| category.game == CatalogGame::Marble)
    }

    pub fn all_content(&self, category_id: u32) -> Option<Vec<String>> {
        self.category(category_id)
            .map(|category| category.words.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_seed_parses() {
        let catalog = Catalog::embedded().expect("seed parses");
        assert!(!catalog.list_categories(CatalogGame::Quiz).is_empty());
        assert!(!catalog.list_categories(CatalogGame::Liar).is_empty());
    }

    #[test]
    fn penalty_category_covers_a_full_board() {
        let catalog = Catalog::embedded().expect("seed parses");
        let penalties = catalog.find_one_penalty_category().expect("penalty seed");
        assert!(penalties.words.len() >= 26);
    }

    #[test]
    fn random_words_samples_without_replacement() {
        let catalog = Catalog::embedded().expect("seed parses");
        let category = &catalog.list_categories(CatalogGame::Quiz)[0];
        let words = catalog
            .random_words(category.category_id, 5)
            .expect("known category");
        assert_eq!(words.len(), 5);
        let mut deduped = words.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), 5);
    }

    #[test]
    fn unknown_category_yields_none() {
        let catalog = Catalog::embedded().expect("seed parses");
        assert!(catalog.random_words(9999, 5).is_none());
    }
}
