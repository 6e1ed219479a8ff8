//! In-memory favorites with a serializable whole-document form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use skycast_core::StorageError;

use crate::types::{FavoriteCity, Location};

/// Storage document name for favorites.
pub const FAVORITES_DOCUMENT: &str = "favorites";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FavoriteError {
    #[error("'{0}' is already a favorite")]
    AlreadyExists(String),
}

/// Persisted form of the favorites list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FavoritesDocument {
    pub favorites: Vec<FavoriteCity>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl FavoritesDocument {
    pub fn from_value(value: Value) -> Result<Self, StorageError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value, StorageError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Favorite cities, unique by case-insensitive location name.
#[derive(Debug, Clone, Default)]
pub struct FavoritesStore {
    favorites: Vec<FavoriteCity>,
    last_updated: Option<DateTime<Utc>>,
}

impl FavoritesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a stored document. Later duplicates are dropped.
    pub fn from_document(document: FavoritesDocument) -> Self {
        let mut store = Self {
            favorites: Vec::with_capacity(document.favorites.len()),
            last_updated: document.last_updated,
        };
        for favorite in document.favorites {
            if store.contains(favorite.location.name()) {
                tracing::warn!(
                    "Dropping duplicate favorite '{}' from stored document",
                    favorite.location.name()
                );
                continue;
            }
            store.favorites.push(favorite);
        }
        store
    }

    pub fn to_document(&self) -> FavoritesDocument {
        FavoritesDocument {
            favorites: self.favorites.clone(),
            last_updated: self.last_updated,
        }
    }

    pub fn list(&self) -> &[FavoriteCity] {
        &self.favorites
    }

    pub fn len(&self) -> usize {
        self.favorites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty()
    }

    /// Whether a favorite's location name equals `name`, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        let needle = name.trim().to_lowercase();
        self.favorites
            .iter()
            .any(|f| f.location.name().to_lowercase() == needle)
    }

    /// Add a resolved location.
    ///
    /// # Errors
    /// Returns `FavoriteError::AlreadyExists` if a favorite with the same
    /// location name (ignoring case) is already present.
    pub fn add(
        &mut self,
        location: Location,
        nickname: Option<String>,
    ) -> Result<&FavoriteCity, FavoriteError> {
        if self.contains(location.name()) {
            return Err(FavoriteError::AlreadyExists(location.name().to_string()));
        }
        self.favorites.push(FavoriteCity::new(location, nickname));
        self.touch();
        Ok(&self.favorites[self.favorites.len() - 1])
    }

    /// Remove the favorite whose name or nickname matches, ignoring case.
    pub fn remove(&mut self, name_or_nickname: &str) -> Option<FavoriteCity> {
        let index = self
            .favorites
            .iter()
            .position(|f| f.matches(name_or_nickname))?;
        let removed = self.favorites.remove(index);
        self.touch();
        Some(removed)
    }

    /// Record that weather for `location` was just shown.
    pub fn mark_viewed(&mut self, location: &Location, at: DateTime<Utc>) -> bool {
        match self.favorites.iter_mut().find(|f| &f.location == location) {
            Some(favorite) => {
                favorite.last_viewed = Some(at);
                self.last_updated = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    fn touch(&mut self) {
        self.last_updated = Some(Utc::now());
    }
}
