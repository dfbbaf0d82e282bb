use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Coordinates, Listing, ListingStatus, SELF_MARKER_ID};

/// One listing as stored in a listings file.
///
/// Coordinates are optional because listings can be created before a
/// location is attached; such entries are never placed on the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub seller_name: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    pub status: ListingStatus,
}

impl ListingEntry {
    /// Engine view of this entry, or `None` when it has no coordinates.
    #[must_use]
    pub fn to_listing(&self) -> Option<Listing> {
        let coordinates = self.coordinates?;
        Some(Listing {
            id: self.id.clone(),
            coordinates,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            quantity: self.quantity.clone(),
            location: self.location.clone(),
            seller_name: self.seller_name.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListingsFile {
    pub listings: Vec<ListingEntry>,
}

impl ListingsFile {
    /// Active listings that can be placed on the map, in file order.
    #[must_use]
    pub fn active_listings(&self) -> Vec<Listing> {
        self.listings
            .iter()
            .filter(|entry| entry.status == ListingStatus::Active)
            .filter_map(ListingEntry::to_listing)
            .collect()
    }
}

/// Load and validate a listings file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_listings(path: &Path) -> Result<ListingsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ListingsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_listings(&content)
}

/// Parse and validate listings YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML does not parse or fails validation.
pub fn parse_listings(content: &str) -> Result<ListingsFile, ConfigError> {
    let file: ListingsFile = serde_yaml::from_str(content)?;
    validate_listings(&file)?;
    Ok(file)
}

fn validate_listings(file: &ListingsFile) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for entry in &file.listings {
        let id = entry.id.trim();
        if id.is_empty() {
            return Err(ConfigError::Validation(
                "listing id must be non-empty".to_string(),
            ));
        }

        if id == SELF_MARKER_ID {
            return Err(ConfigError::Validation(format!(
                "listing id '{SELF_MARKER_ID}' is reserved for the user marker"
            )));
        }

        if !seen_ids.insert(id.to_string()) {
            return Err(ConfigError::Validation(format!(
                "duplicate listing id: '{}'",
                entry.id
            )));
        }

        if entry.price.is_sign_negative() && !entry.price.is_zero() {
            return Err(ConfigError::Validation(format!(
                "listing '{}' has negative price {}",
                entry.id, entry.price
            )));
        }

        if let Some(coordinates) = entry.coordinates {
            if !coordinates.is_valid() {
                return Err(ConfigError::Validation(format!(
                    "listing '{}' has coordinates outside the WGS84 range",
                    entry.id
                )));
            }
        }
    }

    Ok(())
}
