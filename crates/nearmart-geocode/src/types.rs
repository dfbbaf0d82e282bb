//! Response shapes for Nominatim's `/reverse` endpoint (`format=json`).
//!
//! Only the fields the engine consumes are modelled; everything else in the
//! payload is ignored.

use nearmart_core::{PlaceAddress, UNKNOWN_CITY, UNKNOWN_COUNTRY, UNKNOWN_STATE};
use serde::Deserialize;

use crate::client::format_address;

#[derive(Debug, Clone, Deserialize)]
pub struct ReverseResponse {
    pub display_name: String,
    #[serde(default)]
    pub address: AddressDetails,
}

/// The `addressdetails=1` block. Which keys are present depends on the
/// place: rural fixes usually carry `village` and no `city`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressDetails {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl ReverseResponse {
    #[must_use]
    pub fn into_place(self) -> PlaceAddress {
        let AddressDetails {
            city,
            town,
            village,
            state,
            country,
        } = self.address;

        PlaceAddress {
            address: format_address(&self.display_name),
            city: first_present([city, town, village]).unwrap_or_else(|| UNKNOWN_CITY.to_string()),
            state: first_present([state]).unwrap_or_else(|| UNKNOWN_STATE.to_string()),
            country: first_present([country]).unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()),
        }
    }
}

/// First candidate that is present and not blank.
fn first_present<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}
