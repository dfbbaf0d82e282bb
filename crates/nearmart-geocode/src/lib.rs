//! Reverse geocoding against a Nominatim-compatible HTTP API.

pub mod client;
pub mod error;
pub(crate) mod retry;
pub mod types;

pub use client::{format_address, NominatimClient, DEFAULT_BASE_URL};
pub use error::GeocodeError;
pub use types::{AddressDetails, ReverseResponse};
