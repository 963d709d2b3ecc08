//! Address geocoding through the Kakao Local REST API.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

const ADDRESS_SEARCH_URL: &str = "https://dapi.kakao.com/v2/local/search/address.json";

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

#[derive(Debug, Deserialize)]
struct AddressSearch {
    #[serde(default)]
    documents: Vec<AddressDocument>,
}

/// Kakao returns coordinates as strings: `x` is longitude, `y` latitude.
#[derive(Debug, Deserialize)]
struct AddressDocument {
    x: String,
    y: String,
}

/// Geocoder backed by the Kakao Local API.
#[derive(Clone)]
pub struct KakaoGeocoder {
    http: reqwest::Client,
    rest_key: Option<String>,
}

impl KakaoGeocoder {
    /// Create a geocoder. Without a key every lookup fails.
    pub fn new(http: reqwest::Client, rest_key: Option<String>) -> Self {
        Self {
            http,
            rest_key: rest_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Resolve an address to coordinates using the first match.
    pub async fn geocode(&self, address: &str) -> Result<Coordinates> {
        let key = self
            .rest_key
            .as_deref()
            .ok_or_else(|| AppError::Config("Kakao REST API key is not configured".to_string()))?;

        let response = self
            .http
            .get(ADDRESS_SEARCH_URL)
            .header("Authorization", format!("KakaoAK {}", key))
            .query(&[("query", address)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Address search failed: {}",
                response.status()
            )));
        }

        let search: AddressSearch = response.json().await?;
        first_coordinates(&search).ok_or_else(|| {
            AppError::NotFound(format!("Could not resolve address: {}", address))
        })
    }
}

fn first_coordinates(search: &AddressSearch) -> Option<Coordinates> {
    let doc = search.documents.first()?;
    Some(Coordinates {
        lat: doc.y.parse().ok()?,
        lng: doc.x.parse().ok()?,
    })
}
