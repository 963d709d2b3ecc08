//! Library and bookstore locations shown on the map.

mod geocode;

pub use geocode::{Coordinates, KakaoGeocoder};

use serde::{Deserialize, Serialize};

/// Kakao Maps JavaScript SDK endpoint.
const SDK_URL: &str = "https://dapi.kakao.com/v2/maps/sdk.js";

/// Kind of place on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    /// Public library.
    Library,
    /// Bookstore.
    Bookstore,
}

impl LocationKind {
    /// Parse a kind filter. `"all"` and unknown values mean no filter.
    pub fn parse_filter(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "library" => Some(LocationKind::Library),
            "bookstore" => Some(LocationKind::Bookstore),
            _ => None,
        }
    }
}

/// A marker on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Marker ID.
    pub id: u32,
    /// Place name.
    pub name: String,
    /// Library or bookstore.
    #[serde(rename = "type")]
    pub kind: LocationKind,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Street address.
    pub address: String,
}

/// The fixed demo dataset.
pub fn demo_locations() -> Vec<Location> {
    let rows: [(u32, &str, LocationKind, f64, f64, &str); 6] = [
        (1, "강남도서관", LocationKind::Library, 37.4979, 127.0276, "서울특별시 강남구 테헤란로"),
        (2, "교보문고 강남점", LocationKind::Bookstore, 37.5045, 127.0489, "서울특별시 강남구 강남대로"),
        (3, "서울시립도서관", LocationKind::Library, 37.5665, 126.9780, "서울특별시 중구 세종대로"),
        (4, "영풍문고 종로점", LocationKind::Bookstore, 37.5704, 126.9920, "서울특별시 종로구 종로"),
        (5, "반포도서관", LocationKind::Library, 37.5041, 127.0015, "서울특별시 서초구 반포대로"),
        (6, "알라딘 중고서적", LocationKind::Bookstore, 37.5512, 126.9882, "서울특별시 마포구 홍대로"),
    ];

    rows.into_iter()
        .map(|(id, name, kind, lat, lng, address)| Location {
            id,
            name: name.to_string(),
            kind,
            lat,
            lng,
            address: address.to_string(),
        })
        .collect()
}

/// Demo locations, optionally restricted to one kind.
pub fn filter_locations(kind: Option<LocationKind>) -> Vec<Location> {
    demo_locations()
        .into_iter()
        .filter(|loc| kind.is_none_or(|k| loc.kind == k))
        .collect()
}

/// URL of the SDK script the front-end injects, or `None` without a key.
pub fn sdk_script_url(app_key: Option<&str>) -> Option<String> {
    let key = app_key.map(str::trim).filter(|k| !k.is_empty())?;
    Some(format!(
        "{}?appkey={}&libraries=services&autoload=false",
        SDK_URL,
        urlencoding::encode(key)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_by_kind() {
        assert_eq!(filter_locations(None).len(), 6);

        let libraries = filter_locations(Some(LocationKind::Library));
        assert_eq!(libraries.len(), 3);
        assert!(libraries.iter().all(|l| l.kind == LocationKind::Library));
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(LocationKind::parse_filter("Bookstore"), Some(LocationKind::Bookstore));
        assert_eq!(LocationKind::parse_filter("all"), None);
    }

    #[test]
    fn test_sdk_script_url() {
        assert_eq!(sdk_script_url(None), None);
        assert_eq!(sdk_script_url(Some("  ")), None);
        assert_eq!(
            sdk_script_url(Some("abc")).unwrap(),
            "https://dapi.kakao.com/v2/maps/sdk.js?appkey=abc&libraries=services&autoload=false"
        );
    }

    #[test]
    fn test_location_serializes_type_field() {
        let json = serde_json::to_value(&demo_locations()[0]).unwrap();
        assert_eq!(json["type"], "library");
    }
}
