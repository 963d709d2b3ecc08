//! Libraries holding a book, from the data4library `libSrchByBook` endpoint.

use crate::catalog::{clean_isbn, usable_key};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A library that holds a given book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingLibrary {
    /// data4library library code.
    pub lib_code: String,
    /// Library name.
    pub lib_name: String,
    /// Street address.
    pub address: String,
    /// Phone number.
    pub tel: String,
    /// Homepage URL.
    pub homepage: String,
    /// Closing days, as free text.
    pub closed: String,
    /// Opening hours, as free text.
    pub operating_time: String,
    /// Latitude, when published.
    pub latitude: Option<f64>,
    /// Longitude, when published.
    pub longitude: Option<f64>,
}

/// data4library client.
#[derive(Clone)]
pub struct Data4Library {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl Data4Library {
    /// Create a client. Without a usable key requests are sent unauthenticated.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: usable_key(api_key),
        }
    }

    /// Libraries holding the book with this ISBN.
    pub async fn libraries_by_isbn(&self, isbn: &str) -> Result<Vec<HoldingLibrary>> {
        let isbn = clean_isbn(isbn);
        if isbn.is_empty() {
            return Err(AppError::InvalidInput("ISBN is required".to_string()));
        }

        let mut params = vec![("isbn13", isbn.as_str()), ("format", "json")];
        if let Some(key) = self.api_key.as_deref() {
            params.insert(0, ("authKey", key));
        }

        let response = self.http.get(&self.base_url).query(&params).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Library search failed: {}",
                response.status()
            )));
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let body = response.text().await?;

        let libraries = if is_json {
            parse_json(&body)?
        } else {
            parse_xml(&body)?
        };
        tracing::debug!(isbn = %isbn, count = libraries.len(), "Holding libraries found");
        Ok(libraries)
    }
}

/// Field value as text; the API sends some fields as numbers.
fn text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse().ok()
}

fn library_from_json(lib: &Value) -> HoldingLibrary {
    HoldingLibrary {
        lib_code: text(lib, "libCode"),
        lib_name: text(lib, "libName"),
        address: text(lib, "address"),
        tel: text(lib, "tel"),
        homepage: text(lib, "homepage"),
        closed: text(lib, "closed"),
        operating_time: text(lib, "operatingTime"),
        latitude: coordinate(&text(lib, "latitude")),
        longitude: coordinate(&text(lib, "longitude")),
    }
}

/// Parse `response.libs.lib`, which holds either one library or a list.
/// Entries wrapped as `{"lib": {...}}` are unwrapped.
pub(crate) fn parse_json(body: &str) -> Result<Vec<HoldingLibrary>> {
    let data: Value = serde_json::from_str(body)?;

    if let Some(error) = data.get("error").or_else(|| data.pointer("/response/error")) {
        let message = error.as_str().unwrap_or("Library search returned an error");
        return Err(AppError::Upstream(message.to_string()));
    }

    let Some(libs) = data.pointer("/response/libs") else {
        return Ok(Vec::new());
    };
    let entries = match libs {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        Value::Object(_) => match libs.get("lib") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(one) => vec![one],
            None => Vec::new(),
        },
        _ => Vec::new(),
    };

    Ok(entries
        .into_iter()
        .map(|entry| library_from_json(entry.get("lib").unwrap_or(entry)))
        .collect())
}

/// Parse the XML form of the response.
pub(crate) fn parse_xml(body: &str) -> Result<Vec<HoldingLibrary>> {
    let doc = roxmltree::Document::parse(body)?;

    if let Some(error) = doc.descendants().find(|n| n.has_tag_name("error")) {
        let message = error.text().unwrap_or("Library search returned an error");
        return Err(AppError::Upstream(message.trim().to_string()));
    }

    let libraries = doc
        .descendants()
        .filter(|n| n.has_tag_name("lib"))
        .map(|lib| {
            let field = |name: &str| {
                lib.children()
                    .find(|c| c.has_tag_name(name))
                    .and_then(|c| c.text())
                    .map(|t| t.trim().to_string())
                    .unwrap_or_default()
            };
            HoldingLibrary {
                lib_code: field("libCode"),
                lib_name: field("libName"),
                address: field("address"),
                tel: field("tel"),
                homepage: field("homepage"),
                closed: field("closed"),
                operating_time: field("operatingTime"),
                latitude: coordinate(&field("latitude")),
                longitude: coordinate(&field("longitude")),
            }
        })
        .collect();

    Ok(libraries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_single_library() {
        let body = r#"{"response":{"libs":{"lib":{
            "libCode":"111001","libName":"정독도서관","address":"서울 종로구",
            "latitude":"37.5815","longitude":126.9834}}}}"#;
        let libs = parse_json(body).unwrap();
        assert_eq!(libs.len(), 1);
        assert_eq!(libs[0].lib_name, "정독도서관");
        assert_eq!(libs[0].latitude, Some(37.5815));
        assert_eq!(libs[0].longitude, Some(126.9834));
        assert_eq!(libs[0].tel, "");
    }

    #[test]
    fn test_parse_json_many_libraries() {
        let body = r#"{"response":{"libs":[
            {"lib":{"libCode":"1","libName":"A"}},
            {"lib":{"libCode":"2","libName":"B","latitude":""}}
        ]}}"#;
        let libs = parse_json(body).unwrap();
        let names: Vec<_> = libs.iter().map(|l| l.lib_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(libs[1].latitude, None);

        assert!(parse_json(r#"{"response":{}}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_json_error() {
        let result = parse_json(r#"{"response":{"error":"인증키 오류"}}"#);
        assert!(matches!(result, Err(AppError::Upstream(msg)) if msg == "인증키 오류"));
    }

    #[test]
    fn test_parse_xml() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
            <response><libs>
              <lib><libCode>1</libCode><libName>남산도서관</libName>
                   <latitude>37.5531</latitude><longitude>126.9811</longitude></lib>
              <lib><libCode>2</libCode><libName>용산도서관</libName></lib>
            </libs></response>"#;
        let libs = parse_xml(body).unwrap();
        assert_eq!(libs.len(), 2);
        assert_eq!(libs[0].lib_name, "남산도서관");
        assert_eq!(libs[0].latitude, Some(37.5531));
        assert_eq!(libs[1].longitude, None);
    }

    #[test]
    fn test_parse_xml_error() {
        let result = parse_xml("<response><error>invalid key</error></response>");
        assert!(matches!(result, Err(AppError::Upstream(msg)) if msg == "invalid key"));
    }

    #[test]
    fn test_empty_isbn_rejected() {
        let client = Data4Library::new(reqwest::Client::new(), "http://127.0.0.1:9", None);
        let result = tokio_test::block_on(client.libraries_by_isbn(" - "));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
