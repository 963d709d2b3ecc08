//! Google Books volumes API client.

use crate::catalog::{clean_isbn, dedup_by_title, usable_key};
use crate::error::{AppError, Result};
use chrono::Datelike;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Page size used for every query.
const PAGE_SIZE: usize = 10;

/// Terms sampled for the bestseller shelf.
const BESTSELLER_TERMS: [&str; 4] = ["bestseller", "popular", "best seller", "award winner"];

/// Terms sampled for the gallery.
const RANDOM_TERMS: [&str; 22] = [
    "fiction",
    "novel",
    "literature",
    "science",
    "history",
    "philosophy",
    "biography",
    "poetry",
    "drama",
    "mystery",
    "romance",
    "fantasy",
    "science fiction",
    "thriller",
    "horror",
    "adventure",
    "classic",
    "best seller",
    "award winner",
    "bestseller",
    "popular",
    "trending",
];

/// Book metadata as returned to callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Google volume ID.
    pub id: String,
    /// Title.
    pub title: String,
    /// Subtitle.
    pub subtitle: String,
    /// Authors.
    pub authors: Vec<String>,
    /// Authors joined with ", ".
    pub author: String,
    /// Publisher.
    pub publisher: String,
    /// Publication date as published (YYYY, YYYY-MM or YYYY-MM-DD).
    pub published_date: String,
    /// Description.
    pub description: String,
    /// Number of pages.
    pub page_count: u32,
    /// Categories.
    pub categories: Vec<String>,
    /// First category.
    pub genre: String,
    /// Cover URL.
    pub thumbnail: String,
    /// ISBN-10.
    pub isbn10: String,
    /// ISBN-13.
    pub isbn13: String,
    /// ISBN-13 if present, else ISBN-10.
    pub isbn: String,
    /// Language code.
    pub language: String,
    /// Preview link.
    pub preview_link: String,
    /// Info link.
    pub info_link: String,
    /// Publication year.
    pub year: Option<i32>,
    /// Average rating.
    pub average_rating: f32,
    /// Number of ratings.
    pub ratings_count: u32,
}

impl Volume {
    fn has_cover_and_title(&self) -> bool {
        !self.title.is_empty() && !self.thumbnail.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct VolumeList {
    #[serde(default)]
    items: Vec<VolumeItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VolumeInfo {
    title: String,
    subtitle: String,
    authors: Vec<String>,
    publisher: String,
    published_date: String,
    description: String,
    page_count: u32,
    categories: Vec<String>,
    image_links: Option<ImageLinks>,
    industry_identifiers: Vec<IndustryIdentifier>,
    language: String,
    preview_link: String,
    info_link: String,
    average_rating: f32,
    ratings_count: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

/// Leading four-digit year of a publication date.
fn parse_year(date: &str) -> Option<i32> {
    date.get(..4)?.parse().ok()
}

impl From<VolumeItem> for Volume {
    fn from(item: VolumeItem) -> Self {
        let info = item.volume_info;
        let identifier = |kind: &str| {
            info.industry_identifiers
                .iter()
                .find(|id| id.kind == kind)
                .map(|id| id.identifier.clone())
                .unwrap_or_default()
        };
        let isbn10 = identifier("ISBN_10");
        let isbn13 = identifier("ISBN_13");
        let isbn = if isbn13.is_empty() {
            isbn10.clone()
        } else {
            isbn13.clone()
        };
        let thumbnail = info
            .image_links
            .and_then(|links| links.thumbnail.or(links.small_thumbnail))
            .unwrap_or_default();

        Volume {
            id: item.id,
            author: info.authors.join(", "),
            genre: info.categories.first().cloned().unwrap_or_default(),
            year: parse_year(&info.published_date),
            title: info.title,
            subtitle: info.subtitle,
            authors: info.authors,
            publisher: info.publisher,
            published_date: info.published_date,
            description: info.description,
            page_count: info.page_count,
            categories: info.categories,
            thumbnail,
            isbn10,
            isbn13,
            isbn,
            language: info.language,
            preview_link: info.preview_link,
            info_link: info.info_link,
            average_rating: info.average_rating,
            ratings_count: info.ratings_count,
        }
    }
}

/// Google Books client.
#[derive(Clone)]
pub struct GoogleBooks {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooks {
    /// Create a client against `base_url` (the volumes endpoint).
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: usable_key(api_key),
        }
    }

    /// Whether an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn require_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            AppError::Config(
                "Google Books API key is not configured (set GOOGLE_BOOKS_API_KEY)".to_string(),
            )
        })
    }

    async fn query(&self, params: &[(&str, String)]) -> Result<Vec<Volume>> {
        let key = self.require_key()?;
        let response = self
            .http
            .get(&self.base_url)
            .query(params)
            .query(&[("key", key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Google Books request failed: {}",
                response.status()
            )));
        }

        let list: VolumeList = response.json().await?;
        Ok(list.items.into_iter().map(Volume::from).collect())
    }

    /// Run a listing query, turning every failure into an empty list.
    async fn query_soft(&self, context: &str, params: &[(&str, String)]) -> Vec<Volume> {
        if !self.has_api_key() {
            tracing::warn!(context, "Google Books API key is not configured");
            return Vec::new();
        }

        match self.query(params).await {
            Ok(volumes) => volumes,
            Err(e) => {
                tracing::warn!(context, error = %e, "Google Books query failed");
                Vec::new()
            }
        }
    }

    /// Look a book up by ISBN.
    pub async fn search_by_isbn(&self, isbn: &str) -> Result<Volume> {
        let isbn = clean_isbn(isbn);
        let volumes = self.query(&[("q", format!("isbn:{}", isbn))]).await?;

        volumes
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("No book found for ISBN {}", isbn)))
    }

    /// Free text search, first page.
    pub async fn search(&self, query: &str) -> Vec<Volume> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        self.query_soft(
            "search",
            &[
                ("q", query.trim().to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
            ],
        )
        .await
    }

    /// Full details of one volume.
    pub async fn volume(&self, id: &str) -> Result<Volume> {
        let key = self.require_key()?;
        let url = format!("{}/{}", self.base_url, urlencoding::encode(id));
        let response = self.http.get(&url).query(&[("key", key)]).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Book not found: {}", id)));
        }
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Google Books request failed: {}",
                response.status()
            )));
        }

        let item: VolumeItem = response.json().await?;
        Ok(Volume::from(item))
    }

    /// A shuffled sample of popular books with covers.
    pub async fn bestsellers(&self, count: usize) -> Vec<Volume> {
        if !self.has_api_key() {
            tracing::warn!("Google Books API key is not configured");
            return Vec::new();
        }

        let mut books = Vec::new();
        for term in BESTSELLER_TERMS {
            let found = self
                .query_soft(
                    "bestsellers",
                    &[
                        ("q", term.to_string()),
                        ("maxResults", PAGE_SIZE.to_string()),
                        ("orderBy", "relevance".to_string()),
                    ],
                )
                .await;
            books.extend(found.into_iter().filter(Volume::has_cover_and_title));
        }

        let mut books = dedup_by_title(books);
        books.shuffle(&mut rand::rng());
        books.truncate(count);
        books
    }

    /// Books published within the last two years, newest first.
    pub async fn new_releases(&self, count: usize) -> Vec<Volume> {
        if !self.has_api_key() {
            tracing::warn!("Google Books API key is not configured");
            return Vec::new();
        }

        let current_year = chrono::Utc::now().year();
        let terms = [
            current_year.to_string(),
            (current_year - 1).to_string(),
            "new release".to_string(),
            "recent publication".to_string(),
        ];

        let mut books = Vec::new();
        for term in terms {
            let found = self
                .query_soft(
                    "new_releases",
                    &[
                        ("q", term),
                        ("maxResults", PAGE_SIZE.to_string()),
                        ("orderBy", "newest".to_string()),
                    ],
                )
                .await;
            books.extend(
                found
                    .into_iter()
                    .filter(Volume::has_cover_and_title)
                    .filter(|v| v.year.is_some_and(|y| y >= current_year - 2)),
            );
        }

        let mut books = dedup_by_title(books);
        books.sort_by(|a, b| b.published_date.cmp(&a.published_date));
        books.truncate(count);
        books
    }

    /// A shuffled mix across genres, one query per ten books requested.
    pub async fn random_books(&self, count: usize) -> Vec<Volume> {
        if !self.has_api_key() {
            tracing::warn!("Google Books API key is not configured");
            return Vec::new();
        }

        let queries = count.div_ceil(PAGE_SIZE).min(RANDOM_TERMS.len());
        let mut books = Vec::new();
        for (index, term) in RANDOM_TERMS.iter().take(queries).enumerate() {
            let found = self
                .query_soft(
                    "random_books",
                    &[
                        ("q", term.to_string()),
                        ("maxResults", PAGE_SIZE.to_string()),
                        ("startIndex", (index * PAGE_SIZE).to_string()),
                    ],
                )
                .await;
            books.extend(found.into_iter().filter(Volume::has_cover_and_title));
        }

        let mut books = dedup_by_title(books);
        books.shuffle(&mut rand::rng());
        books.truncate(count);
        books
    }

    /// Books from the given publishers, shuffled.
    pub async fn books_by_publishers(&self, publishers: &[String], count: usize) -> Vec<Volume> {
        if !self.has_api_key() {
            tracing::warn!("Google Books API key is not configured");
            return Vec::new();
        }
        if publishers.is_empty() || count == 0 {
            return Vec::new();
        }

        let pages = count.div_ceil(publishers.len()).div_ceil(PAGE_SIZE).max(1);
        let mut books: Vec<Volume> = Vec::new();

        'publishers: for publisher in publishers {
            for page in 0..pages {
                let params = [
                    ("q", format!("inpublisher:{}", publisher)),
                    ("maxResults", PAGE_SIZE.to_string()),
                    ("startIndex", (page * PAGE_SIZE).to_string()),
                ];
                let found = match self.query(&params).await {
                    Ok(found) => found,
                    Err(e) => {
                        tracing::warn!(publisher = %publisher, error = %e, "Publisher search failed");
                        break;
                    }
                };
                if found.is_empty() {
                    break;
                }

                books.extend(
                    found
                        .into_iter()
                        .filter(|v| publisher_matches(&v.publisher, publishers))
                        .filter(Volume::has_cover_and_title),
                );

                if books.len() >= count {
                    break 'publishers;
                }
            }
        }

        let mut books = dedup_by_title(books);
        books.shuffle(&mut rand::rng());
        books.truncate(count);
        books
    }
}

/// Loose publisher match: either name contains the other.
fn publisher_matches(book_publisher: &str, publishers: &[String]) -> bool {
    publishers
        .iter()
        .any(|p| book_publisher.contains(p.as_str()) || p.contains(book_publisher))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "items": [{
            "id": "abc123",
            "volumeInfo": {
                "title": "채식주의자",
                "authors": ["한강", "Deborah Smith"],
                "publisher": "창비",
                "publishedDate": "2007-10-30",
                "pageCount": 247,
                "categories": ["Fiction"],
                "imageLinks": {"smallThumbnail": "http://img/small"},
                "industryIdentifiers": [
                    {"type": "ISBN_10", "identifier": "8936433598"},
                    {"type": "ISBN_13", "identifier": "9788936433598"}
                ],
                "language": "ko",
                "averageRating": 4.5,
                "ratingsCount": 12
            }
        }]
    }"#;

    #[test]
    fn test_volume_mapping() {
        let list: VolumeList = serde_json::from_str(SAMPLE).unwrap();
        let volume = Volume::from(list.items.into_iter().next().unwrap());

        assert_eq!(volume.id, "abc123");
        assert_eq!(volume.author, "한강, Deborah Smith");
        assert_eq!(volume.genre, "Fiction");
        assert_eq!(volume.thumbnail, "http://img/small");
        assert_eq!(volume.isbn, "9788936433598");
        assert_eq!(volume.isbn10, "8936433598");
        assert_eq!(volume.year, Some(2007));
        assert_eq!(volume.page_count, 247);
    }

    #[test]
    fn test_missing_fields_default() {
        let list: VolumeList =
            serde_json::from_str(r#"{"items":[{"id":"x","volumeInfo":{}}]}"#).unwrap();
        let volume = Volume::from(list.items.into_iter().next().unwrap());
        assert_eq!(volume.title, "");
        assert_eq!(volume.isbn, "");
        assert_eq!(volume.year, None);
        assert!(!volume.has_cover_and_title());

        let empty: VolumeList = serde_json::from_str(r#"{"totalItems":0}"#).unwrap();
        assert!(empty.items.is_empty());
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2024"), Some(2024));
        assert_eq!(parse_year("2024-05"), Some(2024));
        assert_eq!(parse_year("n/a"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn test_publisher_matches() {
        let publishers = vec!["민음사".to_string()];
        assert!(publisher_matches("(주)민음사", &publishers));
        assert!(!publisher_matches("창비", &publishers));
    }

    #[test]
    fn test_without_key_lists_are_empty() {
        let client = GoogleBooks::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/volumes",
            Some("YOUR_API_KEY".to_string()),
        );
        assert!(!client.has_api_key());

        tokio_test::block_on(async {
            assert!(client.search("rust").await.is_empty());
            assert!(client.bestsellers(6).await.is_empty());
            assert!(client.new_releases(4).await.is_empty());
            assert!(client.random_books(40).await.is_empty());
            assert!(client.books_by_publishers(&["창비".to_string()], 40).await.is_empty());
            assert!(matches!(
                client.search_by_isbn("978-0").await,
                Err(AppError::Config(_))
            ));
        });
    }
}
