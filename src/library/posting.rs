//! Reading postings (reviews), their comments and likes.

use crate::error::{AppError, Result};
use crate::library::shelf::ShelfEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rating given when the form leaves it untouched.
pub const DEFAULT_RATING: u8 = 5;

/// A review about a book on the author's shelf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Posting {
    /// Posting ID.
    pub id: String,
    /// Author user ID (`None` for anonymous local drafts).
    pub author_id: Option<String>,
    /// Author display name.
    pub author_name: String,
    /// Shelf entry the posting is about.
    pub book_id: String,
    /// Book title at the time of writing.
    pub book_title: String,
    /// Book author at the time of writing.
    #[serde(default)]
    pub book_author: String,
    /// Book cover.
    #[serde(default)]
    pub book_thumbnail: String,
    /// Posting title.
    pub title: String,
    /// Posting body.
    pub content: String,
    /// Rating, 1 to 5.
    pub rating: u8,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Number of likes.
    #[serde(default)]
    pub like_count: u32,
    /// Number of comments.
    #[serde(default)]
    pub comment_count: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last edit time.
    pub updated_at: DateTime<Utc>,
}

/// The posting form, used for both create and edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingDraft {
    /// Title; blank means "<book title> 독후감".
    #[serde(default)]
    pub title: String,
    /// Body (required).
    #[serde(default)]
    pub content: String,
    /// Rating, 1 to 5.
    #[serde(default = "default_rating")]
    pub rating: u8,
    /// Comma separated tags as typed.
    #[serde(default)]
    pub tags: String,
}

fn default_rating() -> u8 {
    DEFAULT_RATING
}

impl Default for PostingDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            rating: DEFAULT_RATING,
            tags: String::new(),
        }
    }
}

/// Create request: the form plus the shelf entry it is about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPosting {
    /// Shelf entry ID.
    pub book_id: String,
    /// Form fields.
    #[serde(flatten)]
    pub draft: PostingDraft,
}

/// Split comma separated tags, trimming each and dropping empty ones.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Title used when the form leaves it blank.
pub fn default_title(book_title: &str) -> String {
    format!("{} 독후감", book_title)
}

impl PostingDraft {
    /// Pre-fill the form from an existing posting.
    pub fn from_posting(posting: &Posting) -> Self {
        Self {
            title: posting.title.clone(),
            content: posting.content.clone(),
            rating: posting.rating,
            tags: posting.tags.join(", "),
        }
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> bool {
        !self.content.trim().is_empty()
    }

    fn validate(&self) -> Result<()> {
        if !self.can_submit() {
            return Err(AppError::InvalidInput(
                "Posting content is required".to_string(),
            ));
        }
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::InvalidInput(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        Ok(())
    }

    fn resolved_title(&self, book_title: &str) -> String {
        let title = self.title.trim();
        if title.is_empty() {
            default_title(book_title)
        } else {
            title.to_string()
        }
    }

    /// Validate and create a posting about `book`.
    pub fn into_posting(
        self,
        book: &ShelfEntry,
        author_id: Option<String>,
        author_name: &str,
    ) -> Result<Posting> {
        self.validate()?;
        let now = Utc::now();

        Ok(Posting {
            id: Uuid::new_v4().to_string(),
            author_id,
            author_name: author_name.to_string(),
            book_id: book.id.clone(),
            book_title: book.title.clone(),
            book_author: book.author.clone(),
            book_thumbnail: book.thumbnail.clone(),
            title: self.resolved_title(&book.title),
            content: self.content.trim().to_string(),
            rating: self.rating,
            tags: parse_tags(&self.tags),
            like_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Validate and replace the editable fields of `posting`.
    pub fn apply_to(self, posting: &mut Posting) -> Result<()> {
        self.validate()?;

        posting.title = self.resolved_title(&posting.book_title);
        posting.content = self.content.trim().to_string();
        posting.rating = self.rating;
        posting.tags = parse_tags(&self.tags);
        posting.updated_at = Utc::now();
        Ok(())
    }
}

/// A comment on a posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Comment ID.
    pub id: String,
    /// Posting the comment belongs to.
    pub posting_id: String,
    /// Author user ID.
    pub author_id: String,
    /// Author display name.
    pub author_name: String,
    /// Comment text.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Build a comment, rejecting blank text.
    pub fn new(posting_id: &str, author_id: &str, author_name: &str, content: &str) -> Result<Self> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::InvalidInput(
                "Comment content is required".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            posting_id: posting_id.to_string(),
            author_id: author_id.to_string(),
            author_name: author_name.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        })
    }
}

/// Result of toggling a like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    /// Whether the caller now likes the posting.
    pub liked: bool,
    /// Likes after the toggle.
    pub like_count: u32,
}
