//! Shelf entries: a user's books and their reading progress.

use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reading status of a shelf entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    /// Still being read.
    #[default]
    Reading,
    /// Finished.
    Completed,
}

impl ReadingStatus {
    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::Reading => "reading",
            ReadingStatus::Completed => "completed",
        }
    }

    /// Parse the database representation; unknown values read as `Reading`.
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => ReadingStatus::Completed,
            _ => ReadingStatus::Reading,
        }
    }
}

/// Clamp any progress value into 0-100.
pub fn clamp_progress(progress: i64) -> u8 {
    progress.clamp(0, 100) as u8
}

/// A book on a user's shelf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelfEntry {
    /// Entry ID.
    pub id: String,
    /// Book title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Genre, free text.
    #[serde(default)]
    pub genre: String,
    /// Cover image URL.
    #[serde(default)]
    pub thumbnail: String,
    /// Reading status.
    #[serde(default)]
    pub status: ReadingStatus,
    /// Progress in percent (0-100).
    #[serde(default)]
    pub progress: u8,
    /// Total number of pages, when known.
    #[serde(default)]
    pub total_pages: Option<u32>,
    /// Whether the book is borrowed.
    #[serde(default)]
    pub is_rental: bool,
    /// Due date of a borrowed book.
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    /// Free-form memo.
    #[serde(default)]
    pub memo: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// When the book was marked completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Add-book form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShelfEntry {
    /// Book title (required).
    #[serde(default)]
    pub title: String,
    /// Author (required).
    #[serde(default)]
    pub author: String,
    /// Genre.
    #[serde(default)]
    pub genre: String,
    /// Cover image URL.
    #[serde(default)]
    pub thumbnail: String,
    /// Initial progress, clamped.
    #[serde(default)]
    pub progress: Option<i64>,
    /// Total number of pages.
    #[serde(default)]
    pub total_pages: Option<u32>,
    /// Whether the book is borrowed.
    #[serde(default)]
    pub is_rental: bool,
    /// Due date, only kept for borrowed books.
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
}

impl NewShelfEntry {
    /// Validate the form and build a fresh entry.
    pub fn into_entry(self) -> Result<ShelfEntry> {
        let title = required(&self.title, "Title")?;
        let author = required(&self.author, "Author")?;
        let now = Utc::now();

        Ok(ShelfEntry {
            id: Uuid::new_v4().to_string(),
            title,
            author,
            genre: self.genre.trim().to_string(),
            thumbnail: self.thumbnail.trim().to_string(),
            status: ReadingStatus::Reading,
            progress: clamp_progress(self.progress.unwrap_or(0)),
            total_pages: self.total_pages.filter(|p| *p > 0),
            is_rental: self.is_rental,
            return_date: self.return_date.filter(|_| self.is_rental),
            memo: String::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }
}

/// Full replacement of an entry's editable fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelfUpdate {
    /// Book title (required).
    pub title: String,
    /// Author (required).
    pub author: String,
    /// Genre.
    #[serde(default)]
    pub genre: String,
    /// Cover image URL.
    #[serde(default)]
    pub thumbnail: String,
    /// Reading status.
    #[serde(default)]
    pub status: ReadingStatus,
    /// Progress, clamped to 0-100.
    #[serde(default)]
    pub progress: i64,
    /// Total number of pages.
    #[serde(default)]
    pub total_pages: Option<u32>,
    /// Whether the book is borrowed.
    #[serde(default)]
    pub is_rental: bool,
    /// Due date.
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    /// Memo.
    #[serde(default)]
    pub memo: String,
}

impl From<&ShelfEntry> for ShelfUpdate {
    fn from(entry: &ShelfEntry) -> Self {
        Self {
            title: entry.title.clone(),
            author: entry.author.clone(),
            genre: entry.genre.clone(),
            thumbnail: entry.thumbnail.clone(),
            status: entry.status,
            progress: entry.progress as i64,
            total_pages: entry.total_pages,
            is_rental: entry.is_rental,
            return_date: entry.return_date,
            memo: entry.memo.clone(),
        }
    }
}

impl ShelfEntry {
    /// Replace every editable field. Last write wins.
    pub fn apply(&mut self, update: ShelfUpdate) -> Result<()> {
        let title = required(&update.title, "Title")?;
        let author = required(&update.author, "Author")?;

        self.title = title;
        self.author = author;
        self.genre = update.genre.trim().to_string();
        self.thumbnail = update.thumbnail.trim().to_string();
        self.progress = clamp_progress(update.progress);
        self.total_pages = update.total_pages.filter(|p| *p > 0);
        self.is_rental = update.is_rental;
        self.return_date = update.return_date.filter(|_| update.is_rental);
        self.memo = update.memo;

        match update.status {
            ReadingStatus::Completed if self.status != ReadingStatus::Completed => {
                self.mark_completed();
            }
            ReadingStatus::Reading => {
                self.status = ReadingStatus::Reading;
                self.completed_at = None;
            }
            ReadingStatus::Completed => {}
        }

        self.updated_at = Utc::now();
        Ok(())
    }

    /// Set the progress only.
    pub fn set_progress(&mut self, progress: i64) {
        self.progress = clamp_progress(progress);
        self.updated_at = Utc::now();
    }

    /// Replace the memo only.
    pub fn set_memo(&mut self, memo: impl Into<String>) {
        self.memo = memo.into();
        self.updated_at = Utc::now();
    }

    /// Confirm completion: progress 100, status completed.
    pub fn mark_completed(&mut self) {
        let now = Utc::now();
        self.progress = 100;
        self.status = ReadingStatus::Completed;
        self.completed_at.get_or_insert(now);
        self.updated_at = now;
    }

    /// Record pages read in a reading session.
    ///
    /// Progress is derived from `total_pages` when known; reaching the last
    /// page completes the book.
    pub fn record_pages_read(&mut self, pages_read: u32) -> Result<()> {
        let Some(total) = self.total_pages else {
            self.updated_at = Utc::now();
            return Ok(());
        };

        if pages_read > total {
            return Err(AppError::InvalidInput(format!(
                "Pages read ({}) exceed the book's {} pages",
                pages_read, total
            )));
        }

        let percent = (pages_read as f64 * 100.0 / total as f64).round() as i64;
        if percent >= 100 {
            self.mark_completed();
        } else {
            self.set_progress(percent);
        }
        Ok(())
    }

    /// Whether the book is finished.
    pub fn is_completed(&self) -> bool {
        self.status == ReadingStatus::Completed
    }
}

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Counters shown on the home page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelfStats {
    /// Number of entries.
    pub total_books: usize,
    /// Entries still being read.
    pub reading: usize,
    /// Finished entries.
    pub completed: usize,
    /// Share of finished entries, rounded percent.
    pub completion_rate: u8,
}

impl ShelfStats {
    /// Compute stats over a set of entries.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a ShelfEntry>) -> Self {
        let mut stats = ShelfStats::default();
        for entry in entries {
            stats.total_books += 1;
            match entry.status {
                ReadingStatus::Reading => stats.reading += 1,
                ReadingStatus::Completed => stats.completed += 1,
            }
        }

        if stats.total_books > 0 {
            stats.completion_rate =
                (stats.completed as f64 * 100.0 / stats.total_books as f64).round() as u8;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(title: &str, author: &str) -> NewShelfEntry {
        NewShelfEntry {
            title: title.to_string(),
            author: author.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_entry_requires_title_and_author() {
        assert!(form("", "Han Kang").into_entry().is_err());
        assert!(form("The Vegetarian", "   ").into_entry().is_err());

        let entry = form(" The Vegetarian ", "Han Kang").into_entry().unwrap();
        assert_eq!(entry.title, "The Vegetarian");
        assert_eq!(entry.status, ReadingStatus::Reading);
        assert_eq!(entry.progress, 0);
    }

    #[test]
    fn test_return_date_only_for_rentals() {
        let date = NaiveDate::from_ymd_opt(2026, 11, 1);
        let mut new = form("Book", "Author");
        new.return_date = date;

        assert_eq!(new.clone().into_entry().unwrap().return_date, None);

        new.is_rental = true;
        assert_eq!(new.into_entry().unwrap().return_date, date);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut entry = form("Book", "Author").into_entry().unwrap();
        entry.set_progress(150);
        assert_eq!(entry.progress, 100);
        entry.set_progress(-3);
        assert_eq!(entry.progress, 0);
    }

    #[test]
    fn test_mark_completed_sets_status() {
        let mut entry = form("Book", "Author").into_entry().unwrap();
        entry.set_progress(100);
        assert_eq!(entry.status, ReadingStatus::Reading);

        entry.mark_completed();
        assert_eq!(entry.status, ReadingStatus::Completed);
        assert_eq!(entry.progress, 100);
        assert!(entry.completed_at.is_some());
    }

    #[test]
    fn test_apply_replaces_fields() {
        let mut entry = form("Book", "Author").into_entry().unwrap();
        let mut update = ShelfUpdate::from(&entry);
        update.memo = "great so far".to_string();
        update.progress = 42;

        entry.apply(update).unwrap();
        assert_eq!(entry.memo, "great so far");
        assert_eq!(entry.progress, 42);

        let mut bad = ShelfUpdate::from(&entry);
        bad.title = String::new();
        assert!(entry.apply(bad).is_err());
        assert_eq!(entry.title, "Book");
    }

    #[test]
    fn test_record_pages_read() {
        let mut new = form("Book", "Author");
        new.total_pages = Some(200);
        let mut entry = new.into_entry().unwrap();

        entry.record_pages_read(50).unwrap();
        assert_eq!(entry.progress, 25);

        assert!(entry.record_pages_read(201).is_err());

        entry.record_pages_read(200).unwrap();
        assert!(entry.is_completed());
    }

    #[test]
    fn test_stats() {
        let mut a = form("A", "x").into_entry().unwrap();
        let b = form("B", "x").into_entry().unwrap();
        let c = form("C", "x").into_entry().unwrap();
        a.mark_completed();

        let stats = ShelfStats::from_entries([&a, &b, &c]);
        assert_eq!(stats.total_books, 3);
        assert_eq!(stats.reading, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.completion_rate, 33);

        assert_eq!(ShelfStats::from_entries(&Vec::new()).completion_rate, 0);
    }
}
