use crate::client::storage::Storage;
use crate::db::User;
use crate::error::{AppError, Result};
use crate::library::{
    NewShelfEntry, Posting, PostingDraft, ShelfEntry, ShelfStats, ShelfUpdate,
};

/// Local storage key of the shelf.
pub const BOOKS_KEY: &str = "myLibraryBooks";
/// Local storage key of the postings.
pub const POSTINGS_KEY: &str = "bookPostings";

/// Name shown for postings written while signed out.
const ANONYMOUS: &str = "익명";

/// Name used on a posting: the user's name, else the email local part.
pub fn author_name(user: Option<&User>) -> String {
    let Some(user) = user else {
        return ANONYMOUS.to_string();
    };
    if !user.name.trim().is_empty() {
        return user.name.clone();
    }
    match user.email.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => ANONYMOUS.to_string(),
    }
}

/// Shelf and postings kept on this machine.
pub struct LocalLibrary {
    storage: Storage,
}

impl LocalLibrary {
    /// Wrap a storage file.
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    // ========== SHELF ==========

    /// Every shelf entry, in insertion order.
    pub fn books(&self) -> Vec<ShelfEntry> {
        self.storage.get(BOOKS_KEY).unwrap_or_default()
    }

    /// One shelf entry.
    pub fn book(&self, id: &str) -> Result<ShelfEntry> {
        self.books()
            .into_iter()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", id)))
    }

    fn save_books(&mut self, books: &[ShelfEntry]) -> Result<()> {
        self.storage.set(BOOKS_KEY, books)
    }

    /// Validate and append a new entry.
    pub fn add_book(&mut self, form: NewShelfEntry) -> Result<ShelfEntry> {
        let entry = form.into_entry()?;
        let mut books = self.books();
        books.push(entry.clone());
        self.save_books(&books)?;
        Ok(entry)
    }

    /// Apply `change` to one entry and persist the shelf.
    fn modify_book<F>(&mut self, id: &str, change: F) -> Result<ShelfEntry>
    where
        F: FnOnce(&mut ShelfEntry) -> Result<()>,
    {
        let mut books = self.books();
        let entry = books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", id)))?;
        change(entry)?;
        let updated = entry.clone();
        self.save_books(&books)?;
        Ok(updated)
    }

    /// Replace an entry's editable fields.
    pub fn update_book(&mut self, id: &str, update: ShelfUpdate) -> Result<ShelfEntry> {
        self.modify_book(id, |entry| entry.apply(update))
    }

    /// Set progress, clamped to 0-100.
    pub fn set_progress(&mut self, id: &str, progress: i64) -> Result<ShelfEntry> {
        self.modify_book(id, |entry| {
            entry.set_progress(progress);
            Ok(())
        })
    }

    /// Replace the memo.
    pub fn set_memo(&mut self, id: &str, memo: &str) -> Result<ShelfEntry> {
        self.modify_book(id, |entry| {
            entry.set_memo(memo);
            Ok(())
        })
    }

    /// Mark a book completed.
    pub fn complete_book(&mut self, id: &str) -> Result<ShelfEntry> {
        self.modify_book(id, |entry| {
            entry.mark_completed();
            Ok(())
        })
    }

    /// Remove an entry. Returns false if it was not on the shelf.
    pub fn remove_book(&mut self, id: &str) -> Result<bool> {
        let mut books = self.books();
        let before = books.len();
        books.retain(|b| b.id != id);
        if books.len() == before {
            return Ok(false);
        }
        self.save_books(&books)?;
        Ok(true)
    }

    /// Counters over the shelf.
    pub fn stats(&self) -> ShelfStats {
        ShelfStats::from_entries(&self.books())
    }

    // ========== POSTINGS ==========

    fn all_postings(&self) -> Vec<Posting> {
        self.storage.get(POSTINGS_KEY).unwrap_or_default()
    }

    /// Postings, newest first, optionally about one book.
    pub fn postings(&self, book_id: Option<&str>) -> Vec<Posting> {
        let mut postings: Vec<_> = self
            .all_postings()
            .into_iter()
            .filter(|p| book_id.is_none_or(|id| p.book_id == id))
            .collect();
        postings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        postings
    }

    /// Write a posting about a shelf book.
    pub fn write_posting(
        &mut self,
        book_id: &str,
        draft: PostingDraft,
        author: Option<&User>,
    ) -> Result<Posting> {
        let book = self.book(book_id)?;
        let posting = draft.into_posting(&book, author.map(|u| u.id.clone()), &author_name(author))?;

        let mut postings = self.all_postings();
        postings.push(posting.clone());
        self.storage.set(POSTINGS_KEY, &postings)?;
        Ok(posting)
    }

    /// Replace a posting's form fields.
    pub fn edit_posting(&mut self, id: &str, draft: PostingDraft) -> Result<Posting> {
        let mut postings = self.all_postings();
        let posting = postings
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Posting not found: {}", id)))?;
        draft.apply_to(posting)?;
        let updated = posting.clone();
        self.storage.set(POSTINGS_KEY, &postings)?;
        Ok(updated)
    }

    /// Delete a posting. Returns false if it did not exist.
    pub fn remove_posting(&mut self, id: &str) -> Result<bool> {
        let mut postings = self.all_postings();
        let before = postings.len();
        postings.retain(|p| p.id != id);
        if postings.len() == before {
            return Ok(false);
        }
        self.storage.set(POSTINGS_KEY, &postings)?;
        Ok(true)
    }
}
