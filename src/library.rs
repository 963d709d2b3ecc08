/// Reading postings, comments and likes.
pub mod posting;
/// Shelf entries and reading progress.
pub mod shelf;

pub use posting::{Comment, LikeState, NewPosting, Posting, PostingDraft};
pub use shelf::{NewShelfEntry, ReadingStatus, ShelfEntry, ShelfStats, ShelfUpdate};
