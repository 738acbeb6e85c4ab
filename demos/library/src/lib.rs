//! Library domain model: authors who own awards outright and share books
//! through a link relation. Exercises the full session surface, lazy
//! associations included.

mod author;
mod award;
mod book;

pub use author::Author;
pub use award::AuthorAward;
pub use book::Book;

/// Link relation joining authors (source) to books (target).
pub const BOOK_AUTHORSHIP: &str = "book_authorship";
