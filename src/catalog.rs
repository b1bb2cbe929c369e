use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::book_status::BookStatus;

/// Identifier of a catalogued book, assigned sequentially from 1
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct BookId(pub u32);

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A book record owned by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Book {
    /// Stable identifier
    id: BookId,
    /// Book title
    pub title: String,
    /// Book author
    pub author: String,
    /// Shelf category
    pub category: String,
    /// Lending status, only written by the lending engine
    status: BookStatus,
}

impl Book {
    /// Identifier of this book
    #[must_use]
    pub fn id(&self) -> BookId {
        self.id
    }

    /// Current lending status
    #[must_use]
    pub fn status(&self) -> BookStatus {
        self.status
    }

    /// Only the lending engine moves a book between statuses.
    pub(crate) fn set_status(&mut self, status: BookStatus) {
        self.status = status;
    }

    /// Case-insensitive keyword match over title, author and category
    #[must_use]
    pub fn matches(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        [&self.title, &self.author, &self.category]
            .iter()
            .any(|field| field.to_lowercase().contains(&keyword))
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} by {} ({})",
            self.id, self.title, self.author, self.category
        )
    }
}

/// Free-text fields supplied when adding or editing a book
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BookDetails {
    /// Book title
    pub title: String,
    /// Book author
    pub author: String,
    /// Shelf category
    pub category: String,
}

impl BookDetails {
    /// Convenience constructor
    #[must_use]
    pub fn new(title: &str, author: &str, category: &str) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            category: category.to_string(),
        }
    }
}

/// The set of book records
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Books keyed by id
    books: BTreeMap<BookId, Book>,
    /// Id handed to the next added book
    next_id: u32,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self {
            books: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild a catalog from stored records
    pub(crate) fn from_parts(books: Vec<Book>, next_id: u32) -> Self {
        Self {
            books: books.into_iter().map(|book| (book.id, book)).collect(),
            next_id,
        }
    }

    /// Id the next added book will receive
    #[must_use]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Add a book and return its new id. New books start `Available`.
    pub fn add(&mut self, details: BookDetails) -> BookId {
        let id = BookId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let BookDetails {
            title,
            author,
            category,
        } = details;
        let book = Book {
            id,
            title,
            author,
            category,
            status: BookStatus::Available,
        };
        self.books.insert(id, book);
        id
    }

    /// Replace the free-text fields of a book. Returns `false` if the id is unknown.
    pub fn edit(&mut self, id: BookId, details: BookDetails) -> bool {
        match self.books.get_mut(&id) {
            Some(book) => {
                book.title = details.title;
                book.author = details.author;
                book.category = details.category;
                true
            }
            None => false,
        }
    }

    /// Remove a book record. Lending state is cleaned up by the engine.
    pub(crate) fn remove(&mut self, id: BookId) -> Option<Book> {
        self.books.remove(&id)
    }

    /// Look up a book
    #[must_use]
    pub fn find_book(&self, id: BookId) -> Option<&Book> {
        self.books.get(&id)
    }

    /// Mutable lookup for the engine's status writes
    pub(crate) fn find_book_mut(&mut self, id: BookId) -> Option<&mut Book> {
        self.books.get_mut(&id)
    }

    /// All books in id order
    pub fn books(&self) -> impl Iterator<Item = &Book> {
        self.books.values()
    }

    /// Number of books
    #[must_use]
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Whether the catalog holds no books
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Books whose title, author or category contains `keyword`
    #[must_use]
    pub fn search(&self, keyword: &str) -> Vec<&Book> {
        self.books
            .values()
            .filter(|book| book.matches(keyword))
            .collect()
    }

    /// Distinct categories, sorted
    #[must_use]
    pub fn categories(&self) -> BTreeSet<&str> {
        self.books
            .values()
            .map(|book| book.category.as_str())
            .collect()
    }

    /// Number of books per category
    #[must_use]
    pub fn category_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for book in self.books.values() {
            let count: &mut usize = counts.entry(book.category.as_str()).or_default();
            *count = count.saturating_add(1);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::{BookDetails, BookId, Catalog};
    use crate::book_status::BookStatus;

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add(BookDetails::new("Dune", "Frank Herbert", "Fiction"));
        catalog.add(BookDetails::new("The Rust Book", "Klabnik", "Programming"));
        catalog.add(BookDetails::new("Foundation", "Isaac Asimov", "Fiction"));
        catalog
    }

    #[test]
    fn test_ids_are_sequential_and_stable() {
        let mut catalog = sample_catalog();
        assert_eq!(catalog.next_id(), 4);
        assert!(catalog.remove(BookId(2)).is_some());
        let id = catalog.add(BookDetails::new("Hyperion", "Dan Simmons", "Fiction"));
        assert_eq!(id, BookId(4));
        assert!(catalog.find_book(BookId(2)).is_none());
    }

    #[test]
    fn test_new_books_are_available() {
        let catalog = sample_catalog();
        let available = BookStatus::Available;
        assert!(catalog.books().all(|book| book.status() == available));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_edit_keeps_status() {
        let mut catalog = sample_catalog();
        catalog
            .find_book_mut(BookId(1))
            .unwrap()
            .set_status(BookStatus::Issued);
        let details = BookDetails::new("Dune Messiah", "Frank Herbert", "SF");
        assert!(catalog.edit(BookId(1), details));
        let book = catalog.find_book(BookId(1)).unwrap();
        assert_eq!(book.title, "Dune Messiah");
        assert_eq!(book.status(), BookStatus::Issued);
        assert!(!catalog.edit(BookId(99), BookDetails::default()));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let catalog = sample_catalog();
        let hits: Vec<_> = catalog
            .search("ASIMOV")
            .iter()
            .map(|book| book.id())
            .collect();
        assert_eq!(hits, vec![BookId(3)]);
        assert_eq!(catalog.search("fiction").len(), 2);
        assert!(catalog.search("cooking").is_empty());
    }

    #[test]
    fn test_categories_and_counts() {
        let catalog = sample_catalog();
        let categories: Vec<_> = catalog.categories().into_iter().collect();
        assert_eq!(categories, vec!["Fiction", "Programming"]);
        assert_eq!(catalog.category_counts().get("Fiction"), Some(&2));
    }
}
