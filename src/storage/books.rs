use chrono::Utc;

use super::db::{Database, StoreError};
use super::models::{Book, BookFilter, BookPatch, BookStats, BookStatus, NewBook};
use super::tables::*;

impl Database {
    // ========================================================================
    // Catalog operations
    // ========================================================================

    /// Add a book to the catalog. The ISBN must be unused.
    pub fn create_book(&self, new: NewBook) -> Result<Book, StoreError> {
        if new.status == BookStatus::Borrowed {
            return Err(StoreError::Invalid(
                "status 'borrowed' can only be set by a borrow".to_string(),
            ));
        }

        let uow = self.begin_unit_of_work()?;
        let isbn = new.isbn.trim().to_string();
        if uow.lookup(BOOK_ISBNS, &isbn)?.is_some() {
            return Err(StoreError::Conflict(
                "Book with this ISBN already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let book = Book {
            author: new.author,
            category: new.category,
            copies: new.copies,
            created_at: now,
            id: uow.next_id("books")?,
            isbn,
            status: new.status,
            title: new.title,
            updated_at: now,
        };

        uow.store(BOOKS, book.id, &book)?;
        uow.link(BOOK_ISBNS, &book.isbn, book.id)?;
        uow.commit()?;

        tracing::debug!(book_id = book.id, isbn = %book.isbn, "Created book");
        Ok(book)
    }

    pub fn get_book(&self, id: u64) -> Result<Book, StoreError> {
        self.fetch(BOOKS, id)?.ok_or(StoreError::NotFound("Book"))
    }

    #[cfg(test)]
    pub(crate) fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError> {
        match self.lookup(BOOK_ISBNS, isbn.trim())? {
            Some(id) => Ok(self.fetch(BOOKS, id)?),
            None => Ok(None),
        }
    }

    /// All books matching the filter, in id order
    pub fn list_books(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError> {
        let books: Vec<Book> = self.scan(BOOKS)?;
        Ok(books.into_iter().filter(|b| filter.matches(b)).collect())
    }

    /// Apply a partial update.
    ///
    /// `borrowed` is never accepted here, and a borrowed book keeps its status
    /// until it is returned, so the catalog cannot drift from the ledger.
    pub fn update_book(&self, id: u64, patch: BookPatch) -> Result<Book, StoreError> {
        if patch.status == Some(BookStatus::Borrowed) {
            return Err(StoreError::Invalid(
                "status 'borrowed' can only be set by a borrow".to_string(),
            ));
        }

        let uow = self.begin_unit_of_work()?;
        let current: Book = uow
            .load(BOOKS, id)?
            .ok_or(StoreError::NotFound("Book"))?;

        if patch.status.is_some() && current.status == BookStatus::Borrowed {
            return Err(StoreError::Conflict(
                "Book is currently borrowed; return it first".to_string(),
            ));
        }

        let mut book = current.clone();
        if let Some(isbn) = patch.isbn {
            let isbn = isbn.trim().to_string();
            if isbn != current.isbn {
                if !uow.claim(BOOK_ISBNS, &isbn, id)? {
                    return Err(StoreError::Conflict(
                        "Book with this ISBN already exists".to_string(),
                    ));
                }
                uow.unlink(BOOK_ISBNS, &current.isbn)?;
                book.isbn = isbn;
            }
        }
        if let Some(title) = patch.title {
            book.title = title;
        }
        if let Some(author) = patch.author {
            book.author = author;
        }
        if let Some(category) = patch.category {
            book.category = category;
        }
        if let Some(copies) = patch.copies {
            book.copies = copies;
        }
        if let Some(status) = patch.status {
            book.status = status;
        }
        book.updated_at = Utc::now();

        uow.store(BOOKS, id, &book)?;
        uow.commit()?;

        tracing::debug!(book_id = id, "Updated book");
        Ok(book)
    }

    /// Remove a book. A book on loan cannot be removed.
    pub fn delete_book(&self, id: u64) -> Result<(), StoreError> {
        let uow = self.begin_unit_of_work()?;
        let book: Book = uow
            .load(BOOKS, id)?
            .ok_or(StoreError::NotFound("Book"))?;

        if book.status == BookStatus::Borrowed {
            return Err(StoreError::Conflict(
                "Book has an active loan and cannot be deleted".to_string(),
            ));
        }

        uow.delete(BOOKS, id)?;
        uow.unlink(BOOK_ISBNS, &book.isbn)?;
        uow.commit()?;

        tracing::debug!(book_id = id, "Deleted book");
        Ok(())
    }

    pub fn book_stats(&self) -> Result<BookStats, StoreError> {
        let books: Vec<Book> = self.scan(BOOKS)?;
        let mut stats = BookStats {
            total_books: books.len() as u64,
            ..Default::default()
        };
        for book in &books {
            match book.status {
                BookStatus::Available => stats.available += 1,
                BookStatus::Borrowed => stats.borrowed += 1,
                BookStatus::Reserved => stats.reserved += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{new_book, setup_db};

    #[test]
    fn test_create_and_get_book() {
        let (db, _temp) = setup_db();

        let book = db.create_book(new_book("978-0-00-000001-1")).unwrap();
        assert_eq!(book.id, 1);
        assert_eq!(book.status, BookStatus::Available);
        assert_eq!(book.copies, 1);

        let fetched = db.get_book(book.id).unwrap();
        assert_eq!(fetched, book);
    }

    #[test]
    fn test_duplicate_isbn_conflicts() {
        let (db, _temp) = setup_db();

        db.create_book(new_book("978-1")).unwrap();
        let err = db.create_book(new_book(" 978-1 ")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_same_title_and_author_are_distinct_books() {
        let (db, _temp) = setup_db();

        let a = db.create_book(new_book("978-1")).unwrap();
        let b = db.create_book(new_book("978-2")).unwrap();
        assert_eq!(a.title, b.title);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_create_rejects_borrowed_status() {
        let (db, _temp) = setup_db();

        let mut new = new_book("978-1");
        new.status = BookStatus::Borrowed;
        assert!(matches!(db.create_book(new), Err(StoreError::Invalid(_))));
        assert!(db.find_book_by_isbn("978-1").unwrap().is_none());
    }

    #[test]
    fn test_get_missing_book() {
        let (db, _temp) = setup_db();
        assert!(matches!(db.get_book(42), Err(StoreError::NotFound("Book"))));
    }

    #[test]
    fn test_list_books_filters() {
        let (db, _temp) = setup_db();

        let mut dune = new_book("978-0441013593");
        dune.title = "Dune".to_string();
        dune.author = "Frank Herbert".to_string();
        dune.category = "Science Fiction".to_string();
        db.create_book(dune).unwrap();

        let mut emma = new_book("978-0141439587");
        emma.title = "Emma".to_string();
        emma.author = "Jane Austen".to_string();
        emma.category = "Classics".to_string();
        emma.status = BookStatus::Reserved;
        db.create_book(emma).unwrap();

        let all = db.list_books(&BookFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        let search = BookFilter {
            search: Some("herb".to_string()),
            ..Default::default()
        };
        let found = db.list_books(&search).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Dune");

        let by_isbn = BookFilter {
            search: Some("439587".to_string()),
            ..Default::default()
        };
        assert_eq!(db.list_books(&by_isbn).unwrap()[0].title, "Emma");

        let reserved = BookFilter {
            status: Some(BookStatus::Reserved),
            ..Default::default()
        };
        assert_eq!(db.list_books(&reserved).unwrap().len(), 1);

        let classics = BookFilter {
            category: Some("Classics".to_string()),
            ..Default::default()
        };
        assert_eq!(db.list_books(&classics).unwrap()[0].author, "Jane Austen");
    }

    #[test]
    fn test_update_book_partial_and_isbn_uniqueness() {
        let (db, _temp) = setup_db();

        let a = db.create_book(new_book("978-1")).unwrap();
        db.create_book(new_book("978-2")).unwrap();

        let updated = db
            .update_book(
                a.id,
                BookPatch {
                    copies: Some(3),
                    title: Some("Second Edition".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.copies, 3);
        assert_eq!(updated.title, "Second Edition");
        assert_eq!(updated.author, a.author);

        let clash = BookPatch {
            isbn: Some("978-2".to_string()),
            ..Default::default()
        };
        assert!(matches!(db.update_book(a.id, clash), Err(StoreError::Conflict(_))));

        let moved = BookPatch {
            isbn: Some("978-3".to_string()),
            ..Default::default()
        };
        db.update_book(a.id, moved).unwrap();
        assert!(db.find_book_by_isbn("978-1").unwrap().is_none());
        assert_eq!(db.find_book_by_isbn("978-3").unwrap().unwrap().id, a.id);
    }

    #[test]
    fn test_update_missing_book() {
        let (db, _temp) = setup_db();
        let result = db.update_book(9, BookPatch::default());
        assert!(matches!(result, Err(StoreError::NotFound("Book"))));
    }

    #[test]
    fn test_delete_book_frees_isbn() {
        let (db, _temp) = setup_db();

        let book = db.create_book(new_book("978-1")).unwrap();
        db.delete_book(book.id).unwrap();
        assert!(matches!(db.get_book(book.id), Err(StoreError::NotFound(_))));
        assert!(matches!(db.delete_book(book.id), Err(StoreError::NotFound(_))));

        let again = db.create_book(new_book("978-1")).unwrap();
        assert_ne!(again.id, book.id);
    }

    #[test]
    fn test_book_stats() {
        let (db, _temp) = setup_db();

        db.create_book(new_book("978-1")).unwrap();
        db.create_book(new_book("978-2")).unwrap();
        let mut reserved = new_book("978-3");
        reserved.status = BookStatus::Reserved;
        db.create_book(reserved).unwrap();

        let stats = db.book_stats().unwrap();
        assert_eq!(
            stats,
            BookStats {
                available: 2,
                borrowed: 0,
                reserved: 1,
                total_books: 3,
            }
        );
    }
}
