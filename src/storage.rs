//! In-memory record store for projects, books and contact submissions.
//!
//! Data lives for the lifetime of the process. Each table hands out ids from
//! its own counter starting at 1; deleted ids are not reused. Listings are
//! returned in id order.

use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{Book, BookPatch, BookStatus, Contact, NewBook, NewContact, Project};

struct Table<T> {
    rows: BTreeMap<u32, T>,
    next_id: u32,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn insert_with(&mut self, build: impl FnOnce(u32) -> T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        row
    }

    fn all(&self) -> Vec<T> {
        self.rows.values().cloned().collect()
    }
}

pub struct MemStorage {
    projects: RwLock<Table<Project>>,
    books: RwLock<Table<Book>>,
    contacts: RwLock<Table<Contact>>,
}

impl MemStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(Table::new()),
            books: RwLock::new(Table::new()),
            contacts: RwLock::new(Table::new()),
        }
    }

    /// Storage pre-populated with the sample portfolio.
    pub fn with_sample_data() -> Self {
        let mut projects = Table::new();
        for (title, description, github, technologies) in SAMPLE_PROJECTS {
            projects.insert_with(|id| Project {
                id,
                title: (*title).to_string(),
                description: (*description).to_string(),
                image_url: None,
                live_url: None,
                github_url: Some((*github).to_string()),
                technologies: technologies.iter().map(|t| (*t).to_string()).collect(),
                featured: false,
            });
        }

        let mut books = Table::new();
        for (title, author, rating, status) in SAMPLE_BOOKS {
            books.insert_with(|id| Book {
                id,
                title: (*title).to_string(),
                author: (*author).to_string(),
                cover_url: None,
                genre: Some("Programming".to_string()),
                rating: *rating,
                review: None,
                status: *status,
            });
        }

        Self {
            projects: RwLock::new(projects),
            books: RwLock::new(books),
            contacts: RwLock::new(Table::new()),
        }
    }

    // =========================================================================
    // Projects
    // =========================================================================

    pub async fn projects(&self) -> Vec<Project> {
        self.projects.read().await.all()
    }

    pub async fn project(&self, id: u32) -> Option<Project> {
        self.projects.read().await.rows.get(&id).cloned()
    }

    // =========================================================================
    // Books
    // =========================================================================

    pub async fn books(&self) -> Vec<Book> {
        self.books.read().await.all()
    }

    pub async fn book(&self, id: u32) -> Option<Book> {
        self.books.read().await.rows.get(&id).cloned()
    }

    pub async fn create_book(&self, new: NewBook) -> Book {
        let book = self.books.write().await.insert_with(|id| Book {
            id,
            title: new.title,
            author: new.author,
            cover_url: new.cover_url,
            genre: new.genre,
            rating: new.rating,
            review: new.review,
            status: new.status,
        });
        debug!(book_id = book.id, "Book created");
        book
    }

    /// Apply `patch` to a book. Returns `None` if it doesn't exist.
    pub async fn update_book(&self, id: u32, patch: BookPatch) -> Option<Book> {
        let mut books = self.books.write().await;
        let book = books.rows.get_mut(&id)?;
        patch.apply(book);
        Some(book.clone())
    }

    /// Remove a book. Returns whether it existed.
    pub async fn delete_book(&self, id: u32) -> bool {
        self.books.write().await.rows.remove(&id).is_some()
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    pub async fn create_contact(&self, new: NewContact) -> Contact {
        self.contacts.write().await.insert_with(|id| Contact {
            id,
            name: new.name,
            email: new.email,
            message: new.message,
            created_at: Utc::now(),
        })
    }

    pub async fn contacts(&self) -> Vec<Contact> {
        self.contacts.read().await.all()
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

const SAMPLE_PROJECTS: &[(&str, &str, &str, &[&str])] = &[
    (
        "Data Engineering Zoomcamp Capstone",
        "A dockerized mini-batch data pipeline streaming from Kafka to PostgreSQL with Spark Structured Streaming.",
        "https://github.com/KonuTech/data-engineering-zoomcamp-capstone-01",
        &["Airflow", "Kafka", "PySpark", "PostgreSQL", "Docker"],
    ),
    (
        "LLM Zoomcamp Capstone",
        "A dockerized RAG application over game reviews, served by Flask on an Elasticsearch vector store.",
        "https://github.com/KonuTech/llm-zoomcamp-capstone-01",
        &["Flask", "Elasticsearch", "PostgreSQL", "Grafana", "Docker"],
    ),
    (
        "Personal Portfolio Website",
        "This portfolio: a typed API with caching, rate limiting and request metrics.",
        "https://github.com/KonuTech/konrad-borowiec",
        &["TypeScript", "React", "Node.js"],
    ),
];

const SAMPLE_BOOKS: &[(&str, &str, Option<u8>, BookStatus)] = &[
    (
        "Fundamentals of Data Engineering",
        "Joe Reis & Matt Housley",
        Some(5),
        BookStatus::Read,
    ),
    (
        "Data Engineering with dbt",
        "Roberto Zagni",
        Some(4),
        BookStatus::Read,
    ),
    (
        "Data Modeling with Snowflake",
        "Serge Gershkovich",
        None,
        BookStatus::ToRead,
    ),
    ("Polars Cookbook", "Yuki Kakegawa", None, BookStatus::ToRead),
];

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn new_book(title: &str) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: "Author".to_string(),
            cover_url: None,
            genre: None,
            rating: None,
            review: None,
            status: BookStatus::ToRead,
        }
    }

    #[tokio::test]
    async fn test_sample_data_is_seeded_in_id_order() {
        let storage = MemStorage::with_sample_data();

        let projects = storage.projects().await;
        assert_eq!(projects.len(), SAMPLE_PROJECTS.len());
        assert_eq!(projects.first().unwrap().id, 1);

        let books = storage.books().await;
        assert_eq!(books.len(), SAMPLE_BOOKS.len());
        assert!(books.windows(2).all(|w| matches!(w, [a, b] if a.id < b.id)));
    }

    #[tokio::test]
    async fn test_book_lifecycle() {
        let storage = MemStorage::new();

        let created = storage.create_book(new_book("Polars Cookbook")).await;
        assert_eq!(created.id, 1);
        assert_eq!(storage.book(1).await.unwrap().title, "Polars Cookbook");

        let patch = BookPatch {
            status: Some(BookStatus::Read),
            rating: Some(4),
            ..BookPatch::default()
        };
        let updated = storage.update_book(1, patch).await.unwrap();
        assert_eq!(updated.status, BookStatus::Read);
        assert_eq!(updated.rating, Some(4));
        assert_eq!(updated.title, "Polars Cookbook");

        assert!(storage.delete_book(1).await);
        assert!(!storage.delete_book(1).await);
        assert!(storage.book(1).await.is_none());
    }

    #[tokio::test]
    async fn test_ids_are_not_reused() {
        let storage = MemStorage::new();
        storage.create_book(new_book("a")).await;
        storage.delete_book(1).await;

        let next = storage.create_book(new_book("b")).await;
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn test_update_missing_book() {
        let storage = MemStorage::new();
        assert!(storage.update_book(7, BookPatch::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_contacts_are_stored() {
        let storage = MemStorage::new();
        let contact = storage
            .create_contact(NewContact {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                message: "Hi".to_string(),
            })
            .await;

        assert_eq!(contact.id, 1);
        assert_eq!(storage.contacts().await, vec![contact]);
    }
}
