//! Unit tests for domain models and their wire format.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use serde_json::json;

mod portfolio_tests {
    use super::*;
    use portfolio_server::models::{Book, BookStatus, Contact, Project};

    fn sample_book() -> Book {
        Book {
            id: 7,
            title: "Zero to Production in Rust".to_string(),
            author: "Luca Palmieri".to_string(),
            cover_url: Some("https://example.com/cover.jpg".to_string()),
            genre: Some("Programming".to_string()),
            rating: Some(4),
            review: None,
            status: BookStatus::ToRead,
        }
    }

    #[test]
    fn test_book_serializes_camel_case() {
        let value = serde_json::to_value(sample_book()).unwrap();

        assert_eq!(value["coverUrl"], "https://example.com/cover.jpg");
        assert_eq!(value["status"], "to-read");
        assert!(value.get("cover_url").is_none());
        assert!(value["review"].is_null());
    }

    #[test]
    fn test_book_status_wire_names() {
        assert_eq!(serde_json::to_value(BookStatus::Read).unwrap(), json!("read"));
        assert_eq!(
            serde_json::from_value::<BookStatus>(json!("to-read")).unwrap(),
            BookStatus::ToRead
        );
        assert!(serde_json::from_value::<BookStatus>(json!("to_read")).is_err());
        assert_eq!(BookStatus::default(), BookStatus::Read);
    }

    #[test]
    fn test_book_json_roundtrip() {
        let book = sample_book();
        let parsed: Book = serde_json::from_str(&serde_json::to_string(&book).unwrap()).unwrap();
        assert_eq!(parsed, book);
    }

    #[test]
    fn test_project_featured_defaults_to_false() {
        let project: Project = serde_json::from_value(json!({
            "id": 1,
            "title": "Portfolio",
            "description": "This site",
            "imageUrl": null,
            "liveUrl": null,
            "githubUrl": "https://github.com/example/portfolio",
            "technologies": ["Rust", "Axum"]
        }))
        .unwrap();

        assert!(!project.featured);
        assert_eq!(project.technologies, vec!["Rust", "Axum"]);
    }

    #[test]
    fn test_contact_serializes_created_at() {
        let contact = Contact {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            message: "Hello".to_string(),
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&contact).unwrap();
        assert!(value["createdAt"].is_string());
    }
}

mod api_tests {
    use super::*;
    use portfolio_server::models::{
        Book, BookPatch, BookStatus, ContactResponse, HealthResponse, NewBook, NewContact,
    };

    #[test]
    fn test_new_book_defaults() {
        let book: NewBook = serde_json::from_value(json!({
            "title": "Dune",
            "author": "Frank Herbert"
        }))
        .unwrap();

        assert_eq!(book.status, BookStatus::Read);
        assert!(book.rating.is_none());
        assert!(book.cover_url.is_none());
    }

    #[test]
    fn test_new_book_rejects_fractional_rating() {
        let result = serde_json::from_value::<NewBook>(json!({
            "title": "Dune",
            "author": "Frank Herbert",
            "rating": 4.5
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_new_book_requires_author() {
        let err = serde_json::from_value::<NewBook>(json!({ "title": "Dune" })).unwrap_err();
        assert!(err.to_string().contains("author"));
    }

    #[test]
    fn test_book_patch_only_touches_present_fields() {
        let mut book = Book {
            id: 1,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            cover_url: None,
            genre: None,
            rating: Some(3),
            review: None,
            status: BookStatus::ToRead,
        };

        let patch: BookPatch = serde_json::from_value(json!({
            "rating": 5,
            "status": "read",
            "coverUrl": "https://example.com/dune.jpg"
        }))
        .unwrap();
        patch.apply(&mut book);

        assert_eq!(book.title, "Dune");
        assert_eq!(book.rating, Some(5));
        assert_eq!(book.status, BookStatus::Read);
        assert_eq!(book.cover_url.as_deref(), Some("https://example.com/dune.jpg"));
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let mut book = Book {
            id: 2,
            title: "Hyperion".to_string(),
            author: "Dan Simmons".to_string(),
            cover_url: None,
            genre: Some("Sci-Fi".to_string()),
            rating: None,
            review: Some("Great".to_string()),
            status: BookStatus::Read,
        };
        let before = book.clone();

        BookPatch::default().apply(&mut book);
        assert_eq!(book, before);
    }

    #[test]
    fn test_new_contact_deserialize() {
        let contact: NewContact = serde_json::from_value(json!({
            "name": "Grace",
            "email": "grace@example.com",
            "message": "Hi there"
        }))
        .unwrap();

        assert_eq!(contact.name, "Grace");
        assert!(serde_json::from_value::<NewContact>(json!({ "name": "Grace" })).is_err());
    }

    #[test]
    fn test_response_shapes() {
        let contact = serde_json::to_value(ContactResponse {
            success: true,
            message: "sent".to_string(),
        })
        .unwrap();
        assert_eq!(contact, json!({ "success": true, "message": "sent" }));

        let health = serde_json::to_value(HealthResponse {
            status: "healthy".to_string(),
            uptime_seconds: 12,
            environment: "test".to_string(),
            version: "0.1.0".to_string(),
            timestamp: Utc::now(),
        })
        .unwrap();
        assert_eq!(health["uptimeSeconds"], 12);
        assert!(health.get("uptime_seconds").is_none());
    }
}
