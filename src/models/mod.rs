mod api;
mod portfolio;

pub use api::{BookPatch, ContactResponse, HealthResponse, NewBook, NewContact};
pub use portfolio::{Book, BookStatus, Contact, Project};
