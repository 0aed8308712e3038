mod books;
mod contact;
mod health;
mod projects;
mod util;

pub use books::{create_book, delete_book, get_book, list_books, update_book};
pub use contact::submit_contact;
pub use health::{health_check, metrics_snapshot, reset_metrics};
pub use projects::{get_project, list_projects};
