//! Fuzz target for request validation and signature matching.
//!
//! Checks that none of these panic on arbitrary input:
//!
//! - text, email, rating and id validation
//! - `SecurityPolicy::match_signature` on arbitrary haystacks
//! - JSON body parsing into the request models
//!
//! # Running
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```

#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use portfolio_server::models::{BookPatch, NewBook, NewContact};
use portfolio_server::security::{BLOCKED_SIGNATURES, SecurityPolicy};
use portfolio_server::validation::{
    MAX_SHORT_TEXT_LENGTH, parse_id, validate_book_patch, validate_email, validate_new_book,
    validate_new_contact, validate_rating, validate_required_text,
};

fn policy() -> &'static SecurityPolicy {
    static POLICY: OnceLock<SecurityPolicy> = OnceLock::new();
    POLICY.get_or_init(|| SecurityPolicy::new(false).expect("signatures compile"))
}

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = validate_required_text(s, "title", MAX_SHORT_TEXT_LENGTH);
        let _ = validate_email(s);
        let _ = parse_id(s, "book");

        if let Some(signature) = policy().match_signature(s) {
            assert!(BLOCKED_SIGNATURES.contains(&signature));
        }

        if let Ok(book) = serde_json::from_str::<NewBook>(s) {
            let _ = validate_new_book(&book);
        }
        if let Ok(patch) = serde_json::from_str::<BookPatch>(s) {
            let _ = validate_book_patch(&patch);
        }
        if let Ok(contact) = serde_json::from_str::<NewContact>(s) {
            let _ = validate_new_contact(&contact);
        }
    }

    if let Some(&rating) = data.first() {
        let _ = validate_rating(Some(rating));
    }
});
