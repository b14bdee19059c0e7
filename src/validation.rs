// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalization and validation of document ids and email addresses.

use std::collections::BTreeSet;
use validator::{ValidateEmail, ValidationError};

/// Longest accepted document identifier.
pub const MAX_DOCUMENT_ID_LEN: usize = 100;

/// Document ids are slugs such as `health-tech-market-2024`.
pub fn is_valid_document_id(document_id: &str) -> bool {
    !document_id.is_empty()
        && document_id.len() <= MAX_DOCUMENT_ID_LEN
        && document_id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

/// `validator` hook for request bodies carrying a document id.
pub fn validate_document_id(document_id: &str) -> Result<(), ValidationError> {
    if is_valid_document_id(document_id) {
        Ok(())
    } else {
        Err(ValidationError::new("document_id")
            .with_message("must be 1-100 characters of a-z, 0-9, '-' or '_'".into()))
    }
}

/// Trim and lower-case an address, returning `None` if it is not a valid email.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    email.validate_email().then_some(email)
}

/// Result of normalizing a batch of candidate addresses.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizedEmails {
    /// Valid, lower-cased, de-duplicated addresses in first-seen order.
    pub valid: Vec<String>,
    /// Inputs that failed validation, as given.
    pub rejected: Vec<String>,
}

/// Normalize a batch of addresses, dropping case-equivalent duplicates.
pub fn normalize_emails<I, S>(candidates: I) -> NormalizedEmails
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    let mut out = NormalizedEmails::default();

    for candidate in candidates {
        let candidate = candidate.as_ref();
        match normalize_email(candidate) {
            Some(email) => {
                if seen.insert(email.clone()) {
                    out.valid.push(email);
                }
            }
            None => out.rejected.push(candidate.to_string()),
        }
    }

    out
}

/// Lower-case signup addresses, keeping only those that contain an `@`.
///
/// Signup payloads come from the identity provider, which has already
/// verified the address shape, so only the minimal check applies here.
pub fn signup_emails<I, S>(addresses: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    addresses
        .into_iter()
        .map(|a| a.as_ref().trim().to_lowercase())
        .filter(|a| a.contains('@'))
        .filter(|a| seen.insert(a.clone()))
        .collect()
}
