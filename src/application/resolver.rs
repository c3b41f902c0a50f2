//! Conversation search.
//!
//! Matches a user query against the account's dialog list by username,
//! then phone number, then display name.

use crate::domain::{AppError, ConversationCandidate, Result};

/// Finds the single dialog matching `query`.
///
/// Rules are tried in order; the first one producing exactly one match wins.
///
/// # Errors
/// `NotFound` when nothing matches, `AmbiguousMatch` when a rule matched
/// several dialogs and no rule matched exactly one.
pub fn resolve<'a>(
    query: &str,
    candidates: &'a [ConversationCandidate],
) -> Result<&'a ConversationCandidate> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::NotFound {
            query: String::new(),
        });
    }

    let rules: [Vec<&ConversationCandidate>; 3] = [
        match_username(query, candidates),
        match_phone(query, candidates),
        match_display_name(query, candidates),
    ];

    if let Some(found) = rules.iter().find(|m| m.len() == 1) {
        let found = found[0];
        tracing::info!(id = found.id, name = %found.display_name, "Resolved conversation");
        return Ok(found);
    }

    if let Some(many) = rules.iter().find(|m| m.len() > 1) {
        return Err(AppError::AmbiguousMatch {
            query: query.to_string(),
            matches: many.iter().map(ToString::to_string).collect(),
        });
    }

    tracing::debug!(query, dialogs = candidates.len(), "No dialog matched");
    Err(AppError::NotFound {
        query: query.to_string(),
    })
}

fn match_username<'a>(
    query: &str,
    candidates: &'a [ConversationCandidate],
) -> Vec<&'a ConversationCandidate> {
    let wanted = query.trim_start_matches('@');
    if wanted.is_empty() {
        return Vec::new();
    }

    candidates
        .iter()
        .filter(|c| {
            c.username
                .as_deref()
                .is_some_and(|u| u.eq_ignore_ascii_case(wanted))
        })
        .collect()
}

fn match_phone<'a>(
    query: &str,
    candidates: &'a [ConversationCandidate],
) -> Vec<&'a ConversationCandidate> {
    let Some(wanted) = normalize_phone(query) else {
        return Vec::new();
    };

    candidates
        .iter()
        .filter(|c| {
            c.phone
                .as_deref()
                .and_then(normalize_phone)
                .is_some_and(|p| p == wanted)
        })
        .collect()
}

fn match_display_name<'a>(
    query: &str,
    candidates: &'a [ConversationCandidate],
) -> Vec<&'a ConversationCandidate> {
    let wanted = query.to_lowercase();

    candidates
        .iter()
        .filter(|c| c.display_name.to_lowercase().contains(&wanted))
        .collect()
}

/// Reduces a phone number to its digits.
///
/// Returns `None` unless the input looks like a phone number: an optional
/// leading `+`, then digits with optional spaces, dashes or parentheses.
pub fn normalize_phone(input: &str) -> Option<String> {
    let rest = input.trim();
    let rest = rest.strip_prefix('+').unwrap_or(rest);

    if !rest
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'))
    {
        return None;
    }

    let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}
