// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ErrorCategory;

/// Keyword families in precedence order. The first family with a keyword contained in the
/// lower-cased message wins.
///
/// Keywords are plain substrings, so short ones such as `ai` also match inside longer words
/// (`OpenAI`, but also `failed`). Messages that match no family classify as
/// [`ErrorCategory::Unknown`].
pub const KEYWORD_TABLE: &[(ErrorCategory, &[&str])] = &[
    (ErrorCategory::NetworkTimeout, &["timeout", "timed out"]),
    (ErrorCategory::DomNotFound, &["not found", "element", "selector"]),
    (ErrorCategory::ContentScriptUnresponsive, &["content script", "script not responsive"]),
    (ErrorCategory::ExtractionFailed, &["extraction", "data", "field"]),
    (ErrorCategory::AiProcessingFailed, &["ai", "model", "processing"]),
    (ErrorCategory::NavigationFailed, &["navigation", "navigate", "tab"]),
    (ErrorCategory::PermissionDenied, &["permission", "access denied"]),
    (ErrorCategory::MemoryLimit, &["memory", "heap", "out of memory"]),
];

/// Sorts a failure message into an [`ErrorCategory`].
///
/// Matching is case-insensitive and deterministic: the same message always yields the same
/// category. See [`KEYWORD_TABLE`] for the precedence.
///
/// # Examples
///
/// ```
/// use lifeline::{ErrorCategory, classify};
///
/// assert_eq!(classify("Request Timeout after 30s"), ErrorCategory::NetworkTimeout);
/// assert_eq!(classify("navigation aborted"), ErrorCategory::NavigationFailed);
/// assert_eq!(classify("something odd"), ErrorCategory::Unknown);
/// ```
#[must_use]
pub fn classify(message: &str) -> ErrorCategory {
    let lowered = message.to_lowercase();

    KEYWORD_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| lowered.contains(keyword)))
        .map_or(ErrorCategory::Unknown, |(category, _)| *category)
}
