// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The closed taxonomy every failure is sorted into.
///
/// The category is assigned once, by [`classify`][crate::classify], and selects the
/// [`RecoveryStrategy`][crate::RecoveryStrategy] applied to the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorCategory {
    /// A network request or page load took too long.
    NetworkTimeout,
    /// An element or selector could not be located.
    DomNotFound,
    /// An injected content script stopped answering.
    ContentScriptUnresponsive,
    /// Reading data or fields out of a source failed.
    ExtractionFailed,
    /// An AI model or processing pipeline failed.
    AiProcessingFailed,
    /// Navigating to a page or tab failed.
    NavigationFailed,
    /// The operation lacked the permission it needs.
    PermissionDenied,
    /// The host ran out of memory or heap.
    MemoryLimit,
    /// None of the known keyword families matched.
    Unknown,
}

impl ErrorCategory {
    /// All categories, in classification precedence order with [`ErrorCategory::Unknown`] last.
    pub const ALL: [Self; 9] = [
        Self::NetworkTimeout,
        Self::DomNotFound,
        Self::ContentScriptUnresponsive,
        Self::ExtractionFailed,
        Self::AiProcessingFailed,
        Self::NavigationFailed,
        Self::PermissionDenied,
        Self::MemoryLimit,
        Self::Unknown,
    ];

    /// Returns the `snake_case` name used in logs and serialized forms.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network_timeout",
            Self::DomNotFound => "dom_not_found",
            Self::ContentScriptUnresponsive => "content_script_unresponsive",
            Self::ExtractionFailed => "extraction_failed",
            Self::AiProcessingFailed => "ai_processing_failed",
            Self::NavigationFailed => "navigation_failed",
            Self::PermissionDenied => "permission_denied",
            Self::MemoryLimit => "memory_limit",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
