// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Value, json};

use crate::{ErrorCategory, Failure, OperationContext};

crate::define_fn_wrapper!(DegradationProvider(Fn(context: &OperationContext, failure: &Failure) -> Option<Value>));

/// A reduced-fidelity result returned in place of a failed operation's output.
///
/// A degraded result is a soft success: the caller gets something to continue with, but the
/// payload must always be reviewed manually before it is trusted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degraded {
    operation: String,
    work_item_index: usize,
    category: ErrorCategory,
    cause: String,
    payload: Value,
}

impl Degraded {
    /// Returns the name of the operation that degraded.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the index of the affected work item.
    #[must_use]
    pub fn work_item_index(&self) -> usize {
        self.work_item_index
    }

    /// Returns the category of the failure that caused the degradation.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Returns the message of the failure that caused the degradation.
    #[must_use]
    pub fn cause(&self) -> &str {
        &self.cause
    }

    /// Returns the provider's payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Consumes the result and returns the provider's payload.
    #[must_use]
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Degraded results always require manual review.
    #[must_use]
    pub const fn requires_manual_review(&self) -> bool {
        true
    }
}

/// Degradation providers keyed by exact operation name.
#[derive(Debug, Clone)]
pub(crate) struct DegradationProviders {
    providers: HashMap<Cow<'static, str>, DegradationProvider>,
}

impl Default for DegradationProviders {
    fn default() -> Self {
        let mut providers = Self { providers: HashMap::new() };

        providers.insert(
            "extract-data",
            DegradationProvider::new(|_, _| {
                Some(json!({
                    "status": "partial",
                    "fields": {},
                    "requires_manual_review": true,
                    "note": "manual review required",
                }))
            }),
        );
        providers.insert(
            "ai-review",
            DegradationProvider::new(|_, _| {
                Some(json!({
                    "status": "unavailable",
                    "summary": null,
                    "requires_manual_review": true,
                    "note": "automated review unavailable, manual review required",
                }))
            }),
        );

        providers
    }
}

impl DegradationProviders {
    pub(crate) fn insert(&mut self, operation_name: impl Into<Cow<'static, str>>, provider: DegradationProvider) {
        self.providers.insert(operation_name.into(), provider);
    }

    pub(crate) fn degrade(&self, context: &OperationContext, failure: &Failure) -> Option<Degraded> {
        let provider = self.providers.get(context.operation_name())?;
        let payload = provider.call(context, failure)?;

        Some(Degraded {
            operation: context.operation_name().to_string(),
            work_item_index: context.work_item_index(),
            category: failure.category(),
            cause: failure.message().to_string(),
            payload,
        })
    }
}
