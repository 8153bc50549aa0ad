// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::borrow::Cow;
use std::fmt::Display;
use std::sync::Arc;
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

/// An opaque, shareable value carried through the context into predicates and hooks.
///
/// The engine never inspects attachments; callbacks recover the concrete type with
/// [`OperationContext::work_item`] or [`OperationContext::environment`].
pub type Attachment = Arc<dyn Any + Send + Sync>;

/// Identifies the circuit breaker bucket of an operation.
///
/// A key is derived from the operation name and the work item index as
/// `"{operation_name}_{work_item_index}"`, so each work item of an operation trips its own
/// breaker.
///
/// # Examples
///
/// ```rust
/// use lifeline::{OperationContext, OperationKey};
///
/// let key = OperationContext::new("extract-data", 7).key();
/// assert_eq!(key, OperationKey::from("extract-data_7"));
/// assert_eq!(key.to_string(), "extract-data_7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey(Cow<'static, str>);

impl OperationKey {
    /// Builds the key for the given operation name and work item index.
    #[must_use]
    pub fn new(operation_name: &str, work_item_index: usize) -> Self {
        Self(Cow::Owned(format!("{operation_name}_{work_item_index}")))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OperationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for OperationKey {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for OperationKey {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl AsRef<str> for OperationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Business context of a single recoverable operation.
///
/// The caller supplies the context; the engine passes it unmodified into retry predicates,
/// fallback actions, environment hooks and degradation providers. Only the
/// [`key`][Self::key] and the cancellation token are used by the engine itself.
///
/// # Examples
///
/// ```rust
/// use lifeline::OperationContext;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let context = OperationContext::new("ai-review", 2)
///     .with_work_item("patient-42".to_string())
///     .with_previous_attempts(1)
///     .with_cancellation(token.clone());
///
/// assert_eq!(context.operation_name(), "ai-review");
/// assert_eq!(context.work_item::<String>().map(String::as_str), Some("patient-42"));
/// assert!(!context.is_cancelled());
/// ```
#[derive(Clone)]
pub struct OperationContext {
    operation_name: Cow<'static, str>,
    work_item_index: usize,
    work_item: Option<Attachment>,
    timestamp: Option<SystemTime>,
    environment: Option<Attachment>,
    previous_attempts: u32,
    cancellation: Option<CancellationToken>,
}

impl OperationContext {
    /// Creates a context for the given operation name and work item index.
    pub fn new(operation_name: impl Into<Cow<'static, str>>, work_item_index: usize) -> Self {
        Self {
            operation_name: operation_name.into(),
            work_item_index,
            work_item: None,
            timestamp: None,
            environment: None,
            previous_attempts: 0,
            cancellation: None,
        }
    }

    /// Attaches the work item the operation acts on.
    #[must_use]
    pub fn with_work_item<T: Any + Send + Sync>(mut self, work_item: T) -> Self {
        self.work_item = Some(Arc::new(work_item));
        self
    }

    /// Attaches an already shared work item.
    #[must_use]
    pub fn with_work_item_attachment(mut self, work_item: Attachment) -> Self {
        self.work_item = Some(work_item);
        self
    }

    /// Attaches the execution environment (for example a browser tab handle).
    #[must_use]
    pub fn with_environment<T: Any + Send + Sync>(mut self, environment: T) -> Self {
        self.environment = Some(Arc::new(environment));
        self
    }

    /// Records when the caller created the context.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Records how many attempts the caller already made outside the engine.
    #[must_use]
    pub fn with_previous_attempts(mut self, previous_attempts: u32) -> Self {
        self.previous_attempts = previous_attempts;
        self
    }

    /// Makes the operation cancellable through the given token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns the operation name.
    #[must_use]
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Returns the index of the work item within its batch.
    #[must_use]
    pub fn work_item_index(&self) -> usize {
        self.work_item_index
    }

    /// Returns the work item if one is attached and it has type `T`.
    #[must_use]
    pub fn work_item<T: Any>(&self) -> Option<&T> {
        self.work_item.as_deref().and_then(|value| value.downcast_ref::<T>())
    }

    /// Returns the attached work item without downcasting.
    #[must_use]
    pub fn work_item_attachment(&self) -> Option<&Attachment> {
        self.work_item.as_ref()
    }

    /// Returns the environment if one is attached and it has type `T`.
    #[must_use]
    pub fn environment<T: Any>(&self) -> Option<&T> {
        self.environment.as_deref().and_then(|value| value.downcast_ref::<T>())
    }

    /// Returns the caller-supplied creation time.
    #[must_use]
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    /// Returns the number of attempts the caller made before handing the operation over.
    #[must_use]
    pub fn previous_attempts(&self) -> u32 {
        self.previous_attempts
    }

    /// Returns the cancellation token, if any.
    #[must_use]
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Returns `true` if a cancellation token is attached and has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Derives the circuit breaker key of this operation.
    #[must_use]
    pub fn key(&self) -> OperationKey {
        OperationKey::new(&self.operation_name, self.work_item_index)
    }
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("operation_name", &self.operation_name)
            .field("work_item_index", &self.work_item_index)
            .field("has_work_item", &self.work_item.is_some())
            .field("timestamp", &self.timestamp)
            .field("has_environment", &self.environment.is_some())
            .field("previous_attempts", &self.previous_attempts)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(OperationContext: Send, Sync, Clone, std::fmt::Debug);
        static_assertions::assert_impl_all!(OperationKey: Send, Sync, Clone, std::hash::Hash);
    }

    #[test]
    fn key_joins_name_and_index() {
        let context = OperationContext::new("navigate", 12);

        assert_eq!(context.key().as_str(), "navigate_12");
        assert_eq!(context.key(), OperationKey::new("navigate", 12));
    }

    #[test]
    fn attachments_downcast_to_their_type() {
        let context = OperationContext::new("extract-data", 0)
            .with_work_item(41_u32)
            .with_environment("tab-7");

        assert_eq!(context.work_item::<u32>(), Some(&41));
        assert_eq!(context.work_item::<String>(), None);
        assert_eq!(context.environment::<&str>(), Some(&"tab-7"));
        assert!(context.work_item_attachment().is_some());
    }

    #[test]
    fn defaults() {
        let context = OperationContext::new("op", 1);

        assert_eq!(context.previous_attempts(), 0);
        assert_eq!(context.timestamp(), None);
        assert!(context.cancellation().is_none());
        assert!(!context.is_cancelled());
        assert!(context.work_item::<u32>().is_none());
    }

    #[test]
    fn cancellation_is_observed() {
        let token = CancellationToken::new();
        let context = OperationContext::new("op", 1).with_cancellation(token.clone());

        token.cancel();

        assert!(context.is_cancelled());
    }

    #[test]
    fn debug_hides_attachments() {
        let timestamp = SystemTime::UNIX_EPOCH + Duration::from_secs(5);
        let context = OperationContext::new("op", 3)
            .with_work_item(vec![1, 2, 3])
            .with_timestamp(timestamp);

        let debug = format!("{context:?}");

        assert!(debug.contains("operation_name: \"op\""));
        assert!(debug.contains("has_work_item: true"));
        assert!(debug.contains("has_environment: false"));
    }
}
