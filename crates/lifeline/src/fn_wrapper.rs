// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Generates a cloneable, thread-safe wrapper around a user-provided closure.
///
/// Recovery callbacks (retry vetoes, fallback actions, environment hooks) are stored in side
/// registries keyed by [`ErrorCategory`][crate::ErrorCategory] and shared across concurrent
/// calls, so each one lives behind an `Arc<dyn Fn ...>`.
///
/// ```rust,ignore
/// define_fn_wrapper!(ShouldRetry(Fn(failure: &Failure, attempt: u32) -> bool));
/// ```
///
/// expands to a `ShouldRetry` type with `new`, `call`, `Clone` and `Debug`.
macro_rules! define_fn_wrapper {
    ($name:ident(Fn($($param_name:ident: $param_ty:ty),*) $(-> $return_ty:ty)?)) => {
        pub(crate) struct $name(std::sync::Arc<dyn Fn($($param_ty),*) $(-> $return_ty)? + Send + Sync>);

        impl $name {
            pub(crate) fn new<F>(f: F) -> Self
            where
                F: Fn($($param_ty),*) $(-> $return_ty)? + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(f))
            }

            pub(crate) fn call(&self, $($param_name: $param_ty),*) $(-> $return_ty)? {
                (self.0)($($param_name),*)
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}

pub(crate) use define_fn_wrapper;
