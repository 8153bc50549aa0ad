// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use futures_util::future::BoxFuture;

use super::{FallbackArgs, HookArgs, RetryNotice};
use crate::{BoxError, Failure, OperationContext};

crate::define_fn_wrapper!(ShouldRetry(Fn(failure: &Failure, attempt: u32, context: &OperationContext) -> bool));
crate::define_fn_wrapper!(FallbackAction(Fn(args: FallbackArgs<'_>) -> Result<(), BoxError>));
crate::define_fn_wrapper!(EnvironmentHook(Fn(args: HookArgs) -> BoxFuture<'static, Result<(), BoxError>>));
crate::define_fn_wrapper!(OnRetry(Fn(notice: RetryNotice<'_>)));
