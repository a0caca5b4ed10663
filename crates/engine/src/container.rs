//! Execution method container
//!
//! Holds the one invocation a row resolved to. `invoke` always yields an
//! outcome: action errors and panics become `Fail`, and an empty container
//! fails instead of panicking.

use crate::args::TypedArgs;
use crate::catalog::{ActionSignature, ParamKind};
use crate::context::ActionContext;
use crate::error::ArgError;
use futures::FutureExt;
use sheetrun_common::{ExecutionOutcome, FailureCause, LocatorType};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;

/// One signature plus arguments that fit it exactly
#[derive(Debug, Clone)]
pub struct ResolvedInvocation {
    signature: Arc<ActionSignature>,
    args: TypedArgs,
}

impl ResolvedInvocation {
    pub fn new(signature: Arc<ActionSignature>, args: TypedArgs) -> Result<Self, ArgError> {
        if args.len() != signature.arity() {
            return Err(ArgError::ArityMismatch {
                expected: signature.arity(),
                found: args.len(),
            });
        }
        if let Some((index, (value, kind))) = args
            .values()
            .iter()
            .zip(signature.kinds())
            .enumerate()
            .find(|(_, (value, kind))| !value.fits(*kind))
        {
            return Err(ArgError::TypeConversion {
                index,
                expected: kind,
                raw: value.to_string(),
                reason: "value of a different kind".to_string(),
            });
        }
        Ok(Self { signature, args })
    }

    pub fn signature(&self) -> &Arc<ActionSignature> {
        &self.signature
    }

    pub fn args(&self) -> &TypedArgs {
        &self.args
    }

    /// Image names referenced by IMAGE locators: the search area and the
    /// element image that follow the locator. `SCREEN` is the whole screen.
    pub fn image_refs(&self) -> Vec<&str> {
        let kinds: Vec<ParamKind> = self.signature.kinds().collect();
        let mut refs = Vec::new();
        for (index, kind) in kinds.iter().enumerate() {
            if *kind != ParamKind::Locator || self.args.locator(index).ok() != Some(LocatorType::Image) {
                continue;
            }
            for offset in 1..=2 {
                if kinds.get(index + offset) != Some(&ParamKind::Text) {
                    break;
                }
                if let Ok(name) = self.args.text(index + offset) {
                    if !name.eq_ignore_ascii_case("SCREEN") {
                        refs.push(name);
                    }
                }
            }
        }
        refs
    }
}

#[derive(Debug, Default)]
pub struct ExecutionContainer {
    bound: Option<ResolvedInvocation>,
}

impl ExecutionContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a signature and arguments, replacing whatever was bound
    pub fn bind(&mut self, signature: Arc<ActionSignature>, args: TypedArgs) -> Result<(), ArgError> {
        self.bound = Some(ResolvedInvocation::new(signature, args)?);
        Ok(())
    }

    pub fn bind_invocation(&mut self, invocation: ResolvedInvocation) {
        self.bound = Some(invocation);
    }

    pub fn reset(&mut self) {
        self.bound = None;
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn invocation(&self) -> Option<&ResolvedInvocation> {
        self.bound.as_ref()
    }

    /// Run the bound action once
    pub async fn invoke(&self, ctx: &ActionContext) -> ExecutionOutcome {
        let Some(invocation) = &self.bound else {
            return ExecutionOutcome::Fail(FailureCause::unbound());
        };

        let signature = &invocation.signature;
        debug!("Invoking {}", signature);

        let call = signature.handler().call(ctx, &invocation.args);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(())) => ExecutionOutcome::Pass,
            Ok(Err(e)) => ExecutionOutcome::fail(e.to_string()),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "action panicked".to_string());
                ExecutionOutcome::fail(format!("{} panicked: {}", signature.name(), message))
            }
        }
    }
}
