//! Action catalog
//!
//! The catalog is the registry of everything a sheet row may call. It is
//! assembled once at startup by an explicit registration pass over a fixed
//! list of providers, then shared read-only by validation and execution.
//! Names are case-sensitive and may be overloaded by parameter list.

use crate::args::{ArgValue, TypedArgs};
use crate::context::ActionContext;
use crate::error::ActionResult;
use futures::future::BoxFuture;
use sheetrun_common::{Error, LocatorType, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Future returned by an action body
pub type ActionFuture<'a> = BoxFuture<'a, ActionResult>;

/// Plain action body
pub type ActionFn = for<'a> fn(&'a ActionContext, &'a TypedArgs) -> ActionFuture<'a>;

/// Action body that carries its own state
#[async_trait::async_trait]
pub trait ActionHandler: Send + Sync {
    async fn call(&self, ctx: &ActionContext, args: &TypedArgs) -> ActionResult;
}

#[derive(Clone)]
pub enum Handler {
    Fn(ActionFn),
    Shared(Arc<dyn ActionHandler>),
}

impl Handler {
    pub async fn call(&self, ctx: &ActionContext, args: &TypedArgs) -> ActionResult {
        match self {
            Handler::Fn(f) => f(ctx, args).await,
            Handler::Shared(handler) => handler.call(ctx, args).await,
        }
    }
}

/// Declared type of one action parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Text,
    Integer,
    Boolean,
    /// Duration; a bare number means milliseconds
    Millis,
    /// Duration; a bare number means seconds
    Seconds,
    Locator,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Text => "text",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
            ParamKind::Millis => "duration(ms)",
            ParamKind::Seconds => "duration(s)",
            ParamKind::Locator => "locator",
        }
    }

    /// Convert one raw cell into a value of this kind
    pub fn convert(&self, raw: &str) -> std::result::Result<ArgValue, String> {
        match self {
            ParamKind::Text => Ok(ArgValue::Text(raw.to_string())),
            ParamKind::Integer => raw
                .parse::<i64>()
                .map(ArgValue::Integer)
                .map_err(|e| e.to_string()),
            ParamKind::Boolean => parse_bool(raw).map(ArgValue::Boolean),
            ParamKind::Millis => parse_duration(raw, Duration::from_millis).map(ArgValue::Duration),
            ParamKind::Seconds => parse_duration(raw, Duration::from_secs).map(ArgValue::Duration),
            ParamKind::Locator => raw.parse::<LocatorType>().map(ArgValue::Locator),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_bool(raw: &str) -> std::result::Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Ok(true),
        "false" | "no" | "n" | "0" | "off" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}

/// `500` uses the declared unit; `500ms`, `5s` and `2m` are explicit
fn parse_duration(
    raw: &str,
    bare: fn(u64) -> Duration,
) -> std::result::Result<Duration, String> {
    let lower = raw.to_ascii_lowercase();
    let (digits, unit_ms) = if let Some(n) = lower.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = lower.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = lower.strip_suffix('m') {
        (n, 60_000)
    } else {
        return lower
            .parse::<u64>()
            .map(bare)
            .map_err(|e| e.to_string());
    };

    let value = digits.trim().parse::<u64>().map_err(|e| e.to_string())?;
    value
        .checked_mul(unit_ms)
        .map(Duration::from_millis)
        .ok_or_else(|| "duration too large".to_string())
}

/// Row-level control effect of an action, applied by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// The first argument names the test case of the following rows
    StartTestCase,
    /// Remaining rows of the sheet are skipped
    StopSheet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

/// An invokable action: name, ordered parameter types and body
#[derive(Clone)]
pub struct ActionSignature {
    name: String,
    params: Vec<Param>,
    provider: &'static str,
    retryable: bool,
    directive: Option<Directive>,
    handler: Handler,
}

impl ActionSignature {
    pub fn new(name: impl Into<String>, handler: ActionFn) -> Self {
        Self::with_handler(name, Handler::Fn(handler))
    }

    pub fn shared(name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        Self::with_handler(name, Handler::Shared(handler))
    }

    fn with_handler(name: impl Into<String>, handler: Handler) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            provider: "",
            retryable: false,
            directive: None,
            handler,
        }
    }

    pub fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind,
        });
        self
    }

    /// Failures of this action are retried by the runner
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    pub fn directive(mut self, directive: Directive) -> Self {
        self.directive = Some(directive);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn kinds(&self) -> impl Iterator<Item = ParamKind> + '_ {
        self.params.iter().map(|p| p.kind)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn directive_kind(&self) -> Option<Directive> {
        self.directive
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    fn same_shape(&self, other: &ActionSignature) -> bool {
        self.name == other.name && self.kinds().eq(other.kinds())
    }
}

impl fmt::Display for ActionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.kind))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}({})", self.name, params)
    }
}

impl fmt::Debug for ActionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSignature")
            .field("signature", &self.to_string())
            .field("provider", &self.provider)
            .field("retryable", &self.retryable)
            .field("directive", &self.directive)
            .finish()
    }
}

/// A named group of actions registered together
#[derive(Clone, Copy)]
pub struct ActionProvider {
    pub name: &'static str,
    pub register: fn(&mut Registrar<'_>),
}

/// Registration handle given to one provider
pub struct Registrar<'a> {
    provider: &'static str,
    builder: &'a mut CatalogBuilder,
}

impl Registrar<'_> {
    pub fn add(&mut self, mut signature: ActionSignature) -> &mut Self {
        signature.provider = self.provider;
        self.builder.push(signature);
        self
    }
}

#[derive(Default)]
pub struct CatalogBuilder {
    actions: BTreeMap<String, Vec<Arc<ActionSignature>>>,
    errors: Vec<String>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(&mut self, provider: &ActionProvider) -> &mut Self {
        let mut registrar = Registrar {
            provider: provider.name,
            builder: self,
        };
        (provider.register)(&mut registrar);
        self
    }

    /// Register a single action outside any provider
    pub fn action(&mut self, signature: ActionSignature) -> &mut Self {
        self.push(signature);
        self
    }

    fn push(&mut self, signature: ActionSignature) {
        if signature.name.trim().is_empty() {
            self.errors
                .push(format!("action with empty name in provider '{}'", signature.provider));
            return;
        }

        let overloads = self.actions.entry(signature.name.clone()).or_default();
        if overloads.iter().any(|existing| existing.same_shape(&signature)) {
            self.errors.push(format!("duplicate action {}", signature));
            return;
        }
        overloads.push(Arc::new(signature));
    }

    pub fn build(self) -> Result<ActionCatalog> {
        if !self.errors.is_empty() {
            return Err(Error::CatalogBuild(self.errors.join("; ")));
        }
        if self.actions.is_empty() {
            return Err(Error::CatalogBuild("no actions registered".to_string()));
        }

        let catalog = ActionCatalog {
            actions: self.actions,
        };
        debug!(
            "Action catalog built: {} names, {} signatures",
            catalog.actions.len(),
            catalog.len()
        );
        Ok(catalog)
    }
}

/// Registry of invokable actions
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    actions: BTreeMap<String, Vec<Arc<ActionSignature>>>,
}

impl ActionCatalog {
    /// Build a catalog from a list of providers
    pub fn build(providers: &[ActionProvider]) -> Result<Self> {
        let mut builder = CatalogBuilder::new();
        for provider in providers {
            builder.provider(provider);
        }
        builder.build()
    }

    /// Catalog of every built-in action
    pub fn builtin() -> Result<Self> {
        Self::build(crate::actions::BUILTIN_PROVIDERS)
    }

    /// All signatures registered under an exact name
    pub fn overloads(&self, name: &str) -> &[Arc<ActionSignature>] {
        self.actions.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Arc<ActionSignature>> {
        self.actions.values().flatten()
    }

    /// Number of signatures
    pub fn len(&self) -> usize {
        self.actions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Registered names close to an unknown one
    pub fn suggestions(&self, name: &str) -> Vec<String> {
        let wanted = name.to_ascii_lowercase();
        let mut close: Vec<(usize, &str)> = self
            .names()
            .filter_map(|candidate| {
                let lower = candidate.to_ascii_lowercase();
                if lower == wanted {
                    return Some((0, candidate));
                }
                let distance = edit_distance(&lower, &wanted);
                (distance <= 2).then_some((distance, candidate))
            })
            .collect();
        close.sort();
        close.into_iter().take(3).map(|(_, n)| n.to_string()).collect()
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}
