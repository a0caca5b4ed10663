//! Typed argument lists
//!
//! Raw cells are converted against one signature's declared parameter kinds.
//! Conversion either succeeds for every cell or names the first cell that
//! does not fit.

use crate::catalog::{ActionSignature, ParamKind};
use crate::error::{ActionError, ArgError};
use sheetrun_common::LocatorType;
use std::fmt;
use std::time::Duration;

/// One converted argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Duration(Duration),
    Locator(LocatorType),
}

impl ArgValue {
    /// Whether this value is what a parameter of `kind` holds
    pub fn fits(&self, kind: ParamKind) -> bool {
        matches!(
            (self, kind),
            (ArgValue::Text(_), ParamKind::Text)
                | (ArgValue::Integer(_), ParamKind::Integer)
                | (ArgValue::Boolean(_), ParamKind::Boolean)
                | (ArgValue::Duration(_), ParamKind::Millis | ParamKind::Seconds)
                | (ArgValue::Locator(_), ParamKind::Locator)
        )
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Text(s) => f.write_str(s),
            ArgValue::Integer(n) => write!(f, "{}", n),
            ArgValue::Boolean(b) => write!(f, "{}", b),
            ArgValue::Duration(d) => write!(f, "{}ms", d.as_millis()),
            ArgValue::Locator(l) => write!(f, "{}", l),
        }
    }
}

/// Converted arguments of one invocation, in parameter order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypedArgs {
    values: Vec<ArgValue>,
}

impl TypedArgs {
    pub fn new(values: Vec<ArgValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[ArgValue] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.values.get(index)
    }

    /// Whether every value fits the signature's parameter at its position
    pub fn matches(&self, signature: &ActionSignature) -> bool {
        self.values.len() == signature.arity()
            && self
                .values
                .iter()
                .zip(signature.kinds())
                .all(|(value, kind)| value.fits(kind))
    }

    pub fn text(&self, index: usize) -> Result<&str, ActionError> {
        match self.values.get(index) {
            Some(ArgValue::Text(s)) => Ok(s),
            other => Err(mismatch(index, "text", other)),
        }
    }

    pub fn integer(&self, index: usize) -> Result<i64, ActionError> {
        match self.values.get(index) {
            Some(ArgValue::Integer(n)) => Ok(*n),
            other => Err(mismatch(index, "integer", other)),
        }
    }

    pub fn boolean(&self, index: usize) -> Result<bool, ActionError> {
        match self.values.get(index) {
            Some(ArgValue::Boolean(b)) => Ok(*b),
            other => Err(mismatch(index, "boolean", other)),
        }
    }

    pub fn duration(&self, index: usize) -> Result<Duration, ActionError> {
        match self.values.get(index) {
            Some(ArgValue::Duration(d)) => Ok(*d),
            other => Err(mismatch(index, "duration", other)),
        }
    }

    pub fn locator(&self, index: usize) -> Result<LocatorType, ActionError> {
        match self.values.get(index) {
            Some(ArgValue::Locator(l)) => Ok(*l),
            other => Err(mismatch(index, "locator", other)),
        }
    }
}

fn mismatch(index: usize, wanted: &str, found: Option<&ArgValue>) -> ActionError {
    let reason = match found {
        Some(value) => format!("expected {}, found '{}'", wanted, value),
        None => format!("expected {}, found nothing", wanted),
    };
    ActionError::BadArgument { index, reason }
}

/// Convert raw argument cells against one signature
pub fn resolve_arguments<S: AsRef<str>>(
    signature: &ActionSignature,
    raw: &[S],
) -> Result<TypedArgs, ArgError> {
    if raw.len() != signature.arity() {
        return Err(ArgError::ArityMismatch {
            expected: signature.arity(),
            found: raw.len(),
        });
    }

    let values = raw
        .iter()
        .zip(signature.kinds())
        .enumerate()
        .map(|(index, (cell, kind))| {
            let cell = cell.as_ref();
            kind.convert(cell).map_err(|reason| ArgError::TypeConversion {
                index,
                expected: kind,
                raw: cell.to_string(),
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TypedArgs::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ActionFuture;
    use crate::context::ActionContext;

    fn noop<'a>(_ctx: &'a ActionContext, _args: &'a TypedArgs) -> ActionFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    fn wait_signature() -> ActionSignature {
        ActionSignature::new("waitToDisplay", noop)
            .param("locator", ParamKind::Locator)
            .param("pane", ParamKind::Text)
            .param("element", ParamKind::Text)
            .param("timeout", ParamKind::Seconds)
    }

    #[test]
    fn test_resolve_converts_each_cell() {
        let args = resolve_arguments(&wait_signature(), &["name", "Main", "Submit", "5"]).unwrap();
        assert_eq!(args.locator(0).unwrap(), LocatorType::Name);
        assert_eq!(args.text(2).unwrap(), "Submit");
        assert_eq!(args.duration(3).unwrap(), Duration::from_secs(5));
        assert!(args.matches(&wait_signature()));
    }

    #[test]
    fn test_arity_is_checked_before_types() {
        let err = resolve_arguments(&wait_signature(), &["bogus", "Main"]).unwrap_err();
        assert_eq!(err, ArgError::ArityMismatch { expected: 4, found: 2 });
    }

    #[test]
    fn test_first_bad_cell_is_reported() {
        let err =
            resolve_arguments(&wait_signature(), &["NAME", "Main", "Submit", "soon"]).unwrap_err();
        match err {
            ArgError::TypeConversion { index, expected, raw, .. } => {
                assert_eq!(index, 3);
                assert_eq!(expected, ParamKind::Seconds);
                assert_eq!(raw, "soon");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_typed_getters_reject_wrong_kind() {
        let args = TypedArgs::new(vec![ArgValue::Text("Ok".to_string())]);
        assert!(matches!(args.integer(0), Err(ActionError::BadArgument { index: 0, .. })));
        assert!(matches!(args.text(1), Err(ActionError::BadArgument { index: 1, .. })));
        assert!(!args.matches(&wait_signature()));
    }
}
