//! Built-in actions
//!
//! Each submodule is one provider: a `PROVIDER` constant whose `register`
//! function adds that module's signatures to the catalog.

pub mod element;
pub mod files;
pub mod keyboard;
pub mod session;
pub mod window;

use crate::args::TypedArgs;
use crate::catalog::{ActionProvider, ActionSignature, ParamKind};
use crate::driver::Target;
use crate::error::ActionError;

/// Providers that make up the built-in action surface
pub const BUILTIN_PROVIDERS: &[ActionProvider] = &[
    element::PROVIDER,
    keyboard::PROVIDER,
    window::PROVIDER,
    files::PROVIDER,
    session::PROVIDER,
];

/// Append the `(locator, pane, element)` triple most UI actions start with
pub(crate) fn element_params(signature: ActionSignature) -> ActionSignature {
    signature
        .param("locator", ParamKind::Locator)
        .param("pane", ParamKind::Text)
        .param("element", ParamKind::Text)
}

/// Read the `(locator, pane, element)` triple from the first three arguments
pub(crate) fn target(args: &TypedArgs) -> Result<Target, ActionError> {
    Ok(Target::new(args.locator(0)?, args.text(1)?, args.text(2)?))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ActionCatalog;

    #[test]
    fn test_builtin_catalog_builds() {
        let catalog = ActionCatalog::builtin().unwrap();
        for name in [
            "click",
            "write",
            "assertName",
            "waitToDisplay",
            "shortcut",
            "launchApplication",
            "deleteFile",
            "startCapture",
            "startTest",
            "exceptionRecoveryStop",
        ] {
            assert!(catalog.contains(name), "missing {}", name);
        }
        assert_eq!(catalog.overloads("shortcut").len(), 3);
        assert_eq!(catalog.overloads("waitToVanish").len(), 2);
    }

    #[test]
    fn test_builtin_overloads_differ_in_arity() {
        let catalog = ActionCatalog::builtin().unwrap();
        for name in catalog.names() {
            let overloads = catalog.overloads(name);
            let mut arities: Vec<usize> = overloads.iter().map(|s| s.arity()).collect();
            arities.sort_unstable();
            arities.dedup();
            assert_eq!(arities.len(), overloads.len(), "{} has overloads of equal arity", name);
        }
    }
}
