//! Actions Command

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use sheetrun_engine::{ActionCatalog, ActionSignature};

use super::{catalog, EXIT_OK};
use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ActionsArgs {
    /// Only list actions whose name contains this text (case-insensitive)
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActionDisplay {
    pub name: String,
    pub parameters: Vec<String>,
    pub provider: String,
    pub retryable: bool,
}

impl From<&ActionSignature> for ActionDisplay {
    fn from(signature: &ActionSignature) -> Self {
        Self {
            name: signature.name().to_string(),
            parameters: signature
                .params()
                .iter()
                .map(|p| format!("{}: {}", p.name, p.kind))
                .collect(),
            provider: signature.provider().to_string(),
            retryable: signature.is_retryable(),
        }
    }
}

impl TableDisplay for ActionDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Action", "Parameters", "Provider", "Retry"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.parameters.join(", "),
            self.provider.clone(),
            if self.retryable { "✓" } else { "" }.to_string(),
        ]
    }
}

pub fn list(catalog: &ActionCatalog, filter: Option<&str>) -> Vec<ActionDisplay> {
    let filter = filter.map(str::to_lowercase);
    catalog
        .signatures()
        .filter(|sig| match &filter {
            Some(text) => sig.name().to_lowercase().contains(text.as_str()),
            None => true,
        })
        .map(|sig| ActionDisplay::from(sig.as_ref()))
        .collect()
}

pub fn execute(args: ActionsArgs, format: OutputFormat) -> Result<i32> {
    let catalog = catalog()?;
    print_list(&list(&catalog, args.filter.as_deref()), format);
    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_lists_every_overload() {
        let catalog = ActionCatalog::builtin().unwrap();
        let shortcuts = list(&catalog, Some("SHORTCUT"));
        assert_eq!(shortcuts.len(), 3);
        assert!(shortcuts.iter().all(|a| a.provider == "keyboard"));

        let waits = list(&catalog, Some("waitToVanish"));
        assert_eq!(waits[0].parameters[0], "locator: locator");
    }
}
