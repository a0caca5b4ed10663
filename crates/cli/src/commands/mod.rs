//! CLI Commands

pub mod actions;
pub mod history;
pub mod run;
pub mod setup;
pub mod validate;

use anyhow::{bail, Context, Result};
use sheetrun_common::ProjectConfig;
use sheetrun_engine::{ActionCatalog, SheetSelector};
use std::path::Path;
use std::sync::Arc;

/// Every selected sheet validated, whatever the row outcomes
pub const EXIT_OK: i32 = 0;
/// At least one sheet failed validation
pub const EXIT_VALIDATION_FAILED: i32 = 1;
/// The command could not run at all
pub const EXIT_FATAL: i32 = 2;

/// Load the project configuration; a relative project root is taken relative
/// to the folder holding the configuration file
pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    let mut config = ProjectConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    anchor_root(&mut config, path);
    Ok(config)
}

fn anchor_root(config: &mut ProjectConfig, config_path: &Path) {
    if config.paths.root.is_absolute() {
        return;
    }
    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        config.paths.root = parent.join(&config.paths.root);
    }
}

/// Parse selectors; with none given, every configured workbook is selected
pub fn selectors(args: &[String], config: &ProjectConfig) -> Result<Vec<SheetSelector>> {
    let selectors = if args.is_empty() {
        config
            .workbook_paths()
            .into_iter()
            .map(SheetSelector::all)
            .collect::<Vec<_>>()
    } else {
        args.iter()
            .map(|arg| arg.parse::<SheetSelector>())
            .collect::<Result<Vec<_>, _>>()?
    };

    if selectors.is_empty() {
        bail!("no workbooks selected: pass a selector or list workbooks under [paths] in the configuration");
    }
    Ok(selectors)
}

pub fn catalog() -> Result<Arc<ActionCatalog>> {
    Ok(Arc::new(ActionCatalog::builtin()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_root_follows_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheetrun.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.paths.root, dir.path().join("."));
    }

    #[test]
    fn test_selectors_fall_back_to_configured_workbooks() {
        let mut config = ProjectConfig::default();
        config.paths.root = PathBuf::from("/srv/tests");
        config.paths.workbooks = vec![PathBuf::from("workbooks/login.yaml")];

        let picked = selectors(&[], &config).unwrap();
        assert_eq!(picked, vec![SheetSelector::all("/srv/tests/workbooks/login.yaml")]);

        let picked = selectors(&["suite.yaml:Login,Logout".to_string()], &config).unwrap();
        assert_eq!(
            picked[0].sheets,
            Some(vec!["Login".to_string(), "Logout".to_string()])
        );
    }

    #[test]
    fn test_no_selectors_and_no_workbooks_is_an_error() {
        assert!(selectors(&[], &ProjectConfig::default()).is_err());
    }
}
