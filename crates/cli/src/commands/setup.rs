//! Project setup

use anyhow::{Context, Result};
use clap::Args;
use sheetrun_common::ProjectConfig;
use sheetrun_engine::workbook::{Row, Sheet};
use sheetrun_engine::Workbook;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{anchor_root, EXIT_OK};
use crate::output::{print_info, print_success};

const EXAMPLE_WORKBOOK: &str = "workbooks/example.yaml";

#[derive(Args)]
pub struct SetupArgs {
    /// Overwrite an existing configuration file with the defaults
    #[arg(long)]
    pub force: bool,
}

/// Configuration written by a fresh setup
pub fn default_config() -> ProjectConfig {
    let mut config = ProjectConfig::default();
    config.paths.workbooks = vec![PathBuf::from(EXAMPLE_WORKBOOK)];
    config
        .apps
        .insert("notepad".to_string(), "notepad.exe".to_string());
    config
}

fn example_workbook(path: &Path) -> Workbook {
    let rows = vec![
        Row::new(["Action", "Locator", "Pane", "Element", "Value"]),
        Row::new(["startTest", "Notepad smoke"]),
        Row::new(["launchApplication", "notepad"]),
        Row::new(["waitToDisplay", "NAME", "Untitled - Notepad", "Text Editor"]),
        Row::new(["write", "NAME", "Untitled - Notepad", "Text Editor", "hello from sheetrun"]),
        Row::new(["closeApplication", "notepad"]),
    ];
    Workbook::new(path, vec![Sheet::new("Smoke", rows)])
}

pub fn execute(args: SetupArgs, config_path: &Path) -> Result<i32> {
    let fresh = args.force || !config_path.exists();
    let mut config = if fresh {
        let config = default_config();
        config
            .save(config_path)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        print_success(&format!("Wrote {}", config_path.display()));
        config
    } else {
        print_info(&format!("Keeping existing {}", config_path.display()));
        ProjectConfig::load(config_path)?
    };
    anchor_root(&mut config, config_path);

    for folder in config.project_folders() {
        if folder.is_dir() {
            debug!("Folder {} already exists", folder.display());
            continue;
        }
        std::fs::create_dir_all(&folder)
            .with_context(|| format!("failed to create {}", folder.display()))?;
        print_info(&format!("Created {}", folder.display()));
    }

    if fresh {
        let example = config.resolve(Path::new(EXAMPLE_WORKBOOK));
        if !example.exists() {
            example_workbook(&example).save()?;
            print_success(&format!("Wrote example workbook {}", example.display()));
        }
    }

    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetrun_engine::validate::validate_sheet;
    use sheetrun_engine::ActionCatalog;

    #[test]
    fn test_setup_creates_project_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("sheetrun.toml");

        execute(SetupArgs { force: false }, &config_path).unwrap();

        assert!(config_path.exists());
        for folder in ["workbooks", "reports", "screenshots", "images", "logs"] {
            assert!(dir.path().join(folder).is_dir(), "missing {}", folder);
        }
        assert!(dir.path().join(EXAMPLE_WORKBOOK).exists());

        // Running again keeps the existing configuration
        std::fs::write(&config_path, "[retry]\nmax_attempts = 4\n").unwrap();
        execute(SetupArgs { force: false }, &config_path).unwrap();
        assert_eq!(ProjectConfig::load(&config_path).unwrap().retry.max_attempts, 4);
    }

    #[test]
    fn test_example_workbook_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.yaml");
        let workbook = example_workbook(&path);
        let catalog = ActionCatalog::builtin().unwrap();

        let rows = workbook.rows("Smoke").unwrap();
        let validation = validate_sheet(&catalog, &workbook.sheet_id("Smoke"), &rows);
        assert!(validation.is_valid(), "{:?}", validation.issues);
        assert_eq!(validation.planned.len(), 5);
    }
}
