//! File system checks, relative to the configured repository folder

use crate::args::TypedArgs;
use crate::catalog::{ActionFuture, ActionProvider, ActionSignature, ParamKind, Registrar};
use crate::context::ActionContext;
use crate::error::{ActionError, ActionResult};
use std::path::{Path, PathBuf};
use tracing::info;

pub const PROVIDER: ActionProvider = ActionProvider {
    name: "files",
    register,
};

fn register(r: &mut Registrar<'_>) {
    r.add(ActionSignature::new("deleteFile", delete_file).param("path", ParamKind::Text))
        .add(
            ActionSignature::new("deleteFile", delete_file_in)
                .param("folder", ParamKind::Text)
                .param("file", ParamKind::Text),
        )
        .add(ActionSignature::new("assertFileExists", assert_file_exists).param("path", ParamKind::Text))
        .add(
            ActionSignature::new("assertTextInFile", assert_text_in_file)
                .param("path", ParamKind::Text)
                .param("text", ParamKind::Text),
        )
        .add(
            ActionSignature::new("assertTextNotInFile", assert_text_not_in_file)
                .param("path", ParamKind::Text)
                .param("text", ParamKind::Text),
        );
}

fn resolve(ctx: &ActionContext, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        ctx.repo_path().join(path)
    }
}

async fn remove(path: PathBuf) -> ActionResult {
    if !tokio::fs::try_exists(&path).await? {
        return Err(ActionError::Failed(format!("{} does not exist", path.display())));
    }
    tokio::fs::remove_file(&path).await?;
    info!("Deleted {}", path.display());
    Ok(())
}

fn delete_file<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move { remove(resolve(ctx, args.text(0)?)).await })
}

fn delete_file_in<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move { remove(resolve(ctx, args.text(0)?).join(args.text(1)?)).await })
}

fn assert_file_exists<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        let path = resolve(ctx, args.text(0)?);
        if !tokio::fs::try_exists(&path).await? {
            return Err(ActionError::Assertion(format!("{} does not exist", path.display())));
        }
        Ok(())
    })
}

async fn file_contains(ctx: &ActionContext, args: &TypedArgs) -> Result<bool, ActionError> {
    let path = resolve(ctx, args.text(0)?);
    let content = tokio::fs::read_to_string(&path).await?;
    Ok(content.contains(args.text(1)?))
}

fn assert_text_in_file<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        if !file_contains(ctx, args).await? {
            return Err(ActionError::Assertion(format!(
                "'{}' not found in {}",
                args.text(1)?,
                args.text(0)?
            )));
        }
        Ok(())
    })
}

fn assert_text_not_in_file<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        if file_contains(ctx, args).await? {
            return Err(ActionError::Assertion(format!(
                "'{}' unexpectedly found in {}",
                args.text(1)?,
                args.text(0)?
            )));
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use crate::actions::testing::run_builtin;
    use crate::error::ActionError;
    use sheetrun_common::ProjectConfig;

    fn config_in(dir: &std::path::Path) -> ProjectConfig {
        let mut config = ProjectConfig::default();
        config.paths.repo_path = Some(dir.to_path_buf());
        config
    }

    #[tokio::test]
    async fn test_delete_file_in_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        std::fs::write(dir.path().join("out").join("export.csv"), "a,b").unwrap();

        let (result, _) =
            run_builtin(config_in(dir.path()), "deleteFile", &["out", "export.csv"]).await;
        assert!(result.is_ok());
        assert!(!dir.path().join("out").join("export.csv").exists());

        let (result, _) = run_builtin(config_in(dir.path()), "deleteFile", &["out/export.csv"]).await;
        assert!(matches!(result, Err(ActionError::Failed(_))));
    }

    #[tokio::test]
    async fn test_text_assertions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.log"), "started\nready\n").unwrap();

        let (result, _) =
            run_builtin(config_in(dir.path()), "assertTextInFile", &["app.log", "ready"]).await;
        assert!(result.is_ok());

        let (result, _) =
            run_builtin(config_in(dir.path()), "assertTextNotInFile", &["app.log", "ready"]).await;
        assert!(matches!(result, Err(ActionError::Assertion(_))));

        let (result, _) =
            run_builtin(config_in(dir.path()), "assertFileExists", &["missing.log"]).await;
        assert!(matches!(result, Err(ActionError::Assertion(_))));
    }
}
