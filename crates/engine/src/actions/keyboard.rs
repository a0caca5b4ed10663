//! Keyboard and mouse wheel actions

use crate::args::TypedArgs;
use crate::catalog::{ActionFuture, ActionProvider, ActionSignature, ParamKind, Registrar};
use crate::context::ActionContext;

pub const PROVIDER: ActionProvider = ActionProvider {
    name: "keyboard",
    register,
};

fn register(r: &mut Registrar<'_>) {
    r.add(ActionSignature::new("clear", clear))
        .add(ActionSignature::new("keyboardType", keyboard_type).param("text", ParamKind::Text))
        .add(ActionSignature::new("paste", paste).param("text", ParamKind::Text))
        .add(ActionSignature::new("shortcut", shortcut).param("key", ParamKind::Text))
        .add(
            ActionSignature::new("shortcut", shortcut)
                .param("modifier", ParamKind::Text)
                .param("key", ParamKind::Text),
        )
        .add(
            ActionSignature::new("shortcut", shortcut)
                .param("modifier", ParamKind::Text)
                .param("second", ParamKind::Text)
                .param("key", ParamKind::Text),
        )
        .add(ActionSignature::new("scrollUp", scroll_up).param("steps", ParamKind::Integer))
        .add(ActionSignature::new("scrollDown", scroll_down).param("steps", ParamKind::Integer));
}

fn clear<'a>(ctx: &'a ActionContext, _args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().clear().await?;
        Ok(())
    })
}

fn keyboard_type<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().type_text(args.text(0)?).await?;
        Ok(())
    })
}

fn paste<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().paste(args.text(0)?).await?;
        Ok(())
    })
}

/// Every overload presses all of its arguments together
fn shortcut<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        let keys = (0..args.len())
            .map(|i| args.text(i).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        let pressed = ctx.driver().press_keys(&keys).await;
        if pressed.is_err() {
            // leave no modifier stuck for the next row
            let _ = ctx.driver().release_all().await;
        }
        pressed?;
        Ok(())
    })
}

fn scroll_up<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().scroll(-args.integer(0)?.saturating_abs()).await?;
        Ok(())
    })
}

fn scroll_down<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().scroll(args.integer(0)?.saturating_abs()).await?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use crate::actions::testing::run_builtin;
    use sheetrun_common::ProjectConfig;

    #[tokio::test]
    async fn test_shortcut_presses_all_keys() {
        let (result, driver) =
            run_builtin(ProjectConfig::default(), "shortcut", &["ctrl", "shift", "s"]).await;
        assert!(result.is_ok());
        assert_eq!(driver.calls(), vec!["press ctrl+shift+s"]);
    }

    #[tokio::test]
    async fn test_scroll_direction() {
        let (_, driver) = run_builtin(ProjectConfig::default(), "scrollUp", &["3"]).await;
        assert_eq!(driver.calls(), vec!["scroll -3"]);
        let (_, driver) = run_builtin(ProjectConfig::default(), "scrollDown", &["-2"]).await;
        assert_eq!(driver.calls(), vec!["scroll 2"]);
    }

    #[tokio::test]
    async fn test_scroll_extremes_saturate() {
        let (_, driver) = run_builtin(ProjectConfig::default(), "scrollUp", &["-9223372036854775808"]).await;
        assert_eq!(driver.calls(), vec!["scroll -9223372036854775807"]);
        let (_, driver) = run_builtin(ProjectConfig::default(), "scrollDown", &["-9223372036854775808"]).await;
        assert_eq!(driver.calls(), vec!["scroll 9223372036854775807"]);
    }
}
