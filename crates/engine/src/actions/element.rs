//! Element actions, assertions and waits

use super::{element_params, target};
use crate::args::TypedArgs;
use crate::catalog::{ActionFn, ActionFuture, ActionProvider, ActionSignature, ParamKind, Registrar};
use crate::context::ActionContext;
use crate::driver::{ClickKind, WaitCondition};
use crate::error::{ActionError, ActionResult};
use std::time::Duration;

pub const PROVIDER: ActionProvider = ActionProvider {
    name: "element",
    register,
};

fn register(r: &mut Registrar<'_>) {
    r.add(element_params(ActionSignature::new("click", click)).retryable())
        .add(element_params(ActionSignature::new("clickCenter", click_center)).retryable())
        .add(element_params(ActionSignature::new("rightClick", right_click)).retryable())
        .add(element_params(ActionSignature::new("doubleClick", double_click)).retryable())
        .add(element_params(ActionSignature::new("hover", hover)).retryable())
        .add(
            element_params(ActionSignature::new("write", write))
                .param("text", ParamKind::Text)
                .retryable(),
        )
        .add(element_params(ActionSignature::new("check", check)).retryable())
        .add(element_params(ActionSignature::new("unCheck", uncheck)).retryable())
        .add(element_params(ActionSignature::new("drag", drag)).retryable())
        .add(element_params(ActionSignature::new("drop", drop_on)).retryable())
        .add(element_params(ActionSignature::new("assertExist", assert_exist)).retryable())
        .add(element_params(ActionSignature::new("assertNotExist", assert_not_exist)))
        .add(element_params(ActionSignature::new("assertEnabled", assert_enabled)).retryable())
        .add(element_params(ActionSignature::new("assertNotEnabled", assert_not_enabled)))
        .add(
            element_params(ActionSignature::new("assertName", assert_name))
                .param("expected", ParamKind::Text)
                .retryable(),
        );

    let waits: [(&str, ActionFn, ActionFn); 3] = [
        ("waitToDisplay", wait_to_display, wait_to_display_for),
        ("waitToVanish", wait_to_vanish, wait_to_vanish_for),
        ("waitToEnable", wait_to_enable, wait_to_enable_for),
    ];
    for (name, untimed, timed) in waits {
        r.add(element_params(ActionSignature::new(name, untimed)))
            .add(element_params(ActionSignature::new(name, timed)).param("timeout", ParamKind::Seconds));
    }

    r.add(ActionSignature::new("waitTime", wait_time).param("duration", ParamKind::Seconds));
}

async fn click_with(ctx: &ActionContext, args: &TypedArgs, kind: ClickKind) -> ActionResult {
    let target = target(args)?;
    ctx.driver().click(&target, kind, ctx.find_wait()).await?;
    Ok(())
}

fn click<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(click_with(ctx, args, ClickKind::Left))
}

fn click_center<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(click_with(ctx, args, ClickKind::Center))
}

fn right_click<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(click_with(ctx, args, ClickKind::Right))
}

fn double_click<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(click_with(ctx, args, ClickKind::Double))
}

fn hover<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().hover(&target(args)?, ctx.find_wait()).await?;
        Ok(())
    })
}

fn write<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver()
            .write(&target(args)?, args.text(3)?, ctx.find_wait())
            .await?;
        Ok(())
    })
}

fn check<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver()
            .set_checked(&target(args)?, true, ctx.find_wait())
            .await?;
        Ok(())
    })
}

fn uncheck<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver()
            .set_checked(&target(args)?, false, ctx.find_wait())
            .await?;
        Ok(())
    })
}

fn drag<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().drag(&target(args)?, ctx.find_wait()).await?;
        Ok(())
    })
}

fn drop_on<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().drop_on(&target(args)?, ctx.find_wait()).await?;
        Ok(())
    })
}

async fn expect_presence(ctx: &ActionContext, args: &TypedArgs, present: bool) -> ActionResult {
    let target = target(args)?;
    let found = ctx.driver().exists(&target, ctx.find_wait()).await?;
    if found != present {
        let verb = if present { "is missing" } else { "is present" };
        return Err(ActionError::Assertion(format!("{} {}", target, verb)));
    }
    Ok(())
}

fn assert_exist<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(expect_presence(ctx, args, true))
}

fn assert_not_exist<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(expect_presence(ctx, args, false))
}

async fn expect_enabled(ctx: &ActionContext, args: &TypedArgs, enabled: bool) -> ActionResult {
    let target = target(args)?;
    if ctx.driver().is_enabled(&target, ctx.find_wait()).await? != enabled {
        let state = if enabled { "disabled" } else { "enabled" };
        return Err(ActionError::Assertion(format!("{} is {}", target, state)));
    }
    Ok(())
}

fn assert_enabled<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(expect_enabled(ctx, args, true))
}

fn assert_not_enabled<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(expect_enabled(ctx, args, false))
}

fn assert_name<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        let target = target(args)?;
        let expected = args.text(3)?;
        let actual = ctx.driver().element_name(&target, ctx.find_wait()).await?;
        if actual != expected {
            return Err(ActionError::Assertion(format!(
                "{} is named '{}', expected '{}'",
                target, actual, expected
            )));
        }
        Ok(())
    })
}

async fn wait_until(
    ctx: &ActionContext,
    args: &TypedArgs,
    condition: WaitCondition,
    timeout: Duration,
) -> ActionResult {
    let target = target(args)?;
    if !ctx.driver().wait_for(&target, condition, timeout).await? {
        let state = match condition {
            WaitCondition::Displayed => "displayed",
            WaitCondition::Vanished => "gone",
            WaitCondition::Enabled => "enabled",
        };
        return Err(ActionError::Failed(format!(
            "{} not {} within {}s",
            target,
            state,
            timeout.as_secs()
        )));
    }
    Ok(())
}

fn wait_to_display<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(wait_until(ctx, args, WaitCondition::Displayed, ctx.max_wait()))
}

fn wait_to_display_for<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        wait_until(ctx, args, WaitCondition::Displayed, args.duration(3)?).await
    })
}

fn wait_to_vanish<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(wait_until(ctx, args, WaitCondition::Vanished, ctx.max_wait()))
}

fn wait_to_vanish_for<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move { wait_until(ctx, args, WaitCondition::Vanished, args.duration(3)?).await })
}

fn wait_to_enable<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(wait_until(ctx, args, WaitCondition::Enabled, ctx.max_wait()))
}

fn wait_to_enable_for<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move { wait_until(ctx, args, WaitCondition::Enabled, args.duration(3)?).await })
}

fn wait_time<'a>(_ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        tokio::time::sleep(args.duration(0)?).await;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use crate::actions::testing::run_builtin;
    use crate::error::ActionError;
    use sheetrun_common::ProjectConfig;

    #[tokio::test]
    async fn test_click_reaches_driver() {
        let (result, driver) =
            run_builtin(ProjectConfig::default(), "doubleClick", &["name", "Main", "Submit"]).await;
        assert!(result.is_ok());
        assert_eq!(driver.calls(), vec!["click Double NAME 'Submit' in 'Main'"]);
    }

    #[tokio::test]
    async fn test_assert_name_compares_text() {
        let (result, _) =
            run_builtin(ProjectConfig::default(), "assertName", &["ID", "Main", "title", "title"])
                .await;
        assert!(result.is_ok());

        let (result, _) =
            run_builtin(ProjectConfig::default(), "assertName", &["ID", "Main", "title", "Other"])
                .await;
        assert!(matches!(result, Err(ActionError::Assertion(_))));
    }

    #[tokio::test]
    async fn test_assert_not_exist_fails_when_present() {
        let (result, _) =
            run_builtin(ProjectConfig::default(), "assertNotExist", &["TEXT", "Main", "Error"])
                .await;
        assert!(matches!(result, Err(ActionError::Assertion(_))));
    }

    #[tokio::test]
    async fn test_timed_wait_uses_explicit_duration() {
        let (result, driver) = run_builtin(
            ProjectConfig::default(),
            "waitToVanish",
            &["NAME", "Main", "Spinner", "2"],
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(driver.calls(), vec!["wait_for Vanished NAME 'Spinner' in 'Main'"]);
    }
}
