//! Capture session commands and runner directives

use crate::args::TypedArgs;
use crate::catalog::{ActionFuture, ActionProvider, ActionSignature, Directive, ParamKind, Registrar};
use crate::context::ActionContext;
use crate::driver::CaptureCommand;

pub const PROVIDER: ActionProvider = ActionProvider {
    name: "session",
    register,
};

fn register(r: &mut Registrar<'_>) {
    r.add(ActionSignature::new("startCapture", start_capture).param("name", ParamKind::Text))
        .add(ActionSignature::new("addNote", add_note))
        .add(ActionSignature::new("saveCapture", save_capture))
        .add(ActionSignature::new("cancelCapture", cancel_capture))
        .add(
            ActionSignature::new("startTest", directive_only)
                .param("name", ParamKind::Text)
                .directive(Directive::StartTestCase),
        )
        .add(ActionSignature::new("exceptionRecoveryStop", directive_only).directive(Directive::StopSheet));
}

fn start_capture<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        let command = CaptureCommand::Start {
            name: args.text(0)?.to_string(),
        };
        ctx.driver().capture(&command).await?;
        Ok(())
    })
}

fn add_note<'a>(ctx: &'a ActionContext, _args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().capture(&CaptureCommand::AddNote).await?;
        Ok(())
    })
}

fn save_capture<'a>(ctx: &'a ActionContext, _args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().capture(&CaptureCommand::Save).await?;
        Ok(())
    })
}

fn cancel_capture<'a>(ctx: &'a ActionContext, _args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().capture(&CaptureCommand::Cancel).await?;
        Ok(())
    })
}

/// The runner applies the effect; the action itself does nothing
fn directive_only<'a>(_ctx: &'a ActionContext, _args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async { Ok(()) })
}

#[cfg(test)]
mod tests {
    use crate::actions::testing::run_builtin;
    use crate::catalog::{ActionCatalog, Directive};
    use sheetrun_common::ProjectConfig;

    #[test]
    fn test_directives_are_declared() {
        let catalog = ActionCatalog::builtin().unwrap();
        assert_eq!(
            catalog.overloads("startTest")[0].directive_kind(),
            Some(Directive::StartTestCase)
        );
        assert_eq!(
            catalog.overloads("exceptionRecoveryStop")[0].directive_kind(),
            Some(Directive::StopSheet)
        );
    }

    #[tokio::test]
    async fn test_capture_commands_reach_driver() {
        let (result, driver) = run_builtin(ProjectConfig::default(), "startCapture", &["login"]).await;
        assert!(result.is_ok());
        assert_eq!(driver.calls(), vec![r#"capture Start { name: "login" }"#]);
    }
}
