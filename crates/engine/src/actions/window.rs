//! Windows, panes and applications

use crate::args::TypedArgs;
use crate::catalog::{ActionFn, ActionFuture, ActionProvider, ActionSignature, ParamKind, Registrar};
use crate::context::ActionContext;
use crate::driver::{WindowOp, WindowScope};
use tracing::debug;

pub const PROVIDER: ActionProvider = ActionProvider {
    name: "window",
    register,
};

fn register(r: &mut Registrar<'_>) {
    r.add(ActionSignature::new("launchApplication", launch).param("application", ParamKind::Text))
        .add(ActionSignature::new("closeApplication", close).param("application", ParamKind::Text))
        .add(ActionSignature::new("setRootSearch", set_root_search).param("enabled", ParamKind::Boolean))
        .add(ActionSignature::new("openURL", open_url).param("url", ParamKind::Text));

    let window_ops: [(&str, ActionFn); 6] = [
        ("maximizeWindow", maximize_window),
        ("maximizePane", maximize_pane),
        ("closeWindow", close_window),
        ("closePane", close_pane),
        ("focusWindow", focus_window),
        ("focusPane", focus_pane),
    ];
    for (name, body) in window_ops {
        r.add(ActionSignature::new(name, body).param("title", ParamKind::Text).retryable());
    }
}

/// Configured path for an application alias, or the argument itself
fn program<'a>(ctx: &'a ActionContext, application: &'a str) -> &'a str {
    match ctx.config().app_path(application) {
        Some(path) => {
            debug!("Application alias {} -> {}", application, path);
            path
        }
        None => application,
    }
}

fn launch<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().launch(program(ctx, args.text(0)?)).await?;
        Ok(())
    })
}

fn close<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver()
            .close_application(program(ctx, args.text(0)?))
            .await?;
        Ok(())
    })
}

fn set_root_search<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().set_root_search(args.boolean(0)?).await?;
        Ok(())
    })
}

fn open_url<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(async move {
        ctx.driver().open_url(args.text(0)?).await?;
        Ok(())
    })
}

async fn window_op(
    ctx: &ActionContext,
    args: &TypedArgs,
    op: WindowOp,
    scope: WindowScope,
) -> crate::error::ActionResult {
    ctx.driver()
        .window(op, scope, args.text(0)?, ctx.find_wait())
        .await?;
    Ok(())
}

fn maximize_window<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(window_op(ctx, args, WindowOp::Maximize, WindowScope::Window))
}

fn maximize_pane<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(window_op(ctx, args, WindowOp::Maximize, WindowScope::Pane))
}

fn close_window<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(window_op(ctx, args, WindowOp::Close, WindowScope::Window))
}

fn close_pane<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(window_op(ctx, args, WindowOp::Close, WindowScope::Pane))
}

fn focus_window<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(window_op(ctx, args, WindowOp::Focus, WindowScope::Window))
}

fn focus_pane<'a>(ctx: &'a ActionContext, args: &'a TypedArgs) -> ActionFuture<'a> {
    Box::pin(window_op(ctx, args, WindowOp::Focus, WindowScope::Pane))
}
