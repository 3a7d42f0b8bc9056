use ytconvert::handlers::{convert_mkv, AppContext};
use ytconvert::prompt::ParameterPrompt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ctx = AppContext::from_env().await?;

    let Some(request) = ctx.ask(ParameterPrompt::None)? else {
        return Ok(());
    };

    if let Err(e) = convert_mkv(&ctx, &request).await {
        log::error!("Merge of {} failed: {:#}", request.url, e);
        return Err(e);
    }
    Ok(())
}
