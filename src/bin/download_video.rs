use ytconvert::handlers::{download_video, AppContext};
use ytconvert::prompt::ParameterPrompt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ctx = AppContext::from_env().await?;

    let Some(request) = ctx.ask(ParameterPrompt::Container)? else {
        return Ok(());
    };

    if let Err(e) = download_video(&ctx, &request).await {
        log::error!("Download of {} failed: {:#}", request.url, e);
        return Err(e);
    }
    Ok(())
}
