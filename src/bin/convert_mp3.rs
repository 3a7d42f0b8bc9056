use ytconvert::handlers::{convert_mp3, AppContext};
use ytconvert::prompt::ParameterPrompt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ctx = AppContext::from_env().await?;

    let Some(request) = ctx.ask(ParameterPrompt::Bitrate)? else {
        return Ok(());
    };

    if let Err(e) = convert_mp3(&ctx, &request).await {
        log::error!("mp3 conversion of {} failed: {:#}", request.url, e);
        return Err(e);
    }
    Ok(())
}
