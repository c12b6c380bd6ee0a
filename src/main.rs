use anyhow::Context;
use caption_video_bot::{bot, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    log::info!("Starting caption video bot...");

    let config = Config::from_env().context("reading configuration from environment")?;
    log::info!("Loaded {:?}", config);

    bot::run(config).await
}
