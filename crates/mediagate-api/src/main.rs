use mediagate_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    mediagate_api::telemetry::init_telemetry()?;

    let (_state, router) = mediagate_api::setup::initialize_app(config.clone()).await?;

    mediagate_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
