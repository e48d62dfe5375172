use tubely_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration; fails fast on missing or invalid settings
    let config = Config::from_env()?;

    // Initialize the application (telemetry, database, storage, routes)
    let (_state, router) = tubely_api::setup::initialize_app(config.clone()).await?;

    tubely_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
