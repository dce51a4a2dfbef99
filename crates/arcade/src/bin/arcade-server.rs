use arcade::prelude::*;

#[tokio::main]
async fn main() -> Result<(), ArcadeError> {
    arcade::logging::init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind,
        idle_secs = config.idle_timeout.as_secs(),
        sweep_secs = config.lobby.sweep_interval.as_secs(),
        "starting arcade server"
    );

    let server = ArcadeServerBuilder::from_config(config).build().await?;
    server.run().await
}
