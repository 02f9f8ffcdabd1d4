use stampede::server::{GameServer, config::ServerConfig, error::ServerError};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    stampede::logger::init_from_env();

    let config = ServerConfig::from_env();
    let server = GameServer::new(config);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutting down");
        }
    }

    Ok(())
}
