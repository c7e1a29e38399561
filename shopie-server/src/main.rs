use shopie_server::{Config, Server, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Environment (dotenv, logging)
    setup_environment()?;

    print_banner();

    tracing::info!("Shopie server starting...");

    // 2. Configuration
    let config = Config::from_env();

    // 3. Server state (database, services, reconcile)
    let state = ServerState::initialize(&config)?;

    // 4. HTTP server (Server::run starts background tasks)
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
