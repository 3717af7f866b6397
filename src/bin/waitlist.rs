#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use anyhow::Context as _;
    use oor3d::waitlist::{
        Waitlist,
        api::{WaitlistState, cors_layer, waitlist_routes},
        config::ServerConfig,
        store::{JsonFileStore, MemoryStore, SignupStore},
    };

    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let config = ServerConfig::from_env()?;
    let store: Arc<dyn SignupStore> = match &config.data_file {
        Some(path) => Arc::new(JsonFileStore::open(path).await?),
        None => {
            log::warn!("OOR3D_DATA_FILE not set, signups are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    if config.admin_token.is_none() {
        log::warn!("OOR3D_ADMIN_TOKEN not set, admin routes are open");
    }

    let state = WaitlistState::new(Waitlist::new(store), &config);
    let app = waitlist_routes(state).layer(cors_layer(&config));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    log::info!("Waitlist API listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    log::info!("Waitlist API stopped");
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {}
