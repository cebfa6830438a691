use hybrid_recommender::{
    api::{create_router, AppState, RequestDefaults},
    config::Config,
    loaders::{self, load_dataset},
    services::DatasetSnapshot,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hybrid_recommender=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    // Build the first snapshot before accepting traffic
    let loader = loaders::from_config(&config).await?;
    let dataset = load_dataset(loader.as_ref()).await?;
    let floor = config.popularity_floor;
    let snapshot = tokio::task::spawn_blocking(move || {
        DatasetSnapshot::build(&dataset.ratings, dataset.catalog, floor)
    })
    .await??;

    let defaults = RequestDefaults {
        user: config.user_params(),
        item: config.item_params(),
        hybrid: config.hybrid_params(),
    };
    let state = AppState::new(snapshot, floor, loader, defaults);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
