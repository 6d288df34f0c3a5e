use coastal_web::WebConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("coastal_web=info,coastal_core=info,tower_http=info")),
        )
        .init();

    let config = WebConfig::load()?;
    coastal_web::serve(config).await
}
