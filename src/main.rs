use tracing_subscriber::EnvFilter;

use taskflow::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("taskflow=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    taskflow::api::serve(config).await
}
