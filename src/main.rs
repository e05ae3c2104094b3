#[tokio::main]
async fn main() -> anyhow::Result<()> {
    uifunnel_cli::cli::app::run().await
}
