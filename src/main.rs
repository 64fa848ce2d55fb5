#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gedtree::run_server().await
}
