#[tokio::main]
async fn main() -> anyhow::Result<()> {
    raid_server::run().await
}
