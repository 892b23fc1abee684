use anyhow::Result;
use tally_server::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
