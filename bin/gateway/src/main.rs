use eyre::Report;

#[tokio::main]
async fn main() -> Result<(), Report> {
    payrail_gateway::run().await
}
