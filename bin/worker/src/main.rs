use eyre::Report;

#[tokio::main]
async fn main() -> Result<(), Report> {
    payrail_worker::run().await
}
