#[tokio::main]
async fn main() {
    if let Err(e) = alris_relay_lib::run().await {
        tracing::error!("Relay failed: {:#}", e);
        eprintln!("alris-relay: {:#}", e);
        std::process::exit(1);
    }
}
