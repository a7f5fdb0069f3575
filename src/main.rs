#[tokio::main]
async fn main() {
    if let Err(e) = telecare_scheduling::run().await {
        eprintln!("telecare-scheduling: {e}");
        std::process::exit(1);
    }
}
