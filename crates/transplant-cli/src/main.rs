//! Thin entrypoint for the `transplant` binary.

#[tokio::main]
async fn main() {
    let code = transplant_cli::run().await;
    std::process::exit(code);
}
