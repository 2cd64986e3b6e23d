//! Binary entrypoint for the `tavola` CLI.

#[tokio::main]
async fn main() {
    let exit_code = tavola_cli::run().await;
    std::process::exit(exit_code);
}
