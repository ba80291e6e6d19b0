use queue_contract_cli::run_cli;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        let exit_code = e.exit_code();
        eprintln!("Error: {}", e);
        std::process::exit(exit_code);
    }
}
