// src/main.rs
#[tokio::main]
async fn main() {
    env_logger::init();

    match agentx_cli::cli::run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e.user_friendly_message());
            std::process::exit(e.exit_code());
        }
    }
}
