use std::process::ExitCode;

use log::*;
use market_server::{cli::handle_command_line_args, config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        return ExitCode::SUCCESS;
    }
    let config = ServerConfig::from_env_or_default();
    info!("🚀️ Starting marketplace server on {}:{}", config.host, config.port);
    match run_server(config).await {
        Ok(()) => {
            info!("🚀️ Server shut down");
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!("🚀️ Server stopped with an error. {e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        },
    }
}
