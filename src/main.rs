use std::process::ExitCode;

use therapy_portal::config::PortalConfig;

#[tokio::main]
async fn main() -> ExitCode {
    therapy_portal::init_tracing();

    let config = match PortalConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match therapy_portal::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Portal failed: {e}");
            ExitCode::FAILURE
        }
    }
}
