//! OpStudio CLI entry point

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use opstudio::cli::{
    app::{
        run_audio, run_chat, run_consent, run_datasets, run_features, run_governance, run_health,
        run_metrics, run_models, run_vision, AudioOptions, VisionOptions,
    },
    args::{Cli, Commands},
};
use opstudio::infrastructure::HttpApiGateway;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let gateway = HttpApiGateway::new(cli.api_url.clone());
    let timeout = Duration::from_secs(cli.timeout);

    match cli.command {
        Commands::Vision {
            captures,
            save,
            return_image,
        } => {
            let options = VisionOptions {
                captures,
                save,
                return_image,
                timeout,
            };
            run_vision(options, gateway).await
        }
        Commands::Audio { duration } => {
            let options = AudioOptions {
                duration: Duration::from_secs(duration),
                timeout,
            };
            run_audio(options, gateway).await
        }
        Commands::Chat { query, top_k } => run_chat(&query, top_k, gateway).await,
        Commands::Health => run_health(gateway).await,
        Commands::Metrics => run_metrics(gateway).await,
        Commands::Governance => run_governance(gateway).await,
        Commands::Features => run_features(gateway).await,
        Commands::Datasets => run_datasets(gateway).await,
        Commands::Models => run_models(gateway).await,
        Commands::Consent { action } => run_consent(action, gateway).await,
    }
}
