//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// OpStudio - operator console for an ML platform
#[derive(Parser, Debug)]
#[command(name = "opstudio")]
#[command(version)]
#[command(about = "Operator console for an ML platform: capture, inference, and platform panels")]
#[command(long_about = None)]
pub struct Cli {
    /// Backend base URL
    #[arg(
        long,
        global = true,
        value_name = "URL",
        env = "OPSTUDIO_API_URL",
        default_value = "http://localhost:8000"
    )]
    pub api_url: String,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture camera frames and run vision inference
    Vision {
        /// Number of frames to capture
        #[arg(short = 'n', long, value_name = "COUNT", default_value_t = 1)]
        captures: u32,

        /// Write the annotated frame to a PNG file
        #[arg(short, long, value_name = "FILE")]
        save: Option<PathBuf>,

        /// Ask the backend to return the annotated image
        #[arg(long)]
        return_image: bool,
    },
    /// Record from the microphone and transcribe
    Audio {
        /// Recording duration in seconds
        #[arg(short, long, value_name = "SECS", default_value_t = 5)]
        duration: u64,
    },
    /// Ask the retrieval-augmented chat endpoint
    Chat {
        /// Question to ask
        query: String,

        /// Number of sources to retrieve
        #[arg(long, value_name = "K", default_value_t = 5)]
        top_k: u32,
    },
    /// Show liveness, readiness, and version
    Health,
    /// Show the evaluation metrics summary
    Metrics,
    /// Show the governance risk score
    Governance,
    /// Show feature store state
    Features,
    /// List registered datasets
    Datasets,
    /// Show the loaded model descriptor
    Models,
    /// Show or change the privacy consent flag
    Consent {
        #[command(subcommand)]
        action: ConsentAction,
    },
}

/// Consent actions
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConsentAction {
    /// Show the current consent flag
    Show,
    /// Enable consent
    Enable,
    /// Disable consent
    Disable,
}
