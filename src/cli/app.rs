//! Command runners wiring the real adapters to the use cases

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::application::panels::Panels;
use crate::application::{
    AudioStudio, CaptureOutcome, PanelError, StopOutcome, VisionStudio,
};
use crate::domain::session::TranscriptStatus;
use crate::infrastructure::{
    render_annotated, CpalMicrophone, HttpApiGateway, NokhwaCamera,
};

use super::args::ConsentAction;
use super::presenter::Presenter;

/// Exit codes. Usage errors exit with clap's own code 2.
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;

/// Options for the vision runner
#[derive(Debug, Clone)]
pub struct VisionOptions {
    pub captures: u32,
    pub save: Option<PathBuf>,
    pub return_image: bool,
    pub timeout: Duration,
}

/// Options for the audio runner
#[derive(Debug, Clone)]
pub struct AudioOptions {
    pub duration: Duration,
    pub timeout: Duration,
}

/// Run the vision capture loop
pub async fn run_vision(options: VisionOptions, gateway: HttpApiGateway) -> ExitCode {
    let mut presenter = Presenter::new();
    let studio = VisionStudio::new(NokhwaCamera::new(0), Arc::new(gateway), options.timeout);

    if let Err(e) = studio.start().await {
        presenter.error(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }
    presenter.info("Camera acquired");

    for _ in 0..options.captures {
        presenter.start_spinner("Capturing...");
        match studio.capture(options.return_image).await {
            CaptureOutcome::Applied => {
                let report = studio.report().await;
                match report.headline() {
                    Some(headline) => {
                        presenter.spinner_success(&headline);
                        presenter.output(&headline);
                    }
                    None => presenter.spinner_success("No prediction in response"),
                }
                let boxes = report.overlay.boxes().len();
                if boxes > 0 {
                    presenter.info(&format!("{} face(s) detected", boxes));
                }
            }
            CaptureOutcome::NoData => {
                presenter.spinner_success("Empty response; previous result kept");
            }
            CaptureOutcome::Rejected => {
                presenter.spinner_fail("A capture is already in flight");
            }
            CaptureOutcome::Failed => {
                let report = studio.report().await;
                let reason = report
                    .last_error
                    .unwrap_or_else(|| "capture failed".to_string());
                presenter.spinner_fail(&reason);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    }

    if let Some(path) = &options.save {
        let report = studio.report().await;
        let png = match (&report.annotated_png, &report.last_frame_png) {
            (Some(annotated), _) => Some(annotated.clone()),
            (None, Some(frame)) => match render_annotated(frame, &report.overlay) {
                Ok(png) => Some(png),
                Err(e) => {
                    presenter.error(&e.to_string());
                    None
                }
            },
            (None, None) => {
                presenter.warn("No frame captured; nothing to save");
                None
            }
        };
        match png {
            Some(png) => match std::fs::write(path, png) {
                Ok(()) => presenter.success(&format!("Saved {}", path.display())),
                Err(e) => {
                    presenter.error(&format!("Failed to write {}: {}", path.display(), e));
                    let _ = studio.stop().await;
                    return ExitCode::from(EXIT_ERROR);
                }
            },
            None => {
                let _ = studio.stop().await;
                return ExitCode::from(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = studio.stop().await {
        presenter.error(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Run one timed recording and transcribe it
pub async fn run_audio(options: AudioOptions, gateway: HttpApiGateway) -> ExitCode {
    let mut presenter = Presenter::new();
    let studio = AudioStudio::new(CpalMicrophone::new(), Arc::new(gateway), options.timeout);

    if let Err(e) = studio.start().await {
        presenter.error(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }

    let total_ms = options.duration.as_millis() as u64;
    presenter.start_spinner("Recording...");
    let started = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        ticker.tick().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if elapsed_ms >= total_ms {
            break;
        }
        let progress = presenter.format_progress(elapsed_ms, total_ms);
        presenter.update_spinner(&format!("Recording... {}", progress));
    }

    presenter.update_spinner("Transcribing...");
    match studio.stop().await {
        Ok(StopOutcome::Submitted) => {}
        Ok(StopOutcome::DroppedBusy) => {
            presenter.spinner_fail("A transcription is already in flight; clip dropped");
            return ExitCode::from(EXIT_ERROR);
        }
        Err(e) => {
            presenter.spinner_fail(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    }

    // The request runs on its own task; wait for it to settle.
    let deadline = Instant::now() + options.timeout + Duration::from_secs(5);
    let report = loop {
        let report = studio.report().await;
        if !report.transcript.is_pending() {
            break report;
        }
        if Instant::now() >= deadline {
            presenter.spinner_fail("Transcription did not settle in time");
            return ExitCode::from(EXIT_ERROR);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    if let Some(reason) = &report.last_error {
        presenter.spinner_fail(reason);
        return ExitCode::from(EXIT_ERROR);
    }

    match report.transcript {
        TranscriptStatus::NoSpeech => {
            presenter.spinner_success("No speech detected");
            if let Some(text) = &report.text {
                presenter.output(text);
            }
        }
        _ => {
            presenter.spinner_success("Transcription complete");
            match &report.text {
                Some(text) => presenter.output(text),
                None => presenter.warn("No transcript available"),
            }
        }
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Ask the chat endpoint and print the answer with its sources
pub async fn run_chat(query: &str, top_k: u32, gateway: HttpApiGateway) -> ExitCode {
    let presenter = Presenter::new();
    let panels = Panels::new(Arc::new(gateway));

    match panels.ask(query, top_k).await {
        Ok(answer) => {
            match &answer.answer {
                Some(Value::String(text)) => presenter.output(text),
                Some(value) => presenter.json(value),
                None => presenter.warn("No answer in response"),
            }
            if !answer.citations.is_empty() {
                presenter.info("Sources:");
                for citation in &answer.citations {
                    let title = citation.title.as_deref().unwrap_or("untitled");
                    let score = citation
                        .score
                        .map(|s| format!("{:.3}", s))
                        .unwrap_or_else(|| "?".to_string());
                    presenter.key_value(title, &format!("score {}", score));
                }
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => fail(&presenter, e),
    }
}

/// Show the health probes
pub async fn run_health(gateway: HttpApiGateway) -> ExitCode {
    let presenter = Presenter::new();
    let panels = Panels::new(Arc::new(gateway));

    match panels.health().await {
        Ok(report) => {
            presenter.key_value("live", &raw(&report.live));
            presenter.key_value("ready", &raw(&report.ready));
            presenter.key_value("version", &raw(&report.version));
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => fail(&presenter, e),
    }
}

/// Show the metrics summary
pub async fn run_metrics(gateway: HttpApiGateway) -> ExitCode {
    let presenter = Presenter::new();
    let panels = Panels::new(Arc::new(gateway));

    match panels.metrics().await {
        Ok(summary) => {
            presenter.key_value("f1", &number(summary.f1));
            presenter.key_value("latency_ms", &number(summary.latency_ms));
            presenter.key_value("model_size_mb", &number(summary.model_size_mb));
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => fail(&presenter, e),
    }
}

/// Show the governance risk score
pub async fn run_governance(gateway: HttpApiGateway) -> ExitCode {
    let presenter = Presenter::new();
    let panels = Panels::new(Arc::new(gateway));

    match panels.governance().await {
        Ok(risk) => {
            let score = risk.risk_score.unwrap_or(0.0);
            presenter.key_value("risk_score", &format!("{}/100", score));
            let components = risk.components.unwrap_or_default();
            presenter.key_value(
                "leakage_issues",
                &components.leakage_issues.unwrap_or(0).to_string(),
            );
            presenter.key_value(
                "data_issues",
                &components.data_issues.unwrap_or(0).to_string(),
            );
            presenter.key_value(
                "bad_images",
                &components.bad_images.unwrap_or(0).to_string(),
            );
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => fail(&presenter, e),
    }
}

/// Show feature store state
pub async fn run_features(gateway: HttpApiGateway) -> ExitCode {
    let presenter = Presenter::new();
    let panels = Panels::new(Arc::new(gateway));

    match panels.features().await {
        Ok(info) => {
            presenter.key_value("active_version", info.active_version.as_deref().unwrap_or("-"));
            let latest = info.latest.unwrap_or_default();
            presenter.key_value("latest.date", latest.date.as_deref().unwrap_or("-"));
            presenter.key_value("latest.size_mb", &number(latest.size_mb));
            presenter.key_value(
                "latest.rows",
                &latest
                    .rows
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => fail(&presenter, e),
    }
}

/// List registered datasets
pub async fn run_datasets(gateway: HttpApiGateway) -> ExitCode {
    let presenter = Presenter::new();
    let panels = Panels::new(Arc::new(gateway));

    match panels.datasets().await {
        Ok(datasets) => {
            if datasets.is_empty() {
                presenter.info("No datasets registered yet");
                return ExitCode::from(EXIT_SUCCESS);
            }
            for dataset in &datasets {
                let name = dataset.name.as_deref().unwrap_or("unnamed");
                let detail = format!(
                    "{} / {} / {}",
                    dataset.config_file.as_deref().unwrap_or("-"),
                    dataset.kind.as_deref().unwrap_or("-"),
                    dataset.task.as_deref().unwrap_or("-"),
                );
                presenter.key_value(name, &detail);
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => fail(&presenter, e),
    }
}

/// Show the loaded model descriptor
pub async fn run_models(gateway: HttpApiGateway) -> ExitCode {
    let presenter = Presenter::new();
    let panels = Panels::new(Arc::new(gateway));

    match panels.models().await {
        Ok(Some(value)) => {
            presenter.json(&value);
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(None) => {
            presenter.warn("No model information available");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => fail(&presenter, e),
    }
}

/// Show or change the privacy consent flag
pub async fn run_consent(action: ConsentAction, gateway: HttpApiGateway) -> ExitCode {
    let presenter = Presenter::new();
    let panels = Panels::new(Arc::new(gateway));

    match action {
        ConsentAction::Show => match panels.consent().await {
            Ok(state) => {
                let enabled = state.enabled.unwrap_or(false);
                presenter.output(if enabled { "ON" } else { "OFF" });
                ExitCode::from(EXIT_SUCCESS)
            }
            Err(e) => fail(&presenter, e),
        },
        ConsentAction::Enable | ConsentAction::Disable => {
            let enabled = matches!(action, ConsentAction::Enable);
            match panels.set_consent(enabled).await {
                Ok(true) => {
                    presenter.success(&format!(
                        "Consent {}",
                        if enabled { "enabled" } else { "disabled" }
                    ));
                    ExitCode::from(EXIT_SUCCESS)
                }
                Ok(false) => {
                    presenter.error("Backend did not acknowledge the change");
                    ExitCode::from(EXIT_ERROR)
                }
                Err(e) => fail(&presenter, e),
            }
        }
    }
}

fn fail(presenter: &Presenter, e: PanelError) -> ExitCode {
    presenter.error(&e.to_string());
    ExitCode::from(EXIT_ERROR)
}

fn raw(value: &Option<Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "-".to_string(),
    }
}

fn number(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.3}", value),
        None => "n/a".to_string(),
    }
}
