//! Read-and-render fetchers for the platform's informational panels
//!
//! Every DTO field is optional: a panel renders placeholders for whatever
//! the backend leaves out, and a malformed body decodes to the empty shape
//! rather than an error. Only a transport failure is an error here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::ports::{ApiGateway, ApiResponse};

/// A panel request that could not complete at the transport level
#[derive(Debug, Clone, Error)]
#[error("Request failed: {0}")]
pub struct PanelError(pub String);

/// One retrieved source backing a chat answer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Citation {
    pub rank: Option<u64>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub score: Option<f64>,
}

/// Answer from the retrieval-augmented chat endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatAnswer {
    pub answer: Option<Value>,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// Combined liveness, readiness, and version probes
#[derive(Debug, Clone, Default)]
pub struct HealthReport {
    pub live: Option<Value>,
    pub ready: Option<Value>,
    pub version: Option<Value>,
}

/// Headline evaluation numbers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSummary {
    pub f1: Option<f64>,
    pub latency_ms: Option<f64>,
    pub model_size_mb: Option<f64>,
}

/// Per-category issue counts behind the governance score
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RiskComponents {
    pub leakage_issues: Option<u64>,
    pub data_issues: Option<u64>,
    pub bad_images: Option<u64>,
}

/// Governance risk score on a 0 to 100 scale
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GovernanceRisk {
    pub risk_score: Option<f64>,
    pub components: Option<RiskComponents>,
}

/// Most recent materialized feature snapshot
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureSnapshot {
    pub date: Option<String>,
    pub size_mb: Option<f64>,
    pub rows: Option<u64>,
}

/// Feature store state
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureStoreInfo {
    pub active_version: Option<String>,
    pub latest: Option<FeatureSnapshot>,
}

/// One registered dataset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetEntry {
    pub name: Option<String>,
    pub config_file: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub task: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DatasetList {
    #[serde(default)]
    datasets: Vec<DatasetEntry>,
}

/// Current privacy consent flag
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConsentState {
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConsentAck {
    status: Option<String>,
}

/// Panel fetchers over the shared gateway
pub struct Panels<G: ApiGateway> {
    gateway: Arc<G>,
}

impl<G: ApiGateway> Panels<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    fn decode_or_default<T>(&self, response: ApiResponse) -> Result<T, PanelError>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match response {
            ApiResponse::TransportFailed(reason) => Err(PanelError(reason)),
            other => Ok(other.decode().unwrap_or_default()),
        }
    }

    /// Ask the retrieval-augmented chat endpoint
    pub async fn ask(&self, query: &str, top_k: u32) -> Result<ChatAnswer, PanelError> {
        let body = json!({ "query": query, "top_k": top_k });
        let response = self.gateway.submit_json("/chat/ask", &body).await;
        self.decode_or_default(response)
    }

    /// Probe liveness, readiness, and version
    pub async fn health(&self) -> Result<HealthReport, PanelError> {
        let mut report = HealthReport::default();
        report.live = self.fetch_raw("/health/live").await?;
        report.ready = self.fetch_raw("/health/ready").await?;
        report.version = self.fetch_raw("/health/version").await?;
        Ok(report)
    }

    /// Fetch the evaluation metrics summary
    pub async fn metrics(&self) -> Result<MetricsSummary, PanelError> {
        let response = self.gateway.fetch_json("/metrics/summary").await;
        self.decode_or_default(response)
    }

    /// Fetch the governance risk score
    pub async fn governance(&self) -> Result<GovernanceRisk, PanelError> {
        let response = self.gateway.fetch_json("/governance/risk_score").await;
        self.decode_or_default(response)
    }

    /// Fetch feature store state
    pub async fn features(&self) -> Result<FeatureStoreInfo, PanelError> {
        let response = self.gateway.fetch_json("/features/info").await;
        self.decode_or_default(response)
    }

    /// Fetch the registered dataset table
    pub async fn datasets(&self) -> Result<Vec<DatasetEntry>, PanelError> {
        let response = self.gateway.fetch_json("/features/datasets").await;
        let list: DatasetList = self.decode_or_default(response)?;
        Ok(list.datasets)
    }

    /// Fetch the loaded model descriptor as loose JSON
    pub async fn models(&self) -> Result<Option<Value>, PanelError> {
        self.fetch_raw("/models/info").await
    }

    /// Fetch the current privacy consent flag
    pub async fn consent(&self) -> Result<ConsentState, PanelError> {
        let response = self.gateway.fetch_json("/privacy/consent").await;
        self.decode_or_default(response)
    }

    /// Set the privacy consent flag. Returns whether the backend
    /// acknowledged the change.
    pub async fn set_consent(&self, enabled: bool) -> Result<bool, PanelError> {
        let body = json!({ "enabled": enabled });
        let response = self.gateway.submit_json("/privacy/consent", &body).await;
        let ack: ConsentAck = self.decode_or_default(response)?;
        Ok(ack.status.as_deref() == Some("ok"))
    }

    async fn fetch_raw(&self, path: &str) -> Result<Option<Value>, PanelError> {
        match self.gateway.fetch_json(path).await {
            ApiResponse::Ok(value) => Ok(Some(value)),
            ApiResponse::Empty => Ok(None),
            ApiResponse::TransportFailed(reason) => Err(PanelError(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MultipartForm;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex as StdMutex;

    /// Maps request paths to scripted responses
    struct RoutedGateway {
        routes: StdMutex<HashMap<String, VecDeque<ApiResponse>>>,
        bodies: StdMutex<Vec<(String, Value)>>,
    }

    impl RoutedGateway {
        fn new(routes: Vec<(&str, ApiResponse)>) -> Arc<Self> {
            let mut map: HashMap<String, VecDeque<ApiResponse>> = HashMap::new();
            for (path, response) in routes {
                map.entry(path.to_string()).or_default().push_back(response);
            }
            Arc::new(Self {
                routes: StdMutex::new(map),
                bodies: StdMutex::new(Vec::new()),
            })
        }

        fn respond(&self, path: &str) -> ApiResponse {
            self.routes
                .lock()
                .unwrap()
                .get_mut(path)
                .and_then(VecDeque::pop_front)
                .unwrap_or(ApiResponse::Empty)
        }
    }

    #[async_trait]
    impl ApiGateway for RoutedGateway {
        async fn submit_json(&self, path: &str, body: &Value) -> ApiResponse {
            self.bodies
                .lock()
                .unwrap()
                .push((path.to_string(), body.clone()));
            self.respond(path)
        }

        async fn submit_multipart(&self, path: &str, _form: MultipartForm) -> ApiResponse {
            self.respond(path)
        }

        async fn fetch_json(&self, path: &str) -> ApiResponse {
            self.respond(path)
        }
    }

    #[tokio::test]
    async fn chat_ask_sends_query_and_decodes_citations() {
        let gateway = RoutedGateway::new(vec![(
            "/chat/ask",
            ApiResponse::Ok(json!({
                "answer": "deploy with the release pipeline",
                "citations": [
                    {"rank": 1, "title": "Runbook", "score": 0.91},
                    {"rank": 2, "title": "CI notes", "score": 0.42, "url": "http://wiki/ci"}
                ]
            })),
        )]);
        let panels = Panels::new(Arc::clone(&gateway));

        let answer = panels.ask("how do we deploy", 5).await.unwrap();
        assert_eq!(
            answer.answer,
            Some(json!("deploy with the release pipeline"))
        );
        assert_eq!(answer.citations.len(), 2);
        assert_eq!(answer.citations[0].title.as_deref(), Some("Runbook"));
        assert_eq!(answer.citations[1].url.as_deref(), Some("http://wiki/ci"));

        let bodies = gateway.bodies.lock().unwrap();
        assert_eq!(bodies[0].0, "/chat/ask");
        assert_eq!(bodies[0].1, json!({"query": "how do we deploy", "top_k": 5}));
    }

    #[tokio::test]
    async fn health_combines_three_probes() {
        let gateway = RoutedGateway::new(vec![
            ("/health/live", ApiResponse::Ok(json!({"status": "ok"}))),
            ("/health/ready", ApiResponse::Empty),
            ("/health/version", ApiResponse::Ok(json!({"version": "1.4.2"}))),
        ]);
        let panels = Panels::new(gateway);

        let report = panels.health().await.unwrap();
        assert_eq!(report.live, Some(json!({"status": "ok"})));
        assert!(report.ready.is_none());
        assert_eq!(report.version, Some(json!({"version": "1.4.2"})));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_panel_error() {
        let gateway = RoutedGateway::new(vec![(
            "/metrics/summary",
            ApiResponse::TransportFailed("connection refused".into()),
        )]);
        let panels = Panels::new(gateway);

        let err = panels.metrics().await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn malformed_governance_body_decodes_to_placeholders() {
        let gateway = RoutedGateway::new(vec![(
            "/governance/risk_score",
            ApiResponse::Ok(json!(["not", "an", "object"])),
        )]);
        let panels = Panels::new(gateway);

        let risk = panels.governance().await.unwrap();
        assert!(risk.risk_score.is_none());
        assert!(risk.components.is_none());
    }

    #[tokio::test]
    async fn datasets_tolerate_missing_fields() {
        let gateway = RoutedGateway::new(vec![(
            "/features/datasets",
            ApiResponse::Ok(json!({
                "datasets": [
                    {"name": "faces-v2", "config_file": "faces.yaml", "type": "image"},
                    {"name": "calls"}
                ]
            })),
        )]);
        let panels = Panels::new(gateway);

        let datasets = panels.datasets().await.unwrap();
        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].kind.as_deref(), Some("image"));
        assert!(datasets[1].task.is_none());
    }

    #[tokio::test]
    async fn consent_round_trip_acknowledged() {
        let gateway = RoutedGateway::new(vec![
            ("/privacy/consent", ApiResponse::Ok(json!({"status": "ok"}))),
        ]);
        let panels = Panels::new(Arc::clone(&gateway));

        assert!(panels.set_consent(true).await.unwrap());
        let bodies = gateway.bodies.lock().unwrap();
        assert_eq!(bodies[0].1, json!({"enabled": true}));
    }

    #[tokio::test]
    async fn unacknowledged_consent_change_reports_false() {
        let gateway = RoutedGateway::new(vec![("/privacy/consent", ApiResponse::Empty)]);
        let panels = Panels::new(gateway);
        assert!(!panels.set_consent(false).await.unwrap());
    }
}
