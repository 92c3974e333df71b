//! reqwest-backed API gateway adapter

use async_trait::async_trait;
use serde_json::Value;

use crate::application::ports::{ApiGateway, ApiResponse, MultipartForm, PartBody};

/// HTTP gateway against a single backend base address.
///
/// Status and body are triaged into the three response variants: any request
/// error or non-2xx status is a transport failure, a 2xx whose body is not
/// usable JSON is an empty success. No client-level timeout is configured;
/// timeout policy belongs to the caller.
pub struct HttpApiGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpApiGateway {
    /// Create a gateway against the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// The configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn triage(result: Result<reqwest::Response, reqwest::Error>) -> ApiResponse {
        let response = match result {
            Ok(response) => response,
            Err(e) => return ApiResponse::TransportFailed(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = if body.is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, body)
            };
            return ApiResponse::TransportFailed(detail);
        }

        match response.json::<Value>().await {
            Ok(Value::Null) => ApiResponse::Empty,
            Ok(value) => ApiResponse::Ok(value),
            Err(_) => ApiResponse::Empty,
        }
    }

    fn build_form(form: MultipartForm) -> Result<reqwest::multipart::Form, String> {
        let mut out = reqwest::multipart::Form::new();
        for (name, body) in form.into_parts() {
            match body {
                PartBody::Text(value) => {
                    out = out.text(name, value);
                }
                PartBody::Bytes {
                    data,
                    file_name,
                    mime,
                } => {
                    let part = reqwest::multipart::Part::bytes(data)
                        .file_name(file_name)
                        .mime_str(&mime)
                        .map_err(|e| e.to_string())?;
                    out = out.part(name, part);
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ApiGateway for HttpApiGateway {
    async fn submit_json(&self, path: &str, body: &Value) -> ApiResponse {
        let result = self.client.post(self.url(path)).json(body).send().await;
        Self::triage(result).await
    }

    async fn submit_multipart(&self, path: &str, form: MultipartForm) -> ApiResponse {
        let form = match Self::build_form(form) {
            Ok(form) => form,
            Err(e) => return ApiResponse::TransportFailed(e),
        };
        let result = self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await;
        Self::triage(result).await
    }

    async fn fetch_json(&self, path: &str) -> ApiResponse {
        let result = self.client.get(self.url(path)).send().await;
        Self::triage(result).await
    }
}
