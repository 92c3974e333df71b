//! API gateway port interface

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Outcome of one gateway round trip.
///
/// Absence of data is an explicit variant, not an exception: callers cannot
/// conflate "the backend answered with nothing" with "the transport failed".
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// 2xx with a parsable, non-null JSON body
    Ok(Value),
    /// 2xx whose body was empty, non-JSON, or JSON null. A valid,
    /// non-fatal outcome.
    Empty,
    /// Network-level failure or non-2xx status
    TransportFailed(String),
}

impl ApiResponse {
    /// The JSON payload, if any
    pub fn json(&self) -> Option<&Value> {
        match self {
            Self::Ok(value) => Some(value),
            _ => None,
        }
    }

    /// Decode the payload into a typed shape. A malformed payload decodes to
    /// `None` rather than an error; missing fields are the callee's `Option`s.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        match self {
            Self::Ok(value) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }

    /// Whether the transport itself failed (as opposed to an empty success)
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::TransportFailed(_))
    }
}

/// One part of a multipart submission
#[derive(Debug, Clone)]
pub enum PartBody {
    /// A plain text field
    Text(String),
    /// A binary file field
    Bytes {
        data: Vec<u8>,
        file_name: String,
        mime: String,
    },
}

/// Transport-agnostic multipart form description
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<(String, PartBody)>,
}

impl MultipartForm {
    /// Create an empty form
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((name.into(), PartBody::Text(value.into())));
        self
    }

    /// Add a binary file field
    pub fn bytes(
        mut self,
        name: impl Into<String>,
        data: Vec<u8>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        self.parts.push((
            name.into(),
            PartBody::Bytes {
                data,
                file_name: file_name.into(),
                mime: mime.into(),
            },
        ));
        self
    }

    /// Iterate over the parts
    pub fn parts(&self) -> &[(String, PartBody)] {
        &self.parts
    }

    /// Consume the form into its parts
    pub fn into_parts(self) -> Vec<(String, PartBody)> {
        self.parts
    }
}

/// Port for the backend request/response contract.
///
/// Each operation performs exactly one round trip against a shared base
/// address: no retry and no gateway-level timeout (timeout policy belongs to
/// the caller).
#[async_trait]
pub trait ApiGateway: Send + Sync {
    /// POST a JSON body
    async fn submit_json(&self, path: &str, body: &Value) -> ApiResponse;

    /// POST a multipart form
    async fn submit_multipart(&self, path: &str, form: MultipartForm) -> ApiResponse;

    /// GET a JSON resource
    async fn fetch_json(&self, path: &str) -> ApiResponse;
}

/// Blanket implementation for boxed gateway types
#[async_trait]
impl ApiGateway for Box<dyn ApiGateway> {
    async fn submit_json(&self, path: &str, body: &Value) -> ApiResponse {
        self.as_ref().submit_json(path, body).await
    }

    async fn submit_multipart(&self, path: &str, form: MultipartForm) -> ApiResponse {
        self.as_ref().submit_multipart(path, form).await
    }

    async fn fetch_json(&self, path: &str) -> ApiResponse {
        self.as_ref().fetch_json(path).await
    }
}
