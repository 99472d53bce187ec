use async_trait::async_trait;
use log::{error, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::FaceConfig,
    error::{ApiError, ApiResult},
};

/// Sentinel token the mock detector reports for every probe image.
pub const MOCK_DETECT_TOKEN: &str = "mock_token";
/// Prefix of tokens issued by mock-mode registration.
pub const MOCK_TOKEN_PREFIX: &str = "mock_face_token_";
/// Confidence reported by a successful mock verification.
pub const MOCK_CONFIDENCE: f64 = 95.5;
/// Comparison threshold used when the provider does not supply one.
pub const DEFAULT_THRESHOLD: f64 = 70.0;

const UPSTREAM_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Detection {
    pub face_token: String,
    pub mock: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Verification {
    pub verified: bool,
    pub confidence: f64,
    pub threshold: f64,
    /// Set when the result came from the offline fallback. Mock results are
    /// a test fixture, not a security mechanism; callers must never treat
    /// them as authoritative.
    pub mock: bool,
}

/// Uniform contract over the external face service. The implementation is
/// chosen once at construction from deployment configuration, never per
/// call.
#[async_trait]
pub trait FaceProvider: Send + Sync {
    async fn detect(&self, image_base64: &str) -> ApiResult<Detection>;

    /// Detects a face and returns a token to store against the subject.
    /// Detection failures propagate unchanged.
    async fn register(&self, image_base64: &str, subject_id: &str) -> ApiResult<String>;

    async fn verify(&self, image_base64: &str, stored_token: &str) -> ApiResult<Verification>;
}

pub fn is_mock_token(token: &str) -> bool {
    token.starts_with(MOCK_TOKEN_PREFIX)
}

/// Build the provider matching the deployment configuration. Absence of
/// credentials is a supported configuration, not an error, but it is loud.
pub fn provider_from_config(config: &FaceConfig) -> Arc<dyn FaceProvider> {
    if config.is_live() {
        Arc::new(LiveProvider::new(config))
    } else {
        warn!(
            "Face verification running in MOCK mode: no credentials configured. \
             Mock results are deterministic fixtures and must not be used in production."
        );
        Arc::new(MockProvider)
    }
}

fn mock_verification(probe: &Detection) -> Verification {
    if probe.face_token == MOCK_DETECT_TOKEN {
        Verification {
            verified: true,
            confidence: MOCK_CONFIDENCE,
            threshold: DEFAULT_THRESHOLD,
            mock: true,
        }
    } else {
        Verification {
            verified: false,
            confidence: 0.0,
            threshold: DEFAULT_THRESHOLD,
            mock: true,
        }
    }
}

/// Offline fallback: deterministic sentinel results, no network.
pub struct MockProvider;

#[async_trait]
impl FaceProvider for MockProvider {
    async fn detect(&self, _image_base64: &str) -> ApiResult<Detection> {
        Ok(Detection {
            face_token: MOCK_DETECT_TOKEN.to_string(),
            mock: true,
        })
    }

    async fn register(&self, image_base64: &str, subject_id: &str) -> ApiResult<String> {
        self.detect(image_base64).await?;
        // Same subject always yields the same sentinel token.
        Ok(format!("{}{}", MOCK_TOKEN_PREFIX, subject_id))
    }

    async fn verify(&self, image_base64: &str, stored_token: &str) -> ApiResult<Verification> {
        // A token registered against the live service cannot be compared
        // without credentials; refusing is the only safe answer.
        if !is_mock_token(stored_token) {
            return Err(ApiError::UpstreamError(
                "Face verification credentials not configured".to_string(),
            ));
        }
        let probe = self.detect(image_base64).await?;
        Ok(mock_verification(&probe))
    }
}

#[derive(Debug, Deserialize)]
struct FaceBox {
    face_token: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<FaceBox>,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    confidence: Option<f64>,
    thresholds: Option<HashMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    error_message: Option<String>,
}

/// Live Face++ client. Every outbound call carries a hard 30-second
/// deadline; transport faults are mapped to the retryable error variants at
/// this boundary and raw reqwest errors never escape.
pub struct LiveProvider {
    client: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl LiveProvider {
    pub fn new(config: &FaceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .user_agent("seva-setu-api/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: config.api_key.clone().unwrap_or_default(),
            api_secret: config.api_secret.clone().unwrap_or_default(),
            base_url: config.api_url.clone(),
        }
    }

    fn map_transport_error(error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::UpstreamTimeout
        } else {
            ApiError::UpstreamUnavailable
        }
    }

    async fn post_form(&self, endpoint: &str, form: Vec<(String, String)>) -> ApiResult<String> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(Self::map_transport_error)?;

        if !status.is_success() {
            let message = serde_json::from_str::<UpstreamErrorBody>(&body)
                .ok()
                .and_then(|b| b.error_message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            error!("Face provider {} returned {}: {}", endpoint, status, message);
            return Err(ApiError::UpstreamError(message));
        }

        Ok(body)
    }
}

#[async_trait]
impl FaceProvider for LiveProvider {
    async fn detect(&self, image_base64: &str) -> ApiResult<Detection> {
        let form = vec![
            ("api_key".to_string(), self.api_key.clone()),
            ("api_secret".to_string(), self.api_secret.clone()),
            ("image_base64".to_string(), image_base64.to_string()),
            ("return_attributes".to_string(), "none".to_string()),
        ];

        let body = self.post_form("detect", form).await?;
        let parsed: DetectResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::UpstreamError(format!("Malformed detect response: {}", e)))?;

        let face = parsed.faces.into_iter().next().ok_or(ApiError::NoFaceDetected)?;

        Ok(Detection {
            face_token: face.face_token,
            mock: false,
        })
    }

    async fn register(&self, image_base64: &str, _subject_id: &str) -> ApiResult<String> {
        let detection = self.detect(image_base64).await?;
        Ok(detection.face_token)
    }

    async fn verify(&self, image_base64: &str, stored_token: &str) -> ApiResult<Verification> {
        let probe = self.detect(image_base64).await?;

        // Tokens registered under mock mode must never reach the compare
        // endpoint: resolve them with the same deterministic fixture,
        // flagged as such.
        if is_mock_token(stored_token) {
            warn!("Stored face token is a mock-mode fixture; skipping live comparison");
            return Ok(mock_verification(&probe));
        }

        let form = vec![
            ("api_key".to_string(), self.api_key.clone()),
            ("api_secret".to_string(), self.api_secret.clone()),
            ("face_token1".to_string(), stored_token.to_string()),
            ("face_token2".to_string(), probe.face_token),
        ];

        let body = self.post_form("compare", form).await?;
        let parsed: CompareResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::UpstreamError(format!("Malformed compare response: {}", e)))?;

        let confidence = parsed.confidence.unwrap_or(0.0);
        let threshold = parsed
            .thresholds
            .and_then(|t| t.get("1e-5").copied())
            .unwrap_or(DEFAULT_THRESHOLD);

        Ok(Verification {
            verified: confidence > threshold,
            confidence,
            threshold,
            mock: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_register_is_deterministic_per_subject() {
        let provider = MockProvider;
        let first = provider.register("aW1n", "ramesh").await.unwrap();
        let second = provider.register("b3RoZXJpbWc=", "ramesh").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, "mock_face_token_ramesh");
        assert_ne!(first, provider.register("aW1n", "suresh").await.unwrap());
    }

    #[tokio::test]
    async fn mock_verify_reports_fixture_confidence_and_flag() {
        let provider = MockProvider;
        let token = provider.register("aW1n", "ramesh").await.unwrap();
        let result = provider.verify("cHJvYmU=", &token).await.unwrap();

        assert!(result.verified);
        assert_eq!(result.confidence, MOCK_CONFIDENCE);
        assert!(result.mock, "mock results must always carry the mock flag");
    }

    #[tokio::test]
    async fn mock_verify_refuses_live_registered_tokens() {
        let provider = MockProvider;
        let result = provider.verify("cHJvYmU=", "c2bf4f0d9a8e").await;
        assert!(matches!(result, Err(ApiError::UpstreamError(_))));
    }

    #[test]
    fn mock_token_short_circuit_is_deterministic() {
        let detection = Detection {
            face_token: MOCK_DETECT_TOKEN.to_string(),
            mock: true,
        };
        let result = mock_verification(&detection);
        assert!(result.verified);
        assert!(result.mock);

        let mismatch = Detection {
            face_token: "f4c3".to_string(),
            mock: false,
        };
        let result = mock_verification(&mismatch);
        assert!(!result.verified);
        assert_eq!(result.confidence, 0.0);
        assert!(result.mock);
    }

    #[test]
    fn mock_token_prefix_detection() {
        assert!(is_mock_token("mock_face_token_ramesh"));
        assert!(!is_mock_token("a1b2c3d4"));
        assert!(!is_mock_token("mock_token"));
    }
}
