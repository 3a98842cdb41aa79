use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use url::Url;

use crate::error::AppError;

// ============================================================================
// Helper
// ============================================================================

fn registry_err(e: impl std::fmt::Display) -> AppError {
    AppError::fatal(format!("user registry: {e}"), None)
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserResponse {
    pub ok: bool,
    #[serde(default)]
    pub user: Option<RegisteredUser>,
}

// ============================================================================
// UserRegistryClient
// ============================================================================

/// HTTP client for `POST {base}/users`. Without a base URL every call is a
/// successful no-op.
#[derive(Clone)]
pub struct UserRegistryClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl UserRegistryClient {
    pub fn new(base_url: Option<&Url>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.map(|u| u.as_str().trim_end_matches('/').to_string()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Create or update the user keyed by `user_id`.
    ///
    /// Never fails: errors are logged at WARN and reported as `None`.
    pub async fn upsert(&self, request: &UpsertUserRequest) -> Option<UpsertUserResponse> {
        let Some(base) = &self.base_url else {
            tracing::debug!(user_id = %request.user_id, "User registry not configured, skipping upsert");
            return Some(UpsertUserResponse { ok: true, user: None });
        };

        match self.post_json::<_, UpsertUserResponse>(&format!("{base}/users"), request).await {
            Ok(response) => {
                tracing::info!(user_id = %request.user_id, ok = response.ok, "User registered");
                Some(response)
            }
            Err(e) => {
                tracing::warn!(user_id = %request.user_id, "User registry upsert failed: {}", e);
                None
            }
        }
    }

    /// `GET {base}/health`. `false` when unreachable or not configured.
    pub async fn health(&self) -> bool {
        let Some(base) = &self.base_url else {
            return false;
        };
        #[derive(Deserialize)]
        struct Health {
            ok: bool,
        }
        match self.http.get(format!("{base}/health")).send().await {
            Ok(resp) if resp.status().is_success() => {
                resp.json::<Health>().await.map(|h| h.ok).unwrap_or(false)
            }
            Ok(resp) => {
                tracing::warn!(status = resp.status().as_u16(), "User registry unhealthy");
                false
            }
            Err(e) => {
                tracing::warn!("User registry unreachable: {}", e);
                false
            }
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(registry_err)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::fatal(
                format!("user registry returned HTTP {}: {}", status.as_u16(), text),
                Some(status.as_u16()),
            ));
        }
        resp.json::<T>().await.map_err(registry_err)
    }
}
