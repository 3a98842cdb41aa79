pub mod catalog;
pub mod client;
pub mod conversation;
pub mod credentials;
pub mod failover;
pub mod grouping;
pub mod prompt;
pub mod provider;
pub mod schema;
pub mod types;

use std::sync::Arc;

use catalog::Catalog;
use client::GenerationClient;
use conversation::{ConversationContext, ConversationSession};
use credentials::CredentialPool;
use failover::FailoverInvoker;
use provider::gemini::GeminiProvider;
use provider::GenerativeProvider;

use crate::config::AppConfig;
use crate::error::AppError;

/// Everything a request needs, built once at startup and shared read-only.
pub struct Advisor {
    client: GenerationClient,
}

impl Advisor {
    /// Wire up the Gemini provider, credential pool and catalog from config.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let pool = CredentialPool::from_delimited(config.api_keys()?)?;
        let catalog = match &config.catalog_path {
            Some(path) => Catalog::load(path)?,
            None => {
                tracing::warn!("CATALOG_PATH not set; routine generation is unavailable");
                Catalog::default()
            }
        };
        let provider = GeminiProvider::new(config.base_url.as_str())?;

        tracing::info!(
            credentials = pool.len(),
            model = %config.model,
            base_url = %config.base_url,
            "Advisor ready"
        );

        Self::new(Arc::new(provider), pool, &config.model, &config.brand, Arc::new(catalog))
    }

    pub fn new(
        provider: Arc<dyn GenerativeProvider>,
        pool: CredentialPool,
        model: &str,
        brand: &str,
        catalog: Arc<Catalog>,
    ) -> Result<Self, AppError> {
        let invoker = FailoverInvoker::new(pool);
        Ok(Self {
            client: GenerationClient::new(provider, invoker, model, brand, catalog)?,
        })
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// A fresh chat session sharing this advisor's provider and credentials.
    pub fn conversation(&self, context: ConversationContext) -> ConversationSession {
        ConversationSession::new(
            self.client.provider().clone(),
            self.client.invoker().clone(),
            self.client.model(),
            self.client.brand(),
            context,
        )
    }
}
