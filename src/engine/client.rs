//! Structured generation: skin analysis and routine generation.
//!
//! Both calls go through the [`FailoverInvoker`]; each attempt repeats the
//! network call and the full response validation, so a malformed reply from
//! one credential moves on to the next.

use std::sync::Arc;

use super::catalog::Catalog;
use super::credentials::Credential;
use super::failover::FailoverInvoker;
use super::prompt;
use super::provider::{ContentPart, GenerateRequest, GenerativeProvider};
use super::schema::{self, ResponseSchema};
use super::types::{PastProduct, RoutineResult, SkinConditionCategory};
use crate::error::AppError;
use crate::validation;

/// One uploaded photo.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

pub struct GenerationClient {
    provider: Arc<dyn GenerativeProvider>,
    invoker: FailoverInvoker,
    model: String,
    brand: String,
    catalog: Arc<Catalog>,
    analysis_schema: ResponseSchema,
    routine_schema: ResponseSchema,
}

impl GenerationClient {
    pub fn new(
        provider: Arc<dyn GenerativeProvider>,
        invoker: FailoverInvoker,
        model: impl Into<String>,
        brand: impl Into<String>,
        catalog: Arc<Catalog>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            provider,
            invoker,
            model: model.into(),
            brand: brand.into(),
            catalog,
            analysis_schema: ResponseSchema::new("skin analysis", schema::analysis_schema())?,
            routine_schema: ResponseSchema::new("routine", schema::routine_schema())?,
        })
    }

    pub fn provider(&self) -> &Arc<dyn GenerativeProvider> {
        &self.provider
    }

    pub fn invoker(&self) -> &FailoverInvoker {
        &self.invoker
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    /// Analyze one or more photos of the same face.
    pub async fn analyze_skin(
        &self,
        images: &[ImagePayload],
    ) -> Result<Vec<SkinConditionCategory>, AppError> {
        validation::require_some("image", images)?;

        let mut parts: Vec<ContentPart> = images
            .iter()
            .map(|image| ContentPart::InlineData {
                mime_type: image.mime_type.clone(),
                data: image.bytes.clone(),
            })
            .collect();
        parts.push(ContentPart::text(prompt::ANALYSIS_INSTRUCTIONS));

        let request = GenerateRequest {
            model: self.model.clone(),
            parts,
            response_schema: Some(self.analysis_schema.provider_schema()),
        };

        tracing::info!(images = images.len(), model = %self.model, "Requesting skin analysis");

        let provider = self.provider.as_ref();
        let schema = &self.analysis_schema;
        let request = &request;
        let image_count = images.len();
        let analysis = self
            .invoker
            .invoke("analyze_skin", move |credential: Credential| async move {
                let text = provider.generate(&credential, request).await?;
                let analysis: Vec<SkinConditionCategory> = schema.decode(&text)?;
                check_bounding_boxes(&analysis, image_count)?;
                Ok::<_, AppError>(analysis)
            })
            .await?;

        tracing::info!(categories = analysis.len(), "Skin analysis complete");
        Ok(analysis)
    }

    /// Build a catalog-backed AM/PM routine.
    pub async fn generate_routine(
        &self,
        past_products: &[PastProduct],
        analysis: &[SkinConditionCategory],
        goals: &[String],
    ) -> Result<RoutineResult, AppError> {
        if self.catalog.is_empty() {
            return Err(AppError::Configuration(
                "no product catalog configured; set CATALOG_PATH".into(),
            ));
        }

        let request = GenerateRequest {
            model: self.model.clone(),
            parts: vec![ContentPart::text(prompt::routine_prompt(
                &self.brand,
                &self.catalog,
                past_products,
                analysis,
                goals,
            ))],
            response_schema: Some(self.routine_schema.provider_schema()),
        };

        tracing::info!(
            goals = goals.len(),
            past_products = past_products.len(),
            catalog = self.catalog.len(),
            "Requesting routine"
        );

        let provider = self.provider.as_ref();
        let schema = &self.routine_schema;
        let request = &request;
        let result = self
            .invoker
            .invoke("generate_routine", move |credential: Credential| async move {
                let text = provider.generate(&credential, request).await?;
                schema.decode::<RoutineResult>(&text)
            })
            .await?;

        let recommendation = &result.recommendation;
        tracing::info!(
            title = %result.title,
            am_steps = recommendation.am.len(),
            pm_steps = recommendation.pm.len(),
            "Routine generated"
        );
        for step in recommendation.am.iter().chain(&recommendation.pm) {
            if self.catalog.get(&step.product_id).is_none() {
                tracing::warn!(product_id = %step.product_id, "Routine references a product outside the catalog");
            }
        }
        Ok(result)
    }
}

/// Every box must be a normalized rectangle on one of the submitted images.
fn check_bounding_boxes(
    analysis: &[SkinConditionCategory],
    image_count: usize,
) -> Result<(), AppError> {
    for category in analysis {
        for condition in &category.conditions {
            for bbox in &condition.bounding_boxes {
                if bbox.image_id >= image_count {
                    return Err(AppError::Parse(format!(
                        "'{}' references image {} but only {} were submitted",
                        condition.name, bbox.image_id, image_count
                    )));
                }
                if !bbox.rect.is_normalized() {
                    let r = bbox.rect;
                    return Err(AppError::Parse(format!(
                        "'{}' has an invalid box ({}, {}, {}, {})",
                        condition.name, r.x1, r.y1, r.x2, r.y2
                    )));
                }
            }
        }
    }
    Ok(())
}
