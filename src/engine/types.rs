use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

// =============================================================================
// Skin analysis
// =============================================================================

/// Normalized rectangle `(x1, y1)`–`(x2, y2)` inside one source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    /// `0 <= x1 < x2 <= 1` and `0 <= y1 < y2 <= 1`.
    pub fn is_normalized(&self) -> bool {
        let unit = |v: f64| (0.0..=1.0).contains(&v);
        unit(self.x1)
            && unit(self.y1)
            && unit(self.x2)
            && unit(self.y2)
            && self.x1 < self.x2
            && self.y1 < self.y2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// 0-based index into the images supplied with the analysis request.
    #[serde(deserialize_with = "deserialize_image_index")]
    pub image_id: usize,
    #[serde(rename = "box")]
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SkinCondition {
    pub name: String,
    /// 0–100.
    pub confidence: f64,
    pub location: String,
    pub bounding_boxes: Vec<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SkinConditionCategory {
    pub category: String,
    pub conditions: Vec<SkinCondition>,
}

/// Providers declare indexes as numbers, so `0.0` must decode like `0`.
fn deserialize_image_index<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw < 0.0 || raw.fract() != 0.0 || raw > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "imageId must be a non-negative integer, got {raw}"
        )));
    }
    Ok(raw as usize)
}

// =============================================================================
// Routine
// =============================================================================

/// A product the user has used before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PastProduct {
    pub name: String,
    pub is_using: bool,
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeProduct {
    pub product_id: String,
    pub variant_id: String,
    pub product_name: String,
    pub product_url: String,
    pub product_image_url: String,
    pub price: String,
    pub original_price: String,
    pub key_ingredients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RoutineStep {
    pub step_type: String,
    pub product_id: String,
    pub variant_id: String,
    pub product_name: String,
    pub product_url: String,
    pub product_image_url: String,
    pub purpose: String,
    pub alternatives: Vec<AlternativeProduct>,
    pub price: String,
    pub original_price: String,
    pub key_ingredients: Vec<String>,
}

impl RoutineStep {
    /// The primary product in alternative shape.
    pub fn primary(&self) -> AlternativeProduct {
        AlternativeProduct {
            product_id: self.product_id.clone(),
            variant_id: self.variant_id.clone(),
            product_name: self.product_name.clone(),
            product_url: self.product_url.clone(),
            product_image_url: self.product_image_url.clone(),
            price: self.price.clone(),
            original_price: self.original_price.clone(),
            key_ingredients: self.key_ingredients.clone(),
        }
    }

    /// Primary product followed by the alternatives, in provider order.
    pub fn candidates(&self) -> Vec<AlternativeProduct> {
        let mut all = Vec::with_capacity(self.alternatives.len() + 1);
        all.push(self.primary());
        all.extend(self.alternatives.iter().cloned());
        all
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    pub introduction: String,
    pub am: Vec<RoutineStep>,
    pub pm: Vec<RoutineStep>,
    pub key_ingredients: Vec<String>,
    pub lifestyle_tips: Vec<String>,
    pub disclaimer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RoutineResult {
    pub title: String,
    pub recommendation: Routine,
}

// =============================================================================
// Conversation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}
