//! Response contracts for structured generation.
//!
//! Each contract is written once as standard JSON Schema. The same document
//! validates responses locally (via `jsonschema`) and, after conversion to the
//! provider's OpenAPI subset, is declared to the provider as the response
//! schema.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::error::AppError;

/// Keywords the provider's schema dialect understands.
const PROVIDER_KEYWORDS: &[&str] = &[
    "type",
    "description",
    "properties",
    "items",
    "required",
    "enum",
    "nullable",
    "format",
];

/// A named response contract.
pub struct ResponseSchema {
    name: &'static str,
    schema: Value,
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for ResponseSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSchema").field("name", &self.name).finish()
    }
}

impl ResponseSchema {
    pub fn new(name: &'static str, schema: Value) -> Result<Self, AppError> {
        let validator = jsonschema::validator_for(&schema).map_err(|e| {
            AppError::Configuration(format!("invalid {name} response schema: {e}"))
        })?;
        Ok(Self {
            name,
            schema,
            validator,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The schema in the provider's dialect.
    pub fn provider_schema(&self) -> Value {
        to_provider_schema(&self.schema)
    }

    /// Parse `text` as JSON, validate it, and deserialize into `T`.
    pub fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, AppError> {
        let value: Value = serde_json::from_str(text.trim())
            .map_err(|e| AppError::Parse(format!("{} is not valid JSON: {e}", self.name)))?;

        let violations: Vec<String> = self
            .validator
            .iter_errors(&value)
            .take(5)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        if !violations.is_empty() {
            return Err(AppError::Parse(format!(
                "{} does not match its schema: {}",
                self.name,
                violations.join("; ")
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| AppError::Parse(format!("{} could not be decoded: {e}", self.name)))
    }
}

/// Convert standard JSON Schema into the provider's OpenAPI subset:
/// upper-case type names, unsupported keywords dropped.
pub fn to_provider_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if !PROVIDER_KEYWORDS.contains(&key.as_str()) {
                    continue;
                }
                let converted = match key.as_str() {
                    "type" => match value {
                        Value::String(t) => Value::String(t.to_uppercase()),
                        other => other.clone(),
                    },
                    "properties" => match value {
                        Value::Object(props) => Value::Object(
                            props
                                .iter()
                                .map(|(name, prop)| (name.clone(), to_provider_schema(prop)))
                                .collect(),
                        ),
                        other => other.clone(),
                    },
                    "items" => to_provider_schema(value),
                    _ => value.clone(),
                };
                out.insert(key.clone(), converted);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

// =============================================================================
// Contracts
// =============================================================================

fn string_array() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

/// Array of categories, each with conditions and bounding boxes.
pub fn analysis_schema() -> Value {
    let coordinate = |description: &str| {
        json!({ "type": "number", "minimum": 0.0, "maximum": 1.0, "description": description })
    };
    let bounding_box = json!({
        "type": "object",
        "properties": {
            "imageId": {
                "type": "integer",
                "minimum": 0,
                "description": "0-based index of the image this box applies to."
            },
            "box": {
                "type": "object",
                "properties": {
                    "x1": coordinate("Normalized top-left x coordinate."),
                    "y1": coordinate("Normalized top-left y coordinate."),
                    "x2": coordinate("Normalized bottom-right x coordinate."),
                    "y2": coordinate("Normalized bottom-right y coordinate.")
                },
                "required": ["x1", "y1", "x2", "y2"]
            }
        },
        "required": ["imageId", "box"]
    });
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "description": "The category of skin conditions, e.g., 'Acne & Breakouts'."
                },
                "conditions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {
                                "type": "string",
                                "description": "The specific skin condition name, e.g., 'Hormonal Acne'."
                            },
                            "confidence": {
                                "type": "number",
                                "minimum": 0,
                                "maximum": 100,
                                "description": "The confidence score from 0 to 100."
                            },
                            "location": {
                                "type": "string",
                                "description": "The primary facial location of the condition, e.g., 'Forehead'."
                            },
                            "boundingBoxes": {
                                "type": "array",
                                "description": "Array of bounding boxes for this condition.",
                                "items": bounding_box
                            }
                        },
                        "required": ["name", "confidence", "location", "boundingBoxes"]
                    }
                }
            },
            "required": ["category", "conditions"]
        }
    })
}

fn alternative_product_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "productId": { "type": "string" },
            "variantId": { "type": "string" },
            "productName": { "type": "string" },
            "productUrl": { "type": "string" },
            "productImageUrl": { "type": "string" },
            "price": { "type": "string" },
            "originalPrice": { "type": "string" },
            "keyIngredients": string_array()
        },
        "required": [
            "productId", "variantId", "productName", "productUrl",
            "productImageUrl", "price", "originalPrice", "keyIngredients"
        ]
    })
}

fn routine_step_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "stepType": { "type": "string", "description": "A single, descriptive word for the routine step." },
            "productId": { "type": "string", "description": "The exact ID of the product from the catalog." },
            "variantId": { "type": "string", "description": "The exact variant ID for the product." },
            "productName": { "type": "string", "description": "The full name of the recommended product." },
            "productUrl": { "type": "string", "description": "The direct URL to the product page." },
            "productImageUrl": { "type": "string", "description": "The direct URL to the product's image from the catalog." },
            "purpose": { "type": "string", "description": "Why this specific product is recommended for the user." },
            "alternatives": {
                "type": "array",
                "description": "Suitable alternative products from the catalog for this step. Can be empty.",
                "items": alternative_product_schema()
            },
            "price": { "type": "string" },
            "originalPrice": { "type": "string" },
            "keyIngredients": string_array()
        },
        "required": [
            "stepType", "productId", "variantId", "productName", "productUrl",
            "productImageUrl", "purpose", "alternatives", "price", "originalPrice",
            "keyIngredients"
        ]
    })
}

/// `{title, recommendation: {introduction, am, pm, keyIngredients, lifestyleTips, disclaimer}}`.
pub fn routine_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string", "description": "A short, powerful title for the plan." },
            "recommendation": {
                "type": "object",
                "properties": {
                    "introduction": { "type": "string", "description": "A brief, encouraging intro to the plan." },
                    "am": {
                        "type": "array",
                        "description": "Steps for the morning routine.",
                        "items": routine_step_schema()
                    },
                    "pm": {
                        "type": "array",
                        "description": "Steps for the evening routine.",
                        "items": routine_step_schema()
                    },
                    "keyIngredients": {
                        "type": "array",
                        "description": "Key ingredient names from the recommended products.",
                        "items": { "type": "string" }
                    },
                    "lifestyleTips": {
                        "type": "array",
                        "description": "Lifestyle and wellness tips.",
                        "items": { "type": "string" }
                    },
                    "disclaimer": { "type": "string", "description": "A final important disclaimer message." }
                },
                "required": ["introduction", "am", "pm", "keyIngredients", "lifestyleTips", "disclaimer"]
            }
        },
        "required": ["title", "recommendation"]
    })
}
