#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use routine_advisor::engine::catalog::Catalog;
use routine_advisor::engine::credentials::{Credential, CredentialPool};
use routine_advisor::engine::provider::{ChatChannel, GenerateRequest, GenerativeProvider};
use routine_advisor::engine::Advisor;
use routine_advisor::error::AppError;

/// What the provider does for one call.
pub enum Outcome {
    Reply(String),
    Chunks(Vec<String>),
    /// Streams the chunks, then fails with a retriable error.
    Interrupted(Vec<String>, &'static str),
    Retriable(&'static str),
    Fatal(&'static str),
}

impl Outcome {
    pub fn reply(text: impl Into<String>) -> Self {
        Outcome::Reply(text.into())
    }

    pub fn chunks(chunks: &[&str]) -> Self {
        Outcome::Chunks(chunks.iter().map(|c| c.to_string()).collect())
    }

    pub fn interrupted(chunks: &[&str], msg: &'static str) -> Self {
        Outcome::Interrupted(chunks.iter().map(|c| c.to_string()).collect(), msg)
    }

    fn into_result(self) -> Result<String, AppError> {
        match self {
            Outcome::Reply(text) => Ok(text),
            Outcome::Chunks(chunks) => Ok(chunks.concat()),
            Outcome::Interrupted(_, msg) | Outcome::Retriable(msg) => Err(AppError::retriable(msg, Some(503))),
            Outcome::Fatal(msg) => Err(AppError::fatal(msg, Some(400))),
        }
    }
}

/// One recorded provider call: which credential and what kind of call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Generate { credential: usize, model: String, has_schema: bool, images: usize },
    OpenChat { credential: usize },
    Send { credential: usize, message: String },
}

/// Provider whose responses are scripted in call order.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Outcome>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl ScriptedProvider {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into())),
            calls: Arc::default(),
        }
    }

    pub fn push(&self, outcome: Outcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Credential ordinals of all `generate` calls, in order.
    pub fn generate_credentials(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Generate { credential, .. } => Some(credential),
                _ => None,
            })
            .collect()
    }

    fn next(&self) -> Outcome {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Fatal("script exhausted"))
    }
}

#[async_trait]
impl GenerativeProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerateRequest,
    ) -> Result<String, AppError> {
        let images = request
            .parts
            .iter()
            .filter(|p| matches!(p, routine_advisor::engine::provider::ContentPart::InlineData { .. }))
            .count();
        self.calls.lock().unwrap().push(Call::Generate {
            credential: credential.ordinal(),
            model: request.model.clone(),
            has_schema: request.response_schema.is_some(),
            images,
        });
        self.next().into_result()
    }

    async fn open_chat(
        &self,
        credential: &Credential,
        _model: &str,
        _system_instruction: &str,
    ) -> Result<Box<dyn ChatChannel>, AppError> {
        self.calls.lock().unwrap().push(Call::OpenChat {
            credential: credential.ordinal(),
        });
        Ok(Box::new(ScriptedChat {
            provider: self.clone(),
            credential: credential.ordinal(),
        }))
    }
}

struct ScriptedChat {
    provider: ScriptedProvider,
    credential: usize,
}

#[async_trait]
impl ChatChannel for ScriptedChat {
    async fn send_streaming(
        &mut self,
        message: &str,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, AppError> {
        self.provider.calls.lock().unwrap().push(Call::Send {
            credential: self.credential,
            message: message.to_string(),
        });
        match self.provider.next() {
            Outcome::Chunks(chunks) => {
                for chunk in &chunks {
                    on_chunk(chunk);
                }
                Ok(chunks.concat())
            }
            Outcome::Reply(text) => {
                on_chunk(&text);
                Ok(text)
            }
            Outcome::Interrupted(chunks, msg) => {
                for chunk in &chunks {
                    on_chunk(chunk);
                }
                Err(AppError::retriable(msg, Some(503)))
            }
            other => other.into_result(),
        }
    }
}

pub const CATALOG_JSON: &str = r#"[
  {"id":"DI-CL-01","name":"Salicylic Gel Cleanser","url":"https://shop.example/cl01","description":"Oil control cleanser",
   "keyIngredients":["Salicylic Acid","Zinc PCA"],"suitableFor":["Acne","Oily Skin"],
   "imageUrl":"https://shop.example/cl01.png","variantId":"40001","price":"₹399","originalPrice":"₹449"},
  {"id":"DI-MO-01","name":"Ceramide Barrier Cream","url":"https://shop.example/mo01",
   "keyIngredients":["Ceramides","Hyaluronic Acid"],"suitableFor":["Dry Skin"],
   "imageUrl":"https://shop.example/mo01.png","variantId":"40002","price":"₹599","originalPrice":"₹699"},
  {"id":"DI-MO-02","name":"Oil-Free Gel Moisturizer","url":"https://shop.example/mo02",
   "keyIngredients":["Niacinamide","Hyaluronic Acid"],"suitableFor":["Oily Skin"],
   "imageUrl":"https://shop.example/mo02.png","variantId":"40003","price":"₹549","originalPrice":"₹549"},
  {"id":"DI-SS-01","name":"Mineral Sunscreen SPF 50","url":"https://shop.example/ss01",
   "keyIngredients":["Zinc Oxide"],"suitableFor":["All Skin Types"],
   "imageUrl":"https://shop.example/ss01.png","variantId":"40004","price":"₹499","originalPrice":"₹599"}
]"#;

pub fn pool(keys: &[&str]) -> CredentialPool {
    CredentialPool::new(keys.iter().copied()).unwrap()
}

pub fn advisor(provider: &ScriptedProvider, keys: &[&str]) -> Advisor {
    advisor_with_catalog(provider, keys, Catalog::from_json(CATALOG_JSON).unwrap())
}

pub fn advisor_with_catalog(provider: &ScriptedProvider, keys: &[&str], catalog: Catalog) -> Advisor {
    Advisor::new(
        Arc::new(provider.clone()),
        pool(keys),
        "gemini-test",
        "Test Brand",
        Arc::new(catalog),
    )
    .unwrap()
}

pub const ANALYSIS_FIXTURE: &str = r#"[
  {
    "category": "Acne & Breakouts",
    "conditions": [
      {
        "name": "Pustules",
        "confidence": 88,
        "location": "Chin",
        "boundingBoxes": [
          { "imageId": 0, "box": { "x1": 0.42, "y1": 0.71, "x2": 0.51, "y2": 0.79 } }
        ]
      }
    ]
  }
]"#;

pub const BAD_BOX_FIXTURE: &str = r#"[
  {
    "category": "Acne & Breakouts",
    "conditions": [
      {
        "name": "Pustules",
        "confidence": 88,
        "location": "Chin",
        "boundingBoxes": [
          { "imageId": 0, "box": { "x1": 0.6, "y1": 0.71, "x2": 0.5, "y2": 0.79 } }
        ]
      }
    ]
  }
]"#;

/// Routine where Moisturizer appears in AM and PM with different products.
pub fn routine_fixture() -> String {
    serde_json::json!({
        "title": "Clear & Calm Plan",
        "recommendation": {
            "introduction": "A gentle plan for breakouts.",
            "am": [
                step("Cleanser", "DI-CL-01", "Salicylic Gel Cleanser", &["Salicylic Acid", "Zinc PCA"], vec![]),
                step("Moisturizer", "DI-MO-02", "Oil-Free Gel Moisturizer", &["Niacinamide", "Hyaluronic Acid"],
                     vec![alt("DI-MO-01", "Ceramide Barrier Cream", &["Ceramides", "Hyaluronic Acid"])]),
                step("Sunscreen", "DI-SS-01", "Mineral Sunscreen SPF 50", &["Zinc Oxide"], vec![])
            ],
            "pm": [
                step("Cleanser", "DI-CL-01", "Salicylic Gel Cleanser", &["Salicylic Acid", "Zinc PCA"], vec![]),
                step("Moisturizer", "DI-MO-01", "Ceramide Barrier Cream", &["Ceramides", "Hyaluronic Acid"],
                     vec![alt("DI-MO-02", "Oil-Free Gel Moisturizer", &["Niacinamide", "Hyaluronic Acid"]),
                          alt("DI-XX-09", "Plain Balm", &[])])
            ],
            "keyIngredients": ["Salicylic Acid", "Niacinamide", "Ceramides", "Zinc Oxide"],
            "lifestyleTips": ["Change pillowcases often."],
            "disclaimer": "Not medical advice."
        }
    })
    .to_string()
}

fn alt(id: &str, name: &str, ingredients: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "productId": id,
        "variantId": "1",
        "productName": name,
        "productUrl": format!("https://shop.example/{id}"),
        "productImageUrl": format!("https://shop.example/{id}.png"),
        "price": "₹1",
        "originalPrice": "₹1",
        "keyIngredients": ingredients
    })
}

fn step(
    step_type: &str,
    id: &str,
    name: &str,
    ingredients: &[&str],
    alternatives: Vec<serde_json::Value>,
) -> serde_json::Value {
    let mut value = alt(id, name, ingredients);
    value["stepType"] = step_type.into();
    value["purpose"] = format!("{step_type} for acne-prone skin").into();
    value["alternatives"] = alternatives.into();
    value
}
