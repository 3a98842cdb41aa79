//! Prompt text for the three provider interactions.

use super::catalog::Catalog;
use super::types::{PastProduct, Routine, SkinConditionCategory};

/// Brand used when no `BRAND_NAME` is configured.
pub const DEFAULT_BRAND: &str = "House of Skin";

/// First assistant message shown in every new transcript.
pub const CHAT_GREETING: &str = "Hello! I'm your AI Skincare Assistant. Do you have any questions about your new routine or skin analysis?";

/// Transcript entry appended when a chat turn fails.
pub const CHAT_FAILURE_REPLY: &str =
    "Sorry, I encountered an error and couldn't connect to the AI assistant. Please try again.";

pub const ANALYSIS_INSTRUCTIONS: &str = r#"Analyze these facial images in detail. They may show different angles of the same person's face (e.g., front, left side, right side). Provide one single, consolidated analysis based on all images provided. Identify all potential skin conditions. Group them into relevant categories like 'Acne & Breakouts', 'Oil Control & Sebum', 'Skin Texture & Surface', 'Pigmentation', 'Hydration Levels', 'Signs of Aging', 'Redness & Sensitivity'.

For each specific condition you identify, provide:
1. A 'name' for the condition (e.g., 'Pustules').
2. A 'confidence' score from 0 to 100 on how certain you are.
3. A 'location' string describing the primary area on the face (e.g., "Forehead", "Cheeks", "Nose", "Chin", "Around Mouth", "General Face").
4. An array of 'boundingBoxes' showing where you found the condition. Each bounding box object must have an 'imageId' (the 0-based index of the input image it corresponds to) and a 'box' object with normalized coordinates (x1, y1, x2, y2) from 0.0 to 1.0, where x1 < x2 and y1 < y2. If a condition is general and not localized, use a location like "General Face" and return an empty array for boundingBoxes.

Provide the output strictly in JSON format according to the provided schema. Be thorough and identify as many relevant conditions as possible.

BALANCED ANALYSIS: report on healthy aspects of the skin as well. If you identify clear, healthy areas, include a 'Healthy Skin' category with specific condition names like 'Clear and Balanced Skin on Forehead' or 'Good Hydration on Cheeks'. Do not include the 'Healthy Skin' category if the images show widespread or severe conditions with no discernible healthy areas. Accuracy is the top priority.

REDNESS: do not classify a red spot as 'Redness' if the redness is a characteristic of another primary condition. An inflamed acne pustule is naturally red; identify it only as 'Acne'. Use 'Redness & Sensitivity' only for rosacea, widespread irritation, flushing, or persistent patches of redness that are not part of another condition."#;

/// `Category: Name at Location (N% confidence), ...; Category: ...`
pub fn summarize_analysis(analysis: &[SkinConditionCategory]) -> String {
    analysis
        .iter()
        .map(|cat| {
            let conditions = cat
                .conditions
                .iter()
                .map(|c| format!("{} at {} ({}% confidence)", c.name, c.location, c.confidence))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}: {}", cat.category, conditions)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn summarize_past_products(past: &[PastProduct]) -> String {
    if past.is_empty() {
        return "None specified.".to_string();
    }
    past.iter()
        .map(|p| {
            let usage = if p.is_using { "currently using" } else { "used in past" };
            if p.duration.is_empty() {
                format!("{} ({usage})", p.name)
            } else {
                format!("{} ({usage}, {})", p.name, p.duration)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn routine_prompt(
    brand: &str,
    catalog: &Catalog,
    past: &[PastProduct],
    analysis: &[SkinConditionCategory],
    goals: &[String],
) -> String {
    format!(
        r#"You are a world-class dermatologist and skincare expert for the brand "{brand}". Create a highly personalized and effective skincare routine for a user based on their data. You MUST use products exclusively from the {brand} catalog provided below. Recommend as many or as few steps as are genuinely necessary for the user's conditions and goals.

**{brand} Product Catalog:**
{catalog}

**User Data:**
- **Previously Used Products:** {past}
- **AI Skin Analysis Results:** {analysis}
- **Primary Skincare Goals:** {goals}

**Instructions:**
1. **Analyze and Select:** From the catalog, select the MOST appropriate products to build a cohesive AM and PM routine. Use the 'suitableFor' and 'keyIngredients' fields to match products to the user's conditions.
2. **Create the Routine:** For each step provide `stepType` (one word, e.g. "Cleanser", "Toner", "Serum", "Moisturizer", "Sunscreen", "Treatment"), `productId`, `variantId`, `productName`, `productUrl`, `productImageUrl`, `price`, `originalPrice` (all copied exactly from the catalog), `purpose` (why this product suits this user), `keyIngredients` (MANDATORY, copied from the catalog) and `alternatives` (other catalog products that would work for this step, each with `productId`, `variantId`, `productName`, `productUrl`, `productImageUrl`, `price`, `originalPrice` and `keyIngredients`; may be empty).
3. **Key Ingredients:** List 4-5 key active ingredients from the selected products.
4. **Lifestyle Tips:** Provide lifestyle and wellness tips that support the user's goals.
5. **Disclaimer & Introduction:** Provide a standard disclaimer and a brief, encouraging introduction.
6. **Routine Title:** Create a short, powerful title for the plan.

**PRODUCT CONSISTENCY:** If a `stepType` (e.g. "Cleanser", "Moisturizer", "Serum") is needed in both the AM and PM routines, you MUST recommend the exact same product (same `productId`) for that step in both. "Sunscreen" only ever appears in the AM routine.

**Output Format:** Return a single JSON object with a "title" key and a "recommendation" key. "recommendation" contains "introduction", "am", "pm", "keyIngredients", "lifestyleTips" and "disclaimer". DO NOT recommend any product that is not in the catalog."#,
        catalog = catalog.snapshot(),
        past = summarize_past_products(past),
        analysis = summarize_analysis(analysis),
        goals = goals.join(", "),
    )
}

fn summarize_routine(routine: &Routine) -> String {
    let steps = |steps: &[super::types::RoutineStep]| {
        steps
            .iter()
            .map(|s| format!("{} ({})", s.product_name, s.purpose))
            .collect::<Vec<_>>()
            .join(" -> ")
    };
    format!(
        "Introduction: {}\nAM Routine: {}\nPM Routine: {}\nKey Ingredients: {}\nLifestyle Tips: {}\nDisclaimer: {}",
        routine.introduction,
        steps(&routine.am),
        steps(&routine.pm),
        routine.key_ingredients.join(", "),
        routine.lifestyle_tips.join(" "),
        routine.disclaimer,
    )
}

/// System context for the follow-up chat.
pub fn chat_system_instruction(
    brand: &str,
    analysis: &[SkinConditionCategory],
    goals: &[String],
    routine: &Routine,
) -> String {
    format!(
        r#"You are a friendly and knowledgeable skincare assistant for the brand "{brand}". The user has just received a skincare analysis and a routine composed of specific {brand} products.
Their details are:
- Skin Analysis: {analysis}
- Skincare Goals: {goals}
- Recommended Routine:
{routine}

Answer their follow-up questions about their skin, the recommended routine, or the {brand} products in their routine.
Be concise and helpful. Always encourage consulting a real dermatologist for medical advice or diagnosis. Do not give medical advice."#,
        analysis = summarize_analysis(analysis),
        goals = goals.join(", "),
        routine = summarize_routine(routine),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::SkinCondition;

    fn analysis() -> Vec<SkinConditionCategory> {
        vec![SkinConditionCategory {
            category: "Acne & Breakouts".into(),
            conditions: vec![
                SkinCondition {
                    name: "Pustules".into(),
                    confidence: 82.0,
                    location: "Forehead".into(),
                    bounding_boxes: vec![],
                },
                SkinCondition {
                    name: "Blackheads".into(),
                    confidence: 64.5,
                    location: "Nose".into(),
                    bounding_boxes: vec![],
                },
            ],
        }]
    }

    #[test]
    fn test_summarize_analysis() {
        assert_eq!(
            summarize_analysis(&analysis()),
            "Acne & Breakouts: Pustules at Forehead (82% confidence), Blackheads at Nose (64.5% confidence)"
        );
    }

    #[test]
    fn test_summarize_past_products() {
        assert_eq!(summarize_past_products(&[]), "None specified.");
        let past = vec![
            PastProduct { name: "Retinol Cream".into(), is_using: true, duration: "3 Months".into() },
            PastProduct { name: "Clay Mask".into(), is_using: false, duration: String::new() },
        ];
        assert_eq!(
            summarize_past_products(&past),
            "Retinol Cream (currently using, 3 Months), Clay Mask (used in past)"
        );
    }

    #[test]
    fn test_routine_prompt_embeds_inputs() {
        let catalog = Catalog::default();
        let prompt = routine_prompt(DEFAULT_BRAND, &catalog, &[], &analysis(), &["Clear Acne & Breakouts".to_string()]);
        assert!(prompt.contains("Pustules at Forehead"));
        assert!(prompt.contains("Primary Skincare Goals:** Clear Acne & Breakouts"));
        assert!(prompt.contains("same `productId`"));
        assert!(prompt.contains("for the brand \"House of Skin\""));
    }

    #[test]
    fn test_chat_system_instruction_lists_routine() {
        let routine = Routine {
            introduction: "Intro".into(),
            am: vec![],
            pm: vec![],
            key_ingredients: vec!["Niacinamide".into(), "Ceramides".into()],
            lifestyle_tips: vec!["Sleep well.".into()],
            disclaimer: "Consult a dermatologist.".into(),
        };
        let text = chat_system_instruction("Acme", &analysis(), &["Even Skin Tone".into()], &routine);
        assert!(text.contains("for the brand \"Acme\""));
        assert!(text.contains("Key Ingredients: Niacinamide, Ceramides"));
        assert!(text.contains("Skincare Goals: Even Skin Tone"));
    }
}
