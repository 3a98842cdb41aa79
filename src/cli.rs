use std::io::Write as _;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tokio::io::AsyncBufReadExt;

use crate::config::AppConfig;
use crate::engine::client::ImagePayload;
use crate::engine::conversation::{ConversationContext, STREAMING_MARKER};
use crate::engine::grouping::{group_step, unify_routine};
use crate::engine::types::{PastProduct, RoutineResult, SkinConditionCategory};
use crate::engine::Advisor;
use crate::error::AppError;
use crate::registry::{UpsertUserRequest, UserRegistryClient};

#[derive(Debug, Parser)]
#[command(name = "routine-advisor", version, about = "Personalized skincare routines from skin photos")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze one or more face photos and print the conditions as JSON.
    Analyze {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Generate an AM/PM routine from a saved analysis.
    Routine {
        /// JSON file produced by `analyze`.
        #[arg(long)]
        analysis: PathBuf,
        #[arg(long = "goal", required = true)]
        goals: Vec<String>,
        /// A product used in the past.
        #[arg(long = "past")]
        past: Vec<String>,
        /// A product currently in use.
        #[arg(long = "using")]
        using: Vec<String>,
        /// Print steps grouped by shared ingredients instead of JSON.
        #[arg(long)]
        summary: bool,
    },
    /// Ask follow-up questions about a routine (one message per line).
    Chat {
        #[arg(long)]
        analysis: PathBuf,
        /// JSON file produced by `routine`.
        #[arg(long)]
        routine: PathBuf,
        #[arg(long = "goal", required = true)]
        goals: Vec<String>,
    },
    /// Register a user with the user registry.
    Register {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
}

pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    tracing::debug!(config = ?config, "Configuration loaded");

    match cli.command {
        Command::Analyze { images } => {
            let advisor = Advisor::from_config(&config)?;
            let mut payloads = Vec::with_capacity(images.len());
            for path in &images {
                payloads.push(read_image(path).await?);
            }
            let analysis = advisor.client().analyze_skin(&payloads).await?;
            print_json(&analysis)
        }
        Command::Routine {
            analysis,
            goals,
            past,
            using,
            summary,
        } => {
            let advisor = Advisor::from_config(&config)?;
            let analysis: Vec<SkinConditionCategory> = read_json(&analysis).await?;
            let past_products: Vec<PastProduct> = using
                .into_iter()
                .map(|name| (name, true))
                .chain(past.into_iter().map(|name| (name, false)))
                .map(|(name, is_using)| PastProduct {
                    name,
                    is_using,
                    duration: String::new(),
                })
                .collect();

            let result = advisor
                .client()
                .generate_routine(&past_products, &analysis, &goals)
                .await?;
            if summary {
                print_summary(&result);
                Ok(())
            } else {
                print_json(&result)
            }
        }
        Command::Chat {
            analysis,
            routine,
            goals,
        } => {
            let advisor = Advisor::from_config(&config)?;
            let analysis: Vec<SkinConditionCategory> = read_json(&analysis).await?;
            let routine: RoutineResult = read_json(&routine).await?;
            let mut session = advisor.conversation(ConversationContext {
                analysis,
                goals,
                routine: routine.recommendation,
            });
            chat_loop(&mut session).await
        }
        Command::Register {
            user_id,
            email,
            name,
        } => {
            let registry = UserRegistryClient::new(config.user_api_base_url.as_ref())?;
            let response = registry
                .upsert(&UpsertUserRequest {
                    user_id,
                    email,
                    name,
                })
                .await;
            match response {
                Some(response) => print_json(&response),
                None => {
                    eprintln!("registration skipped: user registry unavailable");
                    Ok(())
                }
            }
        }
    }
}

async fn chat_loop(
    session: &mut crate::engine::conversation::ConversationSession,
) -> Result<(), AppError> {
    if let Some(greeting) = session.transcript().first() {
        println!("AI: {}", greeting.text);
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut printed = 0usize;
        let mut observer = |partial: &str| {
            let clean = partial.strip_suffix(STREAMING_MARKER).unwrap_or(partial);
            if printed == 0 {
                print!("AI: ");
            }
            if let Some(delta) = clean.get(printed..) {
                print!("{delta}");
                let _ = std::io::stdout().flush();
            }
            printed = clean.len();
        };
        match session.send_message(line, &mut observer).await {
            Ok(_) => println!(),
            Err(e) => {
                println!();
                let apology = session.transcript().last().map(|m| m.text.as_str()).unwrap_or_default();
                println!("AI: {apology}");
                eprintln!("error: {e}");
            }
        }
    }
    Ok(())
}

async fn read_image(path: &Path) -> Result<ImagePayload, AppError> {
    let bytes = tokio::fs::read(path).await?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        return Err(AppError::Request(format!(
            "{} does not look like an image ({})",
            path.display(),
            mime.essence_str()
        )));
    }
    Ok(ImagePayload::new(mime.essence_str(), bytes))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let text = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&text)
        .map_err(|e| AppError::Request(format!("{} is not valid input: {e}", path.display())))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Request(format!("cannot serialize output: {e}")))?;
    println!("{json}");
    Ok(())
}

fn print_summary(result: &RoutineResult) {
    let routine = &result.recommendation;
    println!("{}\n", result.title);
    println!("{}\n", routine.introduction);

    let unified = unify_routine(routine);
    for step_type in &unified.step_types {
        println!("== {step_type}");
        for unified_step in unified.steps_of_type(step_type) {
            let step = &unified_step.step;
            println!("  [{}] {} ({})", unified_step.usage.as_str(), step.product_name, step.price);
            for group in group_step(step) {
                let names: Vec<&str> = group.members.iter().map(|p| p.product_name.as_str()).collect();
                println!("      {}: {}", group.label, names.join(" | "));
            }
        }
    }

    if !routine.key_ingredients.is_empty() {
        println!("\nKey ingredients: {}", routine.key_ingredients.join(", "));
    }
    for tip in &routine.lifestyle_tips {
        println!("  - {tip}");
    }
    println!("\n{}", routine.disclaimer);
}
