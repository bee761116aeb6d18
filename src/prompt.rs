//! Terminal prompt that answers side workflows for the CLI.

use async_trait::async_trait;
use crm_kanban_core::{
    DealConversionInput, DealStage, ResultCaptureInput, WorkflowInput, WorkflowKind, WorkflowPrompt, WorkflowRequest,
};
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};

/// Result types offered when completing a task.
pub const RESULT_TYPES: [&str; 3] = ["note", "outcome", "follow_up"];

/// Asks the workflow questions with dialoguer. Declining the first
/// confirmation, or any prompt error (e.g. no TTY), counts as cancel.
pub struct DialoguerPrompt;

#[async_trait]
impl WorkflowPrompt for DialoguerPrompt {
    async fn collect(&self, request: &WorkflowRequest) -> Option<WorkflowInput> {
        let request = request.clone();
        match tokio::task::spawn_blocking(move || ask(&request)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "workflow prompt failed; treating as cancel");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "workflow prompt task panicked");
                None
            }
        }
    }
}

fn ask(request: &WorkflowRequest) -> dialoguer::Result<Option<WorkflowInput>> {
    let theme = ColorfulTheme::default();
    println!();
    println!(
        "{} {}",
        console::style("Moving").bold(),
        console::style(format!(
            "'{}' from {} to {}",
            request.headline, request.from_stage, request.to_stage
        ))
        .cyan()
    );
    println!("{}", console::style(describe(request.workflow)).dim());

    let proceed = Confirm::with_theme(&theme)
        .with_prompt("Continue?")
        .default(true)
        .interact()?;
    if !proceed {
        return Ok(None);
    }

    let input = match request.workflow {
        WorkflowKind::DealConversion => {
            let deal_title: String = Input::with_theme(&theme)
                .with_prompt("Deal title")
                .with_initial_text(default_deal_title(&request.headline))
                .allow_empty(true)
                .interact_text()?;
            let value: String = Input::with_theme(&theme)
                .with_prompt("Deal value")
                .default("0".to_string())
                .interact_text()?;
            let stages: Vec<&str> = DealStage::ALL.iter().map(DealStage::as_str).collect();
            let stage = Select::with_theme(&theme)
                .with_prompt("Pipeline stage")
                .items(&stages)
                .default(0)
                .interact()?;
            WorkflowInput::DealConversion(DealConversionInput {
                deal_title,
                deal_value: parse_amount(&value),
                deal_stage: stages[stage].to_string(),
            })
        }
        WorkflowKind::ResultCapture => {
            let result_text: String = Input::with_theme(&theme)
                .with_prompt("Result")
                .allow_empty(true)
                .interact_text()?;
            let result_type = Select::with_theme(&theme)
                .with_prompt("Result type")
                .items(&RESULT_TYPES)
                .default(0)
                .interact()?;
            let created_by_name: String = Input::with_theme(&theme)
                .with_prompt("Recorded by (optional)")
                .allow_empty(true)
                .interact_text()?;
            WorkflowInput::ResultCapture(ResultCaptureInput {
                result_text,
                result_type: RESULT_TYPES[result_type].to_string(),
                created_by: None,
                created_by_name: non_empty(created_by_name),
            })
        }
    };
    Ok(Some(input))
}

fn describe(workflow: WorkflowKind) -> &'static str {
    match workflow {
        WorkflowKind::DealConversion => "Converting a lead creates a deal first.",
        WorkflowKind::ResultCapture => "Completing a task records its result first.",
    }
}

pub fn default_deal_title(headline: &str) -> String {
    format!("{} deal", headline.trim())
}

/// Parse a typed amount, tolerating currency symbols and thousands
/// separators. Unparsable input becomes NaN so validation rejects it.
pub fn parse_amount(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().unwrap_or(f64::NAN)
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}
