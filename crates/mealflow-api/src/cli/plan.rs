//! Interactive terminal planning: `mealflow plan`.
//!
//! Runs a session in-process, prints its events, and answers each interrupt
//! with a line read from the terminal until the session completes or fails.
//! Closing stdin leaves the session interrupted so it can be resumed later.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};

use mealflow_core::emitter::EventStream;
use mealflow_core::session::{SessionManager, StartRequest};
use mealflow_types::event::WorkflowEvent;
use mealflow_types::interrupt::InterruptPayload;
use mealflow_types::session::SessionId;
use mealflow_types::state::{Ingredient, MealOption};

use crate::cli::PlanArgs;
use crate::state::AppState;

/// How a terminal planning run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    Complete { reminders_added: bool, items: usize },
    Failed { message: String },
    /// Input ran out while the session waited at an interrupt.
    Detached,
}

/// Source of answers to interrupt prompts.
pub trait InputSource {
    /// Next answer, or `None` when no more input is available.
    fn next_input(&mut self, payload: &InterruptPayload) -> impl Future<Output = Result<Option<String>>>;
}

/// Reads answers from the terminal, or from piped stdin when no user is
/// attended.
pub struct TerminalInput {
    lines: Option<tokio::io::Lines<BufReader<tokio::io::Stdin>>>,
}

impl Default for TerminalInput {
    fn default() -> Self {
        let lines = (!console::user_attended()).then(|| BufReader::new(tokio::io::stdin()).lines());
        Self { lines }
    }
}

impl InputSource for TerminalInput {
    async fn next_input(&mut self, _payload: &InterruptPayload) -> Result<Option<String>> {
        if let Some(lines) = self.lines.as_mut() {
            return Ok(lines.next_line().await?);
        }
        let answer = tokio::task::spawn_blocking(|| {
            Input::<String>::new()
                .with_prompt(">")
                .allow_empty(true)
                .interact_text()
        })
        .await
        .context("input task panicked")??;
        Ok(Some(answer))
    }
}

/// `mealflow plan`: start a session and drive it from the terminal.
pub async fn run_plan(state: &AppState, args: PlanArgs, json: bool) -> Result<()> {
    let request = match (args.cuisine, args.url) {
        (_, Some(url)) => StartRequest::url(url),
        (Some(cuisine), None) => StartRequest::cuisine(cuisine, args.sources),
        (None, None) => anyhow::bail!("either --cuisine or --url is required"),
    };

    let (id, events) = state.manager.start(request).await?;
    let mut printer = EventPrinter::new(json);
    let outcome = drive(&state.manager, id, events, &mut TerminalInput::default(), &mut printer).await?;

    if json {
        return Ok(());
    }
    match outcome {
        PlanOutcome::Complete { .. } => {}
        PlanOutcome::Failed { message } => anyhow::bail!("session {id} failed: {message}"),
        PlanOutcome::Detached => {
            println!();
            println!(
                "  {} Session {} is waiting for input. Resume it with {}",
                style("i").blue().bold(),
                style(id).dim(),
                style(format!("POST /api/v1/sessions/{id}/resume")).yellow()
            );
            println!();
        }
    }
    Ok(())
}

/// Print events and answer interrupts until the session leaves the
/// interrupted state or input runs out.
pub async fn drive(
    manager: &SessionManager,
    id: SessionId,
    mut events: EventStream,
    input: &mut impl InputSource,
    printer: &mut EventPrinter,
) -> Result<PlanOutcome> {
    loop {
        let mut pending = None;
        let mut outcome = None;
        while let Some(event) = events.recv().await {
            printer.print(&event)?;
            match event {
                WorkflowEvent::Interrupt(payload) => pending = Some(payload),
                WorkflowEvent::Complete {
                    reminders_added,
                    grocery_list,
                    ..
                } => {
                    outcome = Some(PlanOutcome::Complete {
                        reminders_added,
                        items: grocery_list.len(),
                    })
                }
                WorkflowEvent::Error { message } => outcome = Some(PlanOutcome::Failed { message }),
                _ => {}
            }
        }
        printer.clear();

        if let Some(outcome) = outcome {
            return Ok(outcome);
        }
        let Some(payload) = pending else {
            anyhow::bail!("event stream for session {id} ended without a result");
        };
        let Some(answer) = input.next_input(&payload).await? else {
            return Ok(PlanOutcome::Detached);
        };
        tracing::debug!(session_id = %id, "resuming with terminal input");
        events = manager.resume(&id, answer).await?;
    }
}

/// Renders events as styled text or JSON lines.
pub struct EventPrinter {
    json: bool,
    spinner: Option<ProgressBar>,
}

impl EventPrinter {
    pub fn new(json: bool) -> Self {
        Self { json, spinner: None }
    }

    fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn spin(&mut self, message: &str) {
        let spinner = self.spinner.get_or_insert_with(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(Duration::from_millis(80));
            spinner
        });
        spinner.set_message(message.to_string());
    }

    pub fn print(&mut self, event: &WorkflowEvent) -> Result<()> {
        if self.json {
            let line = serde_json::json!({ "event": event.name(), "data": event.data()? });
            println!("{line}");
            return Ok(());
        }

        if let WorkflowEvent::Status { message, .. } = event {
            self.spin(message);
            return Ok(());
        }
        self.clear();

        match event {
            WorkflowEvent::SessionStart { session_id } => {
                println!();
                println!("  {} {}", style("Session").bold(), style(session_id).dim());
            }
            WorkflowEvent::Status { .. } => {}
            WorkflowEvent::Interrupt(payload) => print_interrupt(payload),
            WorkflowEvent::GroceryList { items } => {
                println!();
                println!("  {}", style("── Grocery list ──").dim());
                print_ingredients(items, false);
            }
            WorkflowEvent::Complete {
                selected_meal,
                reminders_added,
                ..
            } => {
                println!();
                let meal = selected_meal.as_ref().map(|m| m.name.as_str()).unwrap_or("your meal");
                println!("  {} Ready to cook {}", style("✓").green().bold(), style(meal).cyan());
                if *reminders_added {
                    println!("  {} Grocery items added to reminders", style("✓").green());
                }
                println!();
            }
            WorkflowEvent::Error { message } => {
                println!();
                println!("  {} {}", style("✗").red().bold(), message);
                println!();
            }
        }
        Ok(())
    }
}

fn print_interrupt(payload: &InterruptPayload) {
    println!();
    match payload {
        InterruptPayload::MealOptions { options, .. } => print_options(options),
        InterruptPayload::IngredientReview { ingredients, .. } => print_ingredients(ingredients, true),
        InterruptPayload::RemindersPrompt {
            items, existing_lists, ..
        } => {
            println!("  {} item{} to add", style(items.len()).bold(), if items.len() == 1 { "" } else { "s" });
            if existing_lists.is_empty() {
                println!("  {}", style("No reminder lists found").dim());
            }
            for (list, n) in existing_lists.iter().zip(1usize..) {
                println!("  {} {}", style(format!("{n:>2}.")).bold(), list);
            }
        }
        InterruptPayload::Generic { data, .. } => {
            if !data.is_null() {
                println!("  {}", style(data).dim());
            }
        }
    }

    println!();
    println!("  {}", style(payload.prompt()).bold());
    if let Some(instruction) = instruction(payload) {
        println!("  {}", style(instruction).dim());
    }
}

fn instruction(payload: &InterruptPayload) -> Option<&str> {
    match payload {
        InterruptPayload::MealOptions { instruction, .. }
        | InterruptPayload::IngredientReview { instruction, .. }
        | InterruptPayload::RemindersPrompt { instruction, .. } => Some(instruction),
        InterruptPayload::Generic { .. } => None,
    }
}

fn print_options(options: &[MealOption]) {
    for option in options {
        println!(
            "  {} {}",
            style(format!("{:>2}.", option.id)).bold(),
            style(&option.name).cyan()
        );
        if !option.description.is_empty() {
            println!("      {}", option.description);
        }
        let details: Vec<&str> = [option.cook_time.as_deref(), option.servings.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !details.is_empty() {
            println!("      {}", style(details.join(" · ")).dim());
        }
        println!("      {}", style(&option.recipe_url).dim());
    }
}

fn print_ingredients(items: &[Ingredient], numbered: bool) {
    for (item, n) in items.iter().zip(1usize..) {
        let bullet = if numbered { format!("{n:>2}.") } else { " •".to_string() };
        println!("  {} {}", style(bullet).dim(), format_ingredient(item));
    }
}

fn format_ingredient(item: &Ingredient) -> String {
    [item.amount.as_str(), item.unit.as_str(), item.name.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
