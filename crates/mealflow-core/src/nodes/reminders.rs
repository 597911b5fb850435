//! Writing the reviewed grocery list to a reminders list.

use std::sync::Arc;

use mealflow_types::error::CollaboratorError;
use mealflow_types::interrupt::InterruptPayload;
use mealflow_types::state::{Ingredient, WorkflowState};
use mealflow_types::update::StateUpdate;

use super::ADD_TO_REMINDERS;
use crate::collaborators::ReminderListClient;
use crate::collate::{self, CONFLICT_MARKER, CollatedLine};
use crate::node::{Node, NodeOutcome};

/// How the user answered the reminders prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChoice {
    Skip,
    List(String),
}

impl ListChoice {
    /// `skip`/`no`/`cancel`/empty skip; a number picks an existing list
    /// (out of range numbers become a literal list name); any other text
    /// names a list.
    pub fn parse(input: &str, existing: &[String]) -> Self {
        let input = input.trim();
        if matches!(input.to_lowercase().as_str(), "" | "skip" | "no" | "cancel") {
            return Self::Skip;
        }
        if let Ok(n) = input.parse::<usize>() {
            if let Some(name) = n.checked_sub(1).and_then(|i| existing.get(i)) {
                return Self::List(name.clone());
            }
        }
        Self::List(input.to_string())
    }
}

/// Writes planned for one list.
#[derive(Debug, Default, PartialEq, Eq)]
struct ListChanges {
    remove: Vec<String>,
    add: Vec<String>,
}

impl ListChanges {
    /// Collate the grocery list into the list's current items.
    fn plan(existing: &[String], groceries: &[Ingredient]) -> Self {
        let known: Vec<Ingredient> = existing.iter().map(|t| collate::parse_reminder_text(t)).collect();
        let mut changes = Self::default();
        for line in collate::collate(&known, groceries) {
            if line.is_updated_known() {
                changes.remove.extend(line.known.iter().map(|&i| existing[i].clone()));
                changes.add.push(reminder_text(&line));
            } else if line.is_new() {
                changes.add.push(reminder_text(&line));
            }
        }
        changes
    }

    fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

fn reminder_text(line: &CollatedLine) -> String {
    let text = collate::format_reminder_text(&line.ingredient);
    if line.conflict {
        format!("{text} {CONFLICT_MARKER}")
    } else {
        text
    }
}

pub struct AddToReminders<R> {
    reminders: Arc<R>,
}

impl<R> AddToReminders<R> {
    pub fn new(reminders: Arc<R>) -> Self {
        Self { reminders }
    }
}

impl<R: ReminderListClient> AddToReminders<R> {
    async fn existing_lists(&self) -> Vec<String> {
        self.reminders.lists().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read reminder lists");
            Vec::new()
        })
    }

    /// Create `list` if needed and write the collated groceries to it.
    async fn write(&self, list: &str, exists: bool, groceries: &[Ingredient]) -> Result<(), CollaboratorError> {
        let current = if exists {
            self.reminders.items(list).await.unwrap_or_else(|e| {
                tracing::warn!(list, error = %e, "could not read list items, adding without collation");
                Vec::new()
            })
        } else {
            self.reminders.create_list(list).await?;
            tracing::info!(list, "created reminders list");
            Vec::new()
        };

        let changes = ListChanges::plan(&current, groceries);
        if changes.is_empty() {
            return Ok(());
        }
        if !changes.remove.is_empty() {
            self.reminders.remove_items(list, &changes.remove).await?;
        }
        let mut failed = 0;
        for text in &changes.add {
            if let Err(e) = self.reminders.add_item(list, text).await {
                tracing::warn!(list, item = %text, error = %e, "could not add reminder");
                failed += 1;
            }
        }
        tracing::info!(
            list,
            added = changes.add.len() - failed,
            replaced = changes.remove.len(),
            failed,
            "reminders written"
        );
        if failed > 0 {
            return Err(CollaboratorError::Unavailable(format!(
                "{failed} of {} reminders could not be added",
                changes.add.len()
            )));
        }
        Ok(())
    }
}

impl<R: ReminderListClient> Node for AddToReminders<R> {
    fn name(&self) -> &str {
        ADD_TO_REMINDERS
    }

    fn is_interrupt(&self) -> bool {
        true
    }

    fn status_message(&self) -> Option<&str> {
        Some("Adding items to reminders...")
    }

    fn reads(&self) -> &'static [&'static str] {
        &["grocery_list"]
    }

    fn writes(&self) -> &'static [&'static str] {
        &["reminders_added"]
    }

    async fn run(&self, state: &WorkflowState, resume: Option<&str>) -> NodeOutcome {
        let groceries = state.grocery_list();
        if groceries.is_empty() {
            return NodeOutcome::Update(StateUpdate::new().reminders_added(false));
        }

        let lists = self.existing_lists().await;
        let Some(input) = resume else {
            let mut prompt = String::from("Add these items to a reminders list?");
            for (i, name) in lists.iter().enumerate() {
                prompt.push_str(&format!("\n{}. {name}", i + 1));
            }
            return NodeOutcome::Interrupt(InterruptPayload::RemindersPrompt {
                items: groceries.to_vec(),
                existing_lists: lists,
                prompt,
                instruction: "Enter list number, new list name, or 'skip'".into(),
            });
        };

        let list = match ListChoice::parse(input, &lists) {
            ListChoice::Skip => return NodeOutcome::Update(StateUpdate::new().reminders_added(false)),
            ListChoice::List(list) => list,
        };
        let exists = lists.contains(&list);
        let added = match self.write(&list, exists, groceries).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(list = %list, error = %e, "adding to reminders failed");
                false
            }
        };
        NodeOutcome::Update(StateUpdate::new().reminders_added(added))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockReminders;
    use mealflow_types::update::Patch;

    fn state(items: Vec<Ingredient>) -> WorkflowState {
        WorkflowState {
            grocery_list: Some(items),
            ..WorkflowState::default()
        }
    }

    fn added(outcome: NodeOutcome) -> bool {
        match outcome {
            NodeOutcome::Update(StateUpdate {
                reminders_added: Patch::Set(added),
                ..
            }) => added,
            other => panic!("expected reminders_added, got {other:?}"),
        }
    }

    #[test]
    fn list_choice_parsing() {
        let lists = vec!["Groceries".to_string(), "Costco".to_string()];
        assert_eq!(ListChoice::parse(" Skip ", &lists), ListChoice::Skip);
        assert_eq!(ListChoice::parse("", &lists), ListChoice::Skip);
        assert_eq!(ListChoice::parse("2", &lists), ListChoice::List("Costco".into()));
        assert_eq!(ListChoice::parse("7", &lists), ListChoice::List("7".into()));
        assert_eq!(ListChoice::parse("0", &lists), ListChoice::List("0".into()));
        assert_eq!(ListChoice::parse("Weekend", &lists), ListChoice::List("Weekend".into()));
    }

    #[test]
    fn plan_merges_into_existing_items() {
        let existing = vec!["garlic (2 cloves)".to_string(), "milk (1 l)".to_string()];
        let groceries = vec![
            Ingredient::new("Garlic", "1", "cloves"),
            Ingredient::new("basil", "1", "bunch"),
            Ingredient::new("milk", "2", "cups"),
        ];
        let changes = ListChanges::plan(&existing, &groceries);
        assert_eq!(changes.remove, ["garlic (2 cloves)"]);
        assert_eq!(
            changes.add,
            [
                "garlic (3 cloves)".to_string(),
                "milk (2 cups) [check units]".to_string(),
                "basil (1 bunch)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn prompts_with_existing_lists() {
        let node = AddToReminders::new(Arc::new(MockReminders::new().with_list("Groceries", &[])));
        let outcome = node.run(&state(vec![Ingredient::new("salt", "1", "tsp")]), None).await;
        let NodeOutcome::Interrupt(InterruptPayload::RemindersPrompt { existing_lists, items, .. }) = outcome else {
            panic!("expected reminders prompt");
        };
        assert_eq!(existing_lists, ["Groceries"]);
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn empty_list_skips_prompt() {
        let node = AddToReminders::new(Arc::new(MockReminders::new()));
        assert!(!added(node.run(&state(vec![]), None).await));
    }

    #[tokio::test]
    async fn skip_writes_nothing() {
        let reminders = Arc::new(MockReminders::new().with_list("Groceries", &[]));
        let node = AddToReminders::new(Arc::clone(&reminders));
        let outcome = node.run(&state(vec![Ingredient::new("salt", "1", "tsp")]), Some("skip")).await;
        assert!(!added(outcome));
        assert_eq!(reminders.list_items("Groceries"), Some(vec![]));
    }

    #[tokio::test]
    async fn numbered_choice_collates_into_existing_list() {
        let reminders = Arc::new(MockReminders::new().with_list("Groceries", &["garlic (2 cloves)"]));
        let node = AddToReminders::new(Arc::clone(&reminders));
        let groceries = vec![Ingredient::new("garlic", "1", "cloves"), Ingredient::new("salt", "1", "tsp")];

        assert!(added(node.run(&state(groceries), Some("1")).await));
        assert_eq!(
            reminders.list_items("Groceries"),
            Some(vec!["garlic (3 cloves)".to_string(), "salt (1 tsp)".to_string()])
        );
    }

    #[tokio::test]
    async fn new_list_is_created() {
        let reminders = Arc::new(MockReminders::new());
        let node = AddToReminders::new(Arc::clone(&reminders));
        assert!(added(node.run(&state(vec![Ingredient::new("salt", "1", "tsp")]), Some("Weekend")).await));
        assert_eq!(reminders.list_items("Weekend"), Some(vec!["salt (1 tsp)".to_string()]));
    }

    #[tokio::test]
    async fn failed_creation_reports_false() {
        let node = AddToReminders::new(Arc::new(MockReminders::new().read_only()));
        let outcome = node.run(&state(vec![Ingredient::new("salt", "1", "tsp")]), Some("Weekend")).await;
        assert!(!added(outcome));
    }
}
