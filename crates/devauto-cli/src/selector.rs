//! Interactive task selector for `devauto run`

use anyhow::{bail, Result};
use devauto_config::{AutomationManifest, Trigger};
use dialoguer::{theme::ColorfulTheme, MultiSelect};
use std::io::IsTerminal;

/// Label shown for a task in the picker
fn item_label(id: &str, manifest: &AutomationManifest) -> String {
    match manifest.task(id) {
        Some(task) => match task.name.as_deref() {
            Some(name) if name != id => format!("{} - {}", id, name),
            _ => id.to_string(),
        },
        None => id.to_string(),
    }
}

/// Ids offered by the picker: manual tasks first, then the rest
fn candidates(manifest: &AutomationManifest) -> Vec<&str> {
    let (mut manual, rest): (Vec<_>, Vec<_>) = manifest
        .tasks
        .iter()
        .partition(|(_, task)| task.has_trigger(&Trigger::Manual));
    manual.extend(rest);
    manual.into_iter().map(|(id, _)| id.as_str()).collect()
}

/// Let the user pick one or more tasks
pub fn select_tasks(manifest: &AutomationManifest, prompt: &str) -> Result<Vec<String>> {
    let ids = candidates(manifest);
    if ids.is_empty() {
        bail!("No tasks defined in the automation manifest");
    }

    if !std::io::stdin().is_terminal() {
        bail!("No task specified. Available tasks: {}", ids.join(", "));
    }

    let items: Vec<String> = ids.iter().map(|id| item_label(id, manifest)).collect();
    let chosen = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .interact()?;

    if chosen.is_empty() {
        bail!("No task selected");
    }
    Ok(chosen.into_iter().map(|i| ids[i].to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devauto_config::TaskSpec;

    fn manifest() -> AutomationManifest {
        let mut m = AutomationManifest::default();
        m.tasks.insert(
            "install-dependencies".into(),
            TaskSpec {
                name: Some("Install dependencies".into()),
                command: "go mod download".into(),
                triggered_by: vec![Trigger::PostDevcontainerStart],
                ..Default::default()
            },
        );
        m.tasks.insert(
            "test".into(),
            TaskSpec {
                name: Some("test".into()),
                command: "go test ./...".into(),
                triggered_by: vec![Trigger::Manual],
                ..Default::default()
            },
        );
        m
    }

    #[test]
    fn test_manual_tasks_listed_first() {
        let m = manifest();
        assert_eq!(candidates(&m), vec!["test", "install-dependencies"]);
    }

    #[test]
    fn test_item_label() {
        let m = manifest();
        assert_eq!(
            item_label("install-dependencies", &m),
            "install-dependencies - Install dependencies"
        );
        assert_eq!(item_label("test", &m), "test");
    }
}
