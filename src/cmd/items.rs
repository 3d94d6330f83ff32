//! Item commands: tasks, artifacts, review reports, checklist fields.
//!
//! Every command here resolves against the active phase and refuses
//! verbs the phase's metadata does not support. Mutations go through
//! the shared document and are persisted before any output.

use anyhow::Result;
use std::path::Path;
use std::str::FromStr;

use usher::phases::{Event, FieldKind, PhaseName, State};
use usher::project::Workflow;
use usher::state::{FieldValue, ReviewAssessment};

use super::super::{ArtifactCommands, ReviewCommands, TaskCommands};

pub fn cmd_task(project_dir: &Path, command: &TaskCommands) -> Result<()> {
    let (store, workflow) = super::open_workflow(project_dir)?;
    let phase_name = require_active_phase(&workflow)?;
    let meta = *workflow.phase(phase_name)?.meta();
    if !meta.supports_tasks {
        anyhow::bail!("Phase '{phase_name}' does not track tasks");
    }

    match command {
        TaskCommands::Add { name } => {
            let task_name = name.join(" ");
            let id = workflow
                .doc()
                .borrow_mut()
                .phase_mut(phase_name)
                .add_task(&task_name);
            super::persist(&store, &workflow)?;
            println!("Added task {id}: {task_name}");
            if workflow.state() == State::ImplementationPlanning {
                println!("Run 'usher complete' when the plan is ready to execute.");
            }
        }
        TaskCommands::Done { id } => {
            let completed = workflow
                .doc()
                .borrow_mut()
                .phase_mut(phase_name)
                .complete_task(*id);
            if !completed {
                anyhow::bail!("No task with id {id} in phase '{phase_name}'");
            }
            super::persist(&store, &workflow)?;
            println!("Task {id} done");
            if let Some(event) = workflow.state().advance_event()
                && workflow.can_fire(event)
            {
                println!("All tasks done. Run 'usher complete' to close out implementation.");
            }
        }
        TaskCommands::List => {
            let doc = workflow.doc().borrow();
            match doc.phase(phase_name) {
                Some(data) if !data.tasks.is_empty() => {
                    println!();
                    for task in &data.tasks {
                        let mark = if task.is_done() { "x" } else { " " };
                        println!("  [{mark}] {:>3}  {}", task.id, task.name);
                    }
                    println!();
                    println!("{}/{} done", data.done_task_count(), data.tasks.len());
                }
                _ => println!("No tasks yet. Add one with 'usher task add <name>'."),
            }
        }
    }

    Ok(())
}

pub fn cmd_artifact(project_dir: &Path, command: &ArtifactCommands) -> Result<()> {
    let (store, workflow) = super::open_workflow(project_dir)?;
    let phase_name = require_active_phase(&workflow)?;
    let meta = *workflow.phase(phase_name)?.meta();
    if !meta.supports_artifacts {
        anyhow::bail!("Phase '{phase_name}' does not track artifacts");
    }

    match command {
        ArtifactCommands::Add { path } => {
            let added = workflow
                .doc()
                .borrow_mut()
                .phase_mut(phase_name)
                .add_artifact(path);
            if !added {
                anyhow::bail!("Artifact '{path}' is already recorded in phase '{phase_name}'");
            }
            super::persist(&store, &workflow)?;
            println!("Added artifact '{path}' (awaiting approval)");
        }
        ArtifactCommands::Approve { path } => {
            let approved = workflow
                .doc()
                .borrow_mut()
                .phase_mut(phase_name)
                .approve_artifact(path);
            if !approved {
                anyhow::bail!("No artifact '{path}' in phase '{phase_name}'");
            }
            super::persist(&store, &workflow)?;
            println!("Approved '{path}'");
            if let Some(event) = workflow.state().advance_event()
                && workflow.can_fire(event)
            {
                println!("All artifacts approved. Run 'usher complete' to close out {phase_name}.");
            }
        }
        ArtifactCommands::List => {
            let doc = workflow.doc().borrow();
            match doc.phase(phase_name) {
                Some(data) if !data.artifacts.is_empty() => {
                    println!();
                    for artifact in &data.artifacts {
                        let mark = if artifact.approved { "a" } else { " " };
                        println!("  [{mark}] {}", artifact.path);
                    }
                    println!();
                    let approved = data.artifacts.len() - data.unapproved_count();
                    println!("{}/{} approved", approved, data.artifacts.len());
                }
                _ => println!("No artifacts yet. Add one with 'usher artifact add <path>'."),
            }
        }
    }

    Ok(())
}

pub fn cmd_review(project_dir: &Path, command: &ReviewCommands) -> Result<()> {
    let (store, mut workflow) = super::open_workflow(project_dir)?;

    match command {
        ReviewCommands::Record {
            assessment,
            summary,
        } => {
            let assessment = ReviewAssessment::from_str(assessment)?;
            if workflow.state() != State::ReviewActive {
                anyhow::bail!(
                    "Review results can only be recorded while a review is active (state '{}')",
                    workflow.state()
                );
            }
            workflow
                .doc()
                .borrow_mut()
                .phase_mut(PhaseName::Review)
                .record_report(assessment, summary.clone());
            super::persist(&store, &workflow)?;
            println!("Recorded review: {assessment}");
            match assessment {
                ReviewAssessment::Pass => println!("Run 'usher complete' to close out review."),
                ReviewAssessment::Fail => {
                    println!("Run 'usher review reopen' to send the work back to implementation.")
                }
            }
        }
        ReviewCommands::Reopen => {
            if !workflow.can_fire(Event::ReviewFail) {
                if workflow.state() != State::ReviewActive {
                    anyhow::bail!("No review in flight (state '{}')", workflow.state());
                }
                anyhow::bail!(
                    "Reopening requires a failed review on record. Record one with 'usher review record fail'."
                );
            }
            workflow.fire(Event::ReviewFail)?;
            super::persist(&store, &workflow)?;
            println!("Implementation reopened");
            println!("State: {}", workflow.state());
        }
    }

    Ok(())
}

pub fn cmd_set(project_dir: &Path, field: &str, value: &str) -> Result<()> {
    let (store, workflow) = super::open_workflow(project_dir)?;
    let phase_name = require_active_phase(&workflow)?;
    let meta = *workflow.phase(phase_name)?.meta();

    let Some(def) = meta.field(field) else {
        if meta.custom_fields.is_empty() {
            anyhow::bail!("Phase '{phase_name}' has no settable fields");
        }
        let known = meta
            .custom_fields
            .iter()
            .map(|def| def.key)
            .collect::<Vec<_>>()
            .join(", ");
        anyhow::bail!("Unknown field '{field}' for phase '{phase_name}'. Valid fields: {known}");
    };

    let parsed = match def.kind {
        FieldKind::Bool => {
            let flag: bool = value.parse().map_err(|_| {
                anyhow::anyhow!("Invalid value '{value}' for '{field}'; expected true or false")
            })?;
            FieldValue::Bool(flag)
        }
        FieldKind::Text => FieldValue::Text(value.to_string()),
    };

    workflow
        .doc()
        .borrow_mut()
        .phase_mut(phase_name)
        .set_field(field, parsed);
    super::persist(&store, &workflow)?;

    println!("Set {field} = {value}");
    if let Some(event) = workflow.state().advance_event()
        && workflow.can_fire(event)
    {
        println!("Run 'usher complete' to advance.");
    }

    Ok(())
}

fn require_active_phase(workflow: &Workflow) -> Result<PhaseName> {
    workflow.active_phase().ok_or_else(|| {
        anyhow::anyhow!("No phase is active. Run 'usher start <name>' to begin a project.")
    })
}
