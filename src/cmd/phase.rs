//! Status and phase progression commands.

use anyhow::{Context, Result};
use std::path::Path;
use std::str::FromStr;

use usher::phases::{Event, Phase, PhaseName, State};
use usher::state::{PhaseData, ProjectDoc};

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use usher::state::StateStore;

    println!();
    println!("Usher Project Status");
    println!("====================");
    println!();

    let store = StateStore::in_dir(project_dir);
    if !store.exists() {
        println!("Project: Not initialized");
        println!();
        println!("Run 'usher init' to initialize the project.");
        println!();
        return Ok(());
    }

    let (_, workflow) = super::open_workflow(project_dir)?;
    let doc = workflow.doc().borrow();

    let name = doc.name.as_deref().unwrap_or("(unnamed)");
    println!("Project: {} [{}]", name, &doc.id.to_string()[..8]);
    println!("Type:    {}", workflow.type_name());
    println!("State:   {}", workflow.state());
    if let Some(active) = workflow.active_phase() {
        println!("Phase:   {active}");
    }
    println!();

    println!("  {:<16} {:<10} Notes", "Phase", "Status");
    println!("  {:<16} {:<10} -----", "----------------", "----------");
    for phase in workflow.phases() {
        let marker = if Some(phase.name()) == workflow.active_phase() {
            "*"
        } else {
            " "
        };
        let (status, notes) = match doc.phase(phase.name()) {
            Some(data) => (data.status.to_string(), phase_notes(phase, data)),
            None => ("pending".to_string(), String::new()),
        };
        println!("{marker} {:<16} {:<10} {notes}", phase.name().as_str(), status);
    }

    println!();
    let permitted = workflow.permitted_events();
    if permitted.is_empty() {
        println!("Next: {}", blocked_hint(workflow.state(), &doc));
    } else {
        println!("Available actions:");
        for event in permitted {
            println!("  {:<28} ({event})", event_hint(event));
        }
    }
    println!();

    Ok(())
}

pub fn cmd_enable(project_dir: &Path, phase: &str) -> Result<()> {
    let name = PhaseName::from_str(phase)?;
    let (store, mut workflow) = super::open_workflow(project_dir)?;
    workflow.phase(name)?;

    let Some(event) = name.enable_event() else {
        anyhow::bail!("Phase '{name}' is not optional; it cannot be enabled or skipped");
    };

    workflow
        .fire(event)
        .with_context(|| format!("Cannot enable '{name}'"))?;
    super::persist(&store, &workflow)?;

    println!("Enabled '{name}'");
    println!("State: {}", workflow.state());

    Ok(())
}

pub fn cmd_skip(project_dir: &Path, phase: &str) -> Result<()> {
    let name = PhaseName::from_str(phase)?;
    let (store, mut workflow) = super::open_workflow(project_dir)?;
    workflow.phase(name)?;

    let Some(event) = name.skip_event() else {
        anyhow::bail!("Phase '{name}' is not optional; it cannot be enabled or skipped");
    };

    workflow
        .fire(event)
        .with_context(|| format!("Cannot skip '{name}'"))?;
    super::persist(&store, &workflow)?;

    println!("Skipped '{name}'");
    println!("State: {}", workflow.state());

    Ok(())
}

pub fn cmd_complete(project_dir: &Path) -> Result<()> {
    let (store, mut workflow) = super::open_workflow(project_dir)?;
    let state = workflow.state();

    let Some(event) = state.advance_event() else {
        match state.phase() {
            Some(phase) => anyhow::bail!(
                "Phase '{phase}' awaits a decision. Run 'usher enable {phase}' or 'usher skip {phase}'."
            ),
            None => anyhow::bail!("No project in flight. Run 'usher start <name>' first."),
        }
    };

    if !workflow.can_fire(event) {
        let doc = workflow.doc().borrow();
        let phase = state.phase().map(|name| name.to_string()).unwrap_or_default();
        anyhow::bail!(
            "Cannot complete '{phase}' yet. {}",
            blocked_hint(state, &doc)
        );
    }

    let landed = workflow.fire(event)?;
    super::persist(&store, &workflow)?;

    if landed == State::NoProject {
        println!("Project complete. All phases done.");
    } else {
        println!("Advanced to '{landed}'");
    }

    Ok(())
}

/// One-line progress summary for a phase's status row.
fn phase_notes(phase: &Phase, data: &PhaseData) -> String {
    let meta = phase.meta();
    let mut notes = Vec::new();
    if meta.supports_tasks && !data.tasks.is_empty() {
        notes.push(format!(
            "tasks {}/{}",
            data.done_task_count(),
            data.tasks.len()
        ));
    }
    if meta.supports_artifacts && !data.artifacts.is_empty() {
        let approved = data.artifacts.len() - data.unapproved_count();
        notes.push(format!(
            "artifacts {}/{} approved",
            approved,
            data.artifacts.len()
        ));
    }
    if let Some(report) = data.latest_report() {
        notes.push(format!("last review {}", report.assessment));
    }
    for def in meta.custom_fields {
        let value = data
            .field(def.key)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unset".to_string());
        notes.push(format!("{} {}", def.key, value));
    }
    notes.join(", ")
}

/// What blocks the forward event in an active state, phrased as the
/// command that unblocks it.
fn blocked_hint(state: State, doc: &ProjectDoc) -> String {
    let data = state.phase().and_then(|name| doc.phase(name));
    match state {
        State::DiscoveryActive | State::DesignActive => match data {
            Some(d) if !d.artifacts.is_empty() => format!(
                "Artifacts awaiting approval: {} ('usher artifact approve <path>')",
                d.unapproved_count()
            ),
            _ => "Add at least one artifact ('usher artifact add <path>')".to_string(),
        },
        State::ImplementationPlanning => {
            "Add at least one task ('usher task add <name>')".to_string()
        }
        State::ImplementationExecuting => match data {
            Some(d) if !d.tasks.is_empty() => format!(
                "Tasks still pending: {} ('usher task done <id>')",
                d.tasks.len() - d.done_task_count()
            ),
            _ => "Add at least one task ('usher task add <name>')".to_string(),
        },
        State::ReviewActive => match data.and_then(|d| d.latest_report()) {
            Some(report) if !report.passed() => {
                "Latest review failed; reopen implementation ('usher review reopen') or record a new result"
                    .to_string()
            }
            _ => "Record a review result ('usher review record pass|fail')".to_string(),
        },
        State::FinalizeDocumentation => {
            "Confirm documentation is updated ('usher set docs_updated true')".to_string()
        }
        State::FinalizeChecks => {
            "Confirm checks are green ('usher set checks_green true')".to_string()
        }
        State::FinalizeDeletion => {
            "Confirm scratch work is deleted ('usher set scratch_deleted true')".to_string()
        }
        State::NoProject
        | State::DiscoveryDecision
        | State::DesignDecision
        | State::ReviewDecision => "No forward event from this state".to_string(),
    }
}

/// The CLI invocation that fires `event`.
fn event_hint(event: Event) -> &'static str {
    match event {
        Event::StartProject => "usher start <name>",
        Event::EnableDiscovery => "usher enable discovery",
        Event::SkipDiscovery => "usher skip discovery",
        Event::EnableDesign => "usher enable design",
        Event::SkipDesign => "usher skip design",
        Event::EnableReview => "usher enable review",
        Event::SkipReview => "usher skip review",
        Event::ReviewFail => "usher review reopen",
        _ => "usher complete",
    }
}
