//! Guidance prompts rendered on state entry.
//!
//! Every workflow state (except idle) has a template describing what to
//! do there and which commands move the workflow on. Templates are
//! rendered against the live project document when the state is entered
//! and handed to a [`PromptSink`]. The default sink writes one markdown
//! file under `.usher/`, always reflecting the current state; a null
//! sink exists for contexts that want silent transitions.
//!
//! Rendering happens inside an entry action, so a sink failure fails the
//! fire and rolls the transition back.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;

use crate::machine::StateMachine;
use crate::phases::State;
use crate::state::{PhaseData, ProjectDoc, SharedDoc};

/// Prompt file name within the `.usher` directory.
pub const PROMPT_FILE: &str = "prompt.md";

/// Destination for rendered prompts.
pub trait PromptSink {
    fn render(&self, prompt: &RenderedPrompt) -> anyhow::Result<()>;
}

/// A template after placeholder expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub state: State,
    pub title: String,
    pub body: String,
}

/// A static guidance template bound to one state. Bodies may use
/// `{project}`, `{tasks}`, and `{artifacts}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub state: State,
    pub title: &'static str,
    pub body: &'static str,
}

/// The template catalog one workflow renders from. Project types start
/// from the built-in catalog and may override individual states.
pub struct PromptSet {
    templates: Vec<PromptTemplate>,
}

impl PromptSet {
    /// Catalog covering every non-idle state of the built-in vocabulary.
    pub fn builtin() -> Self {
        Self {
            templates: vec![
                PromptTemplate {
                    state: State::DiscoveryDecision,
                    title: "Discovery decision",
                    body: "Project: {project}\n\nDecide whether this project needs an up-front \
                           discovery pass.\n\n- Enable it when requirements or constraints are \
                           unclear: `usher enable discovery`\n- Skip it when the change is already \
                           well understood: `usher skip discovery`",
                },
                PromptTemplate {
                    state: State::DiscoveryActive,
                    title: "Discovery",
                    body: "Project: {project}\n\nInvestigate and write the findings down. Record \
                           each produced document with `usher artifact add <path>` and approve \
                           reviewed ones with `usher artifact approve <path>`.\n\nArtifacts so \
                           far:\n{artifacts}\n\nWhen every artifact is approved, run `usher \
                           complete`.",
                },
                PromptTemplate {
                    state: State::DesignDecision,
                    title: "Design decision",
                    body: "Project: {project}\n\nDecide whether this project needs a written \
                           design.\n\n- Enable it for changes that touch interfaces or data \
                           shapes: `usher enable design`\n- Skip it for self-contained work: \
                           `usher skip design`",
                },
                PromptTemplate {
                    state: State::DesignActive,
                    title: "Design",
                    body: "Project: {project}\n\nWrite the design down. Record each document with \
                           `usher artifact add <path>` and approve reviewed ones with `usher \
                           artifact approve <path>`.\n\nArtifacts so far:\n{artifacts}\n\nWhen \
                           every artifact is approved, run `usher complete`.",
                },
                PromptTemplate {
                    state: State::ImplementationPlanning,
                    title: "Implementation planning",
                    body: "Project: {project}\n\nBreak the work into tasks with `usher task add \
                           <name>`.\n\nTasks so far:\n{tasks}\n\nWhen the plan is ready, run \
                           `usher complete` to begin execution.",
                },
                PromptTemplate {
                    state: State::ImplementationExecuting,
                    title: "Implementation",
                    body: "Project: {project}\n\nWork the task list. Mark each finished task with \
                           `usher task done <id>`.\n\nTasks:\n{tasks}\n\nWhen every task is done, \
                           run `usher complete`.",
                },
                PromptTemplate {
                    state: State::ReviewDecision,
                    title: "Review decision",
                    body: "Project: {project}\n\nDecide whether this project needs a review \
                           round.\n\n- Enable it: `usher enable review`\n- Skip it: `usher skip \
                           review`",
                },
                PromptTemplate {
                    state: State::ReviewActive,
                    title: "Review",
                    body: "Project: {project}\n\nReview the implementation and record the outcome \
                           with `usher review record pass` or `usher review record fail --summary \
                           <why>`.\n\nA passing review moves on via `usher complete`. A failing \
                           one reopens implementation via `usher review reopen`.",
                },
                PromptTemplate {
                    state: State::FinalizeDocumentation,
                    title: "Finalize: documentation",
                    body: "Project: {project}\n\nBring the project documentation up to date. Then \
                           run `usher set docs_updated true` and `usher complete`.",
                },
                PromptTemplate {
                    state: State::FinalizeChecks,
                    title: "Finalize: checks",
                    body: "Project: {project}\n\nRun the verification checks. When they are \
                           green, run `usher set checks_green true` and `usher complete`.",
                },
                PromptTemplate {
                    state: State::FinalizeDeletion,
                    title: "Finalize: cleanup",
                    body: "Project: {project}\n\nDelete scratch files and working notes. Then run \
                           `usher set scratch_deleted true` and `usher complete` to finish the \
                           project.",
                },
            ],
        }
    }

    pub fn templates(&self) -> &[PromptTemplate] {
        &self.templates
    }

    pub fn get(&self, state: State) -> Option<&PromptTemplate> {
        self.templates.iter().find(|t| t.state == state)
    }

    /// Replace the template for `template.state`, or add it when that
    /// state had none.
    pub fn with_override(mut self, template: PromptTemplate) -> Self {
        match self.templates.iter_mut().find(|t| t.state == template.state) {
            Some(slot) => *slot = template,
            None => self.templates.push(template),
        }
        self
    }
}

/// Expand a template against the current document.
pub fn render(template: &PromptTemplate, doc: &ProjectDoc) -> RenderedPrompt {
    let slice = template.state.phase().and_then(|name| doc.phase(name));
    let project = doc.name.as_deref().unwrap_or("unnamed project");
    let body = template
        .body
        .replace("{project}", project)
        .replace("{tasks}", &format_tasks(slice))
        .replace("{artifacts}", &format_artifacts(slice));
    RenderedPrompt {
        state: template.state,
        title: template.title.to_string(),
        body,
    }
}

fn format_tasks(slice: Option<&PhaseData>) -> String {
    let tasks = match slice {
        Some(slice) if !slice.tasks.is_empty() => &slice.tasks,
        _ => return "(none yet)".to_string(),
    };
    tasks
        .iter()
        .map(|task| {
            let mark = if task.is_done() { "x" } else { " " };
            format!("- [{mark}] {}. {}", task.id, task.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_artifacts(slice: Option<&PhaseData>) -> String {
    let artifacts = match slice {
        Some(slice) if !slice.artifacts.is_empty() => &slice.artifacts,
        _ => return "(none yet)".to_string(),
    };
    artifacts
        .iter()
        .map(|artifact| {
            let status = if artifact.approved { "approved" } else { "pending" };
            format!("- {} ({status})", artifact.path)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Register an entry action on every templated state that renders the
/// template and hands it to `sink`.
pub fn attach_prompts(
    machine: &mut StateMachine,
    set: &PromptSet,
    doc: &SharedDoc,
    sink: Rc<dyn PromptSink>,
) {
    for template in set.templates() {
        let template = *template;
        let doc = doc.clone();
        let sink = sink.clone();
        machine.configure(template.state).on_entry(move || {
            let rendered = render(&template, &doc.borrow());
            sink.render(&rendered)
        });
    }
}

/// Sink that overwrites a single markdown file on every render, so the
/// file always describes the current state.
pub struct FilePromptSink {
    path: PathBuf,
}

impl FilePromptSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(usher_dir: &Path) -> Self {
        Self {
            path: usher_dir.join(PROMPT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PromptSink for FilePromptSink {
    fn render(&self, prompt: &RenderedPrompt) -> anyhow::Result<()> {
        let content = format!("# {}\n\n{}\n", prompt.title, prompt.body);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write prompt file at {}", self.path.display()))?;
        tracing::debug!("wrote prompt for '{}' to {}", prompt.state, self.path.display());
        Ok(())
    }
}

/// Sink that drops every prompt. Used by commands that only mutate data
/// and by tests that do not care about guidance output.
pub struct NullPromptSink;

impl PromptSink for NullPromptSink {
    fn render(&self, _prompt: &RenderedPrompt) -> anyhow::Result<()> {
        Ok(())
    }
}
