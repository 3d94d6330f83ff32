//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                                   |
//! |-----------|----------------------------------------------------|
//! | `project` | `Init`, `Start`, `Types`, `Reset`                  |
//! | `phase`   | `Status`, `Enable`, `Skip`, `Complete`             |
//! | `items`   | `Task`, `Artifact`, `Review`, `Set`                |

pub mod items;
pub mod phase;
pub mod project;

pub use items::{cmd_artifact, cmd_review, cmd_set, cmd_task};
pub use phase::{cmd_complete, cmd_enable, cmd_skip, cmd_status};
pub use project::{cmd_init, cmd_reset, cmd_start, cmd_types};

use std::path::Path;
use std::rc::Rc;

use anyhow::Result;

use usher::project::{load_workflow, TypeRegistry, Workflow};
use usher::prompts::{FilePromptSink, NullPromptSink, PromptSink};
use usher::state::{StateStore, USHER_DIR};
use usher::usher_config::UsherToml;

/// Build the workflow for the project at `project_dir` from its persisted
/// document, honoring the prompt settings in usher.toml.
pub(crate) fn open_workflow(project_dir: &Path) -> Result<(StateStore, Workflow)> {
    let store = StateStore::in_dir(project_dir);
    let usher_dir = project_dir.join(USHER_DIR);
    let config = UsherToml::load_or_default(&usher_dir)?;
    let sink: Rc<dyn PromptSink> = if config.prompts.enabled {
        Rc::new(FilePromptSink::new(usher_dir.join(config.prompt_file())))
    } else {
        Rc::new(NullPromptSink)
    };
    let registry = TypeRegistry::builtin();
    let workflow = load_workflow(&store, &registry, sink)?;
    Ok((store, workflow))
}

/// Write the workflow's document back to disk.
pub(crate) fn persist(store: &StateStore, workflow: &Workflow) -> Result<()> {
    let mut doc = workflow.doc().borrow_mut();
    store.save(&mut doc)?;
    Ok(())
}
