//! Project types: named phase compositions.
//!
//! | Module     | Purpose                                            |
//! |------------|----------------------------------------------------|
//! | `types`    | The built-in project types (standard, hotfix)      |
//! | `workflow` | A built machine bound to its document              |
//!
//! A [`ProjectType`] declares an ordered phase list plus any exceptional
//! transitions a plain chain cannot express, and builds a [`Workflow`]
//! from a loaded document. The [`TypeRegistry`] maps the persisted
//! discriminator back to a type; it is passed into the loader explicitly
//! rather than living in a global table.

pub mod types;
mod workflow;

use std::collections::BTreeMap;
use std::rc::Rc;

pub use types::{HotfixProject, StandardProject};
pub use workflow::Workflow;

use crate::errors::WorkflowError;
use crate::machine::StateMachine;
use crate::phases::{build_phase_chain, Event, Phase, PhaseMeta, PhaseName, State};
use crate::prompts::{attach_prompts, PromptSet, PromptSink};
use crate::state::{shared, SharedDoc, StateStore};

/// A named workflow composition. Implementations declare what phases run
/// and in what order; the default `build` turns that declaration into a
/// live machine bound to one document.
pub trait ProjectType {
    /// Stable discriminator persisted alongside the project document.
    fn type_name(&self) -> &'static str;

    /// Fresh phase instances in chain order. Called once per build;
    /// phases are not shared between workflows.
    fn phase_list(&self) -> Vec<Phase>;

    /// Layer transitions a plain forward chain cannot express, looking
    /// up wiring points in the composed phase map. The default wires
    /// nothing.
    fn wire_exceptions(
        &self,
        _machine: &mut StateMachine,
        _phases: &BTreeMap<PhaseName, Phase>,
        _doc: &SharedDoc,
    ) -> Result<(), WorkflowError> {
        Ok(())
    }

    /// Guidance templates for this type. Defaults to the built-in
    /// catalog.
    fn prompt_set(&self) -> PromptSet {
        PromptSet::builtin()
    }

    /// Phase metadata without constructing a machine, for answering
    /// "what operations exist" before any project is loaded.
    fn phases(&self) -> Vec<(PhaseName, PhaseMeta)> {
        self.phase_list()
            .iter()
            .map(|phase| (phase.name(), *phase.meta()))
            .collect()
    }

    /// Compose the machine for `doc` and bind them into a workflow. The
    /// machine starts at the document's stored state, so a freshly built
    /// workflow with zero fires reads back exactly what was persisted.
    fn build(&self, doc: SharedDoc, sink: Rc<dyn PromptSink>) -> Result<Workflow, WorkflowError> {
        let phases = self.phase_list();
        doc.borrow_mut().ensure_phases(phases.iter().map(Phase::name));

        let initial = doc.borrow().current_state;
        let mut machine = StateMachine::new(initial);
        let map = build_phase_chain(
            &mut machine,
            &doc,
            State::NoProject,
            Event::StartProject,
            phases,
        )?;
        self.wire_exceptions(&mut machine, &map, &doc)?;
        attach_prompts(&mut machine, &self.prompt_set(), &doc, sink);

        Ok(Workflow::new(self.type_name(), machine, map, doc))
    }
}

/// Explicit discriminator dispatch. The first type registered is the
/// baseline every unknown discriminator falls back to; lookups scan in
/// registration order, so the first type with a given name wins.
pub struct TypeRegistry {
    baseline: Box<dyn ProjectType>,
    others: Vec<Box<dyn ProjectType>>,
}

impl TypeRegistry {
    pub fn with_baseline(baseline: Box<dyn ProjectType>) -> Self {
        Self {
            baseline,
            others: Vec::new(),
        }
    }

    pub fn register(&mut self, project_type: Box<dyn ProjectType>) {
        self.others.push(project_type);
    }

    /// Registry holding the built-in types, with `standard` as baseline.
    pub fn builtin() -> Self {
        let mut registry = Self::with_baseline(Box::new(StandardProject));
        registry.register(Box::new(HotfixProject));
        registry
    }

    pub fn baseline(&self) -> &dyn ProjectType {
        self.baseline.as_ref()
    }

    /// Strict lookup by discriminator.
    pub fn get(&self, name: &str) -> Option<&dyn ProjectType> {
        self.iter().find(|ty| ty.type_name() == name)
    }

    /// Lookup with the backward-compatibility rule: an unrecognized
    /// discriminator resolves to the baseline type.
    pub fn resolve(&self, name: &str) -> &dyn ProjectType {
        match self.get(name) {
            Some(ty) => ty,
            None => {
                tracing::warn!(
                    "unknown project type '{name}', falling back to '{}'",
                    self.baseline.type_name()
                );
                self.baseline()
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ProjectType> {
        std::iter::once(self.baseline.as_ref())
            .chain(self.others.iter().map(|ty| ty.as_ref()))
    }
}

/// Load the document, resolve its type, and build the bound workflow.
pub fn load_workflow(
    store: &StateStore,
    registry: &TypeRegistry,
    sink: Rc<dyn PromptSink>,
) -> anyhow::Result<Workflow> {
    let doc = store.load()?;
    let project_type = registry.resolve(&doc.project_type);
    tracing::debug!(
        "loaded '{}' project at state '{}'",
        project_type.type_name(),
        doc.current_state
    );
    let workflow = project_type.build(shared(doc), sink)?;
    Ok(workflow)
}
