//! A built machine bound to its project document.
//!
//! `Workflow` is what the command layer holds: it answers "what can
//! happen now" (`can_fire`, `permitted_events`), makes things happen
//! (`fire`, which also syncs the document's stored state token), and
//! resolves phase-level questions (`phase`, `active_phase`). One
//! workflow is built per process invocation and discarded on exit.

use std::collections::BTreeMap;
use std::fmt;

use crate::errors::WorkflowError;
use crate::machine::StateMachine;
use crate::phases::{Event, Phase, PhaseName, State};
use crate::state::SharedDoc;

pub struct Workflow {
    type_name: &'static str,
    machine: StateMachine,
    phases: BTreeMap<PhaseName, Phase>,
    doc: SharedDoc,
}

// `StateMachine` holds boxed closures, so `Debug` cannot be derived.
impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("type_name", &self.type_name)
            .field("state", &self.machine.state())
            .field("phases", &self.phases)
            .finish_non_exhaustive()
    }
}

impl Workflow {
    pub(crate) fn new(
        type_name: &'static str,
        machine: StateMachine,
        phases: BTreeMap<PhaseName, Phase>,
        doc: SharedDoc,
    ) -> Self {
        Self {
            type_name,
            machine,
            phases,
            doc,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn state(&self) -> State {
        self.machine.state()
    }

    pub fn doc(&self) -> &SharedDoc {
        &self.doc
    }

    /// The phase owning the current state, or `None` when idle.
    pub fn active_phase(&self) -> Option<PhaseName> {
        self.state().phase()
    }

    pub fn can_fire(&self, event: Event) -> bool {
        self.machine.can_fire(event)
    }

    pub fn permitted_events(&self) -> Vec<Event> {
        self.machine.permitted_events()
    }

    /// Fire `event` and, on success, sync the document's stored state
    /// token. The document is only written to disk by the caller, after
    /// this returns; a failed fire therefore never changes durable
    /// state.
    pub fn fire(&mut self, event: Event) -> Result<State, WorkflowError> {
        let landed = self.machine.fire(event)?;
        self.doc.borrow_mut().current_state = landed;
        Ok(landed)
    }

    /// Look up a phase of this workflow's composition.
    pub fn phase(&self, name: PhaseName) -> Result<&Phase, WorkflowError> {
        self.phases.get(&name).ok_or_else(|| WorkflowError::UnknownPhase {
            name: name.to_string(),
        })
    }

    /// Phases in canonical name order.
    pub fn phases(&self) -> impl Iterator<Item = &Phase> {
        self.phases.values()
    }
}
