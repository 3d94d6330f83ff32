//! Chain builder: compose an ordered phase list into one machine.
//!
//! Wiring rules:
//! - the idle state gets one transition, `start` into the first phase's
//!   entry state
//! - each phase's exit (and skip, for decision phases) points at the
//!   next phase's entry state
//! - the last phase's exit points back at the idle state, closing the
//!   cycle
//!
//! Returns the phases keyed by name so the workflow can answer
//! phase-level questions after composition.

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::ChainError;
use crate::machine::StateMachine;
use crate::phases::{Event, Phase, PhaseName, State};
use crate::state::SharedDoc;

pub fn build_phase_chain(
    machine: &mut StateMachine,
    doc: &SharedDoc,
    idle: State,
    start: Event,
    phases: Vec<Phase>,
) -> Result<BTreeMap<PhaseName, Phase>, ChainError> {
    let mut seen = BTreeSet::new();
    for phase in &phases {
        if !seen.insert(phase.name()) {
            return Err(ChainError::DuplicatePhase { name: phase.name() });
        }
    }

    let entries: Vec<State> = phases.iter().map(Phase::entry_state).collect();
    let Some(first_entry) = entries.first().copied() else {
        return Err(ChainError::Empty);
    };

    machine.configure(idle).permit(start, first_entry);
    for (i, phase) in phases.iter().enumerate() {
        let next_entry = entries.get(i + 1).copied().unwrap_or(idle);
        phase.wire(machine, doc, next_entry);
        tracing::trace!("wired phase '{}' exiting to '{next_entry}'", phase.name());
    }

    Ok(phases.into_iter().map(|p| (p.name(), p)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::builtin;
    use crate::state::{shared, ProjectDoc};

    fn doc_for(names: impl IntoIterator<Item = PhaseName>) -> SharedDoc {
        shared(ProjectDoc::new("standard", names))
    }

    #[test]
    fn test_map_contains_exactly_the_given_phases() {
        let doc = doc_for([
            PhaseName::Discovery,
            PhaseName::Design,
            PhaseName::Implementation,
        ]);
        let mut machine = StateMachine::new(State::NoProject);
        let map = build_phase_chain(
            &mut machine,
            &doc,
            State::NoProject,
            Event::StartProject,
            vec![builtin::discovery(), builtin::design(), builtin::implementation()],
        )
        .unwrap();

        assert_eq!(map.len(), 3);
        assert!(map.contains_key(&PhaseName::Discovery));
        assert!(map.contains_key(&PhaseName::Design));
        assert!(map.contains_key(&PhaseName::Implementation));
        assert!(!map.contains_key(&PhaseName::Review));
    }

    #[test]
    fn test_chain_wires_each_exit_to_the_next_entry() {
        let doc = doc_for([
            PhaseName::Discovery,
            PhaseName::Design,
            PhaseName::Implementation,
        ]);
        let mut machine = StateMachine::new(State::NoProject);
        build_phase_chain(
            &mut machine,
            &doc,
            State::NoProject,
            Event::StartProject,
            vec![builtin::discovery(), builtin::design(), builtin::implementation()],
        )
        .unwrap();

        assert_eq!(
            machine.fire(Event::StartProject).unwrap(),
            State::DiscoveryDecision
        );
        assert_eq!(
            machine.fire(Event::SkipDiscovery).unwrap(),
            State::DesignDecision
        );
        assert_eq!(
            machine.fire(Event::EnableDesign).unwrap(),
            State::DesignActive
        );

        {
            let mut doc = doc.borrow_mut();
            let slice = doc.phase_mut(PhaseName::Design);
            slice.add_artifact("design/plan.md");
            slice.approve_artifact("design/plan.md");
        }
        assert_eq!(
            machine.fire(Event::CompleteDesign).unwrap(),
            State::ImplementationPlanning
        );

        doc.borrow_mut()
            .phase_mut(PhaseName::Implementation)
            .add_task("build it");
        assert_eq!(
            machine.fire(Event::BeginExecution).unwrap(),
            State::ImplementationExecuting
        );

        doc.borrow_mut()
            .phase_mut(PhaseName::Implementation)
            .complete_task(1);
        // Last phase in the chain: its exit closes the loop to idle.
        assert_eq!(
            machine.fire(Event::CompleteImplementation).unwrap(),
            State::NoProject
        );
    }

    #[test]
    fn test_single_phase_chain_is_a_degenerate_cycle() {
        let doc = doc_for([PhaseName::Implementation]);
        let mut machine = StateMachine::new(State::NoProject);
        build_phase_chain(
            &mut machine,
            &doc,
            State::NoProject,
            Event::StartProject,
            vec![builtin::implementation()],
        )
        .unwrap();

        machine.fire(Event::StartProject).unwrap();
        assert_eq!(machine.state(), State::ImplementationPlanning);

        doc.borrow_mut()
            .phase_mut(PhaseName::Implementation)
            .add_task("only step");
        machine.fire(Event::BeginExecution).unwrap();
        doc.borrow_mut()
            .phase_mut(PhaseName::Implementation)
            .complete_task(1);
        machine.fire(Event::CompleteImplementation).unwrap();
        assert_eq!(machine.state(), State::NoProject);

        // The cycle is reusable: a new run can start immediately.
        assert!(machine.can_fire(Event::StartProject));
    }

    #[test]
    fn test_empty_chain_is_rejected() {
        let doc = doc_for([]);
        let mut machine = StateMachine::new(State::NoProject);
        let err = build_phase_chain(
            &mut machine,
            &doc,
            State::NoProject,
            Event::StartProject,
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Empty));
    }

    #[test]
    fn test_duplicate_phase_is_rejected() {
        let doc = doc_for([PhaseName::Implementation]);
        let mut machine = StateMachine::new(State::NoProject);
        let err = build_phase_chain(
            &mut machine,
            &doc,
            State::NoProject,
            Event::StartProject,
            vec![builtin::implementation(), builtin::implementation()],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ChainError::DuplicatePhase {
                name: PhaseName::Implementation
            }
        ));
    }
}
