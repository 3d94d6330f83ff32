//! Decision-shaped phase: optional work behind an enable/skip gate.
//!
//! Two states. The decision state offers `enable` (drop into the active
//! state and do the work) or `skip` (jump straight to the next phase,
//! recording the skip). The active state offers `complete`, gated by the
//! phase's completion rule.

use crate::machine::StateMachine;
use crate::phases::{CompletionRule, Event, State};
use crate::state::{PhaseData, PhaseHandle};

#[derive(Debug)]
pub struct DecisionPhase {
    decision: State,
    active: State,
    enable: Event,
    skip: Event,
    complete: Event,
    completion: CompletionRule,
}

impl DecisionPhase {
    pub fn new(
        decision: State,
        active: State,
        enable: Event,
        skip: Event,
        complete: Event,
        completion: CompletionRule,
    ) -> Self {
        Self {
            decision,
            active,
            enable,
            skip,
            complete,
            completion,
        }
    }

    pub fn entry_state(&self) -> State {
        self.decision
    }

    pub fn exit_event(&self) -> Event {
        self.complete
    }

    pub fn states(&self) -> Vec<State> {
        vec![self.decision, self.active]
    }

    pub(crate) fn wire(&self, machine: &mut StateMachine, handle: PhaseHandle, next_entry: State) {
        let on_active = handle.clone();
        machine.configure(self.active).on_entry(move || {
            on_active.update(PhaseData::activate);
            Ok(())
        });

        let on_skip = handle.clone();
        machine
            .configure(self.decision)
            .permit(self.enable, self.active)
            .permit_then(self.skip, next_entry, move || {
                on_skip.update(PhaseData::mark_skipped);
                Ok(())
            });

        let rule = self.completion;
        let gate = handle.clone();
        let on_complete = handle;
        machine.configure(self.active).permit_if_then(
            self.complete,
            next_entry,
            move || gate.check(|data| rule.evaluate(data)),
            move || {
                on_complete.update(PhaseData::mark_completed);
                Ok(())
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WorkflowError;
    use crate::phases::PhaseName;
    use crate::state::{shared, PhaseStatus, ProjectDoc, SharedDoc};

    fn wired() -> (StateMachine, SharedDoc) {
        let doc = shared(ProjectDoc::new("standard", [PhaseName::Discovery]));
        let mut machine = StateMachine::new(State::DiscoveryDecision);
        let phase = DecisionPhase::new(
            State::DiscoveryDecision,
            State::DiscoveryActive,
            Event::EnableDiscovery,
            Event::SkipDiscovery,
            Event::CompleteDiscovery,
            CompletionRule::ArtifactsApproved,
        );
        phase.wire(
            &mut machine,
            PhaseHandle::new(doc.clone(), PhaseName::Discovery),
            State::DesignDecision,
        );
        (machine, doc)
    }

    fn slice_status(doc: &SharedDoc) -> PhaseStatus {
        doc.borrow()
            .phase(PhaseName::Discovery)
            .map(|p| p.status)
            .unwrap_or_default()
    }

    #[test]
    fn test_enable_enters_active_and_marks_the_slice() {
        let (mut machine, doc) = wired();
        assert_eq!(slice_status(&doc), PhaseStatus::Pending);

        machine.fire(Event::EnableDiscovery).unwrap();
        assert_eq!(machine.state(), State::DiscoveryActive);
        assert_eq!(slice_status(&doc), PhaseStatus::Active);
        assert!(doc
            .borrow()
            .phase(PhaseName::Discovery)
            .unwrap()
            .started_at
            .is_some());
    }

    #[test]
    fn test_skip_jumps_past_the_phase_and_records_it() {
        let (mut machine, doc) = wired();

        let landed = machine.fire(Event::SkipDiscovery).unwrap();
        assert_eq!(landed, State::DesignDecision);
        assert_eq!(slice_status(&doc), PhaseStatus::Skipped);
    }

    #[test]
    fn test_complete_is_blocked_until_artifacts_are_approved() {
        let (mut machine, doc) = wired();
        machine.fire(Event::EnableDiscovery).unwrap();

        // No artifacts at all: the gate stays closed.
        assert!(!machine.can_fire(Event::CompleteDiscovery));

        doc.borrow_mut()
            .phase_mut(PhaseName::Discovery)
            .add_artifact("notes/findings.md");
        let err = machine.fire(Event::CompleteDiscovery).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        assert_eq!(machine.state(), State::DiscoveryActive);

        doc.borrow_mut()
            .phase_mut(PhaseName::Discovery)
            .approve_artifact("notes/findings.md");
        let landed = machine.fire(Event::CompleteDiscovery).unwrap();
        assert_eq!(landed, State::DesignDecision);
        assert_eq!(slice_status(&doc), PhaseStatus::Completed);
        assert!(doc
            .borrow()
            .phase(PhaseName::Discovery)
            .unwrap()
            .completed_at
            .is_some());
    }

    #[test]
    fn test_decision_state_offers_exactly_enable_and_skip() {
        let (machine, _doc) = wired();
        assert_eq!(
            machine.permitted_events(),
            vec![Event::EnableDiscovery, Event::SkipDiscovery]
        );
    }
}
