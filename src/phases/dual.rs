//! Dual-state phase: mandatory work split into planning and execution.
//!
//! Entry lands in the planning state, where work items are collected.
//! `begin` moves to the executing state once the readiness rule holds;
//! `complete` exits once the completion rule holds. Re-entering the
//! planning state (the review loop fires a backward edge here) runs the
//! same activation action, which clears any stale completion stamp.

use crate::machine::StateMachine;
use crate::phases::{CompletionRule, Event, State};
use crate::state::{PhaseData, PhaseHandle};

#[derive(Debug)]
pub struct DualStatePhase {
    planning: State,
    executing: State,
    begin: Event,
    complete: Event,
    readiness: CompletionRule,
    completion: CompletionRule,
}

impl DualStatePhase {
    pub fn new(
        planning: State,
        executing: State,
        begin: Event,
        complete: Event,
        readiness: CompletionRule,
        completion: CompletionRule,
    ) -> Self {
        Self {
            planning,
            executing,
            begin,
            complete,
            readiness,
            completion,
        }
    }

    pub fn entry_state(&self) -> State {
        self.planning
    }

    pub fn exit_event(&self) -> Event {
        self.complete
    }

    pub fn states(&self) -> Vec<State> {
        vec![self.planning, self.executing]
    }

    pub(crate) fn wire(&self, machine: &mut StateMachine, handle: PhaseHandle, next_entry: State) {
        let on_planning = handle.clone();
        machine.configure(self.planning).on_entry(move || {
            on_planning.update(PhaseData::activate);
            Ok(())
        });

        let ready = self.readiness;
        let ready_gate = handle.clone();
        machine
            .configure(self.planning)
            .permit_if(self.begin, self.executing, move || {
                ready_gate.check(|data| ready.evaluate(data))
            });

        let done = self.completion;
        let done_gate = handle.clone();
        let on_complete = handle;
        machine.configure(self.executing).permit_if_then(
            self.complete,
            next_entry,
            move || done_gate.check(|data| done.evaluate(data)),
            move || {
                on_complete.update(PhaseData::mark_completed);
                Ok(())
            },
        );
    }
}
