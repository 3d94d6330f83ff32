//! Multi-stage phase: a fixed ladder of gated stages.
//!
//! Entry lands on the first stage. Each stage has one advance event,
//! gated by its own completion rule; the last stage's advance is the
//! phase exit. The first-stage structure (`first` plus `rest`) makes an
//! empty ladder unrepresentable.

use crate::machine::StateMachine;
use crate::phases::{CompletionRule, Event, State};
use crate::state::{PhaseData, PhaseHandle};

/// One rung of the ladder.
#[derive(Debug, Clone, Copy)]
pub struct StageSpec {
    pub state: State,
    pub advance: Event,
    pub rule: CompletionRule,
}

#[derive(Debug)]
pub struct MultiStagePhase {
    first: StageSpec,
    rest: Vec<StageSpec>,
}

impl MultiStagePhase {
    pub fn new(first: StageSpec, rest: Vec<StageSpec>) -> Self {
        Self { first, rest }
    }

    pub fn entry_state(&self) -> State {
        self.first.state
    }

    pub fn exit_event(&self) -> Event {
        self.rest.last().unwrap_or(&self.first).advance
    }

    pub fn states(&self) -> Vec<State> {
        std::iter::once(self.first.state)
            .chain(self.rest.iter().map(|s| s.state))
            .collect()
    }

    pub(crate) fn wire(&self, machine: &mut StateMachine, handle: PhaseHandle, next_entry: State) {
        let on_first = handle.clone();
        machine.configure(self.first.state).on_entry(move || {
            on_first.update(PhaseData::activate);
            Ok(())
        });

        let stages: Vec<&StageSpec> = std::iter::once(&self.first)
            .chain(self.rest.iter())
            .collect();
        for (i, stage) in stages.iter().enumerate() {
            let rule = stage.rule;
            let gate = handle.clone();
            let guard = move || gate.check(|data| rule.evaluate(data));
            match stages.get(i + 1) {
                Some(next) => {
                    machine
                        .configure(stage.state)
                        .permit_if(stage.advance, next.state, guard);
                }
                None => {
                    let on_complete = handle.clone();
                    machine.configure(stage.state).permit_if_then(
                        stage.advance,
                        next_entry,
                        guard,
                        move || {
                            on_complete.update(PhaseData::mark_completed);
                            Ok(())
                        },
                    );
                }
            }
        }
    }
}
