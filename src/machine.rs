//! Table-driven state machine core.
//!
//! The machine stores its transition table as data: a map from
//! `(state, event)` pairs to the list of candidate transitions registered
//! for that pair, in registration order. States and events are opaque to
//! the machine; it compares and orders them and nothing more. All
//! workflow meaning lives in the guards and actions registered against
//! the table.
//!
//! Guards are pure predicates over shared project data. Actions are
//! fallible side effects. `fire` is atomic from the caller's view: if any
//! action fails, the machine remains in (or is restored to) the source
//! state and the error is returned.

use std::collections::BTreeMap;

use crate::errors::WorkflowError;
use crate::phases::{Event, State};

/// Pure predicate deciding whether a candidate transition is eligible.
/// Guards must not mutate anything; the machine may evaluate them any
/// number of times without firing.
pub type Guard = Box<dyn Fn() -> bool>;

/// Fallible side effect run while firing a transition.
pub type Action = Box<dyn Fn() -> anyhow::Result<()>>;

struct Transition {
    target: State,
    guard: Option<Guard>,
    action: Option<Action>,
}

impl Transition {
    fn eligible(&self) -> bool {
        self.guard.as_ref().is_none_or(|guard| guard())
    }
}

/// A deterministic finite-state machine over workflow states and events.
///
/// Built once per process from the active project type's phase list, then
/// driven by `fire`. The table maps are ordered so that iteration (and
/// therefore `permitted_events`) is deterministic across runs.
pub struct StateMachine {
    current: State,
    transitions: BTreeMap<(State, Event), Vec<Transition>>,
    entry_actions: BTreeMap<State, Vec<Action>>,
    exit_actions: BTreeMap<State, Vec<Action>>,
}

impl StateMachine {
    pub fn new(initial: State) -> Self {
        Self {
            current: initial,
            transitions: BTreeMap::new(),
            entry_actions: BTreeMap::new(),
            exit_actions: BTreeMap::new(),
        }
    }

    /// Current state of the machine.
    pub fn state(&self) -> State {
        self.current
    }

    /// Open a builder scoped to `state` for registering transitions and
    /// entry/exit actions. May be called repeatedly for the same state;
    /// registrations accumulate in call order.
    pub fn configure(&mut self, state: State) -> StateConfig<'_> {
        StateConfig {
            machine: self,
            state,
        }
    }

    /// Whether `event` would be accepted from the current state. Pure:
    /// evaluates guards but runs no actions and changes no state.
    pub fn can_fire(&self, event: Event) -> bool {
        self.first_eligible(self.current, event).is_some()
    }

    /// Events with at least one eligible transition from the current
    /// state, in the vocabulary's canonical order.
    pub fn permitted_events(&self) -> Vec<Event> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == self.current)
            .map(|(_, event)| *event)
            .filter(|event| self.can_fire(*event))
            .collect()
    }

    /// Index of the first registered transition for `(state, event)` whose
    /// guard passes. Registration order resolves overlapping guards: the
    /// earliest eligible candidate wins.
    fn first_eligible(&self, state: State, event: Event) -> Option<usize> {
        self.transitions
            .get(&(state, event))?
            .iter()
            .position(Transition::eligible)
    }

    /// Fire `event` from the current state.
    ///
    /// Eligibility is decided exactly once, before any action runs; a
    /// guard cannot be re-consulted midway through a fire. Then, in order:
    /// exit actions of the source state, the transition's own action, the
    /// state change, entry actions of the target state. If an entry action
    /// fails the state change is rolled back, so a failed `fire` never
    /// leaves the machine in the target state. Returns the new state.
    pub fn fire(&mut self, event: Event) -> Result<State, WorkflowError> {
        let from = self.current;
        let Some(chosen) = self.first_eligible(from, event) else {
            return Err(WorkflowError::InvalidTransition { state: from, event });
        };
        let target = match self
            .transitions
            .get(&(from, event))
            .and_then(|candidates| candidates.get(chosen))
        {
            Some(transition) => transition.target,
            None => return Err(WorkflowError::InvalidTransition { state: from, event }),
        };

        if let Some(actions) = self.exit_actions.get(&from) {
            for action in actions {
                action().map_err(|source| WorkflowError::ActionFailed {
                    state: from,
                    event,
                    source,
                })?;
            }
        }

        if let Some(transition) = self
            .transitions
            .get(&(from, event))
            .and_then(|candidates| candidates.get(chosen))
            && let Some(action) = &transition.action
        {
            action().map_err(|source| WorkflowError::ActionFailed {
                state: from,
                event,
                source,
            })?;
        }

        self.current = target;

        if let Some(actions) = self.entry_actions.get(&target) {
            for action in actions {
                if let Err(source) = action() {
                    self.current = from;
                    return Err(WorkflowError::ActionFailed {
                        state: from,
                        event,
                        source,
                    });
                }
            }
        }

        tracing::debug!("fired '{event}': '{from}' -> '{target}'");
        Ok(target)
    }
}

/// Builder handle returned by [`StateMachine::configure`]. Every method
/// consumes and returns the handle so registrations chain.
pub struct StateConfig<'a> {
    machine: &'a mut StateMachine,
    state: State,
}

impl StateConfig<'_> {
    /// Register an unguarded transition to `target` on `event`.
    pub fn permit(self, event: Event, target: State) -> Self {
        self.push(event, target, None, None)
    }

    /// Register a transition eligible only while `guard` returns true.
    pub fn permit_if(self, event: Event, target: State, guard: impl Fn() -> bool + 'static) -> Self {
        self.push(event, target, Some(Box::new(guard)), None)
    }

    /// Register an unguarded transition that runs `action` while firing,
    /// after the source state's exit actions and before the state change.
    pub fn permit_then(
        self,
        event: Event,
        target: State,
        action: impl Fn() -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.push(event, target, None, Some(Box::new(action)))
    }

    /// Register a guarded transition with an action. The action belongs to
    /// this transition alone; other transitions on the same event do not
    /// run it.
    pub fn permit_if_then(
        self,
        event: Event,
        target: State,
        guard: impl Fn() -> bool + 'static,
        action: impl Fn() -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.push(event, target, Some(Box::new(guard)), Some(Box::new(action)))
    }

    /// Run `action` every time this state is entered, after the firing
    /// transition's own action. Multiple registrations run in order.
    pub fn on_entry(self, action: impl Fn() -> anyhow::Result<()> + 'static) -> Self {
        self.machine
            .entry_actions
            .entry(self.state)
            .or_default()
            .push(Box::new(action));
        self
    }

    /// Run `action` every time this state is exited, before anything else
    /// in the fire sequence.
    pub fn on_exit(self, action: impl Fn() -> anyhow::Result<()> + 'static) -> Self {
        self.machine
            .exit_actions
            .entry(self.state)
            .or_default()
            .push(Box::new(action));
        self
    }

    fn push(
        self,
        event: Event,
        target: State,
        guard: Option<Guard>,
        action: Option<Action>,
    ) -> Self {
        self.machine
            .transitions
            .entry((self.state, event))
            .or_default()
            .push(Transition {
                target,
                guard,
                action,
            });
        self
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn logger(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> impl Fn() -> anyhow::Result<()> + use<> {
        let log = Rc::clone(log);
        move || {
            log.borrow_mut().push(tag);
            Ok(())
        }
    }

    #[test]
    fn test_fire_moves_to_target_and_returns_it() {
        let mut machine = StateMachine::new(State::NoProject);
        machine
            .configure(State::NoProject)
            .permit(Event::StartProject, State::DiscoveryDecision);

        let landed = machine.fire(Event::StartProject).unwrap();
        assert_eq!(landed, State::DiscoveryDecision);
        assert_eq!(machine.state(), State::DiscoveryDecision);
    }

    #[test]
    fn test_can_fire_is_pure() {
        let mut machine = StateMachine::new(State::NoProject);
        machine
            .configure(State::NoProject)
            .permit(Event::StartProject, State::DiscoveryDecision);

        for _ in 0..3 {
            assert!(machine.can_fire(Event::StartProject));
        }
        assert!(!machine.can_fire(Event::CompleteDesign));
        assert_eq!(machine.state(), State::NoProject);
    }

    #[test]
    fn test_invalid_fire_is_an_error_and_repeatable() {
        let mut machine = StateMachine::new(State::NoProject);
        machine
            .configure(State::NoProject)
            .permit(Event::StartProject, State::DiscoveryDecision);

        for _ in 0..2 {
            let err = machine.fire(Event::CompleteReview).unwrap_err();
            assert!(matches!(
                err,
                WorkflowError::InvalidTransition {
                    state: State::NoProject,
                    event: Event::CompleteReview,
                }
            ));
            assert_eq!(machine.state(), State::NoProject);
        }
    }

    #[test]
    fn test_guard_blocks_until_condition_flips() {
        let open = Rc::new(RefCell::new(false));
        let gate = Rc::clone(&open);
        let mut machine = StateMachine::new(State::ImplementationExecuting);
        machine
            .configure(State::ImplementationExecuting)
            .permit_if(Event::CompleteImplementation, State::ReviewDecision, move || {
                *gate.borrow()
            });

        assert!(!machine.can_fire(Event::CompleteImplementation));
        let err = machine.fire(Event::CompleteImplementation).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        assert_eq!(machine.state(), State::ImplementationExecuting);

        *open.borrow_mut() = true;
        assert!(machine.can_fire(Event::CompleteImplementation));
        machine.fire(Event::CompleteImplementation).unwrap();
        assert_eq!(machine.state(), State::ReviewDecision);
    }

    #[test]
    fn test_first_registered_eligible_transition_wins() {
        let mut machine = StateMachine::new(State::ReviewActive);
        machine
            .configure(State::ReviewActive)
            .permit_if(Event::CompleteReview, State::FinalizeDocumentation, || true)
            .permit_if(Event::CompleteReview, State::ImplementationPlanning, || true);

        let landed = machine.fire(Event::CompleteReview).unwrap();
        assert_eq!(landed, State::FinalizeDocumentation);
    }

    #[test]
    fn test_later_candidate_fires_when_earlier_guard_fails() {
        let mut machine = StateMachine::new(State::ReviewActive);
        machine
            .configure(State::ReviewActive)
            .permit_if(Event::CompleteReview, State::FinalizeDocumentation, || false)
            .permit_if(Event::CompleteReview, State::ImplementationPlanning, || true);

        let landed = machine.fire(Event::CompleteReview).unwrap();
        assert_eq!(landed, State::ImplementationPlanning);
    }

    #[test]
    fn test_fire_runs_exit_then_transition_action_then_entry() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut machine = StateMachine::new(State::DesignDecision);
        machine
            .configure(State::DesignDecision)
            .on_exit(logger(&log, "exit"))
            .permit_then(Event::SkipDesign, State::ImplementationPlanning, logger(&log, "transition"));
        machine
            .configure(State::ImplementationPlanning)
            .on_entry(logger(&log, "entry-a"))
            .on_entry(logger(&log, "entry-b"));

        machine.fire(Event::SkipDesign).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["exit", "transition", "entry-a", "entry-b"]
        );
    }

    #[test]
    fn test_entry_action_failure_rolls_back_state() {
        let mut machine = StateMachine::new(State::NoProject);
        machine
            .configure(State::NoProject)
            .permit(Event::StartProject, State::DiscoveryDecision);
        machine
            .configure(State::DiscoveryDecision)
            .on_entry(|| anyhow::bail!("disk full"));

        let err = machine.fire(Event::StartProject).unwrap_err();
        assert!(matches!(err, WorkflowError::ActionFailed { .. }));
        assert!(err.to_string().contains("disk full"));
        assert_eq!(machine.state(), State::NoProject);

        // The failed fire left everything untouched; retrying the same
        // event still finds the transition.
        assert!(machine.can_fire(Event::StartProject));
    }

    #[test]
    fn test_exit_action_failure_stops_the_fire() {
        let ran = Rc::new(RefCell::new(false));
        let witness = Rc::clone(&ran);
        let mut machine = StateMachine::new(State::DiscoveryActive);
        machine
            .configure(State::DiscoveryActive)
            .on_exit(|| anyhow::bail!("no exit"))
            .permit_then(Event::CompleteDiscovery, State::DesignDecision, move || {
                *witness.borrow_mut() = true;
                Ok(())
            });

        let err = machine.fire(Event::CompleteDiscovery).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ActionFailed {
                state: State::DiscoveryActive,
                event: Event::CompleteDiscovery,
                ..
            }
        ));
        assert_eq!(machine.state(), State::DiscoveryActive);
        assert!(!*ran.borrow(), "transition action must not run after a failed exit");
    }

    #[test]
    fn test_eligibility_is_decided_before_actions_run() {
        // The transition action flips the flag its own guard reads. The
        // guard was already consulted, so the fire must still complete.
        let flag = Rc::new(RefCell::new(true));
        let flip = Rc::clone(&flag);
        let read = Rc::clone(&flag);
        let mut machine = StateMachine::new(State::ReviewDecision);
        machine.configure(State::ReviewDecision).permit_if_then(
            Event::SkipReview,
            State::FinalizeDocumentation,
            move || *read.borrow(),
            move || {
                *flip.borrow_mut() = false;
                Ok(())
            },
        );

        let landed = machine.fire(Event::SkipReview).unwrap();
        assert_eq!(landed, State::FinalizeDocumentation);
    }

    #[test]
    fn test_transition_action_runs_only_for_its_own_transition() {
        let hits = Rc::new(RefCell::new(0u32));
        let counter = Rc::clone(&hits);
        let mut machine = StateMachine::new(State::ReviewActive);
        machine
            .configure(State::ReviewActive)
            .permit_if(Event::CompleteReview, State::FinalizeDocumentation, || true)
            .permit_if_then(
                Event::CompleteReview,
                State::ImplementationPlanning,
                || true,
                move || {
                    *counter.borrow_mut() += 1;
                    Ok(())
                },
            );

        machine.fire(Event::CompleteReview).unwrap();
        assert_eq!(machine.state(), State::FinalizeDocumentation);
        assert_eq!(*hits.borrow(), 0, "losing candidate's action must not run");
    }

    #[test]
    fn test_permitted_events_filters_by_guard_and_sorts() {
        let mut machine = StateMachine::new(State::DiscoveryDecision);
        machine
            .configure(State::DiscoveryDecision)
            .permit(Event::SkipDiscovery, State::DesignDecision)
            .permit_if(Event::EnableDiscovery, State::DiscoveryActive, || false);
        machine
            .configure(State::DesignDecision)
            .permit(Event::SkipDesign, State::ImplementationPlanning);

        assert_eq!(machine.permitted_events(), vec![Event::SkipDiscovery]);
    }

    #[test]
    fn test_configure_twice_accumulates() {
        let mut machine = StateMachine::new(State::NoProject);
        machine
            .configure(State::NoProject)
            .permit_if(Event::StartProject, State::DiscoveryDecision, || false);
        machine
            .configure(State::NoProject)
            .permit(Event::StartProject, State::ImplementationPlanning);

        let landed = machine.fire(Event::StartProject).unwrap();
        assert_eq!(landed, State::ImplementationPlanning);
    }

    #[test]
    fn test_self_loop_runs_exit_and_entry_for_same_state() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut machine = StateMachine::new(State::ImplementationPlanning);
        machine
            .configure(State::ImplementationPlanning)
            .on_entry(logger(&log, "entry"))
            .on_exit(logger(&log, "exit"))
            .permit(Event::BeginExecution, State::ImplementationPlanning);

        machine.fire(Event::BeginExecution).unwrap();
        assert_eq!(*log.borrow(), vec!["exit", "entry"]);
        assert_eq!(machine.state(), State::ImplementationPlanning);
    }
}
