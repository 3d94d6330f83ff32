//! The built-in project types.
//!
//! `standard` runs the full lifecycle: discovery, design, implementation,
//! review, finalize. `hotfix` drops the two up-front phases for urgent
//! work. Both layer the same exceptional transition on the chain: a
//! failed review reopens implementation.

use std::collections::BTreeMap;

use crate::errors::WorkflowError;
use crate::machine::StateMachine;
use crate::phases::{builtin, CompletionRule, Event, Phase, PhaseName, State};
use crate::project::ProjectType;
use crate::prompts::{PromptSet, PromptTemplate};
use crate::state::{PhaseData, PhaseHandle, SharedDoc};

/// Backward edge from the review phase's working state to the
/// implementation phase's entry, eligible while the latest recorded
/// report fails. Firing it puts the review phase back in the queue so
/// the rework is reviewed again.
fn wire_review_reopen(
    machine: &mut StateMachine,
    phases: &BTreeMap<PhaseName, Phase>,
    doc: &SharedDoc,
) -> Result<(), WorkflowError> {
    let implementation =
        phases
            .get(&PhaseName::Implementation)
            .ok_or_else(|| WorkflowError::UnknownPhase {
                name: PhaseName::Implementation.to_string(),
            })?;
    let review = phases
        .get(&PhaseName::Review)
        .ok_or_else(|| WorkflowError::UnknownPhase {
            name: PhaseName::Review.to_string(),
        })?;

    let source = review
        .states()
        .last()
        .copied()
        .unwrap_or_else(|| review.entry_state());
    let target = implementation.entry_state();
    let gate = PhaseHandle::new(doc.clone(), PhaseName::Review);
    let requeue = gate.clone();
    machine.configure(source).permit_if_then(
        Event::ReviewFail,
        target,
        move || gate.check(|data| CompletionRule::LatestReportFails.evaluate(data)),
        move || {
            requeue.update(PhaseData::requeue);
            Ok(())
        },
    );
    Ok(())
}

/// The full lifecycle.
pub struct StandardProject;

impl ProjectType for StandardProject {
    fn type_name(&self) -> &'static str {
        "standard"
    }

    fn phase_list(&self) -> Vec<Phase> {
        vec![
            builtin::discovery(),
            builtin::design(),
            builtin::implementation(),
            builtin::review(),
            builtin::finalize(),
        ]
    }

    fn wire_exceptions(
        &self,
        machine: &mut StateMachine,
        phases: &BTreeMap<PhaseName, Phase>,
        doc: &SharedDoc,
    ) -> Result<(), WorkflowError> {
        wire_review_reopen(machine, phases, doc)
    }
}

/// Urgent-fix lifecycle: straight to implementation, still reviewed and
/// finalized.
pub struct HotfixProject;

impl ProjectType for HotfixProject {
    fn type_name(&self) -> &'static str {
        "hotfix"
    }

    fn phase_list(&self) -> Vec<Phase> {
        vec![
            builtin::implementation(),
            builtin::review(),
            builtin::finalize(),
        ]
    }

    fn wire_exceptions(
        &self,
        machine: &mut StateMachine,
        phases: &BTreeMap<PhaseName, Phase>,
        doc: &SharedDoc,
    ) -> Result<(), WorkflowError> {
        wire_review_reopen(machine, phases, doc)
    }

    fn prompt_set(&self) -> PromptSet {
        PromptSet::builtin().with_override(PromptTemplate {
            state: State::ImplementationPlanning,
            title: "Hotfix planning",
            body: "Project: {project}\n\nKeep the task list minimal: the fix itself and a \
                   regression test. Add tasks with `usher task add <name>`.\n\nTasks so \
                   far:\n{tasks}\n\nWhen the plan is ready, run `usher complete`.",
        })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::project::Workflow;
    use crate::prompts::NullPromptSink;
    use crate::state::{shared, PhaseStatus, ProjectDoc, ReviewAssessment, SharedDoc};

    fn fresh(ty: &dyn ProjectType) -> (Workflow, SharedDoc) {
        let doc = shared(ProjectDoc::new(ty.type_name(), []));
        let workflow = ty.build(doc.clone(), Rc::new(NullPromptSink)).unwrap();
        (workflow, doc)
    }

    fn with_slice(doc: &SharedDoc, name: PhaseName, mutate: impl FnOnce(&mut PhaseData)) {
        mutate(doc.borrow_mut().phase_mut(name));
    }

    fn status(doc: &SharedDoc, name: PhaseName) -> PhaseStatus {
        doc.borrow()
            .phase(name)
            .map(|p| p.status)
            .unwrap_or_default()
    }

    #[test]
    fn test_standard_walks_the_full_lifecycle() {
        let (mut wf, doc) = fresh(&StandardProject);

        assert_eq!(wf.fire(Event::StartProject).unwrap(), State::DiscoveryDecision);
        assert_eq!(wf.fire(Event::EnableDiscovery).unwrap(), State::DiscoveryActive);
        with_slice(&doc, PhaseName::Discovery, |s| {
            s.add_artifact("notes/findings.md");
            s.approve_artifact("notes/findings.md");
        });
        assert_eq!(wf.fire(Event::CompleteDiscovery).unwrap(), State::DesignDecision);
        assert_eq!(wf.fire(Event::SkipDesign).unwrap(), State::ImplementationPlanning);
        assert_eq!(status(&doc, PhaseName::Design), PhaseStatus::Skipped);

        with_slice(&doc, PhaseName::Implementation, |s| {
            s.add_task("write the fix");
        });
        assert_eq!(wf.fire(Event::BeginExecution).unwrap(), State::ImplementationExecuting);
        with_slice(&doc, PhaseName::Implementation, |s| {
            s.complete_task(1);
        });
        assert_eq!(wf.fire(Event::CompleteImplementation).unwrap(), State::ReviewDecision);

        assert_eq!(wf.fire(Event::EnableReview).unwrap(), State::ReviewActive);
        with_slice(&doc, PhaseName::Review, |s| {
            s.record_report(ReviewAssessment::Pass, None);
        });
        assert_eq!(wf.fire(Event::CompleteReview).unwrap(), State::FinalizeDocumentation);

        for (key, event, landed) in [
            ("docs_updated", Event::CompleteDocumentation, State::FinalizeChecks),
            ("checks_green", Event::CompleteChecks, State::FinalizeDeletion),
            ("scratch_deleted", Event::CompleteDeletion, State::NoProject),
        ] {
            with_slice(&doc, PhaseName::Finalize, |s| {
                s.set_field(key, crate::state::FieldValue::Bool(true));
            });
            assert_eq!(wf.fire(event).unwrap(), landed);
        }

        assert_eq!(status(&doc, PhaseName::Discovery), PhaseStatus::Completed);
        assert_eq!(status(&doc, PhaseName::Implementation), PhaseStatus::Completed);
        assert_eq!(status(&doc, PhaseName::Finalize), PhaseStatus::Completed);
        assert_eq!(wf.active_phase(), None);
        // The chain is a cycle: a new project can start right away.
        assert!(wf.can_fire(Event::StartProject));
    }

    fn drive_to_review_active(wf: &mut Workflow, doc: &SharedDoc) {
        wf.fire(Event::StartProject).unwrap();
        wf.fire(Event::SkipDiscovery).unwrap();
        wf.fire(Event::SkipDesign).unwrap();
        with_slice(doc, PhaseName::Implementation, |s| {
            s.add_task("one");
        });
        wf.fire(Event::BeginExecution).unwrap();
        with_slice(doc, PhaseName::Implementation, |s| {
            s.complete_task(1);
        });
        wf.fire(Event::CompleteImplementation).unwrap();
        wf.fire(Event::EnableReview).unwrap();
    }

    #[test]
    fn test_failed_review_reopens_implementation() {
        let (mut wf, doc) = fresh(&StandardProject);
        drive_to_review_active(&mut wf, &doc);

        with_slice(&doc, PhaseName::Review, |s| {
            s.record_report(ReviewAssessment::Fail, Some("misses edge case".into()));
        });
        // A failing latest report blocks completion and opens the
        // backward edge instead.
        assert!(!wf.can_fire(Event::CompleteReview));
        assert!(wf.can_fire(Event::ReviewFail));

        assert_eq!(wf.fire(Event::ReviewFail).unwrap(), State::ImplementationPlanning);
        assert_eq!(status(&doc, PhaseName::Implementation), PhaseStatus::Active);
        assert_eq!(status(&doc, PhaseName::Review), PhaseStatus::Pending);

        // Rework and come back through review with a passing report.
        with_slice(&doc, PhaseName::Implementation, |s| {
            let id = s.add_task("handle edge case");
            s.complete_task(id);
        });
        wf.fire(Event::BeginExecution).unwrap();
        wf.fire(Event::CompleteImplementation).unwrap();
        wf.fire(Event::EnableReview).unwrap();
        with_slice(&doc, PhaseName::Review, |s| {
            s.record_report(ReviewAssessment::Pass, None);
        });
        assert_eq!(wf.fire(Event::CompleteReview).unwrap(), State::FinalizeDocumentation);
        assert_eq!(doc.borrow().phase(PhaseName::Review).unwrap().reports.len(), 2);
    }

    #[test]
    fn test_review_edges_are_mutually_exclusive() {
        let (mut wf, doc) = fresh(&StandardProject);
        drive_to_review_active(&mut wf, &doc);

        // No report yet: neither edge is eligible.
        assert!(!wf.can_fire(Event::CompleteReview));
        assert!(!wf.can_fire(Event::ReviewFail));

        with_slice(&doc, PhaseName::Review, |s| {
            s.record_report(ReviewAssessment::Pass, None);
        });
        assert!(wf.can_fire(Event::CompleteReview));
        assert!(!wf.can_fire(Event::ReviewFail));
    }

    #[test]
    fn test_hotfix_goes_straight_to_implementation() {
        let (mut wf, _doc) = fresh(&HotfixProject);
        assert_eq!(wf.fire(Event::StartProject).unwrap(), State::ImplementationPlanning);
        // The dropped phases are not part of the composition at all.
        assert!(wf.phase(PhaseName::Discovery).is_err());
        assert!(wf.phase(PhaseName::Design).is_err());
        assert!(wf.phase(PhaseName::Review).is_ok());
    }

    #[test]
    fn test_hotfix_keeps_the_reopen_loop() {
        let (mut wf, doc) = fresh(&HotfixProject);
        wf.fire(Event::StartProject).unwrap();
        with_slice(&doc, PhaseName::Implementation, |s| {
            let id = s.add_task("patch");
            s.complete_task(id);
        });
        wf.fire(Event::BeginExecution).unwrap();
        wf.fire(Event::CompleteImplementation).unwrap();
        wf.fire(Event::EnableReview).unwrap();
        with_slice(&doc, PhaseName::Review, |s| {
            s.record_report(ReviewAssessment::Fail, None);
        });
        assert_eq!(wf.fire(Event::ReviewFail).unwrap(), State::ImplementationPlanning);
    }

    #[test]
    fn test_hotfix_overrides_the_planning_prompt() {
        let set = HotfixProject.prompt_set();
        assert_eq!(
            set.get(State::ImplementationPlanning).unwrap().title,
            "Hotfix planning"
        );
        // Everything else stays stock.
        assert_eq!(set.get(State::ReviewActive).unwrap().title, "Review");
    }

    #[test]
    fn test_type_names_are_stable_discriminators() {
        assert_eq!(StandardProject.type_name(), "standard");
        assert_eq!(HotfixProject.type_name(), "hotfix");
    }
}
