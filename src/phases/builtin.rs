//! The stock phases every built-in project type is assembled from.
//!
//! Each constructor returns a fresh [`Phase`] value; project types own
//! their phase instances, so two workflows never share wiring.

use crate::phases::{
    CompletionRule, CustomFieldDef, DecisionPhase, DualStatePhase, Event, FieldKind,
    MultiStagePhase, Phase, PhaseMeta, PhaseName, PhaseShape, StageSpec, State,
};

/// Optional up-front research. Exit is gated on every recorded artifact
/// being approved.
pub fn discovery() -> Phase {
    Phase::new(
        PhaseName::Discovery,
        PhaseShape::Decision(DecisionPhase::new(
            State::DiscoveryDecision,
            State::DiscoveryActive,
            Event::EnableDiscovery,
            Event::SkipDiscovery,
            Event::CompleteDiscovery,
            CompletionRule::ArtifactsApproved,
        )),
        PhaseMeta {
            supports_tasks: false,
            supports_artifacts: true,
            custom_fields: &[],
        },
    )
}

/// Optional design write-up, same shape and gating as discovery.
pub fn design() -> Phase {
    Phase::new(
        PhaseName::Design,
        PhaseShape::Decision(DecisionPhase::new(
            State::DesignDecision,
            State::DesignActive,
            Event::EnableDesign,
            Event::SkipDesign,
            Event::CompleteDesign,
            CompletionRule::ArtifactsApproved,
        )),
        PhaseMeta {
            supports_tasks: false,
            supports_artifacts: true,
            custom_fields: &[],
        },
    )
}

/// Mandatory build work. Planning collects tasks; execution cannot begin
/// with an empty task list and cannot complete with an open task.
pub fn implementation() -> Phase {
    Phase::new(
        PhaseName::Implementation,
        PhaseShape::DualState(DualStatePhase::new(
            State::ImplementationPlanning,
            State::ImplementationExecuting,
            Event::BeginExecution,
            Event::CompleteImplementation,
            CompletionRule::HasTasks,
            CompletionRule::TasksComplete,
        )),
        PhaseMeta {
            supports_tasks: true,
            supports_artifacts: false,
            custom_fields: &[],
        },
    )
}

/// Optional review round. Completion requires the latest recorded report
/// to pass; a failing latest report instead makes the reopen edge
/// eligible.
pub fn review() -> Phase {
    Phase::new(
        PhaseName::Review,
        PhaseShape::Decision(DecisionPhase::new(
            State::ReviewDecision,
            State::ReviewActive,
            Event::EnableReview,
            Event::SkipReview,
            Event::CompleteReview,
            CompletionRule::LatestReportPasses,
        )),
        PhaseMeta::none(),
    )
}

const FINALIZE_FIELDS: &[CustomFieldDef] = &[
    CustomFieldDef {
        key: "docs_updated",
        label: "Documentation updated",
        kind: FieldKind::Bool,
    },
    CustomFieldDef {
        key: "checks_green",
        label: "Verification checks green",
        kind: FieldKind::Bool,
    },
    CustomFieldDef {
        key: "scratch_deleted",
        label: "Scratch files deleted",
        kind: FieldKind::Bool,
    },
];

/// Mandatory wrap-up ladder: documentation, then checks, then deletion
/// of scratch material. Each rung is gated by its own boolean field.
pub fn finalize() -> Phase {
    Phase::new(
        PhaseName::Finalize,
        PhaseShape::MultiStage(MultiStagePhase::new(
            StageSpec {
                state: State::FinalizeDocumentation,
                advance: Event::CompleteDocumentation,
                rule: CompletionRule::FieldTrue("docs_updated"),
            },
            vec![
                StageSpec {
                    state: State::FinalizeChecks,
                    advance: Event::CompleteChecks,
                    rule: CompletionRule::FieldTrue("checks_green"),
                },
                StageSpec {
                    state: State::FinalizeDeletion,
                    advance: Event::CompleteDeletion,
                    rule: CompletionRule::FieldTrue("scratch_deleted"),
                },
            ],
        )),
        PhaseMeta {
            supports_tasks: false,
            supports_artifacts: false,
            custom_fields: FINALIZE_FIELDS,
        },
    )
}
