//! Workflow vocabulary and phase shapes.
//!
//! A phase is a reusable unit of workflow: it owns one or two (or more)
//! machine states, the internal transitions between them, and the exit
//! event that signals the phase is finished. Phases come in a closed set
//! of three shapes:
//! - [`DecisionPhase`]: optional work behind an enable/skip decision
//! - [`DualStatePhase`]: mandatory work split into planning and execution
//! - [`MultiStagePhase`]: a fixed ladder of gated stages
//!
//! The chain builder ([`build_phase_chain`]) stitches an ordered list of
//! phases into one machine by pointing each phase's exit at the next
//! phase's entry and closing the loop back to the idle state.

pub mod builtin;
mod chain;
mod decision;
mod dual;
mod multi;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use chain::build_phase_chain;
pub use decision::DecisionPhase;
pub use dual::DualStatePhase;
pub use multi::{MultiStagePhase, StageSpec};

use crate::machine::StateMachine;
use crate::state::{PhaseData, PhaseHandle, SharedDoc};

/// Every state a workflow machine can occupy. The machine itself treats
/// these as opaque ordered tokens; the names exist for serialization and
/// display.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Idle: no project in flight. Initial and final state of every chain.
    #[default]
    NoProject,
    DiscoveryDecision,
    DiscoveryActive,
    DesignDecision,
    DesignActive,
    ImplementationPlanning,
    ImplementationExecuting,
    ReviewDecision,
    ReviewActive,
    FinalizeDocumentation,
    FinalizeChecks,
    FinalizeDeletion,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::NoProject => "no_project",
            State::DiscoveryDecision => "discovery_decision",
            State::DiscoveryActive => "discovery_active",
            State::DesignDecision => "design_decision",
            State::DesignActive => "design_active",
            State::ImplementationPlanning => "implementation_planning",
            State::ImplementationExecuting => "implementation_executing",
            State::ReviewDecision => "review_decision",
            State::ReviewActive => "review_active",
            State::FinalizeDocumentation => "finalize_documentation",
            State::FinalizeChecks => "finalize_checks",
            State::FinalizeDeletion => "finalize_deletion",
        }
    }

    /// The phase this state belongs to, if any.
    pub fn phase(&self) -> Option<PhaseName> {
        match self {
            State::NoProject => None,
            State::DiscoveryDecision | State::DiscoveryActive => Some(PhaseName::Discovery),
            State::DesignDecision | State::DesignActive => Some(PhaseName::Design),
            State::ImplementationPlanning | State::ImplementationExecuting => {
                Some(PhaseName::Implementation)
            }
            State::ReviewDecision | State::ReviewActive => Some(PhaseName::Review),
            State::FinalizeDocumentation | State::FinalizeChecks | State::FinalizeDeletion => {
                Some(PhaseName::Finalize)
            }
        }
    }

    /// The event that moves the workflow forward out of this state, when
    /// one exists. Decision states have no single forward event (the
    /// decision is enable-or-skip) and the idle state advances by
    /// starting a project, so both return `None`.
    pub fn advance_event(&self) -> Option<Event> {
        match self {
            State::NoProject | State::DiscoveryDecision | State::DesignDecision
            | State::ReviewDecision => None,
            State::DiscoveryActive => Some(Event::CompleteDiscovery),
            State::DesignActive => Some(Event::CompleteDesign),
            State::ImplementationPlanning => Some(Event::BeginExecution),
            State::ImplementationExecuting => Some(Event::CompleteImplementation),
            State::ReviewActive => Some(Event::CompleteReview),
            State::FinalizeDocumentation => Some(Event::CompleteDocumentation),
            State::FinalizeChecks => Some(Event::CompleteChecks),
            State::FinalizeDeletion => Some(Event::CompleteDeletion),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every event a workflow machine can be asked to fire. Declaration
/// order is the canonical display order for permitted-event listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    StartProject,
    EnableDiscovery,
    SkipDiscovery,
    CompleteDiscovery,
    EnableDesign,
    SkipDesign,
    CompleteDesign,
    BeginExecution,
    CompleteImplementation,
    EnableReview,
    SkipReview,
    CompleteReview,
    /// Exceptional backward edge: a failed review reopens implementation.
    ReviewFail,
    CompleteDocumentation,
    CompleteChecks,
    CompleteDeletion,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StartProject => "start_project",
            Event::EnableDiscovery => "enable_discovery",
            Event::SkipDiscovery => "skip_discovery",
            Event::CompleteDiscovery => "complete_discovery",
            Event::EnableDesign => "enable_design",
            Event::SkipDesign => "skip_design",
            Event::CompleteDesign => "complete_design",
            Event::BeginExecution => "begin_execution",
            Event::CompleteImplementation => "complete_implementation",
            Event::EnableReview => "enable_review",
            Event::SkipReview => "skip_review",
            Event::CompleteReview => "complete_review",
            Event::ReviewFail => "review_fail",
            Event::CompleteDocumentation => "complete_documentation",
            Event::CompleteChecks => "complete_checks",
            Event::CompleteDeletion => "complete_deletion",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical phase identities. Doubles as the key for per-phase data
/// slices in the project document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    Discovery,
    Design,
    Implementation,
    Review,
    Finalize,
}

impl PhaseName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::Discovery => "discovery",
            PhaseName::Design => "design",
            PhaseName::Implementation => "implementation",
            PhaseName::Review => "review",
            PhaseName::Finalize => "finalize",
        }
    }

    /// Event that opts into this phase, for phases that are optional.
    pub fn enable_event(&self) -> Option<Event> {
        match self {
            PhaseName::Discovery => Some(Event::EnableDiscovery),
            PhaseName::Design => Some(Event::EnableDesign),
            PhaseName::Review => Some(Event::EnableReview),
            PhaseName::Implementation | PhaseName::Finalize => None,
        }
    }

    /// Event that opts out of this phase, for phases that are optional.
    pub fn skip_event(&self) -> Option<Event> {
        match self {
            PhaseName::Discovery => Some(Event::SkipDiscovery),
            PhaseName::Design => Some(Event::SkipDesign),
            PhaseName::Review => Some(Event::SkipReview),
            PhaseName::Implementation | PhaseName::Finalize => None,
        }
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovery" => Ok(PhaseName::Discovery),
            "design" => Ok(PhaseName::Design),
            "implementation" => Ok(PhaseName::Implementation),
            "review" => Ok(PhaseName::Review),
            "finalize" => Ok(PhaseName::Finalize),
            _ => anyhow::bail!(
                "Invalid phase '{s}'. Valid phases: discovery, design, implementation, review, finalize"
            ),
        }
    }
}

/// Pure, data-driven completion predicates. Guards built from these read
/// a phase's data slice and nothing else, so the machine can evaluate
/// them repeatedly without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionRule {
    /// At least one artifact recorded and every artifact approved. An
    /// empty artifact list does not count as vacuously approved.
    ArtifactsApproved,
    /// At least one task recorded, in any status.
    HasTasks,
    /// At least one task recorded and every task done.
    TasksComplete,
    /// The most recently recorded review report passed.
    LatestReportPasses,
    /// The most recently recorded review report failed.
    LatestReportFails,
    /// The named custom field is present and true.
    FieldTrue(&'static str),
}

impl CompletionRule {
    pub fn evaluate(&self, data: &PhaseData) -> bool {
        match self {
            CompletionRule::ArtifactsApproved => {
                !data.artifacts.is_empty() && data.artifacts.iter().all(|a| a.approved)
            }
            CompletionRule::HasTasks => !data.tasks.is_empty(),
            CompletionRule::TasksComplete => {
                !data.tasks.is_empty() && data.tasks.iter().all(|t| t.is_done())
            }
            CompletionRule::LatestReportPasses => {
                data.latest_report().is_some_and(|r| r.passed())
            }
            CompletionRule::LatestReportFails => {
                data.latest_report().is_some_and(|r| !r.passed())
            }
            CompletionRule::FieldTrue(key) => data.field_bool(key),
        }
    }
}

/// Descriptive metadata the command layer uses to decide which item
/// verbs apply to a phase. Purely informational; guards enforce the
/// actual rules.
#[derive(Debug, Clone, Copy)]
pub struct PhaseMeta {
    pub supports_tasks: bool,
    pub supports_artifacts: bool,
    pub custom_fields: &'static [CustomFieldDef],
}

impl PhaseMeta {
    pub const fn none() -> Self {
        Self {
            supports_tasks: false,
            supports_artifacts: false,
            custom_fields: &[],
        }
    }

    pub fn field(&self, key: &str) -> Option<&CustomFieldDef> {
        self.custom_fields.iter().find(|def| def.key == key)
    }
}

/// One structured field a phase tracks beyond tasks and artifacts.
#[derive(Debug, Clone, Copy)]
pub struct CustomFieldDef {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Text,
}

/// The three shapes a phase can take. A closed set: workflow composition
/// never needs to be generic over unknown shapes, and the chain builder
/// can reason about all of them by construction.
#[derive(Debug)]
pub enum PhaseShape {
    Decision(DecisionPhase),
    DualState(DualStatePhase),
    MultiStage(MultiStagePhase),
}

/// A named, shaped unit of workflow plus its command-layer metadata.
///
/// A `Phase` does not own a machine; it contributes its states and
/// transitions to one via [`Phase::wire`], which the chain builder calls
/// with the state the workflow should land on once this phase exits.
#[derive(Debug)]
pub struct Phase {
    name: PhaseName,
    shape: PhaseShape,
    meta: PhaseMeta,
}

impl Phase {
    pub fn new(name: PhaseName, shape: PhaseShape, meta: PhaseMeta) -> Self {
        Self { name, shape, meta }
    }

    pub fn name(&self) -> PhaseName {
        self.name
    }

    pub fn meta(&self) -> &PhaseMeta {
        &self.meta
    }

    /// State the workflow lands on when this phase begins.
    pub fn entry_state(&self) -> State {
        match &self.shape {
            PhaseShape::Decision(p) => p.entry_state(),
            PhaseShape::DualState(p) => p.entry_state(),
            PhaseShape::MultiStage(p) => p.entry_state(),
        }
    }

    /// Event whose firing leaves this phase for the next one.
    pub fn exit_event(&self) -> Event {
        match &self.shape {
            PhaseShape::Decision(p) => p.exit_event(),
            PhaseShape::DualState(p) => p.exit_event(),
            PhaseShape::MultiStage(p) => p.exit_event(),
        }
    }

    /// Every state this phase owns, entry first.
    pub fn states(&self) -> Vec<State> {
        match &self.shape {
            PhaseShape::Decision(p) => p.states(),
            PhaseShape::DualState(p) => p.states(),
            PhaseShape::MultiStage(p) => p.states(),
        }
    }

    /// Register this phase's states, transitions, and data actions on
    /// `machine`. `next_entry` is where the workflow goes when the phase
    /// exits (or is skipped).
    pub(crate) fn wire(&self, machine: &mut StateMachine, doc: &SharedDoc, next_entry: State) {
        let handle = PhaseHandle::new(doc.clone(), self.name);
        match &self.shape {
            PhaseShape::Decision(p) => p.wire(machine, handle, next_entry),
            PhaseShape::DualState(p) => p.wire(machine, handle, next_entry),
            PhaseShape::MultiStage(p) => p.wire(machine, handle, next_entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Artifact, ReviewAssessment};

    #[test]
    fn test_state_tokens_are_stable_in_yaml() {
        let yaml = serde_yaml::to_string(&State::ImplementationExecuting).unwrap();
        assert_eq!(yaml.trim(), "implementation_executing");
        let back: State = serde_yaml::from_str("review_decision").unwrap();
        assert_eq!(back, State::ReviewDecision);
    }

    #[test]
    fn test_state_display_matches_serde_token() {
        for state in [
            State::NoProject,
            State::DiscoveryDecision,
            State::FinalizeDeletion,
        ] {
            let yaml = serde_yaml::to_string(&state).unwrap();
            assert_eq!(yaml.trim(), state.to_string());
        }
    }

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(State::default(), State::NoProject);
    }

    #[test]
    fn test_every_state_maps_to_its_phase() {
        assert_eq!(State::NoProject.phase(), None);
        assert_eq!(State::DiscoveryActive.phase(), Some(PhaseName::Discovery));
        assert_eq!(
            State::ImplementationPlanning.phase(),
            Some(PhaseName::Implementation)
        );
        assert_eq!(State::FinalizeChecks.phase(), Some(PhaseName::Finalize));
    }

    #[test]
    fn test_advance_event_table() {
        assert_eq!(State::NoProject.advance_event(), None);
        assert_eq!(State::DiscoveryDecision.advance_event(), None);
        assert_eq!(
            State::ImplementationPlanning.advance_event(),
            Some(Event::BeginExecution)
        );
        assert_eq!(
            State::ReviewActive.advance_event(),
            Some(Event::CompleteReview)
        );
        assert_eq!(
            State::FinalizeDeletion.advance_event(),
            Some(Event::CompleteDeletion)
        );
    }

    #[test]
    fn test_phase_name_round_trips_through_str() {
        for name in [
            PhaseName::Discovery,
            PhaseName::Design,
            PhaseName::Implementation,
            PhaseName::Review,
            PhaseName::Finalize,
        ] {
            let parsed: PhaseName = name.as_str().parse().unwrap();
            assert_eq!(parsed, name);
        }
    }

    #[test]
    fn test_phase_name_rejects_unknown_with_hint() {
        let err = "deploy".parse::<PhaseName>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Invalid phase 'deploy'"));
        assert!(msg.contains("discovery"));
    }

    #[test]
    fn test_optional_phases_have_decision_events() {
        assert_eq!(
            PhaseName::Discovery.enable_event(),
            Some(Event::EnableDiscovery)
        );
        assert_eq!(PhaseName::Review.skip_event(), Some(Event::SkipReview));
        assert_eq!(PhaseName::Implementation.enable_event(), None);
        assert_eq!(PhaseName::Finalize.skip_event(), None);
    }

    #[test]
    fn test_artifacts_approved_rejects_empty_and_unapproved() {
        let mut data = PhaseData::default();
        assert!(!CompletionRule::ArtifactsApproved.evaluate(&data));

        data.artifacts.push(Artifact::new("notes.md"));
        assert!(!CompletionRule::ArtifactsApproved.evaluate(&data));

        for artifact in &mut data.artifacts {
            artifact.approved = true;
        }
        assert!(CompletionRule::ArtifactsApproved.evaluate(&data));
    }

    #[test]
    fn test_task_rules() {
        let mut data = PhaseData::default();
        assert!(!CompletionRule::HasTasks.evaluate(&data));
        assert!(!CompletionRule::TasksComplete.evaluate(&data));

        let first = data.add_task("write parser");
        let second = data.add_task("wire cli");
        assert!(CompletionRule::HasTasks.evaluate(&data));
        assert!(!CompletionRule::TasksComplete.evaluate(&data));

        assert!(data.complete_task(first));
        assert!(!CompletionRule::TasksComplete.evaluate(&data));
        assert!(data.complete_task(second));
        assert!(CompletionRule::TasksComplete.evaluate(&data));
    }

    #[test]
    fn test_latest_report_rules_use_only_the_newest_report() {
        let mut data = PhaseData::default();
        assert!(!CompletionRule::LatestReportPasses.evaluate(&data));
        assert!(!CompletionRule::LatestReportFails.evaluate(&data));

        data.record_report(ReviewAssessment::Fail, Some("missing tests".into()));
        assert!(CompletionRule::LatestReportFails.evaluate(&data));

        data.record_report(ReviewAssessment::Pass, None);
        assert!(CompletionRule::LatestReportPasses.evaluate(&data));
        assert!(!CompletionRule::LatestReportFails.evaluate(&data));
    }

    #[test]
    fn test_field_rule_reads_bool_fields_only() {
        let mut data = PhaseData::default();
        assert!(!CompletionRule::FieldTrue("docs_updated").evaluate(&data));

        data.set_field("docs_updated", crate::state::FieldValue::Bool(false));
        assert!(!CompletionRule::FieldTrue("docs_updated").evaluate(&data));

        data.set_field("docs_updated", crate::state::FieldValue::Bool(true));
        assert!(CompletionRule::FieldTrue("docs_updated").evaluate(&data));

        data.set_field("branch", crate::state::FieldValue::Text("main".into()));
        assert!(!CompletionRule::FieldTrue("branch").evaluate(&data));
    }

    #[test]
    fn test_meta_field_lookup() {
        let phase = builtin::finalize();
        assert!(phase.meta().field("docs_updated").is_some());
        assert!(phase.meta().field("nonsense").is_none());
    }
}
