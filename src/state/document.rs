//! The project document: one YAML-serializable value holding everything
//! a workflow knows between process invocations.
//!
//! The document has two halves. The machine half is `current_state`,
//! written only by the workflow after a successful fire. The data half is
//! the per-phase slices under `phases`, mutated by commands (add a task,
//! approve an artifact) and read by guards. Guards never see the document
//! directly; they go through a [`PhaseHandle`] scoped to one phase.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::phases::{PhaseName, State};

fn default_version() -> String {
    "1".to_string()
}

fn default_project_type() -> String {
    "standard".to_string()
}

/// Root of the persisted document. Unknown discriminators and missing
/// sections are tolerated on load; every field has a usable default so
/// old documents keep parsing as the schema grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDoc {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Project type discriminator. Resolved against the type registry on
    /// load; unrecognized values fall back to the baseline type.
    #[serde(default = "default_project_type")]
    pub project_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub current_state: State,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub phases: BTreeMap<PhaseName, PhaseData>,
}

impl ProjectDoc {
    /// Fresh idle document for a project of `project_type`, with empty
    /// data slices for each named phase.
    pub fn new(project_type: &str, phases: impl IntoIterator<Item = PhaseName>) -> Self {
        let now = Utc::now();
        Self {
            version: default_version(),
            id: Uuid::new_v4(),
            project_type: project_type.to_string(),
            name: None,
            current_state: State::NoProject,
            created_at: now,
            updated_at: now,
            phases: phases
                .into_iter()
                .map(|name| (name, PhaseData::default()))
                .collect(),
        }
    }

    /// Reset the document for a new project run: fresh identity, fresh
    /// timestamps, every existing phase slice cleared back to pending.
    /// `current_state` is untouched; the machine owns it.
    pub fn begin_project(&mut self, name: Option<String>) {
        let now = Utc::now();
        self.id = Uuid::new_v4();
        self.name = name;
        self.created_at = now;
        self.updated_at = now;
        for slice in self.phases.values_mut() {
            *slice = PhaseData::default();
        }
    }

    /// Make sure a data slice exists for every named phase. Existing
    /// slices are left alone.
    pub fn ensure_phases(&mut self, names: impl IntoIterator<Item = PhaseName>) {
        for name in names {
            self.phases.entry(name).or_default();
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn phase(&self, name: PhaseName) -> Option<&PhaseData> {
        self.phases.get(&name)
    }

    pub fn phase_mut(&mut self, name: PhaseName) -> &mut PhaseData {
        self.phases.entry(name).or_default()
    }
}

/// Shared ownership of the document within one process. The workflow,
/// its guards, and the command layer all hold clones of this. Single
/// threaded by design; nothing here is `Send`.
pub type SharedDoc = Rc<RefCell<ProjectDoc>>;

pub fn shared(doc: ProjectDoc) -> SharedDoc {
    Rc::new(RefCell::new(doc))
}

/// A phase's view of its own data slice.
///
/// `check` is the read side used by guards: a missing slice reads as
/// "gate closed" rather than panicking or allocating. `update` is the
/// write side used by actions: it creates the slice on first touch.
#[derive(Clone)]
pub struct PhaseHandle {
    doc: SharedDoc,
    name: PhaseName,
}

impl PhaseHandle {
    pub fn new(doc: SharedDoc, name: PhaseName) -> Self {
        Self { doc, name }
    }

    pub fn name(&self) -> PhaseName {
        self.name
    }

    pub fn check(&self, predicate: impl FnOnce(&PhaseData) -> bool) -> bool {
        self.doc
            .borrow()
            .phase(self.name)
            .map(predicate)
            .unwrap_or(false)
    }

    pub fn update(&self, mutate: impl FnOnce(&mut PhaseData)) {
        mutate(self.doc.borrow_mut().phase_mut(self.name));
    }
}

/// Lifecycle of one phase within one project run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Active,
    Skipped,
    Completed,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::Active => "active",
            PhaseStatus::Skipped => "skipped",
            PhaseStatus::Completed => "completed",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Done => "done",
        })
    }
}

/// One unit of implementation work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

/// A produced file or document awaiting approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    #[serde(default)]
    pub approved: bool,
    pub added_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            approved: false,
            added_at: Utc::now(),
        }
    }
}

/// Outcome of one review round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAssessment {
    Pass,
    Fail,
}

impl fmt::Display for ReviewAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReviewAssessment::Pass => "pass",
            ReviewAssessment::Fail => "fail",
        })
    }
}

impl FromStr for ReviewAssessment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(ReviewAssessment::Pass),
            "fail" => Ok(ReviewAssessment::Fail),
            _ => anyhow::bail!("Invalid assessment '{s}'. Valid assessments: pass, fail"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub assessment: ReviewAssessment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ReviewReport {
    pub fn passed(&self) -> bool {
        self.assessment == ReviewAssessment::Pass
    }
}

/// Value of one custom phase field. Untagged so the YAML reads naturally
/// (`docs_updated: true`, `branch: main`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Everything one phase records during a project run. Guards read this;
/// actions and item commands write it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseData {
    #[serde(default)]
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<ReviewReport>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldValue>,
}

impl PhaseData {
    /// Mark the phase active. Idempotent against re-entry: the original
    /// start time survives, and a stale completion stamp is cleared so a
    /// reopened phase reads as in-flight again.
    pub fn activate(&mut self) {
        self.status = PhaseStatus::Active;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.completed_at = None;
    }

    pub fn mark_skipped(&mut self) {
        self.status = PhaseStatus::Skipped;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.status = PhaseStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Put the phase back in the queue for another pass. History (tasks,
    /// reports, start time) is kept; only the lifecycle resets.
    pub fn requeue(&mut self) {
        self.status = PhaseStatus::Pending;
        self.completed_at = None;
    }

    /// Append a task and return its id. Ids are stable for the lifetime
    /// of the run; they are never reused.
    pub fn add_task(&mut self, name: &str) -> u32 {
        let id = self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        self.tasks.push(Task {
            id,
            name: name.to_string(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        });
        id
    }

    /// Mark the task done. Returns false when no task has that id.
    pub fn complete_task(&mut self, id: u32) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                if !task.is_done() {
                    task.status = TaskStatus::Done;
                    task.completed_at = Some(Utc::now());
                }
                true
            }
            None => false,
        }
    }

    pub fn done_task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_done()).count()
    }

    /// Record an artifact path. Returns false when the path is already
    /// recorded; the existing entry (and its approval) is kept.
    pub fn add_artifact(&mut self, path: &str) -> bool {
        if self.artifacts.iter().any(|a| a.path == path) {
            return false;
        }
        self.artifacts.push(Artifact::new(path));
        true
    }

    /// Approve a recorded artifact. Returns false when the path is not
    /// recorded.
    pub fn approve_artifact(&mut self, path: &str) -> bool {
        match self.artifacts.iter_mut().find(|a| a.path == path) {
            Some(artifact) => {
                artifact.approved = true;
                true
            }
            None => false,
        }
    }

    pub fn unapproved_count(&self) -> usize {
        self.artifacts.iter().filter(|a| !a.approved).count()
    }

    pub fn record_report(&mut self, assessment: ReviewAssessment, summary: Option<String>) {
        self.reports.push(ReviewReport {
            assessment,
            summary,
            recorded_at: Utc::now(),
        });
    }

    /// Most recently recorded report. Recording order is authoritative,
    /// not timestamps.
    pub fn latest_report(&self) -> Option<&ReviewReport> {
        self.reports.last()
    }

    pub fn set_field(&mut self, key: &str, value: FieldValue) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn field_bool(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(FieldValue::Bool(true)))
    }
}
