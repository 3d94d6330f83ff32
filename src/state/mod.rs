//! Persisted project state.
//!
//! | Module     | Purpose                                             |
//! |------------|-----------------------------------------------------|
//! | `document` | The project document and per-phase data slices      |
//! | `store`    | Load/save the document under `.usher/`              |

mod document;
mod store;

pub use document::{
    shared, Artifact, FieldValue, PhaseData, PhaseHandle, PhaseStatus, ProjectDoc,
    ReviewAssessment, ReviewReport, SharedDoc, Task, TaskStatus,
};
pub use store::{StateStore, DOC_FILE, USHER_DIR};
