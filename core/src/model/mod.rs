//! Closed-set record types for every on-disk document.
//!
//! The original system stores untyped JSON blobs and relies on field
//! presence; this module is the boundary where raw bytes become explicit
//! fields and enum variants. Validation happens here, once, rather than at
//! every call site.

pub mod context;
pub mod loop_state;
pub mod mailbox;
pub mod project;
pub mod session;
pub mod swarm;
pub mod task;
pub mod wave;
pub mod worker;

pub use context::Context;
pub use loop_state::LoopState;
pub use mailbox::{Message, MessageType};
pub use project::Project;
pub use session::{EvidenceRecord, ExplorationStage, Phase, Session};
pub use swarm::{SwarmPlan, SwarmStatus};
pub use task::{Complexity, Task, TaskStatus};
pub use wave::{WavePlan, WaveStatus};
pub use worker::{Worker, WorkerStatus};
