//! Session orchestration
//!
//! The `Orchestrator` owns:
//! - which modalities are active
//! - one transport session per active modality
//! - the video and audio capture pipelines
//! - the audio playback context
//!
//! It runs as a single task; everything else talks to it through an
//! `OrchestratorHandle` and watches `DashboardSnapshot`s.

mod events;
mod handle;
mod orchestrator;
mod snapshot;

pub use events::{Command, Event, EventInbox};
pub use handle::OrchestratorHandle;
pub use orchestrator::{Devices, Orchestrator};
pub use snapshot::{AudioSnapshot, DashboardSnapshot, VideoSnapshot};
