use super::events::{Command, EventInbox, Request};
use super::orchestrator::{run, Orchestrator};
use super::snapshot::DashboardSnapshot;
use crate::error::{CommandError, OrchestratorClosed};
use crate::modality::Modality;
use tokio::sync::{mpsc, oneshot, watch};

const COMMAND_QUEUE: usize = 32;

/// Cloneable front door to a running orchestrator
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Request>,
    snapshots: watch::Receiver<DashboardSnapshot>,
}

impl Orchestrator {
    /// Move the orchestrator into its own task
    pub fn spawn(self, inbox: EventInbox) -> OrchestratorHandle {
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
        let snapshots = self.subscribe();

        tokio::spawn(run(self, rx, inbox));

        OrchestratorHandle { commands, snapshots }
    }
}

impl OrchestratorHandle {
    /// Send a command and wait for the state it produced
    pub async fn execute(&self, command: Command) -> Result<DashboardSnapshot, CommandError> {
        let (reply, response) = oneshot::channel();

        self.commands
            .send(Request { command, reply })
            .await
            .map_err(|_| OrchestratorClosed)?;

        let result = response.await.map_err(|_| OrchestratorClosed)?;
        Ok(result?)
    }

    pub async fn toggle_video(&self) -> Result<DashboardSnapshot, CommandError> {
        self.execute(Command::ToggleVideo).await
    }

    pub async fn toggle_audio(&self) -> Result<DashboardSnapshot, CommandError> {
        self.execute(Command::ToggleAudio).await
    }

    pub async fn start_video(&self) -> Result<DashboardSnapshot, CommandError> {
        self.execute(Command::StartVideo).await
    }

    pub async fn stop_video(&self) -> Result<DashboardSnapshot, CommandError> {
        self.execute(Command::StopVideo).await
    }

    pub async fn start_recording(&self) -> Result<DashboardSnapshot, CommandError> {
        self.execute(Command::StartRecording).await
    }

    pub async fn stop_recording(&self) -> Result<DashboardSnapshot, CommandError> {
        self.execute(Command::StopRecording).await
    }

    pub async fn compute_audio_summary(&self) -> Result<DashboardSnapshot, CommandError> {
        self.execute(Command::ComputeAudioSummary).await
    }

    pub async fn dismiss_error(&self, modality: Modality) -> Result<DashboardSnapshot, CommandError> {
        self.execute(Command::DismissError(modality)).await
    }

    pub async fn snapshot(&self) -> Result<DashboardSnapshot, CommandError> {
        self.execute(Command::Snapshot).await
    }

    /// Tear everything down and stop the orchestrator task
    pub async fn shutdown(&self) -> Result<DashboardSnapshot, CommandError> {
        self.execute(Command::Shutdown).await
    }

    /// Receiver that sees every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshots.clone()
    }

    /// Most recently published snapshot, without a round trip
    pub fn latest(&self) -> DashboardSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
