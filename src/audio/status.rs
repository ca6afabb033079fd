use serenity::model::id::UserId;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::MusicError;

pub type StatusSender = mpsc::UnboundedSender<StatusEvent>;
pub type StatusReceiver = mpsc::UnboundedReceiver<StatusEvent>;

/// Notificación legible emitida en cada transición de la sesión.
///
/// El núcleo solo las produce; el anunciador del bot las convierte en embeds.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Joined,
    Queued {
        title: String,
        requester: Option<UserId>,
    },
    PlaylistLoading { url: String },
    PlaylistLoaded { count: usize },
    Downloading { title: String },
    DownloadProgress { title: String, percent: f32 },
    Downloaded { title: String },
    Waiting { title: String },
    NowPlaying {
        title: String,
        requester: Option<UserId>,
    },
    Paused,
    Resumed,
    Skipped,
    QueueListing { titles: Vec<String>, cursor: usize },
    QueueEmpty,
    QueueFinished,
    InvalidCommand { reason: String },
    Help { message: String },
    Failed(MusicError),
}

pub fn status_channel() -> (StatusSender, StatusReceiver) {
    mpsc::unbounded_channel()
}

/// Envía un evento sin fallar si el anunciador ya no existe
pub fn notify(status: &StatusSender, event: StatusEvent) {
    if let Err(e) = status.send(event) {
        debug!("Anunciador cerrado, evento descartado: {:?}", e.0);
    }
}
