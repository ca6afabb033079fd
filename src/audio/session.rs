use dashmap::DashMap;
use serenity::model::id::ChannelId;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        downloader::{DownloadJob, DownloadWorker, Downloader},
        output::AudioSink,
        player::PlaybackController,
        presence::{presence_action, PresenceAction},
        queue::SongQueue,
        status::{notify, StatusEvent, StatusSender},
    },
    config::Config,
    error::{MusicError, Result},
    sources::Song,
};

pub type SessionInbox = mpsc::UnboundedSender<SessionEvent>;

/// Todo lo que puede llegarle a una sesión: pedidos de los handles y
/// señales internas del worker de descargas y de la salida de audio.
#[derive(Debug)]
pub enum SessionEvent {
    Enqueue {
        song: Song,
        reply: oneshot::Sender<Result<usize>>,
    },
    EnqueueMany {
        songs: Vec<Song>,
        reply: oneshot::Sender<Result<usize>>,
    },
    Skip {
        reply: oneshot::Sender<Result<()>>,
    },
    ListQueue {
        reply: oneshot::Sender<Vec<String>>,
    },
    Presence {
        occupants: usize,
    },
    TrackEnded {
        index: usize,
    },
    TrackFailed {
        index: usize,
        reason: String,
    },
    DownloadFinished {
        index: usize,
        result: Result<PathBuf>,
    },
}

/// Parámetros de una sesión
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_queue_size: usize,
    pub progress_step: f32,
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_queue_size: config.max_queue_size,
            progress_step: config.progress_step,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            progress_step: 10.0,
        }
    }
}

/// Sesión de reproducción de un canal de voz.
///
/// Una tarea dueña de la cola y del [`PlaybackController`] procesa los
/// eventos de a uno, así que el estado no necesita locks. El
/// [`DownloadWorker`] y el monitor de presencia corren en sus propias
/// tareas y solo hablan con ella a través del inbox.
pub struct Session;

impl Session {
    pub fn spawn<S, D>(
        config: SessionConfig,
        sink: S,
        downloader: Arc<D>,
        status: StatusSender,
    ) -> SessionHandle
    where
        S: AudioSink + 'static,
        D: Downloader,
    {
        let (inbox, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let downloads = DownloadWorker::spawn(
            downloader,
            inbox.clone(),
            status.clone(),
            config.progress_step,
            cancel.child_token(),
        );
        let actor = SessionActor {
            queue: SongQueue::new(config.max_queue_size),
            controller: PlaybackController::new(sink, inbox.clone(), status.clone()),
            downloads,
            events,
            status: status.clone(),
        };
        tokio::spawn(actor.run(cancel.clone()));

        SessionHandle {
            inbox,
            status,
            cancel,
        }
    }
}

/// Handle clonable para operar una sesión desde los comandos del bot
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inbox: SessionInbox,
    status: StatusSender,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Agrega una canción; devuelve su posición en la cola
    pub async fn enqueue(&self, song: Song) -> Result<usize> {
        self.request(|reply| SessionEvent::Enqueue { song, reply })
            .await?
    }

    /// Agrega varias canciones; devuelve cuántas entraron
    pub async fn enqueue_many(&self, songs: Vec<Song>) -> Result<usize> {
        self.request(|reply| SessionEvent::EnqueueMany { songs, reply })
            .await?
    }

    pub async fn skip(&self) -> Result<()> {
        self.request(|reply| SessionEvent::Skip { reply }).await?
    }

    /// Títulos de toda la cola, incluidos los ya reproducidos
    pub async fn list_queue(&self) -> Result<Vec<String>> {
        self.request(|reply| SessionEvent::ListQueue { reply })
            .await
    }

    /// Muestra de ocupación del canal de voz
    pub fn presence(&self, occupants: usize) {
        let _ = self.inbox.send(SessionEvent::Presence { occupants });
    }

    /// Publica un evento en el canal de estado de esta sesión
    pub fn report(&self, event: StatusEvent) {
        notify(&self.status, event);
    }

    /// Token que se cancela junto con la sesión
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.inbox.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionEvent,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(make(reply))
            .map_err(|_| MusicError::SessionClosed)?;
        rx.await.map_err(|_| MusicError::SessionClosed)
    }
}

struct SessionActor<S> {
    queue: SongQueue,
    controller: PlaybackController<S>,
    downloads: DownloadWorker,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    status: StatusSender,
}

impl<S: AudioSink> SessionActor<S> {
    async fn run(mut self, cancel: CancellationToken) {
        info!("🎧 Sesión iniciada");

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle(event).await;
        }

        info!("👋 Sesión finalizada ({} canciones en la cola)", self.queue.len());
    }

    async fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Enqueue { song, reply } => {
                let result = self.enqueue(song).await;
                let _ = reply.send(result);
            }
            SessionEvent::EnqueueMany { songs, reply } => {
                let result = self.enqueue_many(songs).await;
                let _ = reply.send(result);
            }
            SessionEvent::Skip { reply } => {
                let result = self.controller.skip(&mut self.queue).await;
                if let Err(e) = &result {
                    notify(&self.status, StatusEvent::Failed(e.clone()));
                }
                let _ = reply.send(result);
            }
            SessionEvent::ListQueue { reply } => {
                let titles = self.queue.titles();
                if titles.is_empty() {
                    notify(&self.status, StatusEvent::QueueEmpty);
                } else {
                    notify(
                        &self.status,
                        StatusEvent::QueueListing {
                            titles: titles.clone(),
                            cursor: self.queue.cursor(),
                        },
                    );
                }
                let _ = reply.send(titles);
            }
            SessionEvent::Presence { occupants } => {
                match presence_action(occupants, self.controller.is_paused()) {
                    Some(PresenceAction::Pause) => {
                        info!("👥 Canal vacío, pausando");
                        self.controller.pause().await;
                    }
                    Some(PresenceAction::Resume) => {
                        info!("👥 Volvió alguien, reanudando");
                        self.controller.unpause().await;
                    }
                    None => {}
                }
            }
            SessionEvent::TrackEnded { index } => {
                self.controller.on_track_ended(index, &mut self.queue).await;
            }
            SessionEvent::TrackFailed { index, reason } => {
                self.controller
                    .on_track_failed(index, &reason, &mut self.queue)
                    .await;
            }
            SessionEvent::DownloadFinished { index, result } => {
                match self.queue.get_mut(index) {
                    Some(song) => {
                        let updated = match result {
                            Ok(path) => song.mark_ready(path),
                            Err(e) => song.mark_failed(e.to_string()),
                        };
                        if !updated {
                            warn!("Descarga repetida para la entrada {}", index);
                        }
                    }
                    None => {
                        warn!("Descarga para una entrada inexistente: {}", index);
                        return;
                    }
                }
                self.controller
                    .on_download_finished(index, &mut self.queue)
                    .await;
            }
        }
    }

    async fn enqueue(&mut self, song: Song) -> Result<usize> {
        let was_drained = self.queue.pending() == 0;
        let requester = song.requester();
        let job = DownloadJob {
            index: self.queue.len(),
            title: song.title().to_string(),
            url: song.source_url().to_string(),
        };

        let index = self.queue.push(song).inspect_err(|e| {
            notify(&self.status, StatusEvent::Failed(e.clone()));
        })?;
        debug_assert_eq!(index, job.index);

        let title = job.title.clone();
        self.downloads.enqueue(job)?;
        notify(&self.status, StatusEvent::Queued { title, requester });

        if was_drained {
            self.controller.start(&mut self.queue).await;
        }
        Ok(index)
    }

    async fn enqueue_many(&mut self, songs: Vec<Song>) -> Result<usize> {
        let was_drained = self.queue.pending() == 0;
        let requested = songs.len();

        let indices = self.queue.extend(songs);
        if indices.is_empty() && requested > 0 {
            let e = MusicError::QueueFull(self.queue.max_pending());
            notify(&self.status, StatusEvent::Failed(e.clone()));
            return Err(e);
        }
        if indices.len() < requested {
            warn!(
                "Playlist truncada: {} de {} canciones",
                indices.len(),
                requested
            );
        }

        for &index in &indices {
            let Some(song) = self.queue.get(index) else {
                continue;
            };
            self.downloads.enqueue(DownloadJob {
                index,
                title: song.title().to_string(),
                url: song.source_url().to_string(),
            })?;
        }
        debug!(
            "{} descargas en espera (activa: {})",
            self.downloads.queued(),
            self.downloads.is_downloading()
        );
        notify(
            &self.status,
            StatusEvent::PlaylistLoaded {
                count: indices.len(),
            },
        );

        if was_drained && !indices.is_empty() {
            self.controller.start(&mut self.queue).await;
        }
        Ok(indices.len())
    }
}

/// Registro explícito de sesiones por canal de voz, inyectado en el bot
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<ChannelId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra la sesión; si ya había una para el canal la reemplaza y la cierra
    pub fn insert(&self, channel_id: ChannelId, handle: SessionHandle) {
        if let Some(previous) = self.sessions.insert(channel_id, handle) {
            previous.shutdown();
        }
    }

    pub fn get(&self, channel_id: ChannelId) -> Option<SessionHandle> {
        self.sessions.get(&channel_id).map(|h| h.clone())
    }

    pub fn contains(&self, channel_id: ChannelId) -> bool {
        self.sessions.contains_key(&channel_id)
    }

    pub fn remove(&self, channel_id: ChannelId) -> Option<SessionHandle> {
        self.sessions.remove(&channel_id).map(|(_, handle)| handle)
    }

    pub fn channels(&self) -> Vec<ChannelId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn shutdown_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().shutdown();
        }
        self.sessions.clear();
    }
}
