use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        output::{AudioSink, TrackEvents},
        queue::SongQueue,
        session::SessionInbox,
        status::{notify, StatusEvent, StatusSender},
    },
    error::{MusicError, Result},
    sources::{Song, SongFile},
};

/// Estado del reproductor. Los índices son posiciones en la [`SongQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Nada cargado todavía
    Idle,
    Playing(usize),
    /// Recurso cargado pero suspendido
    Paused(usize),
    /// Salida detenida por un skip; falta su fin de pista
    Stopping(usize),
    /// La entrada bajo el cursor aún no terminó de descargarse
    WaitingForDownload(usize),
    /// El cursor llegó al final de la cola
    Empty,
}

/// Máquina de estados que recorre la cola en orden y maneja la salida de audio.
///
/// No tiene tareas propias: la sesión le entrega cada señal (fin de pista,
/// descarga completada, skip, pausa) y le presta la cola.
pub struct PlaybackController<S> {
    sink: S,
    state: PlayerState,
    paused: bool,
    inbox: SessionInbox,
    status: StatusSender,
}

impl<S: AudioSink> PlaybackController<S> {
    pub fn new(sink: S, inbox: SessionInbox, status: StatusSender) -> Self {
        Self {
            sink,
            state: PlayerState::Idle,
            paused: false,
            inbox,
            status,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Arranca la reproducción si el reproductor no tiene nada seleccionado
    pub async fn start(&mut self, queue: &mut SongQueue) {
        if matches!(self.state, PlayerState::Idle | PlayerState::Empty) {
            self.select(queue).await;
        }
    }

    /// Mueve el cursor y selecciona la siguiente entrada.
    ///
    /// Con el cursor ya al final solo deja el estado en `Empty`.
    pub async fn advance(&mut self, queue: &mut SongQueue) {
        queue.advance();
        self.select(queue).await;
    }

    /// La salida terminó (o se detuvo) la pista `index`
    pub async fn on_track_ended(&mut self, index: usize, queue: &mut SongQueue) {
        if !self.is_loaded(index) {
            debug!("Fin de pista {} ignorado en estado {:?}", index, self.state);
            return;
        }

        discard(queue, index).await;
        self.advance(queue).await;
    }

    /// La salida reportó un error para la pista `index`; cuenta como terminada
    pub async fn on_track_failed(&mut self, index: usize, reason: &str, queue: &mut SongQueue) {
        if !self.is_loaded(index) {
            debug!("Error de pista {} ignorado en estado {:?}", index, self.state);
            return;
        }

        let title = queue.get(index).map(Song::title).unwrap_or_default();
        error!("❌ Error de reproducción en '{}': {}", title, reason);
        notify(
            &self.status,
            StatusEvent::Failed(MusicError::playback(title, reason)),
        );

        discard(queue, index).await;
        self.advance(queue).await;
    }

    /// La descarga de `index` terminó (bien o mal) y la cola ya refleja el resultado
    pub async fn on_download_finished(&mut self, index: usize, queue: &mut SongQueue) {
        if index < queue.cursor() {
            // Saltada mientras se descargaba: nadie va a reproducirla
            discard(queue, index).await;
            return;
        }

        if self.state == PlayerState::WaitingForDownload(index) {
            self.select(queue).await;
        }
    }

    pub async fn skip(&mut self, queue: &mut SongQueue) -> Result<()> {
        match self.state {
            PlayerState::Playing(index) | PlayerState::Paused(index) => {
                info!("⏭️ Saltando pista {}", index);
                // El fin de pista resultante hace avanzar el cursor
                self.state = PlayerState::Stopping(index);
                self.sink.stop().await;
                notify(&self.status, StatusEvent::Skipped);
                Ok(())
            }
            PlayerState::Stopping(index) => {
                debug!("Skip repetido mientras se detiene la pista {}", index);
                Err(MusicError::NothingToSkip)
            }
            PlayerState::WaitingForDownload(index) => {
                info!("⏭️ Saltando pista {} sin descargar", index);
                notify(&self.status, StatusEvent::Skipped);
                self.advance(queue).await;
                Ok(())
            }
            PlayerState::Idle | PlayerState::Empty => Err(MusicError::NothingToSkip),
        }
    }

    /// Devuelve `true` solo si el estado cambió
    pub async fn pause(&mut self) -> bool {
        if self.paused {
            return false;
        }
        self.paused = true;

        if let PlayerState::Playing(index) = self.state {
            self.sink.pause().await;
            self.state = PlayerState::Paused(index);
        }

        info!("⏸️ Reproducción pausada");
        notify(&self.status, StatusEvent::Paused);
        true
    }

    pub async fn unpause(&mut self) -> bool {
        if !self.paused {
            return false;
        }
        self.paused = false;

        if let PlayerState::Paused(index) = self.state {
            self.sink.unpause().await;
            self.state = PlayerState::Playing(index);
        }

        info!("▶️ Reproducción reanudada");
        notify(&self.status, StatusEvent::Resumed);
        true
    }

    fn is_loaded(&self, index: usize) -> bool {
        matches!(
            self.state,
            PlayerState::Playing(i) | PlayerState::Paused(i) | PlayerState::Stopping(i)
                if i == index
        )
    }

    /// Evalúa la entrada bajo el cursor hasta reproducir, esperar o vaciarse
    async fn select(&mut self, queue: &mut SongQueue) {
        loop {
            let (index, title, requester, file) = match queue.current() {
                Some((index, song)) => (
                    index,
                    song.title().to_string(),
                    song.requester(),
                    song.file().clone(),
                ),
                None => {
                    if self.state != PlayerState::Empty {
                        info!("📭 Cola terminada");
                        notify(&self.status, StatusEvent::QueueFinished);
                    }
                    self.state = PlayerState::Empty;
                    return;
                }
            };

            match file {
                SongFile::Pending => {
                    debug!("⏳ Esperando descarga de '{}'", title);
                    self.state = PlayerState::WaitingForDownload(index);
                    notify(&self.status, StatusEvent::Waiting { title });
                    return;
                }
                SongFile::Ready(path) => {
                    let events = TrackEvents::new(index, self.inbox.clone());
                    match self.sink.play(&path, events).await {
                        Ok(()) => {
                            info!("🎵 Reproduciendo: {}", title);
                            self.state = PlayerState::Playing(index);
                            notify(&self.status, StatusEvent::NowPlaying { title, requester });

                            if self.paused {
                                self.sink.pause().await;
                                self.state = PlayerState::Paused(index);
                            }
                            return;
                        }
                        Err(e) => {
                            error!("❌ No se pudo cargar '{}': {:?}", title, e);
                            notify(
                                &self.status,
                                StatusEvent::Failed(MusicError::playback(&title, e)),
                            );
                            discard(queue, index).await;
                            queue.advance();
                        }
                    }
                }
                SongFile::Failed(_) | SongFile::Consumed => {
                    warn!("⏭️ '{}' no es reproducible, se salta", title);
                    queue.advance();
                }
            }
        }
    }

}

/// Marca la entrada como consumida y borra su archivo, si lo tenía
async fn discard(queue: &mut SongQueue, index: usize) {
    if let Some(path) = queue.get_mut(index).and_then(Song::consume) {
        remove_backing_file(path).await;
    }
}

async fn remove_backing_file(path: PathBuf) {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => debug!("🗑️ Archivo eliminado: {}", path.display()),
        Err(e) => warn!("No se pudo eliminar {}: {}", path.display(), e),
    }
}
