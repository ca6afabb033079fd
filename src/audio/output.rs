use anyhow::Result;
use async_trait::async_trait;
use songbird::{
    input::{File, Input},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::{path::Path, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::audio::session::{SessionEvent, SessionInbox};

/// Canal por el que la salida de audio avisa del fin (o error) de una pista.
///
/// Cada pista recibe el suyo, marcado con el índice de cola que se cargó,
/// así la sesión puede descartar avisos de pistas que ya no son la actual.
#[derive(Debug, Clone)]
pub struct TrackEvents {
    index: usize,
    inbox: SessionInbox,
}

impl TrackEvents {
    pub(crate) fn new(index: usize, inbox: SessionInbox) -> Self {
        Self { index, inbox }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn ended(&self) {
        let _ = self.inbox.send(SessionEvent::TrackEnded { index: self.index });
    }

    pub fn failed(&self, reason: impl ToString) {
        let _ = self.inbox.send(SessionEvent::TrackFailed {
            index: self.index,
            reason: reason.to_string(),
        });
    }
}

/// Reproductor de audio al que la sesión entrega los archivos descargados
#[async_trait]
pub trait AudioSink: Send {
    /// Carga y empieza a reproducir `path`; el fin se notifica por `events`
    async fn play(&mut self, path: &Path, events: TrackEvents) -> Result<()>;

    async fn pause(&mut self);

    async fn unpause(&mut self);

    /// Detiene la pista actual. Debe terminar disparando `TrackEvents::ended`.
    async fn stop(&mut self);
}

/// Salida de audio sobre una llamada de songbird
pub struct SongbirdSink {
    call: Arc<Mutex<Call>>,
    current: Option<TrackHandle>,
}

impl SongbirdSink {
    pub fn new(call: Arc<Mutex<Call>>) -> Self {
        Self {
            call,
            current: None,
        }
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn play(&mut self, path: &Path, events: TrackEvents) -> Result<()> {
        let input: Input = File::new(path.to_path_buf()).into();

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };

        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndNotifier {
                    events: events.clone(),
                },
            )
            .map_err(|e| anyhow::anyhow!("Error al agregar event handler: {}", e))?;
        handle
            .add_event(Event::Track(TrackEvent::Error), TrackErrorNotifier { events })
            .map_err(|e| anyhow::anyhow!("Error al agregar event handler: {}", e))?;

        self.current = Some(handle);
        Ok(())
    }

    async fn pause(&mut self) {
        if let Some(track) = &self.current {
            if let Err(e) = track.pause() {
                warn!("No se pudo pausar la pista: {:?}", e);
            }
        }
    }

    async fn unpause(&mut self) {
        if let Some(track) = &self.current {
            if let Err(e) = track.play() {
                warn!("No se pudo reanudar la pista: {:?}", e);
            }
        }
    }

    async fn stop(&mut self) {
        if let Some(track) = self.current.take() {
            if let Err(e) = track.stop() {
                warn!("No se pudo detener la pista: {:?}", e);
            }
        }
    }
}

/// Handler para cuando termina (o se detiene) una pista
struct TrackEndNotifier {
    events: TrackEvents,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("Track {} terminado", self.events.index());
        self.events.ended();
        None
    }
}

/// Handler para errores de reproducción
struct TrackErrorNotifier {
    events: TrackEvents,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let reason = match ctx {
            EventContext::Track(track_list) => track_list
                .first()
                .map(|(state, _handle)| format!("{:?}", state.playing))
                .unwrap_or_else(|| "error desconocido".to_string()),
            _ => "error desconocido".to_string(),
        };

        error!("❌ Error en track {}: {}", self.events.index(), reason);
        self.events.failed(reason);
        None
    }
}
