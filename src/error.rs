use thiserror::Error;

/// Errores del motor de sesión.
///
/// Todas las variantes son `Clone` para poder viajar dentro de
/// [`StatusEvent::Failed`](crate::audio::status::StatusEvent) hasta el canal de texto.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MusicError {
    /// Consulta o playlist que yt-dlp no pudo resolver
    #[error("No se pudo resolver `{query}`: {reason}")]
    Resolution { query: String, reason: String },

    /// Fallo de la herramienta de descarga o archivo de salida inexistente
    #[error("Falló la descarga de `{title}`: {reason}")]
    Download { title: String, reason: String },

    /// El recurso no se pudo cargar o reproducir
    #[error("Error reproduciendo `{title}`: {reason}")]
    Playback { title: String, reason: String },

    #[error("No hay canciones en la cola para saltar")]
    NothingToSkip,

    /// Fallo al unirse o en el handshake del canal de voz
    #[error("No se pudo conectar al canal de voz {channel_id}: {reason}")]
    ChannelJoin { channel_id: u64, reason: String },

    #[error("La cola está llena (máximo {0} canciones pendientes)")]
    QueueFull(usize),

    #[error("La sesión ya no está activa")]
    SessionClosed,
}

impl MusicError {
    pub fn resolution(query: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolution {
            query: query.into(),
            reason: reason.to_string(),
        }
    }

    pub fn download(title: impl Into<String>, reason: impl ToString) -> Self {
        Self::Download {
            title: title.into(),
            reason: reason.to_string(),
        }
    }

    pub fn playback(title: impl Into<String>, reason: impl ToString) -> Self {
        Self::Playback {
            title: title.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MusicError>;
