use anyhow::Result;
use rand::seq::SliceRandom;
use serenity::model::id::UserId;
use tracing::{debug, info, warn};

use crate::{
    audio::{session::SessionHandle, status::StatusEvent},
    bot::commands::Command,
    error::MusicError,
    sources::MediaResolver,
};

const HELP_RESPONSES: [&str; 3] = [
    "Comandos disponibles: play, playlist, skip, queue",
    "No conozco ese comando. Prueba con play <búsqueda>, playlist <url>, skip o queue.",
    "🤔 ¿Qué quisiste decir? Puedo hacer: play, playlist, skip y queue.",
];

/// Ejecuta un comando sobre la sesión del canal de voz del autor.
///
/// Los fallos de dominio no se propagan: terminan como [`StatusEvent`] en el
/// canal de texto. Solo devuelve error si la sesión ya no existe.
pub async fn handle_command<R>(
    command: Command,
    requester: UserId,
    session: &SessionHandle,
    resolver: &R,
) -> Result<()>
where
    R: MediaResolver + ?Sized,
{
    info!("📝 Comando {} recibido", command.name());

    match command {
        Command::Play { query } => handle_play(&query, requester, session, resolver).await,
        Command::Playlist { url } => handle_playlist(&url, requester, session, resolver).await,
        Command::Skip => outcome(session.skip().await),
        Command::Queue => outcome(session.list_queue().await.map(|_| ())),
        Command::MissingArgument { hint, .. } => {
            session.report(StatusEvent::InvalidCommand {
                reason: hint.to_string(),
            });
            Ok(())
        }
        Command::Unknown { name } => {
            debug!("Comando desconocido: {}", name);
            session.report(StatusEvent::Help {
                message: help_message().to_string(),
            });
            Ok(())
        }
    }
}

async fn handle_play<R>(
    query: &str,
    requester: UserId,
    session: &SessionHandle,
    resolver: &R,
) -> Result<()>
where
    R: MediaResolver + ?Sized,
{
    let song = match resolver.resolve(query).await {
        Ok(song) => song.requested_by(requester),
        Err(e) => {
            warn!("No se pudo resolver '{}': {}", query, e);
            session.report(StatusEvent::Failed(e));
            return Ok(());
        }
    };

    outcome(session.enqueue(song).await.map(|_| ()))
}

async fn handle_playlist<R>(
    url: &str,
    requester: UserId,
    session: &SessionHandle,
    resolver: &R,
) -> Result<()>
where
    R: MediaResolver + ?Sized,
{
    session.report(StatusEvent::PlaylistLoading {
        url: url.to_string(),
    });

    let songs = match resolver.resolve_list(url).await {
        Ok(songs) => songs
            .into_iter()
            .map(|song| song.requested_by(requester))
            .collect(),
        Err(e) => {
            warn!("No se pudo cargar la playlist '{}': {}", url, e);
            session.report(StatusEvent::Failed(e));
            return Ok(());
        }
    };

    outcome(session.enqueue_many(songs).await.map(|_| ()))
}

/// La sesión ya notificó el error; solo una sesión cerrada es un fallo real
fn outcome(result: crate::error::Result<()>) -> Result<()> {
    match result {
        Err(MusicError::SessionClosed) => Err(MusicError::SessionClosed.into()),
        Err(e) => {
            debug!("Comando terminado con error ya notificado: {}", e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

fn help_message() -> &'static str {
    HELP_RESPONSES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(HELP_RESPONSES[0])
}
