pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use youtube::YtDlpClient;

/// Trait común para resolver consultas de usuario a canciones
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resuelve una búsqueda o URL a una única canción
    async fn resolve(&self, query: &str) -> Result<Song>;

    /// Resuelve una playlist completa, en orden
    async fn resolve_list(&self, playlist_url: &str) -> Result<Vec<Song>>;
}

/// Estado del archivo local de una canción.
#[derive(Debug, Clone, PartialEq)]
pub enum SongFile {
    /// Todavía en la cola de descargas
    Pending,
    Ready(PathBuf),
    /// La descarga falló; la canción nunca será reproducible
    Failed(String),
    /// Reproducida (o con error) y archivo eliminado
    Consumed,
}

/// Canción resuelta por el [`MediaResolver`].
///
/// Inmutable salvo por `file`, que solo avanza `Pending -> Ready | Failed`
/// y después `Ready -> Consumed`.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    title: String,
    source_url: String,
    requested_by: Option<UserId>,
    file: SongFile,
}

impl Song {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
            requested_by: None,
            file: SongFile::Pending,
        }
    }

    /// Atribuye la canción al miembro que la pidió
    pub fn requested_by(mut self, user: UserId) -> Self {
        self.requested_by = Some(user);
        self
    }

    pub fn requester(&self) -> Option<UserId> {
        self.requested_by
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn file(&self) -> &SongFile {
        &self.file
    }

    /// Ruta del archivo descargado, solo mientras sea reproducible
    pub fn local_file(&self) -> Option<&Path> {
        match &self.file {
            SongFile::Ready(path) => Some(path),
            _ => None,
        }
    }

    /// Marca la canción como descargada. Devuelve `false` si ya había salido de `Pending`.
    pub fn mark_ready(&mut self, path: PathBuf) -> bool {
        if self.file != SongFile::Pending {
            return false;
        }
        self.file = SongFile::Ready(path);
        true
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> bool {
        if self.file != SongFile::Pending {
            return false;
        }
        self.file = SongFile::Failed(reason.into());
        true
    }

    /// Pasa a `Consumed` y devuelve la ruta que hay que borrar, si la había.
    pub fn consume(&mut self) -> Option<PathBuf> {
        match std::mem::replace(&mut self.file, SongFile::Consumed) {
            SongFile::Ready(path) => Some(path),
            SongFile::Failed(reason) => {
                self.file = SongFile::Failed(reason);
                None
            }
            _ => None,
        }
    }
}
