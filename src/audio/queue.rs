use tracing::{debug, info};

use crate::{
    error::{MusicError, Result},
    sources::Song,
};

/// Cola de reproducción de una sesión.
///
/// Solo crece por el final; se consume moviendo un cursor, nunca quitando
/// elementos, para que `queue` pueda listar también lo ya reproducido.
/// Invariante: `cursor <= songs.len()`.
#[derive(Debug)]
pub struct SongQueue {
    songs: Vec<Song>,
    cursor: usize,
    max_pending: usize,
}

impl SongQueue {
    pub fn new(max_pending: usize) -> Self {
        Self {
            songs: Vec::new(),
            cursor: 0,
            max_pending,
        }
    }

    /// Agrega una canción al final y devuelve su índice
    pub fn push(&mut self, song: Song) -> Result<usize> {
        if self.pending() >= self.max_pending {
            return Err(MusicError::QueueFull(self.max_pending));
        }

        info!("➕ Agregado a la cola: {}", song.title());
        self.songs.push(song);
        Ok(self.songs.len() - 1)
    }

    /// Agrega varias canciones (playlist) hasta llenar el espacio disponible.
    ///
    /// Devuelve los índices asignados, en orden.
    pub fn extend(&mut self, songs: Vec<Song>) -> Vec<usize> {
        let available = self.max_pending.saturating_sub(self.pending());
        let start = self.songs.len();

        self.songs.extend(songs.into_iter().take(available));

        let added = start..self.songs.len();
        info!("➕ Agregadas {} canciones a la cola", added.len());
        added.collect()
    }

    /// Entrada bajo el cursor, si queda alguna
    pub fn current(&self) -> Option<(usize, &Song)> {
        self.songs.get(self.cursor).map(|song| (self.cursor, song))
    }

    /// Mueve el cursor una posición. No pasa nunca de `len`.
    pub fn advance(&mut self) -> bool {
        if self.cursor >= self.songs.len() {
            return false;
        }
        self.cursor += 1;
        debug!("➡️ Cursor en {}/{}", self.cursor, self.songs.len());
        true
    }

    pub fn get(&self, index: usize) -> Option<&Song> {
        self.songs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Song> {
        self.songs.get_mut(index)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Entradas que todavía no se reprodujeron ni saltaron (incluida la actual)
    pub fn pending(&self) -> usize {
        self.songs.len() - self.cursor
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    pub fn titles(&self) -> Vec<String> {
        self.songs.iter().map(|song| song.title().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn song(title: &str) -> Song {
        Song::new(title, format!("https://www.youtube.com/watch?v={title}"))
    }

    #[test]
    fn cursor_never_passes_the_end() {
        let mut queue = SongQueue::new(10);
        queue.push(song("a")).unwrap();

        assert!(queue.advance());
        assert!(!queue.advance());
        assert_eq!(queue.cursor(), 1);
        assert!(queue.current().is_none());
    }

    #[test]
    fn consumed_entries_stay_listable() {
        let mut queue = SongQueue::new(10);
        queue.push(song("a")).unwrap();
        queue.push(song("b")).unwrap();
        queue.advance();

        assert_eq!(queue.titles(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(queue.current().map(|(i, s)| (i, s.title())), Some((1, "b")));
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn push_rejects_when_pending_limit_reached() {
        let mut queue = SongQueue::new(1);
        queue.push(song("a")).unwrap();

        assert_eq!(queue.push(song("b")), Err(MusicError::QueueFull(1)));

        // Lo consumido ya no cuenta para el límite
        queue.advance();
        assert_eq!(queue.push(song("b")), Ok(1));
    }

    #[test]
    fn extend_truncates_to_available_space() {
        let mut queue = SongQueue::new(3);
        queue.push(song("a")).unwrap();

        let indices = queue.extend(vec![song("b"), song("c"), song("d")]);

        assert_eq!(indices, vec![1, 2]);
        assert_eq!(queue.len(), 3);
    }
}
