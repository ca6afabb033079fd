//! Fakes compartidos por los tests de `audio`.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::oneshot;

use crate::{
    audio::{
        downloader::{DownloadJob, Downloader, ProgressReporter},
        output::{AudioSink, TrackEvents},
        status::{StatusEvent, StatusReceiver},
    },
    error::MusicError,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Play(PathBuf),
    Pause,
    Unpause,
    Stop,
}

/// Salida de audio que registra llamadas. Falla al cargar rutas con "broken".
#[derive(Clone, Default)]
pub struct FakeSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    current: Arc<Mutex<Option<TrackEvents>>>,
}

impl FakeSink {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    pub fn played(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                SinkCall::Play(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Simula que la pista actual llegó a su fin natural
    pub fn finish_current(&self) {
        if let Some(events) = self.current.lock().take() {
            events.ended();
        }
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn play(&mut self, path: &Path, events: TrackEvents) -> Result<()> {
        self.calls.lock().push(SinkCall::Play(path.to_path_buf()));
        if path.to_string_lossy().contains("broken") {
            anyhow::bail!("formato no soportado");
        }
        *self.current.lock() = Some(events);
        Ok(())
    }

    async fn pause(&mut self) {
        self.calls.lock().push(SinkCall::Pause);
    }

    async fn unpause(&mut self) {
        self.calls.lock().push(SinkCall::Unpause);
    }

    async fn stop(&mut self) {
        self.calls.lock().push(SinkCall::Stop);
        if let Some(events) = self.current.lock().take() {
            events.ended();
        }
    }
}

/// Descargador instrumentado.
///
/// Cada trabajo termina al instante salvo que el test haya retenido su URL
/// con [`FakeDownloader::hold`]; en ese caso espera a que se suelte.
#[derive(Clone, Default)]
pub struct FakeDownloader {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    started: Arc<Mutex<Vec<String>>>,
    gates: Arc<Mutex<HashMap<String, oneshot::Receiver<()>>>>,
    failing: Arc<Mutex<Vec<String>>>,
    progress: Arc<Mutex<Vec<f32>>>,
}

impl FakeDownloader {
    /// Retiene la descarga de `url` hasta que se envíe por el sender devuelto
    pub fn hold(&self, url: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(url.to_string(), rx);
        tx
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().push(url.to_string());
    }

    /// Progreso que el fake emite en cada descarga
    pub fn with_progress(self, steps: &[f32]) -> Self {
        *self.progress.lock() = steps.to_vec();
        self
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(
        &self,
        job: &DownloadJob,
        progress: &mut ProgressReporter,
    ) -> crate::error::Result<PathBuf> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.started.lock().push(job.url.clone());

        let steps = self.progress.lock().clone();
        for percent in steps {
            progress.observe(percent);
        }

        let gate = self.gates.lock().remove(&job.url);
        if let Some(gate) = gate {
            let _ = gate.await;
        } else {
            tokio::task::yield_now().await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().contains(&job.url) {
            return Err(MusicError::download(&job.title, "yt-dlp salió con código 1"));
        }
        Ok(PathBuf::from(format!("{}.mp3", job.title)))
    }
}

/// Espera a que `condition` se cumpla; falla el test a los 2 segundos
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    assert!(polled.is_ok(), "la condición no se cumplió a tiempo");
}

/// Vacía lo que haya en el canal de estado sin esperar
pub fn drain(status: &mut StatusReceiver) -> Vec<StatusEvent> {
    let mut events = Vec::new();
    while let Ok(event) = status.try_recv() {
        events.push(event);
    }
    events
}
