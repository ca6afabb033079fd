use async_trait::async_trait;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    audio::{
        session::{SessionEvent, SessionInbox},
        status::{notify, StatusEvent, StatusSender},
    },
    error::{MusicError, Result},
};

/// Trabajo de la cola de descargas
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJob {
    /// Posición de la canción en la cola de reproducción
    pub index: usize,
    pub title: String,
    pub url: String,
}

/// Herramienta externa que baja el audio de una canción a disco
#[async_trait]
pub trait Downloader: Send + Sync + 'static {
    /// Descarga `job` y devuelve la ruta del archivo producido
    async fn download(&self, job: &DownloadJob, progress: &mut ProgressReporter)
        -> Result<PathBuf>;
}

/// Filtro de progreso: solo deja pasar avances de al menos `step` puntos
/// respecto al último valor reportado.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    step: f32,
    last: f32,
}

impl ProgressTracker {
    pub fn new(step: f32) -> Self {
        Self { step, last: 0.0 }
    }

    pub fn observe(&mut self, percent: f32) -> Option<f32> {
        if percent - self.last >= self.step {
            self.last = percent;
            Some(percent)
        } else {
            None
        }
    }
}

/// Reporta el progreso de una descarga al canal de estado
pub struct ProgressReporter {
    title: String,
    tracker: ProgressTracker,
    status: StatusSender,
}

impl ProgressReporter {
    pub fn new(title: impl Into<String>, step: f32, status: StatusSender) -> Self {
        Self {
            title: title.into(),
            tracker: ProgressTracker::new(step),
            status,
        }
    }

    pub fn observe(&mut self, percent: f32) {
        if let Some(percent) = self.tracker.observe(percent) {
            debug!("⏬ {}: {:.1}%", self.title, percent);
            notify(
                &self.status,
                StatusEvent::DownloadProgress {
                    title: self.title.clone(),
                    percent,
                },
            );
        }
    }
}

/// Descargador en segundo plano de una sesión.
///
/// Una sola tarea consume la cola FIFO, así que nunca hay dos descargas
/// activas a la vez. Cada resultado vuelve a la sesión como
/// [`SessionEvent::DownloadFinished`].
pub struct DownloadWorker {
    jobs: mpsc::UnboundedSender<DownloadJob>,
    busy: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
}

impl DownloadWorker {
    pub fn spawn<D: Downloader>(
        downloader: Arc<D>,
        inbox: SessionInbox,
        status: StatusSender,
        progress_step: f32,
        cancel: CancellationToken,
    ) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let busy = Arc::new(AtomicBool::new(false));
        let queued = Arc::new(AtomicUsize::new(0));

        let worker = Worker {
            downloader,
            jobs: rx,
            inbox,
            status,
            progress_step,
            busy: busy.clone(),
            queued: queued.clone(),
        };
        tokio::spawn(worker.run(cancel));

        Self { jobs, busy, queued }
    }

    pub fn enqueue(&self, job: DownloadJob) -> Result<()> {
        debug!("📥 En cola de descarga: {}", job.title);
        self.queued.fetch_add(1, Ordering::SeqCst);
        self.jobs.send(job).map_err(|_| {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            MusicError::SessionClosed
        })
    }

    pub fn is_downloading(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Trabajos esperando, sin contar el que está en curso
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}

struct Worker<D> {
    downloader: Arc<D>,
    jobs: mpsc::UnboundedReceiver<DownloadJob>,
    inbox: SessionInbox,
    status: StatusSender,
    progress_step: f32,
    busy: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
}

impl<D: Downloader> Worker<D> {
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            let job = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                job = self.jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.queued.fetch_sub(1, Ordering::SeqCst);

            self.busy.store(true, Ordering::SeqCst);
            info!("⏬ Descargando: {}", job.title);
            notify(
                &self.status,
                StatusEvent::Downloading {
                    title: job.title.clone(),
                },
            );

            let mut reporter =
                ProgressReporter::new(&job.title, self.progress_step, self.status.clone());
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.busy.store(false, Ordering::SeqCst);
                    break;
                }
                result = self.downloader.download(&job, &mut reporter) => result,
            };
            self.busy.store(false, Ordering::SeqCst);

            match &result {
                Ok(path) => {
                    info!("✅ Descarga completa: {} -> {}", job.title, path.display());
                    notify(
                        &self.status,
                        StatusEvent::Downloaded {
                            title: job.title.clone(),
                        },
                    );
                }
                Err(e) => {
                    error!("❌ Error descargando {}: {}", job.title, e);
                    notify(&self.status, StatusEvent::Failed(e.clone()));
                }
            }

            let finished = SessionEvent::DownloadFinished {
                index: job.index,
                result,
            };
            if self.inbox.send(finished).is_err() {
                break;
            }
        }

        debug!("Worker de descargas terminado");
    }
}
