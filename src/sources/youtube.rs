use anyhow::Context;
use async_process::Command;
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, error, info, warn};
use url::Url;

use super::{MediaResolver, Song};
use crate::{
    audio::downloader::{DownloadJob, Downloader, ProgressReporter},
    config::Config,
    error::{MusicError, Result},
};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Cliente de yt-dlp: resuelve búsquedas y playlists, y descarga el audio a disco
pub struct YtDlpClient {
    ytdlp_path: String,
    download_dir: PathBuf,
    max_playlist_size: usize,
    progress: ProgressParser,
    seq: AtomicU64,
}

impl YtDlpClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            ytdlp_path: config.ytdlp_path.clone(),
            download_dir: config.download_dir.clone(),
            max_playlist_size: config.max_playlist_size,
            progress: ProgressParser::new()?,
            seq: AtomicU64::new(0),
        })
    }

    /// Verifica que yt-dlp y ffmpeg (usado para extraer el mp3) respondan
    pub async fn verify_dependencies(&self) -> anyhow::Result<()> {
        let output = Command::new(&self.ytdlp_path)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("No se encontró {}", self.ytdlp_path))?;

        if !output.status.success() {
            error!("❌ yt-dlp no disponible. Instala con: pip install yt-dlp");
            anyhow::bail!("yt-dlp salió con {}", output.status);
        }
        let version = String::from_utf8_lossy(&output.stdout);
        info!("✅ yt-dlp versión: {}", version.trim());

        match Command::new("ffmpeg").arg("-version").output().await {
            Ok(output) if output.status.success() => info!("✅ ffmpeg disponible"),
            _ => {
                error!("❌ ffmpeg no encontrado. Instala con: sudo apt install ffmpeg");
                anyhow::bail!("ffmpeg no disponible");
            }
        }

        Ok(())
    }

    /// Ejecuta yt-dlp y devuelve su stdout; cualquier fallo es de resolución.
    ///
    /// `target` va después de `--` para que yt-dlp nunca lo lea como opción.
    async fn run_resolver(&self, query: &str, target: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.ytdlp_path)
            .args(args)
            .arg("--")
            .arg(target)
            .output()
            .await
            .map_err(|e| MusicError::resolution(query, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp falló resolviendo '{}': {}", query, stderr.trim());
            return Err(MusicError::resolution(query, failure_reason(&stderr, output.status)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Nombre único para el archivo de una descarga
    fn next_token(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", Utc::now().timestamp_millis(), seq)
    }
}

#[async_trait]
impl MediaResolver for YtDlpClient {
    async fn resolve(&self, query: &str) -> Result<Song> {
        info!("🔍 Resolviendo: {}", query);

        let target = search_target(query);
        let stdout = self
            .run_resolver(
                query,
                &target,
                &[
                    "--get-title",
                    "--get-id",
                    "--no-playlist",
                    "--no-warnings",
                ],
            )
            .await?;

        let (title, id) = parse_title_id_pairs(&stdout)
            .map_err(|reason| MusicError::resolution(query, reason))?
            .into_iter()
            .next()
            .ok_or_else(|| MusicError::resolution(query, "sin resultados"))?;

        debug!("Resuelto '{}' -> {}", query, id);
        Ok(Song::new(title, watch_url(&id)))
    }

    async fn resolve_list(&self, playlist_url: &str) -> Result<Vec<Song>> {
        let parsed = Url::parse(playlist_url)
            .map_err(|e| MusicError::resolution(playlist_url, format!("URL inválida: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MusicError::resolution(
                playlist_url,
                "la playlist debe ser una URL http(s)",
            ));
        }

        info!("📋 Resolviendo playlist: {}", playlist_url);
        let limit = self.max_playlist_size.to_string();
        let stdout = self
            .run_resolver(
                playlist_url,
                playlist_url,
                &[
                    "--flat-playlist",
                    "--get-title",
                    "--get-id",
                    "--playlist-end",
                    &limit,
                    "--no-warnings",
                ],
            )
            .await?;

        let songs: Vec<Song> = parse_title_id_pairs(&stdout)
            .map_err(|reason| MusicError::resolution(playlist_url, reason))?
            .into_iter()
            .map(|(title, id)| Song::new(title, watch_url(&id)))
            .collect();

        info!("📋 Playlist con {} canciones", songs.len());
        Ok(songs)
    }
}

#[async_trait]
impl Downloader for YtDlpClient {
    async fn download(
        &self,
        job: &DownloadJob,
        progress: &mut ProgressReporter,
    ) -> Result<PathBuf> {
        let token = self.next_token();
        let template = self.download_dir.join(format!("{token}.%(ext)s"));

        let mut child = tokio::process::Command::new(&self.ytdlp_path)
            .args([
                "--no-playlist",
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "0",
                "--newline",
                "--output",
            ])
            .arg(&template)
            .arg("--")
            .arg(&job.url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MusicError::download(&job.title, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let watch_progress = async {
            let Some(stdout) = stdout else { return };
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(percent) = self.progress.percent(&line) {
                    progress.observe(percent);
                }
            }
        };
        let collect_errors = async {
            let mut buffer = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buffer).await;
            }
            buffer
        };
        let ((), errors) = tokio::join!(watch_progress, collect_errors);

        let status = child
            .wait()
            .await
            .map_err(|e| MusicError::download(&job.title, e))?;
        if !status.success() {
            warn!("yt-dlp falló para {}: {}", job.url, errors.trim());
            return Err(MusicError::download(&job.title, failure_reason(&errors, status)));
        }

        find_output(&self.download_dir, &token)
            .await
            .ok_or_else(|| MusicError::download(&job.title, "yt-dlp no produjo ningún archivo"))
    }
}

/// Extrae el porcentaje de las líneas de progreso de yt-dlp
/// (`[download]  42.5% of 3.2MiB ...`)
pub struct ProgressParser {
    pattern: Regex,
}

impl ProgressParser {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            pattern: Regex::new(r"(\d+\.\d+)%")?,
        })
    }

    pub fn percent(&self, line: &str) -> Option<f32> {
        self.pattern
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

/// URLs http(s) van tal cual; el resto es una búsqueda del primer resultado
fn search_target(query: &str) -> String {
    match Url::parse(query) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => query.to_string(),
        _ => format!("ytsearch1:{}", query),
    }
}

/// Última línea de error de yt-dlp, sin el resto de su salida
fn failure_reason(stderr: &str, status: std::process::ExitStatus) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("yt-dlp salió con {status}"))
}

/// yt-dlp imprime título e id en líneas alternadas, en ese orden.
///
/// Un título vacío es válido; un id vacío no.
pub fn parse_title_id_pairs(stdout: &str) -> std::result::Result<Vec<(String, String)>, String> {
    let lines: Vec<&str> = stdout.trim_end_matches(['\r', '\n']).lines().collect();

    if lines.iter().all(|line| line.trim().is_empty()) {
        return Err("yt-dlp no devolvió resultados".to_string());
    }
    if lines.len() % 2 != 0 {
        return Err(format!(
            "salida de yt-dlp malformada ({} líneas)",
            lines.len()
        ));
    }

    lines
        .chunks(2)
        .map(|pair| {
            let (title, id) = (pair[0].trim(), pair[1].trim());
            if id.is_empty() {
                return Err(format!("entrada sin id (título '{}')", title));
            }
            Ok((title.to_string(), id.to_string()))
        })
        .collect()
}

pub fn watch_url(id: &str) -> String {
    format!("{WATCH_URL}{id}")
}

/// Busca en `dir` el archivo cuyo nombre sin extensión sea `token`
async fn find_output(dir: &Path, token: &str) -> Option<PathBuf> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("No se pudo leer {}: {}", dir.display(), e);
            return None;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.file_stem().and_then(|stem| stem.to_str()) == Some(token) {
            return Some(path);
        }
    }
    None
}
