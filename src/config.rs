use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub voice_channel_ids: Vec<u64>,
    pub command_prefix: String,

    // Descargas
    pub download_dir: PathBuf,
    pub ytdlp_path: String,
    pub progress_step: f32,

    // Tiempos
    pub presence_interval: Duration,
    pub join_timeout: Duration,

    // Límites
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        std::fs::create_dir_all(&config.download_dir).with_context(|| {
            format!("No se pudo crear {}", config.download_dir.display())
        })?;

        Ok(config)
    }

    /// Construye la configuración a partir de una fuente de variables
    /// (el entorno en producción, un mapa en los tests) y la valida.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            // Discord
            discord_token: lookup("DISCORD_TOKEN").context("Falta DISCORD_TOKEN")?,
            voice_channel_ids: parse_channel_ids(
                &lookup("VOICE_CHANNEL_IDS").context("Falta VOICE_CHANNEL_IDS")?,
            )?,
            command_prefix: lookup("COMMAND_PREFIX").unwrap_or(defaults.command_prefix),

            // Descargas
            download_dir: lookup("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            ytdlp_path: lookup("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            progress_step: parse_or(&lookup, "PROGRESS_STEP", defaults.progress_step)?,

            // Tiempos
            presence_interval: duration_or(
                &lookup,
                "PRESENCE_INTERVAL",
                defaults.presence_interval,
            )?,
            join_timeout: duration_or(&lookup, "JOIN_TIMEOUT", defaults.join_timeout)?,

            // Límites
            max_queue_size: parse_or(&lookup, "MAX_QUEUE_SIZE", defaults.max_queue_size)?,
            max_playlist_size: parse_or(
                &lookup,
                "MAX_PLAYLIST_SIZE",
                defaults.max_playlist_size,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Valida los valores antes de arrancar el bot.
    ///
    /// - Token y prefijo no vacíos
    /// - Al menos un canal de voz
    /// - Intervalos y límites mayores a cero
    /// - Paso de progreso entre 0 y 100
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN no puede estar vacío");
        }

        if self.voice_channel_ids.is_empty() {
            anyhow::bail!("VOICE_CHANNEL_IDS debe tener al menos un canal");
        }

        if self.command_prefix.is_empty() {
            anyhow::bail!("COMMAND_PREFIX no puede estar vacío");
        }

        if !(self.progress_step > 0.0 && self.progress_step <= 100.0) {
            anyhow::bail!(
                "PROGRESS_STEP debe estar entre 0 y 100, se recibió: {}",
                self.progress_step
            );
        }

        if self.presence_interval.is_zero() {
            anyhow::bail!("PRESENCE_INTERVAL debe ser mayor a 0");
        }

        if self.join_timeout.is_zero() {
            anyhow::bail!("JOIN_TIMEOUT debe ser mayor a 0");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("MAX_QUEUE_SIZE debe ser mayor a 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("MAX_PLAYLIST_SIZE debe ser mayor a 0");
        }

        Ok(())
    }

    /// Resumen para logs, sin el token
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: {} canales de voz, prefijo '{}'\n  \
            Descargas: {} con {} (progreso cada {}%)\n  \
            Tiempos: presencia cada {}, timeout de conexión {}\n  \
            Límites: {} en cola, {} por playlist",
            self.voice_channel_ids.len(),
            self.command_prefix,
            self.download_dir.display(),
            self.ytdlp_path,
            self.progress_step,
            humantime::format_duration(self.presence_interval),
            humantime::format_duration(self.join_timeout),
            self.max_queue_size,
            self.max_playlist_size,
        )
    }
}

/// Valores por defecto; token y canales no tienen y deben venir del entorno.
impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            voice_channel_ids: Vec::new(),
            command_prefix: "!".to_string(),

            download_dir: "./downloads".into(),
            ytdlp_path: "yt-dlp".to_string(),
            progress_step: 10.0,

            presence_interval: Duration::from_secs(5),
            join_timeout: Duration::from_secs(30),

            max_queue_size: 1000,
            max_playlist_size: 100,
        }
    }
}

fn parse_channel_ids(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u64>()
                .with_context(|| format!("ID de canal inválido: '{}'", id))
        })
        .collect()
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Valor inválido para {}: '{}'", key, raw)),
        _ => Ok(default),
    }
}

fn duration_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => humantime::parse_duration(raw.trim())
            .with_context(|| format!("Duración inválida para {}: '{}'", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DISCORD_TOKEN", "token"),
        ("VOICE_CHANNEL_IDS", "111, 222"),
    ];

    #[test]
    fn applies_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.voice_channel_ids, vec![111, 222]);
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.download_dir, PathBuf::from("./downloads"));
        assert_eq!(config.presence_interval, Duration::from_secs(5));
        assert_eq!(config.join_timeout, Duration::from_secs(30));
        assert_eq!(config.progress_step, 10.0);
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.max_playlist_size, 100);
    }

    #[test]
    fn parses_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("COMMAND_PREFIX", "?"),
            ("PRESENCE_INTERVAL", "2s 500ms"),
            ("JOIN_TIMEOUT", "1m"),
            ("PROGRESS_STEP", "25"),
            ("MAX_PLAYLIST_SIZE", "20"),
        ]);

        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.command_prefix, "?");
        assert_eq!(config.presence_interval, Duration::from_millis(2500));
        assert_eq!(config.join_timeout, Duration::from_secs(60));
        assert_eq!(config.progress_step, 25.0);
        assert_eq!(config.max_playlist_size, 20);
    }

    #[test]
    fn missing_token_is_an_error() {
        let result = Config::from_lookup(lookup(&[("VOICE_CHANNEL_IDS", "1")]));

        assert!(result.is_err());
    }

    #[test]
    fn rejects_bad_values() {
        for (key, value) in [
            ("VOICE_CHANNEL_IDS", "abc"),
            ("VOICE_CHANNEL_IDS", " , "),
            ("PRESENCE_INTERVAL", "0s"),
            ("PRESENCE_INTERVAL", "pronto"),
            ("PROGRESS_STEP", "150"),
            ("MAX_QUEUE_SIZE", "0"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.retain(|(k, _)| *k != key);
            vars.push((key, value));

            assert!(
                Config::from_lookup(lookup(&vars)).is_err(),
                "{}={} debería ser inválido",
                key,
                value
            );
        }
    }

    #[test]
    fn summary_hides_token() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        let summary = config.summary();

        assert!(!summary.contains("token"));
        assert!(summary.contains("2 canales de voz"));
    }
}
