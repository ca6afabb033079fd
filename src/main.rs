use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::{path::Path, sync::Arc};
use tracing::{debug, error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::session::SessionRegistry;
use crate::bot::JukeboxBot;
use crate::config::Config;
use crate::sources::YtDlpClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jukebox_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Jukebox Bot v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let ytdlp = Arc::new(YtDlpClient::new(&config)?);

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        ytdlp.verify_dependencies().await?;
        println!("OK");
        return Ok(());
    }

    if let Err(e) = ytdlp.verify_dependencies().await {
        warn!("⚠️ Dependencias incompletas, las descargas van a fallar: {:?}", e);
    }
    purge_download_dir(&config.download_dir).await;

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    // Crear handler del bot
    let registry = SessionRegistry::new();
    let handler = JukeboxBot::new(Arc::new(config.clone()), registry.clone(), ytdlp);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando sesiones...");
        registry.shutdown_all();
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

/// Borra los archivos que hayan quedado de una ejecución anterior
async fn purge_download_dir(dir: &Path) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("No se pudo leer {}: {}", dir.display(), e);
            return;
        }
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => debug!("No se pudo borrar {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        info!("🧹 {} archivos viejos eliminados de {}", removed, dir.display());
    }
}
