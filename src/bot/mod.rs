//! # Bot Module
//!
//! Discord glue for the jukebox engine.
//!
//! - [`JukeboxBot`] implements Serenity's [`EventHandler`]: on `ready` it joins
//!   every configured voice channel and starts one session per channel; on
//!   `message` it routes prefixed commands to the session of the author's
//!   voice channel.
//! - [`commands`] parses the text commands.
//! - [`handlers`] executes them against a [`SessionHandle`].
//! - [`announcer`] turns session status events into embeds.

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{ActivityData, ChannelId, Context, EventHandler, GuildId, Message, Ready},
    async_trait,
};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

pub mod announcer;
pub mod commands;
pub mod handlers;

use crate::{
    audio::{
        output::SongbirdSink,
        presence::{ChannelPresence, PresenceMonitor},
        session::{Session, SessionConfig, SessionHandle, SessionRegistry},
        status::{status_channel, StatusEvent},
    },
    bot::{
        announcer::{report_join_failure, AnnounceTarget, Announcer, DiscordOutput},
        commands::Command,
    },
    config::Config,
    error::MusicError,
    sources::YtDlpClient,
};

/// Handler principal: una sesión de reproducción por canal de voz configurado
pub struct JukeboxBot {
    config: Arc<Config>,
    registry: SessionRegistry,
    ytdlp: Arc<YtDlpClient>,
    /// Canal de texto de los anuncios de cada sesión
    targets: DashMap<ChannelId, AnnounceTarget>,
}

impl JukeboxBot {
    pub fn new(config: Arc<Config>, registry: SessionRegistry, ytdlp: Arc<YtDlpClient>) -> Self {
        Self {
            config,
            registry,
            ytdlp,
            targets: DashMap::new(),
        }
    }

    /// Conecta el bot a un canal de voz y arranca su sesión.
    ///
    /// Si la conexión falla o no termina dentro de `join_timeout`, la sesión
    /// no se crea; los demás canales no se ven afectados.
    async fn start_session(&self, ctx: &Context, channel_id: ChannelId) -> Result<()> {
        let guild_id = voice_channel_guild(ctx, channel_id).await?;

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let cleanup = manager.clone();
        let call = join_or_clean_up(
            self.config.join_timeout,
            manager.join(guild_id, channel_id),
            move || async move {
                // No dejar la llamada a medio crear en el manager
                if let Err(e) = cleanup.remove(guild_id).await {
                    debug!("Sin llamada que limpiar en {}: {:?}", guild_id, e);
                }
            },
        )
        .await
        .map_err(|reason| MusicError::ChannelJoin {
            channel_id: channel_id.get(),
            reason,
        })?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);

        let (status, status_rx) = status_channel();
        let session = Session::spawn(
            SessionConfig::from(self.config.as_ref()),
            SongbirdSink::new(call),
            self.ytdlp.clone(),
            status,
        );

        let target = AnnounceTarget::new(channel_id);
        Announcer::spawn(
            DiscordOutput::new(ctx.http.clone()),
            target.clone(),
            status_rx,
            session.cancellation(),
        );
        PresenceMonitor::spawn(
            ChannelPresence::new(ctx.cache.clone(), guild_id, channel_id),
            session.clone(),
            self.config.presence_interval,
        );

        session.report(StatusEvent::Joined);
        self.targets.insert(channel_id, target);
        self.registry.insert(channel_id, session);
        Ok(())
    }

    /// Sesión del canal de voz en el que está el autor, si es uno de los nuestros
    fn session_for_author(&self, ctx: &Context, message: &Message) -> Option<(ChannelId, SessionHandle)> {
        let guild_id = message.guild_id?;
        let channel_id = {
            let guild = ctx.cache.guild(guild_id)?;
            guild.voice_states.get(&message.author.id)?.channel_id?
        };

        self.registry
            .get(channel_id)
            .map(|session| (channel_id, session))
    }
}

/// Espera a `join` como máximo `limit`. Si falla o vence, corre `cleanup`
/// antes de devolver el motivo.
async fn join_or_clean_up<T, E, C>(
    limit: Duration,
    join: impl Future<Output = std::result::Result<T, E>>,
    cleanup: impl FnOnce() -> C,
) -> std::result::Result<T, String>
where
    E: std::fmt::Display,
    C: Future<Output = ()>,
{
    let reason = match tokio::time::timeout(limit, join).await {
        Ok(Ok(joined)) => return Ok(joined),
        Ok(Err(e)) => e.to_string(),
        Err(_) => "tiempo de espera agotado".to_string(),
    };

    cleanup().await;
    Err(reason)
}

/// Guild del canal de voz, desde la caché o pidiéndolo a la API
async fn voice_channel_guild(ctx: &Context, channel_id: ChannelId) -> Result<GuildId> {
    let channel = channel_id
        .to_channel(ctx)
        .await
        .map_err(|e| MusicError::ChannelJoin {
            channel_id: channel_id.get(),
            reason: e.to_string(),
        })?;

    channel
        .guild()
        .map(|channel| channel.guild_id)
        .ok_or_else(|| {
            MusicError::ChannelJoin {
                channel_id: channel_id.get(),
                reason: "no es un canal de un servidor".to_string(),
            }
            .into()
        })
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
        ctx.set_activity(Some(ActivityData::playing(format!(
            "🎵 {}play",
            self.config.command_prefix
        ))));

        for &id in &self.config.voice_channel_ids {
            let channel_id = ChannelId::new(id);
            // `ready` se repite al reconectar
            if self.registry.contains(channel_id) {
                debug!("Sesión ya activa para {}", channel_id);
                continue;
            }

            if let Err(e) = self.start_session(&ctx, channel_id).await {
                error!("❌ No se pudo iniciar la sesión en {}: {}", channel_id, e);
                report_join_failure(&DiscordOutput::new(ctx.http.clone()), channel_id, &e).await;
            }
        }

        info!("🎧 {} sesiones activas", self.registry.channels().len());
    }

    async fn message(&self, ctx: Context, message: Message) {
        if message.author.bot {
            return;
        }

        let Some(command) = Command::parse(&message.content, &self.config.command_prefix) else {
            return;
        };

        let Some((voice_channel, session)) = self.session_for_author(&ctx, &message) else {
            debug!(
                "Comando de {} ignorado: no está en un canal de voz del bot",
                message.author.name
            );
            return;
        };

        if let Some(target) = self.targets.get(&voice_channel) {
            target.set(message.channel_id);
        }

        info!(
            "📝 {} usó {} en el canal {}",
            message.author.name,
            command.name(),
            voice_channel
        );
        let requester = message.author.id;
        if let Err(e) =
            handlers::handle_command(command, requester, &session, self.ytdlp.as_ref()).await
        {
            warn!("Sesión de {} cerrada: {:?}", voice_channel, e);
            self.registry.remove(voice_channel);
            self.targets.remove(&voice_channel);
        }
    }
}
