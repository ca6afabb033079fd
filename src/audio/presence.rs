use anyhow::Result;
use serenity::{
    cache::Cache,
    model::id::{ChannelId, GuildId},
};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, warn};

use crate::audio::session::SessionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceAction {
    Pause,
    Resume,
}

/// Decide qué hacer con una muestra de ocupación.
///
/// `occupants` incluye al bot: 1 significa que se quedó solo. Con 0 no hay
/// datos fiables (el bot no figura en el canal) y no se hace nada.
pub fn presence_action(occupants: usize, paused: bool) -> Option<PresenceAction> {
    match occupants {
        1 if !paused => Some(PresenceAction::Pause),
        n if n > 1 && paused => Some(PresenceAction::Resume),
        _ => None,
    }
}

/// Fuente de la cantidad de participantes de un canal de voz
#[cfg_attr(test, mockall::automock)]
pub trait PresenceSource: Send + Sync + 'static {
    fn occupants(&self) -> Result<usize>;
}

/// Ocupación leída de la caché de serenity (estados de voz del guild)
pub struct ChannelPresence {
    cache: Arc<Cache>,
    guild_id: GuildId,
    channel_id: ChannelId,
}

impl ChannelPresence {
    pub fn new(cache: Arc<Cache>, guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self {
            cache,
            guild_id,
            channel_id,
        }
    }
}

impl PresenceSource for ChannelPresence {
    fn occupants(&self) -> Result<usize> {
        let guild = self
            .cache
            .guild(self.guild_id)
            .ok_or_else(|| anyhow::anyhow!("Guild {} no está en caché", self.guild_id))?;

        Ok(guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(self.channel_id))
            .count())
    }
}

/// Lazo de control por sondeo: cada `interval` toma una muestra y se la pasa
/// a la sesión, que decide si pausar o reanudar.
///
/// Es sondeo y no eventos porque las notificaciones de estado de voz no son
/// confiables.
pub struct PresenceMonitor;

impl PresenceMonitor {
    pub fn spawn<P: PresenceSource>(
        source: P,
        session: SessionHandle,
        interval: Duration,
    ) -> JoinHandle<()> {
        let cancel = session.cancellation();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match source.occupants() {
                    Ok(occupants) => {
                        debug!("👥 {} participantes en el canal", occupants);
                        session.presence(occupants);
                    }
                    Err(e) => warn!("No se pudo muestrear el canal de voz: {:?}", e),
                }
            }

            debug!("Monitor de presencia terminado");
        })
    }
}
