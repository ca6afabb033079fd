use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serenity::{
    builder::{CreateMessage, EditMessage},
    http::Http,
    model::id::{ChannelId, MessageId},
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    audio::status::{StatusEvent, StatusReceiver},
    error::MusicError,
    ui::embeds::status_embed,
};

/// Destino de los anuncios de una sesión.
///
/// Arranca en el chat del canal de voz y sigue al canal de texto del
/// último comando recibido.
#[derive(Debug, Clone)]
pub struct AnnounceTarget(Arc<RwLock<ChannelId>>);

impl AnnounceTarget {
    pub fn new(channel_id: ChannelId) -> Self {
        Self(Arc::new(RwLock::new(channel_id)))
    }

    pub fn get(&self) -> ChannelId {
        *self.0.read()
    }

    pub fn set(&self, channel_id: ChannelId) {
        *self.0.write() = channel_id;
    }
}

/// Canal de texto donde se publican los eventos de estado
#[async_trait]
pub trait StatusOutput: Send + Sync + 'static {
    async fn send(&self, channel_id: ChannelId, event: &StatusEvent) -> Result<MessageId>;

    async fn edit(&self, channel_id: ChannelId, message_id: MessageId, event: &StatusEvent)
        -> Result<()>;
}

/// Publica embeds en Discord
pub struct DiscordOutput {
    http: Arc<Http>,
}

impl DiscordOutput {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl StatusOutput for DiscordOutput {
    async fn send(&self, channel_id: ChannelId, event: &StatusEvent) -> Result<MessageId> {
        let message = channel_id
            .send_message(&self.http, CreateMessage::new().embed(status_embed(event)))
            .await?;
        Ok(message.id)
    }

    async fn edit(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        event: &StatusEvent,
    ) -> Result<()> {
        channel_id
            .edit_message(
                &self.http,
                message_id,
                EditMessage::new().embed(status_embed(event)),
            )
            .await?;
        Ok(())
    }
}

/// Avisa en el chat del canal de voz que no se pudo entrar.
///
/// Solo publica errores de conexión; devuelve `true` si se publicó algo.
pub async fn report_join_failure<O: StatusOutput + ?Sized>(
    output: &O,
    channel_id: ChannelId,
    error: &anyhow::Error,
) -> bool {
    let join_error = match error.downcast_ref::<MusicError>() {
        Some(join_error @ MusicError::ChannelJoin { .. }) => join_error,
        _ => return false,
    };

    match output
        .send(channel_id, &StatusEvent::Failed(join_error.clone()))
        .await
    {
        Ok(_) => true,
        Err(e) => {
            warn!("No se pudo avisar el fallo de conexión en {}: {:?}", channel_id, e);
            false
        }
    }
}

/// Consume los eventos de estado de una sesión y los publica.
///
/// El mensaje de "descargando" se reutiliza: el progreso y el resultado de
/// esa descarga lo editan en vez de crear mensajes nuevos.
pub struct Announcer<O> {
    output: O,
    target: AnnounceTarget,
    tracked: Option<MessageId>,
}

impl<O: StatusOutput> Announcer<O> {
    pub fn spawn(
        output: O,
        target: AnnounceTarget,
        mut events: StatusReceiver,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let mut announcer = Self {
            output,
            target,
            tracked: None,
        };

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                announcer.announce(&event).await;
            }
            debug!("Anunciador terminado");
        })
    }

    async fn announce(&mut self, event: &StatusEvent) {
        let channel_id = self.target.get();

        let result = match event {
            StatusEvent::Downloading { .. } => self.send_tracked(channel_id, event).await,
            StatusEvent::DownloadProgress { .. } => match self.tracked {
                Some(message_id) => self.output.edit(channel_id, message_id, event).await,
                None => self.send_tracked(channel_id, event).await,
            },
            StatusEvent::Downloaded { .. }
            | StatusEvent::Failed(MusicError::Download { .. }) => match self.tracked.take() {
                Some(message_id) => self.output.edit(channel_id, message_id, event).await,
                None => self.output.send(channel_id, event).await.map(|_| ()),
            },
            _ => self.output.send(channel_id, event).await.map(|_| ()),
        };

        if let Err(e) = result {
            warn!("No se pudo publicar {:?} en {}: {:?}", event, channel_id, e);
        }
    }

    async fn send_tracked(&mut self, channel_id: ChannelId, event: &StatusEvent) -> Result<()> {
        let message_id = self.output.send(channel_id, event).await?;
        self.tracked = Some(message_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{status::status_channel, testing::wait_until};
    use pretty_assertions::assert_eq;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Posted {
        Sent(ChannelId, MessageId, StatusEvent),
        Edited(ChannelId, MessageId, StatusEvent),
    }

    #[derive(Clone, Default)]
    struct FakeOutput {
        posted: Arc<Mutex<Vec<Posted>>>,
    }

    impl FakeOutput {
        fn posted(&self) -> Vec<Posted> {
            self.posted.lock().clone()
        }
    }

    #[async_trait]
    impl StatusOutput for FakeOutput {
        async fn send(&self, channel_id: ChannelId, event: &StatusEvent) -> Result<MessageId> {
            let mut posted = self.posted.lock();
            let message_id = MessageId::new(posted.len() as u64 + 1);
            posted.push(Posted::Sent(channel_id, message_id, event.clone()));
            Ok(message_id)
        }

        async fn edit(
            &self,
            channel_id: ChannelId,
            message_id: MessageId,
            event: &StatusEvent,
        ) -> Result<()> {
            self.posted
                .lock()
                .push(Posted::Edited(channel_id, message_id, event.clone()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn download_progress_edits_the_downloading_message() {
        let output = FakeOutput::default();
        let channel = ChannelId::new(7);
        let (status, rx) = status_channel();
        let handle = Announcer::spawn(
            output.clone(),
            AnnounceTarget::new(channel),
            rx,
            CancellationToken::new(),
        );

        let downloading = StatusEvent::Downloading { title: "a".into() };
        let progress = StatusEvent::DownloadProgress {
            title: "a".into(),
            percent: 42.0,
        };
        let downloaded = StatusEvent::Downloaded { title: "a".into() };
        let playing = StatusEvent::NowPlaying {
            title: "a".into(),
            requester: None,
        };
        for event in [&downloading, &progress, &downloaded, &playing] {
            status.send(event.clone()).unwrap();
        }
        drop(status);
        handle.await.unwrap();

        let first = MessageId::new(1);
        assert_eq!(
            output.posted(),
            vec![
                Posted::Sent(channel, first, downloading),
                Posted::Edited(channel, first, progress),
                Posted::Edited(channel, first, downloaded),
                Posted::Sent(channel, MessageId::new(4), playing),
            ]
        );
    }

    #[tokio::test]
    async fn join_failures_are_posted_to_the_voice_channel_chat() {
        let output = FakeOutput::default();
        let channel = ChannelId::new(9);
        let join_error = MusicError::ChannelJoin {
            channel_id: 9,
            reason: "tiempo de espera agotado".into(),
        };

        assert!(report_join_failure(&output, channel, &join_error.clone().into()).await);
        assert!(!report_join_failure(&output, channel, &anyhow::anyhow!("Songbird no inicializado")).await);

        assert_eq!(
            output.posted(),
            vec![Posted::Sent(
                channel,
                MessageId::new(1),
                StatusEvent::Failed(join_error)
            )]
        );
    }

    #[tokio::test]
    async fn follows_the_latest_command_channel() {
        let output = FakeOutput::default();
        let target = AnnounceTarget::new(ChannelId::new(1));
        let (status, rx) = status_channel();
        let cancel = CancellationToken::new();
        let handle = Announcer::spawn(output.clone(), target.clone(), rx, cancel.clone());

        status.send(StatusEvent::Joined).unwrap();
        wait_until(|| output.posted().len() == 1).await;
        target.set(ChannelId::new(2));
        status.send(StatusEvent::QueueEmpty).unwrap();
        wait_until(|| output.posted().len() == 2).await;

        cancel.cancel();
        handle.await.unwrap();

        let channels: Vec<ChannelId> = output
            .posted()
            .into_iter()
            .map(|p| match p {
                Posted::Sent(channel, ..) | Posted::Edited(channel, ..) => channel,
            })
            .collect();
        assert_eq!(channels, vec![ChannelId::new(1), ChannelId::new(2)]);
    }
}
