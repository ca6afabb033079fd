use serenity::{
    all::{Colour, Timestamp, UserId},
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{audio::status::StatusEvent, error::MusicError};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Jukebox Bot";

/// Límite de Discord para la descripción de un embed
const MAX_DESCRIPTION: usize = 4096;

/// Contenido de un embed de estado, separado del builder para poder testearlo
#[derive(Debug, Clone, PartialEq)]
pub struct StatusCard {
    pub title: String,
    pub description: String,
    pub colour: Colour,
    pub requester: Option<UserId>,
}

impl StatusCard {
    fn new(title: &str, description: impl Into<String>, colour: Colour) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            colour,
            requester: None,
        }
    }

    fn requested_by(mut self, requester: Option<UserId>) -> Self {
        self.requester = requester;
        self
    }

    pub fn from_event(event: &StatusEvent) -> Self {
        use colors::*;

        match event {
            StatusEvent::Joined => Self::new(
                "🔊 Conectado",
                "Listo para reproducir. Usa `play <búsqueda>` para empezar.",
                SUCCESS_GREEN,
            ),
            StatusEvent::Queued { title, requester } => Self::new(
                "✅ Agregada a la cola",
                format!("**{}** se ha agregado a la cola", title),
                SUCCESS_GREEN,
            )
            .requested_by(*requester),
            StatusEvent::PlaylistLoading { url } => {
                Self::new("📋 Cargando playlist", format!("Leyendo {}", url), INFO_BLUE)
            }
            StatusEvent::PlaylistLoaded { count } => Self::new(
                "✅ Playlist cargada",
                format!("Se agregaron {} canciones a la cola", count),
                SUCCESS_GREEN,
            ),
            StatusEvent::Downloading { title } => Self::new(
                "⏬ Descargando",
                format!("Descargando: **{}**", title),
                INFO_BLUE,
            ),
            StatusEvent::DownloadProgress { title, percent } => Self::new(
                "⏬ Descargando",
                format!(
                    "Descargando: **{}**\n{} {:.1}%",
                    title,
                    progress_bar(*percent),
                    percent
                ),
                INFO_BLUE,
            ),
            StatusEvent::Downloaded { title } => Self::new(
                "✅ Descarga completa",
                format!("Descargada: **{}**", title),
                SUCCESS_GREEN,
            ),
            StatusEvent::Waiting { title } => Self::new(
                "⏳ Esperando",
                format!("Esperando la descarga de **{}**", title),
                NEUTRAL_GRAY,
            ),
            StatusEvent::NowPlaying { title, requester } => Self::new(
                "🎶 Reproduciendo ahora",
                format!("**{}**", title),
                MUSIC_PURPLE,
            )
            .requested_by(*requester),
            StatusEvent::Paused => Self::new(
                "⏸️ Pausado",
                "No queda nadie escuchando, la reproducción quedó en pausa.",
                WARNING_ORANGE,
            ),
            StatusEvent::Resumed => {
                Self::new("▶️ Reanudado", "Volvió alguien, seguimos.", SUCCESS_GREEN)
            }
            StatusEvent::Skipped => {
                Self::new("⏭️ Saltada", "Pasando a la siguiente canción.", INFO_BLUE)
            }
            StatusEvent::QueueListing { titles, cursor } => Self::new(
                "📋 Cola actual",
                queue_listing(titles, *cursor),
                INFO_BLUE,
            ),
            StatusEvent::QueueEmpty => Self::new("📭 Cola vacía", "La cola está vacía.", NEUTRAL_GRAY),
            StatusEvent::QueueFinished => Self::new(
                "📭 Cola terminada",
                "Se reprodujo todo. ¡Agrega más canciones!",
                NEUTRAL_GRAY,
            ),
            StatusEvent::InvalidCommand { reason } => {
                Self::new("❌ Comando inválido", reason.as_str(), ERROR_RED)
            }
            StatusEvent::Help { message } => {
                Self::new("❓ Comando desconocido", message.as_str(), WARNING_ORANGE)
            }
            StatusEvent::Failed(error) => {
                Self::new(error_title(error), error.to_string(), ERROR_RED)
            }
        }
    }
}

/// Embed listo para enviar al canal de texto
pub fn status_embed(event: &StatusEvent) -> CreateEmbed {
    let card = StatusCard::from_event(event);

    let mut embed = CreateEmbed::default()
        .title(card.title)
        .description(card.description)
        .color(card.colour)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(user) = card.requester {
        embed = embed.field("👤 Solicitado por", format!("<@{}>", user), true);
    }
    embed
}

fn error_title(error: &MusicError) -> &'static str {
    match error {
        MusicError::Resolution { .. } => "❌ No encontrada",
        MusicError::Download { .. } => "❌ Error de descarga",
        MusicError::Playback { .. } => "❌ Error de reproducción",
        MusicError::NothingToSkip => "❌ No se puede saltar",
        MusicError::ChannelJoin { .. } => "❌ Error de conexión",
        MusicError::QueueFull(_) => "❌ Cola llena",
        MusicError::SessionClosed => "❌ Sesión cerrada",
    }
}

/// Lista numerada; la entrada bajo el cursor va resaltada
fn queue_listing(titles: &[String], cursor: usize) -> String {
    let mut listing = String::new();

    for (index, title) in titles.iter().enumerate() {
        let line = if index == cursor {
            format!("**{}. {}** ◀️\n", index + 1, title)
        } else {
            format!("{}. {}\n", index + 1, title)
        };

        if listing.len() + line.len() > MAX_DESCRIPTION - 32 {
            listing.push_str(&format!("… y {} más", titles.len() - index));
            break;
        }
        listing.push_str(&line);
    }

    listing
}

/// Barra visual de progreso
fn progress_bar(percent: f32) -> String {
    let segments = 20;
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * segments as f32) as usize;
    let empty = segments - filled;

    format!("`[{}{}]`", "█".repeat(filled), "▒".repeat(empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn now_playing_card() {
        let card = StatusCard::from_event(&StatusEvent::NowPlaying {
            title: "Take On Me".into(),
            requester: Some(UserId::new(42)),
        });

        assert_eq!(card.title, "🎶 Reproduciendo ahora");
        assert_eq!(card.description, "**Take On Me**");
        assert_eq!(card.colour, colors::MUSIC_PURPLE);
        assert_eq!(card.requester, Some(UserId::new(42)));
    }

    #[test]
    fn queued_card_without_requester() {
        let card = StatusCard::from_event(&StatusEvent::Queued {
            title: "Intro".into(),
            requester: None,
        });

        assert_eq!(card.description, "**Intro** se ha agregado a la cola");
        assert_eq!(card.requester, None);
    }

    #[test]
    fn errors_are_red_and_use_the_error_message() {
        let card = StatusCard::from_event(&StatusEvent::Failed(MusicError::NothingToSkip));

        assert_eq!(card.title, "❌ No se puede saltar");
        assert_eq!(card.description, MusicError::NothingToSkip.to_string());
        assert_eq!(card.colour, colors::ERROR_RED);
    }

    #[test]
    fn queue_listing_marks_the_cursor() {
        let titles = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        assert_eq!(queue_listing(&titles, 1), "1. a\n**2. b** ◀️\n3. c\n");
        // Con el cursor al final no se resalta nada
        assert_eq!(queue_listing(&titles, 3), "1. a\n2. b\n3. c\n");
    }

    #[test]
    fn long_queue_listing_is_truncated() {
        let titles: Vec<String> = (0..1000).map(|i| format!("canción número {i}")).collect();

        let listing = queue_listing(&titles, 0);

        assert!(listing.len() <= MAX_DESCRIPTION);
        assert!(listing.ends_with("más"));
    }

    #[test]
    fn progress_bar_is_clamped() {
        assert_eq!(progress_bar(0.0), format!("`[{}]`", "▒".repeat(20)));
        assert_eq!(progress_bar(50.0), format!("`[{}{}]`", "█".repeat(10), "▒".repeat(10)));
        assert_eq!(progress_bar(150.0), format!("`[{}]`", "█".repeat(20)));
    }
}
