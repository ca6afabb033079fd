/// Comando de texto reconocido por el bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play { query: String },
    Playlist { url: String },
    Skip,
    Queue,
    /// Comando conocido al que le falta el argumento
    MissingArgument { command: &'static str, hint: &'static str },
    Unknown { name: String },
}

impl Command {
    /// Interpreta un mensaje. Devuelve `None` si no empieza con `prefix`.
    ///
    /// El nombre del comando no distingue mayúsculas; el argumento es el
    /// resto del mensaje tal cual (una búsqueda puede tener espacios).
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        let body = content.strip_prefix(prefix)?.trim();
        let (name, argument) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "play" if argument.is_empty() => Self::MissingArgument {
                command: "play",
                hint: "Indica una URL o un término de búsqueda.",
            },
            "play" => Self::Play {
                query: argument.to_string(),
            },
            "playlist" => match argument.split_whitespace().next() {
                Some(url) => Self::Playlist {
                    url: url.to_string(),
                },
                None => Self::MissingArgument {
                    command: "playlist",
                    hint: "Indica la URL de la playlist.",
                },
            },
            "skip" => Self::Skip,
            "queue" => Self::Queue,
            _ => Self::Unknown {
                name: name.to_string(),
            },
        };

        Some(command)
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Play { .. } => "play",
            Self::Playlist { .. } => "playlist",
            Self::Skip => "skip",
            Self::Queue => "queue",
            Self::MissingArgument { command, .. } => *command,
            Self::Unknown { name } => name.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ignores_messages_without_prefix() {
        assert_eq!(Command::parse("play algo", "!"), None);
        assert_eq!(Command::parse("hola !play", "!"), None);
    }

    #[test]
    fn play_keeps_the_whole_query() {
        assert_eq!(
            Command::parse("!play   never gonna give you up ", "!"),
            Some(Command::Play {
                query: "never gonna give you up".into()
            })
        );
        assert_eq!(
            Command::parse("!PLAY https://youtu.be/dQw4w9WgXcQ", "!"),
            Some(Command::Play {
                query: "https://youtu.be/dQw4w9WgXcQ".into()
            })
        );
    }

    #[test]
    fn playlist_takes_the_first_argument() {
        assert_eq!(
            Command::parse("!playlist https://www.youtube.com/playlist?list=PL1 extra", "!"),
            Some(Command::Playlist {
                url: "https://www.youtube.com/playlist?list=PL1".into()
            })
        );
    }

    #[test]
    fn missing_arguments_are_reported() {
        assert!(matches!(
            Command::parse("!play", "!"),
            Some(Command::MissingArgument { command: "play", .. })
        ));
        assert!(matches!(
            Command::parse("!playlist   ", "!"),
            Some(Command::MissingArgument {
                command: "playlist",
                ..
            })
        ));
    }

    #[test]
    fn simple_commands_and_unknown_ones() {
        assert_eq!(Command::parse("!skip", "!"), Some(Command::Skip));
        assert_eq!(Command::parse("?queue", "?"), Some(Command::Queue));
        assert_eq!(
            Command::parse("!volume 10", "!"),
            Some(Command::Unknown {
                name: "volume".into()
            })
        );
        assert_eq!(
            Command::parse("!", "!"),
            Some(Command::Unknown { name: "".into() })
        );
    }
}
