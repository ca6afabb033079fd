//! # Audio Module
//!
//! Per-channel playback engine for the jukebox bot.
//!
//! Each configured voice channel gets one [`session::Session`]: a task that
//! owns the song queue and the playback state machine, fed by a single
//! event inbox.
//!
//! ## Architecture
//!
//! ### [`session`] - Session actor
//! - Owns the [`queue::SongQueue`] and the [`player::PlaybackController`]
//! - Serializes user commands, download results, track ends and presence samples
//! - [`session::SessionRegistry`] maps voice channels to live sessions
//!
//! ### [`downloader`] - Download Worker
//! - FIFO queue drained by one task, so at most one download is in flight
//! - Threshold-gated progress reporting
//! - Signals completion back to the session instead of being polled
//!
//! ### [`player`] - Playback State Machine
//! - `Idle -> WaitingForDownload -> Playing <-> Paused -> Empty`
//! - Plays strictly in queue order, deleting each file once consumed
//!
//! ### [`presence`] - Presence Monitor
//! - Periodic occupancy sampling; pauses when the bot is alone
//!
//! ### [`output`] / [`status`]
//! - Audio sink abstraction over songbird
//! - Human-readable status events for the text channel
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let (status, status_rx) = status_channel();
//! let session = Session::spawn(SessionConfig::from(&config), sink, downloader, status);
//!
//! session.enqueue(resolver.resolve("never gonna give you up").await?).await?;
//! session.skip().await?;
//! ```

pub mod downloader;
pub mod output;
pub mod player;
pub mod presence;
pub mod queue;
pub mod session;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;
