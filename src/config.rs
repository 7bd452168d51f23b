// src/config.rs
use clap::Parser;

// --- Defaults ---
pub const DEFAULT_GAME_NAME: &str = "hot-seat";
pub const DEFAULT_WHITE_PLAYER: &str = "white";
pub const DEFAULT_BLACK_PLAYER: &str = "black";
pub const DEFAULT_SNAPSHOT_FILENAME: &str = "chess_games.json";
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Command line of the interactive client.
#[derive(Debug, Clone, Parser)]
#[command(name = "chess_session", version, about = "Two-player chess at one terminal, with a live spectator feed")]
pub struct Config {
    /// Name of the game to create
    #[arg(long, default_value = DEFAULT_GAME_NAME)]
    pub name: String,

    /// Player taking the white seat
    #[arg(long, default_value = DEFAULT_WHITE_PLAYER)]
    pub white: String,

    /// Player taking the black seat
    #[arg(long, default_value = DEFAULT_BLACK_PLAYER)]
    pub black: String,

    /// Write all games to this file on exit
    #[arg(long, value_name = "FILE")]
    pub save: Option<String>,

    /// Restore games from this file on start and resume the most recent one
    #[arg(long, value_name = "FILE")]
    pub load: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    pub log: String,
}
