// src/main.rs
use clap::Parser;
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chess_session::config::Config;
use chess_session::{
    GameId, GameService, MemoryStore, Move, MoveError, PieceKind, Position, SessionError, Subscription, Team,
};

// --- Input Parsing ---

#[derive(Debug)]
enum UserInput {
    Move(Move),
    Command(Command),
}

#[derive(Debug)]
enum Command {
    Show(Position),
    Redraw,
    Resign,
    Help,
    Quit,
}

/// Parses a command word or a move such as "e2e4" / "move e2 e4".
fn parse_user_input(input: &str) -> Result<UserInput, MoveError> {
    let trimmed_input = input.trim();
    let mut parts = trimmed_input.splitn(2, char::is_whitespace);
    let command_word = parts.next().unwrap_or("").to_lowercase();
    let argument = parts.next().unwrap_or("").trim();

    match command_word.as_str() {
        "show" => return argument.parse().map(|p| UserInput::Command(Command::Show(p))),
        "redraw" | "board" => return Ok(UserInput::Command(Command::Redraw)),
        "resign" => return Ok(UserInput::Command(Command::Resign)),
        "help" | "?" => return Ok(UserInput::Command(Command::Help)),
        "quit" | "exit" => return Ok(UserInput::Command(Command::Quit)),
        "move" => return Move::parse(argument).map(UserInput::Move),
        _ => {}
    }
    Move::parse(trimmed_input).map(UserInput::Move)
}

// --- Session Setup ---

struct Seats {
    white: Subscription,
    black: Subscription,
}

impl Seats {
    fn for_team(&self, team: Team) -> &Subscription {
        match team {
            Team::White => &self.white,
            Team::Black => &self.black,
        }
    }
}

/// Resumes the most recent stored game if it is still in play, or creates a fresh one.
fn open_game(service: &GameService, config: &Config) -> Result<GameId, SessionError> {
    if let Some(latest) = service.list_games().last() {
        if !service.get_game(latest.id)?.game.is_game_over() {
            println!("Resuming game {} ('{}').", latest.id, latest.name);
            return Ok(latest.id);
        }
    }
    service.create_game(&config.name)
}

fn take_seats(service: &GameService, game_id: GameId, config: &Config) -> Result<Seats, SessionError> {
    let record = service.get_game(game_id)?;
    let white = record.white.clone().unwrap_or_else(|| config.white.clone());
    let black = record.black.clone().unwrap_or_else(|| config.black.clone());
    service.join_game(game_id, &white, Team::White)?;
    service.join_game(game_id, &black, Team::Black)?;
    Ok(Seats { white: service.connect(game_id, &white)?, black: service.connect(game_id, &black)? })
}

/// Prints everything the spectator feed has received since the last call.
fn print_events(spectator: &mut Subscription) {
    for event in spectator.drain() {
        println!("{}", event);
    }
}

fn save_store(store: &MemoryStore, filename: Option<&str>) {
    let Some(filename) = filename else { return };
    match store.save_to_file(filename) {
        Ok(()) => println!("Games saved to '{}'.", filename),
        Err(e) => eprintln!("Warning: Failed to save games: {}", e),
    }
}

/// Saves first so the snapshot keeps the seats, then detaches every connection.
fn close_session(
    service: &GameService,
    store: &MemoryStore,
    connections: impl IntoIterator<Item = Subscription>,
    filename: Option<&str>,
) {
    save_store(store, filename);
    for subscription in connections {
        if let Err(e) = service.leave(subscription.id()) {
            warn!(connection = %subscription.id(), error = %e, "leave failed");
        }
    }
}

/// Asks for a promotion piece until one is given. `None` on EOF or read error.
fn prompt_promotion() -> io::Result<Option<PieceKind>> {
    loop {
        print!("Promote pawn to? (q=Queen, r=Rook, b=Bishop, n=Knight): ");
        io::stdout().flush()?;
        let mut promo_input = String::new();
        if io::stdin().read_line(&mut promo_input)? == 0 {
            return Ok(None);
        }
        match promo_input.trim().chars().next().and_then(PieceKind::promotion_from_char) {
            Some(kind) => return Ok(Some(kind)),
            None => println!("Invalid choice. Please enter q, r, b, or n."),
        }
    }
}

// --- Main Game Loop ---

fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let store = match &config.load {
        Some(filename) => Arc::new(MemoryStore::load_from_file(filename)?),
        None => Arc::new(MemoryStore::new()),
    };
    let service = GameService::new(store.clone());
    let game_id = open_game(&service, &config)?;
    let mut seats = take_seats(&service, game_id, &config)?;
    let mut spectator = service.connect(game_id, "spectator")?;
    info!(game_id, "session ready");

    println!("==============================");
    println!("|     Rust Chess Session     |");
    println!("==============================");
    print_help();

    'game_loop: loop {
        print_events(&mut spectator);
        // Player feeds duplicate the spectator's view; errors are printed from results instead
        seats.white.drain();
        seats.black.drain();

        let record = service.get_game(game_id)?;
        if record.game.is_game_over() {
            match record.game.outcome() {
                Some(result) => println!("\n=== GAME OVER: {}. ===", result),
                None => println!("\n=== GAME OVER ==="),
            }
            break 'game_loop;
        }

        let team = record.game.team_to_move();
        let name = record.player(team).unwrap_or("?").to_string();
        print!("\n{} ({}) to move. Enter move (e.g. e2e4) or command: ", team, name);
        io::stdout().flush()?;

        let mut input_line = String::new();
        match io::stdin().read_line(&mut input_line) {
            Ok(0) => {
                println!("\nEnd of input detected. Quitting game.");
                break 'game_loop;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {}. Try again or use 'quit'.", e);
                continue 'game_loop;
            }
        }
        let input_trimmed = input_line.trim();
        if input_trimmed.is_empty() { continue 'game_loop; }

        match parse_user_input(input_trimmed) {
            Ok(UserInput::Move(mut parsed_move)) => {
                // Ask for the piece only if a promotion to that square is actually legal
                let needs_promotion = parsed_move.promotion().is_none()
                    && service
                        .legal_moves(game_id, parsed_move.start())
                        .map(|moves| moves.iter().any(|m| m.end() == parsed_move.end() && m.promotion().is_some()))
                        .unwrap_or(false);
                if needs_promotion {
                    match prompt_promotion()? {
                        Some(kind) => parsed_move = parsed_move.with_promotion(kind),
                        None => {
                            println!("\nPromotion choice required but not provided. Move cancelled.");
                            continue 'game_loop;
                        }
                    }
                }
                let connection = seats.for_team(team).id();
                if let Err(e) = service.make_move(connection, &parsed_move) {
                    println!("Error making move: {}", e);
                }
            }
            Ok(UserInput::Command(command)) => match command {
                Command::Show(position) => match service.legal_moves(game_id, position) {
                    Ok(moves) if moves.is_empty() => println!("No legal moves from {}.", position),
                    Ok(moves) => {
                        let targets: Vec<String> = moves.iter().map(|m| m.to_string()).collect();
                        println!("Legal moves from {}: {}", position, targets.join(" "));
                    }
                    Err(e) => println!("Error: {}", e),
                },
                Command::Redraw => println!("{}", record.game),
                Command::Resign => {
                    if let Err(e) = service.resign(seats.for_team(team).id()) {
                        println!("Error: {}", e);
                    }
                }
                Command::Help => print_help(),
                Command::Quit => {
                    println!("Quit command received.");
                    break 'game_loop;
                }
            },
            Err(e) => println!("Input Error: {}", e),
        }
    }

    print_events(&mut spectator);
    close_session(&service, &store, [seats.white, seats.black, spectator], config.save.as_deref());
    println!("\nGame session finished.");
    Ok(())
}

/// Prints available commands.
fn print_help() {
    println!("\nAvailable Commands:");
    println!("  <move>         Enter a move in long algebraic notation (e.g., e2e4, e2 e4, a7a8q).");
    println!("  move <move>    Same as above.");
    println!("                 Promotion (q, r, b, n) is optional; will prompt if needed.");
    println!("  show <square>  List the legal moves of the piece on a square (e.g., show g1).");
    println!("  redraw         Print the board again.");
    println!("  resign         Forfeit the game for the side to move (ends game).");
    println!("  help           Show this help message.");
    println!("  quit / exit    Leave the session (saves games if --save was given).");
    println!();
}
