use std::sync::Arc;
use std::time::Duration;

use chess_session::{
    Board, DrawReason, Game, GameResult, GameService, MemoryStore, Move, Piece, PieceKind, Position, ServerEvent,
    SessionError, SessionStore, Subscription, Team, WinReason, Winner,
};

fn mv(s: &str) -> Move {
    Move::parse(s).unwrap()
}

fn notices(sub: &mut Subscription) -> Vec<String> {
    sub.drain()
        .into_iter()
        .filter_map(|event| match event {
            ServerEvent::Notification { message } => Some(message),
            _ => None,
        })
        .collect()
}

struct Table {
    service: GameService,
    game_id: u32,
    alice: Subscription,
    bob: Subscription,
    carol: Subscription,
}

/// alice plays white, bob black, carol watches. All feeds start empty.
fn table() -> Table {
    let service = GameService::in_memory();
    let game_id = service.create_game("club night").unwrap();
    service.join_game(game_id, "alice", Team::White).unwrap();
    service.join_game(game_id, "bob", Team::Black).unwrap();
    let mut alice = service.connect(game_id, "alice").unwrap();
    let mut bob = service.connect(game_id, "bob").unwrap();
    let mut carol = service.connect(game_id, "carol").unwrap();
    alice.drain();
    bob.drain();
    carol.drain();
    Table { service, game_id, alice, bob, carol }
}

#[test]
fn join_notices_name_the_role() {
    let service = GameService::in_memory();
    let id = service.create_game("g").unwrap();
    service.join_game(id, "alice", Team::White).unwrap();
    service.join_game(id, "bob", Team::Black).unwrap();
    let mut alice = service.connect(id, "alice").unwrap();
    let _bob = service.connect(id, "bob").unwrap();
    let _carol = service.connect(id, "carol").unwrap();

    let events = alice.drain();
    assert!(matches!(events[0], ServerEvent::LoadGame { .. }));
    assert_eq!(
        events[1..].to_vec(),
        vec![
            ServerEvent::notification("bob joined the game as black."),
            ServerEvent::notification("carol joined the game as an observer."),
        ]
    );
}

#[test]
fn a_move_reaches_everyone_in_order() {
    let mut t = table();
    let game = t.service.make_move(t.alice.id(), &mv("e2e4")).unwrap();
    assert_eq!(game.team_to_move(), Team::Black);

    let mover = t.alice.drain();
    assert_eq!(mover, vec![ServerEvent::LoadGame { game: game.clone() }]);

    for feed in [&mut t.bob, &mut t.carol] {
        assert_eq!(
            feed.drain(),
            vec![
                ServerEvent::LoadGame { game: game.clone() },
                ServerEvent::notification("alice moved e2 to e4."),
            ]
        );
    }
    assert_eq!(t.service.get_game(t.game_id).unwrap().game, game);
}

#[test]
fn check_and_checkmate_are_announced() {
    let mut t = table();
    t.service.make_move(t.alice.id(), &mv("e2e4")).unwrap();
    t.service.make_move(t.bob.id(), &mv("f7f6")).unwrap();
    t.carol.drain();
    t.service.make_move(t.alice.id(), &mv("d1h5")).unwrap();
    assert_eq!(notices(&mut t.carol), ["alice moved d1 to h5.", "bob is in check."]);

    let mut t = table();
    for (who, m) in [("alice", "f2f3"), ("bob", "e7e5"), ("alice", "g2g4"), ("bob", "d8h4")] {
        let connection = if who == "alice" { t.alice.id() } else { t.bob.id() };
        t.service.make_move(connection, &mv(m)).unwrap();
    }
    let carol = notices(&mut t.carol);
    assert_eq!(carol.last().map(String::as_str), Some("alice is in checkmate!"));
    assert_eq!(notices(&mut t.alice).last().map(String::as_str), Some("alice is in checkmate!"));

    let record = t.service.get_game(t.game_id).unwrap();
    assert!(record.game.is_game_over());
    assert_eq!(record.game.outcome(), Some(GameResult::Win(Team::Black, WinReason::Checkmate)));

    t.alice.drain();
    assert!(matches!(t.service.make_move(t.alice.id(), &mv("e2e4")), Err(SessionError::GameOver)));
    assert_eq!(
        t.alice.drain(),
        vec![ServerEvent::error(SessionError::GameOver.to_string())]
    );
}

#[test]
fn rejected_move_only_tells_the_mover() {
    let mut t = table();
    let err = t.service.make_move(t.alice.id(), &mv("e2e5")).unwrap_err();
    assert!(matches!(err, SessionError::Move(_)));
    assert!(matches!(t.alice.drain().as_slice(), [ServerEvent::Error { .. }]));
    assert!(t.bob.drain().is_empty());
    assert!(t.carol.drain().is_empty());
}

#[test]
fn resignation_flow() {
    let mut t = table();
    assert!(matches!(t.service.resign(t.carol.id()), Err(SessionError::ObserverCannotAct(_))));
    t.carol.drain();

    let result = t.service.resign(t.bob.id()).unwrap();
    assert_eq!(result, GameResult::Win(Team::White, WinReason::Resignation));
    for feed in [&mut t.alice, &mut t.bob, &mut t.carol] {
        assert_eq!(notices(feed), ["bob (black) has resigned."]);
    }

    assert!(matches!(t.service.resign(t.alice.id()), Err(SessionError::GameOver)));
    assert!(matches!(t.service.make_move(t.alice.id(), &mv("e2e4")), Err(SessionError::GameOver)));
    let record = t.service.get_game(t.game_id).unwrap();
    assert_eq!(record.game.resigned(), Some(Team::Black));
}

#[test]
fn leaving_frees_the_seat() {
    let mut t = table();
    t.service.leave(t.carol.id()).unwrap();
    assert!(t.alice.drain().is_empty());

    t.service.leave(t.bob.id()).unwrap();
    assert_eq!(notices(&mut t.alice), ["bob left the game"]);
    let record = t.service.get_game(t.game_id).unwrap();
    assert_eq!(record.black, None);
    assert_eq!(record.white.as_deref(), Some("alice"));

    assert!(matches!(t.service.leave(t.bob.id()), Err(SessionError::NotConnected)));
    t.service.join_game(t.game_id, "dave", Team::Black).unwrap();
}

#[test]
fn a_departed_connection_hears_nothing_more() {
    let mut t = table();
    t.service.leave(t.carol.id()).unwrap();
    t.service.make_move(t.alice.id(), &mv("e2e4")).unwrap();
    assert!(t.carol.drain().is_empty());
    assert_eq!(notices(&mut t.bob), ["alice moved e2 to e4."]);

    t.service.leave(t.bob.id()).unwrap();
    t.service.join_game(t.game_id, "dave", Team::Black).unwrap();
    let dave = t.service.connect(t.game_id, "dave").unwrap();
    t.service.make_move(dave.id(), &mv("e7e5")).unwrap();
    assert!(t.bob.drain().is_empty());
    assert_eq!(t.service.connection_count(t.game_id), 2);
}

#[test]
fn a_slow_observer_still_sees_every_move() {
    let mut t = table();
    let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
    let plies = 40;
    for (ply, m) in shuffle.iter().cycle().take(plies).enumerate() {
        let connection = if ply % 2 == 0 { t.alice.id() } else { t.bob.id() };
        t.service.make_move(connection, &mv(m)).unwrap();
    }

    let events = t.carol.drain();
    let states: Vec<&Game> = events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::LoadGame { game } => Some(game),
            _ => None,
        })
        .collect();
    assert_eq!(states.len(), plies);
    assert_eq!(events.len(), plies * 2);
    assert_eq!(*states[plies - 1], Game::new());
}

fn square(s: &str) -> Position {
    Position::from_algebraic(s).unwrap()
}

#[test]
fn stalemate_is_announced_and_ends_the_game() {
    // White to play Qb6, leaving the lone black king on a8 without a move
    let store = Arc::new(MemoryStore::new());
    let game_id = store.create("endgame");
    let mut record = store.get(game_id).unwrap();
    let mut board = Board::new();
    board.add_piece(square("a8"), Some(Piece::new(Team::Black, PieceKind::King)));
    board.add_piece(square("b5"), Some(Piece::new(Team::White, PieceKind::Queen)));
    board.add_piece(square("c1"), Some(Piece::new(Team::White, PieceKind::King)));
    record.game = Game::from_board(board, Team::White);
    store.save(game_id, record).unwrap();

    let service = GameService::new(store);
    service.join_game(game_id, "alice", Team::White).unwrap();
    service.join_game(game_id, "bob", Team::Black).unwrap();
    let mut alice = service.connect(game_id, "alice").unwrap();
    let mut bob = service.connect(game_id, "bob").unwrap();
    let mut carol = service.connect(game_id, "carol").unwrap();
    for feed in [&mut alice, &mut bob, &mut carol] {
        feed.drain();
    }

    service.make_move(alice.id(), &mv("b5b6")).unwrap();
    assert_eq!(notices(&mut alice), ["Stalemate!"]);
    for feed in [&mut bob, &mut carol] {
        assert_eq!(notices(feed), ["alice moved b5 to b6.", "Stalemate!"]);
    }

    let game = service.get_game(game_id).unwrap().game;
    assert!(game.is_game_over());
    assert_eq!(game.winner(), Winner::Draw);
    assert_eq!(game.outcome(), Some(GameResult::Draw(DrawReason::Stalemate)));

    assert!(matches!(service.make_move(bob.id(), &mv("a8b8")), Err(SessionError::GameOver)));
    assert_eq!(bob.drain(), vec![ServerEvent::error(SessionError::GameOver.to_string())]);
    assert!(carol.drain().is_empty());
}

#[test]
fn one_user_in_both_seats_plays_both_sides() {
    let service = GameService::in_memory();
    let id = service.create_game("solo").unwrap();
    service.join_game(id, "sam", Team::White).unwrap();
    service.join_game(id, "sam", Team::Black).unwrap();
    let sam = service.connect(id, "sam").unwrap();
    service.make_move(sam.id(), &mv("e2e4")).unwrap();
    service.make_move(sam.id(), &mv("e7e5")).unwrap();
    assert_eq!(service.get_game(id).unwrap().game.team_to_move(), Team::White);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn observer_receives_moves_asynchronously() {
    let t = table();
    let Table { service, alice, bob, mut carol, .. } = t;

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while seen.len() < 4 {
            match tokio::time::timeout(Duration::from_secs(5), carol.recv()).await {
                Ok(Some(event)) => seen.push(event),
                _ => break,
            }
        }
        seen
    });

    service.make_move(alice.id(), &mv("g1f3")).unwrap();
    service.make_move(bob.id(), &mv("g8f6")).unwrap();

    let seen = watcher.await.unwrap();
    assert_eq!(seen.len(), 4);
    assert!(matches!(seen[0], ServerEvent::LoadGame { .. }));
    assert_eq!(seen[1], ServerEvent::notification("alice moved g1 to f3."));
    assert!(matches!(seen[2], ServerEvent::LoadGame { .. }));
    assert_eq!(seen[3], ServerEvent::notification("bob moved g8 to f6."));
}

#[tokio::test]
async fn clearing_the_service_ends_subscriptions() {
    let Table { service, mut carol, .. } = table();
    service.clear();
    let next = tokio::time::timeout(Duration::from_secs(1), carol.recv()).await;
    assert!(matches!(next, Ok(None)));
}
