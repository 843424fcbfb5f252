use salvo::protocol::read_server_message;
use salvo::transport::LineTransport;
use salvo::{
    AttackOutcome, Board, CellState, Coord, GameSession, InMemoryTransport, LineWrite,
    OpponentView, Orientation, ServerMessage, SessionEnd, TransportConfig, TurnState,
};
use tokio::time::Duration;

fn destroyer_at(row: i32, col: i32) -> Board {
    let mut board = Board::new();
    board.place(4, Coord::new(row, col), Orientation::Horizontal).unwrap();
    board
}

async fn expect(peer: &mut InMemoryTransport, msg: ServerMessage) {
    let got = read_server_message(peer).await.unwrap();
    assert_eq!(got, Some(msg));
}

async fn expect_result(peer: &mut InMemoryTransport, wire: (i32, i32), outcome: AttackOutcome) {
    let coord = Coord::from_wire(wire.0, wire.1);
    expect(peer, ServerMessage::Result { coord, outcome }).await;
}

async fn expect_attacked(peer: &mut InMemoryTransport, wire: (i32, i32), outcome: AttackOutcome) {
    let coord = Coord::from_wire(wire.0, wire.1);
    expect(peer, ServerMessage::Attacked { coord, outcome }).await;
}

async fn expect_turns(active: &mut InMemoryTransport, waiting: &mut InMemoryTransport) {
    expect(active, ServerMessage::YourTurn).await;
    expect(waiting, ServerMessage::OpponentTurn).await;
}

fn pairs() -> (GameSession, InMemoryTransport, InMemoryTransport) {
    let (s0, c0) = InMemoryTransport::pair();
    let (s1, c1) = InMemoryTransport::pair();
    (GameSession::new(1, Box::new(s0), Box::new(s1)), c0, c1)
}

#[tokio::test]
async fn full_game_with_rejections() {
    let (mut session, mut c0, mut c1) = pairs();

    let script = async {
        c0.write_all(&destroyer_at(0, 0).to_wire()).await.unwrap();
        c1.write_all(&destroyer_at(5, 5).to_wire()).await.unwrap();

        expect_turns(&mut c0, &mut c1).await;
        c0.write_line("(11 1)").await.unwrap();
        expect_result(&mut c0, (11, 1), AttackOutcome::OutOfRange).await;
        expect(&mut c0, ServerMessage::YourTurn).await;

        c0.write_line("(6 6)").await.unwrap();
        expect_result(&mut c0, (6, 6), AttackOutcome::Hit).await;
        expect_attacked(&mut c1, (6, 6), AttackOutcome::Hit).await;
        let mut view = OpponentView::new();
        view.set(Coord::new(5, 5), CellState::Hit);
        expect(&mut c0, ServerMessage::Board(view)).await;

        expect_turns(&mut c1, &mut c0).await;
        c1.write_line("(10 10)").await.unwrap();
        expect_result(&mut c1, (10, 10), AttackOutcome::Miss).await;
        expect_attacked(&mut c0, (10, 10), AttackOutcome::Miss).await;
        let mut their_view = OpponentView::new();
        their_view.set(Coord::new(9, 9), CellState::Miss);
        expect(&mut c1, ServerMessage::Board(their_view)).await;

        expect_turns(&mut c0, &mut c1).await;
        c0.write_line("(6 6)").await.unwrap();
        expect_result(&mut c0, (6, 6), AttackOutcome::AlreadyShot).await;
        expect(&mut c0, ServerMessage::YourTurn).await;
        c0.write_line("6 7").await.unwrap();
        expect_result(&mut c0, (6, 7), AttackOutcome::GameWon).await;
        expect_attacked(&mut c1, (6, 7), AttackOutcome::GameWon).await;
        view.set(Coord::new(5, 5), CellState::Sunk);
        view.set(Coord::new(5, 6), CellState::Sunk);
        expect(&mut c0, ServerMessage::Board(view)).await;
        expect(&mut c0, ServerMessage::GameOver { won: true }).await;
        expect(&mut c1, ServerMessage::GameOver { won: false }).await;

        assert_eq!(read_server_message(&mut c0).await.unwrap(), None);
    };

    let (summary, ()) = tokio::join!(session.run(), script);
    let summary = summary.unwrap();
    assert_eq!(summary.winner, Some(0));
    assert_eq!(summary.turns, 3);
    assert_eq!(summary.end, SessionEnd::AllSunk);
    assert_eq!(session.turn(), TurnState::GameOver(0));
    assert_eq!(session.player(1).sunk_count(), 1);
}

#[tokio::test]
async fn forfeit_hands_the_win_to_the_other_peer() {
    let (mut session, mut c0, mut c1) = pairs();
    let script = async {
        c0.write_all(&destroyer_at(0, 0).to_wire()).await.unwrap();
        c1.write_all(&destroyer_at(5, 5).to_wire()).await.unwrap();
        expect_turns(&mut c0, &mut c1).await;
        c0.write_line("FORFEIT").await.unwrap();
        expect(&mut c1, ServerMessage::OpponentForfeit).await;
        expect(&mut c1, ServerMessage::GameOver { won: true }).await;
        expect(&mut c0, ServerMessage::GameOver { won: false }).await;
    };
    let (summary, ()) = tokio::join!(session.run(), script);
    let summary = summary.unwrap();
    assert_eq!(summary.winner, Some(1));
    assert_eq!(summary.end, SessionEnd::Forfeit { peer: 0 });
    assert_eq!(session.turn(), TurnState::GameOver(1));
}

#[tokio::test]
async fn waiting_peer_can_forfeit_during_the_other_turn() {
    let (mut session, c0, c1) = pairs();
    let script = async move {
        let (mut c0, mut c1) = (c0, c1);
        c0.write_all(&destroyer_at(0, 0).to_wire()).await.unwrap();
        c1.write_all(&destroyer_at(5, 5).to_wire()).await.unwrap();
        expect_turns(&mut c0, &mut c1).await;
        c1.write_line("FORFEIT").await.unwrap();
        c1.shutdown().await.unwrap();
        drop(c1);
        c0.write_line("(10 10)").await.unwrap();

        let mut seen = Vec::new();
        while let Some(msg) = read_server_message(&mut c0).await.unwrap() {
            seen.push(msg);
        }
        assert!(seen.contains(&ServerMessage::OpponentForfeit), "{:?}", seen);
        assert!(!seen.contains(&ServerMessage::OpponentDisconnected), "{:?}", seen);
        assert_eq!(seen.last(), Some(&ServerMessage::GameOver { won: true }));
    };
    let (summary, ()) = tokio::join!(session.run(), script);
    let summary = summary.unwrap();
    assert_eq!(summary.winner, Some(0));
    assert_eq!(summary.end, SessionEnd::Forfeit { peer: 1 });
    assert_eq!(session.turn(), TurnState::GameOver(0));
}

#[tokio::test]
async fn waiting_peer_hanging_up_ends_the_game_at_once() {
    let (mut session, c0, c1) = pairs();
    let script = async move {
        let (mut c0, mut c1) = (c0, c1);
        c0.write_all(&destroyer_at(0, 0).to_wire()).await.unwrap();
        c1.write_all(&destroyer_at(5, 5).to_wire()).await.unwrap();
        expect_turns(&mut c0, &mut c1).await;
        drop(c1);
        // No attack from c0: the drop alone must end the session.
        expect(&mut c0, ServerMessage::OpponentDisconnected).await;
        assert_eq!(read_server_message(&mut c0).await.unwrap(), None);
    };
    let (summary, ()) = tokio::join!(session.run(), script);
    let summary = summary.unwrap();
    assert_eq!(summary.winner, None);
    assert_eq!(summary.end, SessionEnd::Disconnected { peer: 1 });
    assert_eq!(summary.turns, 0);
}

#[tokio::test]
async fn vanished_attacker_is_reported_to_the_survivor() {
    let (mut session, c0, mut c1) = pairs();
    let script = async move {
        let mut c0 = c0;
        c0.write_all(&destroyer_at(0, 0).to_wire()).await.unwrap();
        c1.write_all(&destroyer_at(5, 5).to_wire()).await.unwrap();
        expect_turns(&mut c0, &mut c1).await;
        drop(c0);
        expect(&mut c1, ServerMessage::OpponentDisconnected).await;
        assert_eq!(read_server_message(&mut c1).await.unwrap(), None);
    };
    let (summary, ()) = tokio::join!(session.run(), script);
    let summary = summary.unwrap();
    assert_eq!(summary.winner, None);
    assert_eq!(summary.end, SessionEnd::Disconnected { peer: 0 });
}

#[tokio::test]
async fn legacy_grid_is_accepted_and_playable() {
    let (mut session, mut c0, mut c1) = pairs();
    let script = async {
        c0.write_all(&destroyer_at(0, 0).to_wire()).await.unwrap();
        c1.write_all(&destroyer_at(3, 3).to_legacy_wire()).await.unwrap();
        expect_turns(&mut c0, &mut c1).await;
        c0.write_line("(4 4)").await.unwrap();
        expect_result(&mut c0, (4, 4), AttackOutcome::Hit).await;
        expect_attacked(&mut c1, (4, 4), AttackOutcome::Hit).await;
        let _board = read_server_message(&mut c0).await.unwrap();
        expect_turns(&mut c1, &mut c0).await;
        c1.write_line("FORFEIT").await.unwrap();
        expect(&mut c0, ServerMessage::OpponentForfeit).await;
    };
    let (summary, ()) = tokio::join!(session.run(), script);
    assert_eq!(summary.unwrap().winner, Some(0));
    let ships = session.player(1).board().ships();
    assert_eq!(ships.len(), 1);
    assert_eq!(ships[0].size(), 2);
    assert_eq!(ships[0].hits(), 1);
}

#[tokio::test]
async fn malformed_grid_ends_the_session() {
    let (mut session, mut c0, mut c1) = pairs();
    let script = async {
        c0.write_all(&destroyer_at(0, 0).to_wire()).await.unwrap();
        let mut bad = destroyer_at(0, 0).to_wire();
        bad[50] = b'#';
        c1.write_all(&bad).await.unwrap();
        expect(&mut c0, ServerMessage::OpponentDisconnected).await;
    };
    let (summary, ()) = tokio::join!(session.run(), script);
    assert_eq!(summary.unwrap().end, SessionEnd::Disconnected { peer: 1 });
}

#[tokio::test]
async fn silent_attacker_times_out() {
    let server_config = TransportConfig {
        read_timeout: Some(Duration::from_millis(100)),
        ..TransportConfig::default()
    };
    let client_config = TransportConfig::default();
    let split = |config: &TransportConfig| {
        let (a, b) = tokio::io::duplex(4096);
        let (ar, aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        (
            LineTransport::from_halves(ar, aw, &server_config),
            LineTransport::from_halves(br, bw, config),
        )
    };
    let (s0, mut c0) = split(&client_config);
    let (s1, mut c1) = split(&client_config);
    let mut session = GameSession::new(9, Box::new(s0), Box::new(s1));

    let script = async {
        c0.write_all(&destroyer_at(0, 0).to_wire()).await.unwrap();
        c1.write_all(&destroyer_at(5, 5).to_wire()).await.unwrap();
        assert_eq!(
            read_server_message(&mut c0).await.unwrap(),
            Some(ServerMessage::YourTurn)
        );
        assert_eq!(
            read_server_message(&mut c1).await.unwrap(),
            Some(ServerMessage::OpponentTurn)
        );
        assert_eq!(
            read_server_message(&mut c1).await.unwrap(),
            Some(ServerMessage::OpponentDisconnected)
        );
    };
    let (summary, ()) = tokio::join!(session.run(), script);
    assert_eq!(summary.unwrap().end, SessionEnd::Disconnected { peer: 0 });
}
