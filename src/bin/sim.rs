use log::LevelFilter;
use rand::{rngs::SmallRng, SeedableRng};
use salvo::client::send_grid;
use salvo::{
    init_logging, AiTargeting, Board, ClientSession, Difficulty, GameEnd, GameSession,
    InMemoryTransport,
};
use serde_json::json;

async fn ai_client(
    mut transport: InMemoryTransport,
    seed: u64,
) -> anyhow::Result<(GameEnd, usize)> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let board = Board::random(&mut rng)?;
    send_grid(&mut transport, &board, false).await?;
    let mut session = ClientSession::new(board);
    let mut ai = AiTargeting::new(Difficulty::Normal);
    let end = session.run_ai(&mut transport, &mut ai, &mut rng).await?;
    Ok((end, session.own().sunk_count()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LevelFilter::Warn);
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <seed1> <seed2>", args[0]);
        std::process::exit(1);
    }
    let seed1: u64 = args[1].parse()?;
    let seed2: u64 = args[2].parse()?;

    let (s1, c1) = InMemoryTransport::pair();
    let (s2, c2) = InMemoryTransport::pair();
    let mut session = GameSession::new(1, Box::new(s1), Box::new(s2));

    let (summary, res1, res2) =
        tokio::try_join!(session.run(), ai_client(c1, seed1), ai_client(c2, seed2))?;

    let winner = match summary.winner {
        Some(0) => Some("player1"),
        Some(1) => Some("player2"),
        _ => None,
    };

    let result = json!({
        "player1": {"end": format!("{:?}", res1.0), "ships_lost": res1.1},
        "player2": {"end": format!("{:?}", res2.0), "ships_lost": res2.1},
        "winner": winner,
        "summary": summary,
    });

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}
