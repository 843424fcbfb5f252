use std::io;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use salvo::client::send_grid;
use salvo::ui::{self, RawTerminal, TerminalDisplay};
use salvo::{
    init_logging, AiTargeting, Board, ClientSession, Difficulty, GameEnd, GameServer, LocalGame,
    TcpTransport, TransportConfig,
};
use tokio::sync::mpsc;
use tokio::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PlayerType {
    Human,
    Ai,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Level {
    Easy,
    Normal,
    Hard,
}

impl From<Level> for Difficulty {
    fn from(level: Level) -> Self {
        match level {
            Level::Easy => Difficulty::Easy,
            Level::Normal => Difficulty::Normal,
            Level::Hard => Difficulty::Hard,
        }
    }
}

#[derive(Parser)]
enum Commands {
    /// Host games: every two connections are paired into one session.
    Server {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, help = "Drop a peer that stays silent this long")]
        read_timeout_secs: Option<u64>,
        #[arg(long, help = "Stop after this many sessions have been started")]
        sessions: Option<usize>,
    },
    /// Connect to a server and play.
    Client {
        #[arg(long, default_value = "127.0.0.1:8080")]
        connect: String,
        #[arg(long, value_enum, default_value_t = PlayerType::Human)]
        player: PlayerType,
        #[arg(long, value_enum, default_value_t = Level::Normal)]
        difficulty: Level,
        #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
        seed: Option<u64>,
        #[arg(long)]
        read_timeout_secs: Option<u64>,
        #[arg(long, help = "Send the fleet as bare 'S' markers")]
        legacy_grid: bool,
    },
    /// Play against the AI on the local machine.
    Local {
        #[arg(long, value_enum, default_value_t = Level::Normal)]
        difficulty: Level,
        #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
}

fn make_rng(seed: Option<u64>) -> SmallRng {
    if let Some(s) = seed {
        println!("Using fixed seed: {} (game will be reproducible)", s);
        SmallRng::seed_from_u64(s)
    } else {
        let mut seed_rng = rand::rng();
        SmallRng::from_rng(&mut seed_rng)
    }
}

fn transport_config(read_timeout_secs: Option<u64>) -> TransportConfig {
    TransportConfig {
        read_timeout: read_timeout_secs.map(Duration::from_secs),
        ..TransportConfig::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server {
            bind,
            read_timeout_secs,
            sessions,
        } => {
            init_logging(LevelFilter::Info);
            let mut server = GameServer::bind(&bind, transport_config(read_timeout_secs)).await?;
            server.run(sessions).await?;
        }
        Commands::Client {
            connect,
            player,
            difficulty,
            seed,
            read_timeout_secs,
            legacy_grid,
        } => {
            init_logging(LevelFilter::Off);
            let mut rng = make_rng(seed);
            let board = match player {
                PlayerType::Human => ui::prompt_placement(&mut io::stdin().lock(), &mut rng)?,
                PlayerType::Ai => Board::random(&mut rng)?,
            };
            println!("Connecting to {}...", connect);
            let (mut transport, peer) =
                TcpTransport::connect(&connect, &transport_config(read_timeout_secs)).await?;
            println!("Connected to {}. Waiting for an opponent...", peer);
            send_grid(&mut transport, &board, legacy_grid).await?;
            let mut session = ClientSession::new(board);

            let end = match player {
                PlayerType::Human => {
                    let (reader, writer) = transport.into_split();
                    let (key_tx, key_rx) = mpsc::channel(16);
                    let guard = RawTerminal::enter()?;
                    let keyboard = ui::spawn_keyboard(key_tx);
                    let mut display = TerminalDisplay::new();
                    let end = session.run(reader, writer, key_rx, &mut display).await;
                    drop(guard);
                    let _ = keyboard.await;
                    end
                }
                PlayerType::Ai => {
                    let mut ai = AiTargeting::new(difficulty.into());
                    session.run_ai(&mut transport, &mut ai, &mut rng).await
                }
            };
            match end {
                Ok(GameEnd::Won) => println!("You won!"),
                Ok(GameEnd::Lost) => println!("You lost!"),
                Ok(GameEnd::Quit) => println!("You forfeited."),
                Ok(GameEnd::OpponentLeft) => println!("Your opponent left the game."),
                Err(e) => eprintln!("Game ended with an error: {:#}", e),
            }
        }
        Commands::Local { difficulty, seed } => {
            init_logging(LevelFilter::Off);
            let mut rng = make_rng(seed);
            let mut input = io::stdin().lock();
            let board = ui::prompt_placement(&mut input, &mut rng)?;
            let mut game = LocalGame::with_random_enemy(&mut rng, board, difficulty.into())?;
            ui::run_local(&mut input, &mut game, &mut rng)?;
        }
    }
    Ok(())
}
