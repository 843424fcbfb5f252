//! Terminal front end: the crossterm board display, keyboard polling and
//! the line-based prompts used for placement and the local game.

use std::io::{self, BufRead, Stdout, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::board::Board;
use crate::client::{GameDisplay, KeyInput, Phase};
use crate::common::{AttackOutcome, Coord};
use crate::config::{GRID_SIZE, NUM_SHIPS, SHIPS};
use crate::grid::{CellState, OpponentView};
use crate::local::{LocalGame, HUMAN};
use crate::protocol::parse_coordinate;
use crate::ship::Orientation;

const KEY_POLL: Duration = Duration::from_millis(100);

/// Character for a cell of the player's own board.
fn own_cell(board: &Board, row: usize, col: usize) -> char {
    let cell = board.grid().get(row, col);
    match (cell.ship, cell.state) {
        (Some(_), CellState::Unshot) => 'S',
        (None, CellState::Unshot) => '~',
        (_, state) => state.token(),
    }
}

fn header() -> String {
    let mut line = String::from("   ");
    for c in 1..=GRID_SIZE {
        line.push_str(&format!("{:>2}", c));
    }
    line
}

/// Own board as text rows, ships revealed.
pub fn own_board_lines(board: &Board) -> Vec<String> {
    let mut lines = vec![header()];
    for r in 0..GRID_SIZE {
        let mut line = format!("{:>2} ", r + 1);
        for c in 0..GRID_SIZE {
            line.push(' ');
            line.push(own_cell(board, r, c));
        }
        lines.push(line);
    }
    lines
}

/// Opponent view as text rows.
pub fn opponent_lines(view: &OpponentView) -> Vec<String> {
    let mut lines = vec![header()];
    for r in 0..GRID_SIZE {
        let mut line = format!("{:>2} ", r + 1);
        for c in 0..GRID_SIZE {
            line.push(' ');
            line.push(view.get(Coord::from((r, c))).unwrap_or_default().token());
        }
        lines.push(line);
    }
    lines
}

/// Full-screen display drawn with crossterm.
pub struct TerminalDisplay {
    out: Stdout,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }

    fn draw_boards(
        &mut self,
        own: &Board,
        opponent: &OpponentView,
        cursor_at: Coord,
        your_turn: bool,
        phase: Phase,
    ) -> io::Result<()> {
        queue!(
            self.out,
            cursor::MoveTo(0, 0),
            terminal::Clear(ClearType::FromCursorDown),
            Print("Opponent\r\n"),
            Print(header()),
            Print("\r\n")
        )?;
        let show_cursor = your_turn && phase == Phase::Attack;
        for r in 0..GRID_SIZE {
            queue!(self.out, Print(format!("{:>2} ", r + 1)))?;
            for c in 0..GRID_SIZE {
                let coord = Coord::from((r, c));
                let token = opponent.get(coord).unwrap_or_default().token();
                queue!(self.out, Print(' '))?;
                if show_cursor && coord == cursor_at {
                    queue!(
                        self.out,
                        SetAttribute(Attribute::Reverse),
                        Print(token),
                        SetAttribute(Attribute::Reset)
                    )?;
                } else {
                    queue!(self.out, Print(token))?;
                }
            }
            queue!(self.out, Print("\r\n"))?;
        }
        queue!(self.out, Print("\r\nYour fleet\r\n"))?;
        for line in own_board_lines(own) {
            queue!(self.out, Print(line), Print("\r\n"))?;
        }
        queue!(
            self.out,
            Print("\r\narrows: move   enter: fire   q: forfeit\r\n")
        )?;
        self.out.flush()
    }

    fn draw_line(&mut self, row: u16, msg: &str) -> io::Result<()> {
        queue!(
            self.out,
            cursor::MoveTo(0, row),
            terminal::Clear(ClearType::CurrentLine),
            Print(msg)
        )?;
        self.out.flush()
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

/// Screen rows below the two boards and the key help.
const STATUS_ROW: u16 = 2 * (GRID_SIZE as u16 + 2) + 3;

impl GameDisplay for TerminalDisplay {
    fn render_boards(
        &mut self,
        own: &Board,
        opponent: &OpponentView,
        cursor_at: Coord,
        your_turn: bool,
        phase: Phase,
    ) {
        if let Err(e) = self.draw_boards(own, opponent, cursor_at, your_turn, phase) {
            log::debug!("draw failed: {}", e);
        }
    }

    fn render_status(&mut self, msg: &str) {
        if let Err(e) = self.draw_line(STATUS_ROW, msg) {
            log::debug!("draw failed: {}", e);
        }
    }

    fn render_result(&mut self, msg: &str) {
        if let Err(e) = self.draw_line(STATUS_ROW + 1, msg) {
            log::debug!("draw failed: {}", e);
        }
    }
}

/// Raw mode plus alternate screen for as long as the guard lives.
pub struct RawTerminal;

impl RawTerminal {
    pub fn enter() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, cursor::Hide)?;
        Ok(RawTerminal)
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

pub fn key_from_code(code: KeyCode) -> Option<KeyInput> {
    match code {
        KeyCode::Up => Some(KeyInput::Up),
        KeyCode::Down => Some(KeyInput::Down),
        KeyCode::Left => Some(KeyInput::Left),
        KeyCode::Right => Some(KeyInput::Right),
        KeyCode::Enter | KeyCode::Char(' ') => Some(KeyInput::Enter),
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(KeyInput::Quit),
        _ => None,
    }
}

/// Poll the keyboard on a blocking thread and forward key presses. The
/// thread stops once the receiver is dropped.
pub fn spawn_keyboard(tx: mpsc::Sender<KeyInput>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !tx.is_closed() {
            match event::poll(KEY_POLL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    log::warn!("keyboard poll failed: {}", e);
                    break;
                }
            }
            let key = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("keyboard read failed: {}", e);
                    break;
                }
            };
            if let Some(input) = key_from_code(key.code) {
                if tx.blocking_send(input).is_err() {
                    break;
                }
            }
        }
    })
}

/// Parse a placement line: `row col h|v`, 1-indexed. Orientation defaults
/// to horizontal.
pub fn parse_placement(line: &str) -> Result<(Coord, Orientation), String> {
    let mut parts: Vec<&str> = line.split_whitespace().collect();
    let orientation = match parts.last().map(|p| p.to_ascii_lowercase()) {
        Some(p) if p == "h" => {
            parts.pop();
            Orientation::Horizontal
        }
        Some(p) if p == "v" => {
            parts.pop();
            Orientation::Vertical
        }
        _ => Orientation::Horizontal,
    };
    if parts.len() != 2 {
        return Err("expected: row col [h|v]".to_string());
    }
    let coord = parse_coordinate(&parts.join(" "))
        .ok_or_else(|| format!("'{}' is not a coordinate", parts.join(" ")))?;
    if !coord.in_bounds() {
        return Err(format!("{} is off the grid", coord));
    }
    Ok((coord, orientation))
}

fn read_prompt<I: BufRead>(input: &mut I, prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        anyhow::bail!("input closed");
    }
    Ok(line.trim().to_string())
}

/// Ask for each ship of the catalogue in turn. An empty line places the
/// current ship randomly; invalid placements are asked again.
pub fn prompt_placement<I: BufRead, R: Rng + ?Sized>(
    input: &mut I,
    rng: &mut R,
) -> anyhow::Result<Board> {
    println!("Place your fleet: enter `row col h|v` (1-10), or press Enter for random.");
    let mut board = Board::new();
    for (i, def) in SHIPS.iter().enumerate() {
        loop {
            for line in own_board_lines(&board) {
                println!("{}", line);
            }
            let prompt = format!(
                "Ship {}/{}: {} (length {}) > ",
                i + 1,
                NUM_SHIPS,
                def.name(),
                def.length()
            );
            let line = read_prompt(input, &prompt)?;
            let (origin, orientation) = if line.is_empty() {
                board.random_placement(rng, *def)?
            } else {
                match parse_placement(&line) {
                    Ok(p) => p,
                    Err(e) => {
                        println!("Invalid input: {}", e);
                        continue;
                    }
                }
            };
            match board.place(i, origin, orientation) {
                Ok(_) => {
                    println!("{} placed at {}", def.name(), origin);
                    break;
                }
                Err(e) => println!("Cannot place there: {}", e),
            }
        }
    }
    Ok(board)
}

fn print_local(game: &LocalGame) {
    println!("\nOpponent");
    for line in opponent_lines(&game.enemy_view()) {
        println!("{}", line);
    }
    println!("\nYour fleet");
    for line in own_board_lines(game.player_board()) {
        println!("{}", line);
    }
}

/// Play a [`LocalGame`] on stdin/stdout until someone wins or the player
/// types `q`. Returns `true` when the human won.
pub fn run_local<I: BufRead, R: Rng + ?Sized>(
    input: &mut I,
    game: &mut LocalGame,
    rng: &mut R,
) -> anyhow::Result<bool> {
    loop {
        if let Some(winner) = game.winner() {
            print_local(game);
            let won = winner == HUMAN;
            println!("{}", if won { "You won!" } else { "You lost!" });
            return Ok(won);
        }
        print_local(game);
        let line = read_prompt(input, "Target `row col` (q to quit) > ")?;
        if line.eq_ignore_ascii_case("q") {
            println!("You forfeited.");
            return Ok(false);
        }
        let Some(coord) = parse_coordinate(&line) else {
            println!("Could not read '{}'; enter a row and a column, e.g. 3 7", line);
            continue;
        };
        let outcome = game.player_attack(coord)?;
        println!("You fired at {}: {}", coord, outcome);
        if outcome.is_rejection() || outcome == AttackOutcome::GameWon {
            continue;
        }
        let (at, reply) = game.ai_turn(rng)?;
        println!("Computer fired at {}: {}", at, reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Difficulty;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn placement_lines() {
        assert_eq!(
            parse_placement("3 4 v"),
            Ok((Coord::new(2, 3), Orientation::Vertical))
        );
        assert_eq!(
            parse_placement("(1 1) H"),
            Ok((Coord::new(0, 0), Orientation::Horizontal))
        );
        assert_eq!(
            parse_placement("10 10"),
            Ok((Coord::new(9, 9), Orientation::Horizontal))
        );
        assert!(parse_placement("0 4 v").is_err());
        assert!(parse_placement("north").is_err());
    }

    #[test]
    fn arrow_keys_map_to_inputs() {
        assert_eq!(key_from_code(KeyCode::Left), Some(KeyInput::Left));
        assert_eq!(key_from_code(KeyCode::Char('q')), Some(KeyInput::Quit));
        assert_eq!(key_from_code(KeyCode::Char('x')), None);
    }

    #[test]
    fn invalid_placements_are_asked_again() {
        let mut rng = SmallRng::seed_from_u64(4);
        // Carrier twice on the same row: the second is refused, then random.
        let script = "1 1 h\n1 1 h\nbogus\n\n\n\n\n";
        let board = prompt_placement(&mut script.as_bytes(), &mut rng).unwrap();
        assert!(board.fleet_complete());
        assert_eq!(board.ships()[0].origin(), (0, 0));
    }

    #[test]
    fn local_game_reprompts_on_garbage_and_quits() {
        let mut rng = SmallRng::seed_from_u64(8);
        let player = Board::random(&mut rng).unwrap();
        let mut game = LocalGame::with_random_enemy(&mut rng, player, Difficulty::Easy).unwrap();
        let script = "what\n1 1\n1 1\nq\n";
        let won = run_local(&mut script.as_bytes(), &mut game, &mut rng).unwrap();
        assert!(!won);
        assert_eq!(game.turns(), 2);
    }
}
