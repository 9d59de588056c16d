//! Vocab Duel peer
//!
//! - `vocab-duel host` - create a session and wait for a guest
//! - `vocab-duel join <url>` - join a hosted session
//! - `vocab-duel demo` - two in-process peers play a scripted game

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vocab_duel::{
    VERSION, BOARD_SIZE, short_hex,
    game::state::{GameState, Phase, Seat, AVATARS},
    network::{
        channel_pair, spawn_peer, PeerCommand, PeerConfig, PeerHandle, SessionController,
        SessionUpdate, UpdateOrigin, WsLink,
    },
};

#[derive(Parser)]
#[command(name = "vocab-duel")]
#[command(about = "Two-player word game over a direct peer link", version)]
struct Cli {
    /// Turn clock period in milliseconds
    #[arg(long, global = true)]
    tick_ms: Option<u64>,

    /// Target score for a new session
    #[arg(long, global = true)]
    target: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a session
    Host {
        /// Listen address
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Join a hosted session
    Join {
        /// Host URL, e.g. ws://127.0.0.1:9001
        url: String,
    },

    /// Run two local peers through a scripted game
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let cli = Cli::parse();
    let mut config = PeerConfig::from_env();
    if let Some(ms) = cli.tick_ms.filter(|ms| *ms > 0) {
        config.tick_interval = std::time::Duration::from_millis(ms);
    }
    if let Some(target) = cli.target {
        config.default_target_score = target;
    }

    info!("Vocab Duel v{}", VERSION);

    match cli.command {
        Commands::Host { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            host(config).await
        }
        Commands::Join { url } => join(&url, config).await,
        Commands::Demo => demo(config).await,
    }
}

// =============================================================================
// INTERACTIVE PEERS
// =============================================================================

async fn host(config: PeerConfig) -> Result<()> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (link, addr) = WsLink::host(config.bind_addr, events_tx)
        .await
        .context("failed to start hosting")?;
    println!("Share this address with Player 2: ws://{}", addr);

    let session = SessionController::with_state(link, Seat::Host, config.initial_state());
    let peer = spawn_peer(session, events_rx, &config);
    play(peer, Seat::Host).await
}

async fn join(url: &str, config: PeerConfig) -> Result<()> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let link = WsLink::join(url, events_tx)
        .await
        .with_context(|| format!("failed to connect to {}", url))?;

    let session = SessionController::new(link, Seat::Guest);
    let peer = spawn_peer(session, events_rx, &config);
    play(peer, Seat::Guest).await
}

/// Read commands from stdin and render every change until `quit`.
async fn play(peer: PeerHandle, seat: Seat) -> Result<()> {
    let render = tokio::spawn(render_updates(peer.subscribe(), seat));
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        if line == "help" {
            print_help();
            continue;
        }
        match parse_command(line) {
            Ok(command) => peer.send(command).await?,
            Err(e) => println!("{}", e),
        }
    }

    render.abort();
    let state = peer.shutdown().await?;
    info!("Final digest {}", short_hex(&state.digest()?));
    Ok(())
}

fn parse_command(line: &str) -> Result<PeerCommand> {
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let cell = |args: &[&str]| -> Result<(u8, u8)> {
        match args {
            [row, col, ..] => Ok((row.parse()?, col.parse()?)),
            _ => bail!("expected: <row> <col>"),
        }
    };

    let command = match word {
        "name" => PeerCommand::SetPlayerName(rest.to_string()),
        "avatar" => match args.first() {
            Some(avatar) => PeerCommand::SetPlayerAvatar(avatar.to_string()),
            None => bail!("avatars: {}", AVATARS.join(" ")),
        },
        "target" => PeerCommand::SetTargetScore(rest.parse().context("expected a number")?),
        "start" => PeerCommand::StartGame,
        "select" => {
            let (row, col) = cell(&args)?;
            PeerCommand::SelectCell { row, col }
        }
        "place" => {
            let (row, col) = cell(&args)?;
            let letter = args.get(2).map(|s| s.to_string()).unwrap_or_default();
            PeerCommand::PlaceLetter { row, col, letter }
        }
        "claim" => PeerCommand::ClaimWord,
        "end" => PeerCommand::EndTurn,
        "reset" => PeerCommand::ResetSelection,
        "chat" => PeerCommand::SendChat(rest.to_string()),
        "restart" => PeerCommand::RestartLobby,
        other => bail!("unknown command {:?} (try `help`)", other),
    };
    Ok(command)
}

fn print_help() {
    println!("commands: name <text> | avatar <symbol> | target <n> | start");
    println!("          select <row> <col> | place <row> <col> <letter> | claim | end | reset");
    println!("          chat <text> | restart | help | quit");
}

async fn render_updates(mut updates: broadcast::Receiver<SessionUpdate>, seat: Seat) {
    loop {
        match updates.recv().await {
            Ok(update) if update.origin == UpdateOrigin::Timer => {
                if update.state.time_left % 10 == 0 {
                    println!("⏱  {}s left", update.state.time_left);
                }
            }
            Ok(update) => println!("{}", render(&update, seat)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Renderer skipped {} updates", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn render(update: &SessionUpdate, seat: Seat) -> String {
    let state = &update.state;
    let mut out = String::new();
    out.push_str(&format!("\n[{}] {:?}", update.status.label(), state.phase));

    for (i, player) in state.players.iter().enumerate() {
        let marker = if state.phase == Phase::Playing && state.current_player.index() == i {
            "▶"
        } else {
            " "
        };
        let me = if seat.index() == i { " (you)" } else { "" };
        out.push_str(&format!(
            "\n{} {}{}: {} pts, missed {}",
            marker,
            player.display_tag(),
            me,
            player.score,
            player.missed_turns
        ));
    }

    if !state.phase.is_pregame() {
        out.push_str(&format!(
            "\n{:?} | {}s | word: {}\n   ",
            state.turn_phase, state.time_left, state.current_word
        ));
        for col in 0..BOARD_SIZE {
            out.push_str(&format!("{} ", col));
        }
        for (r, row) in state.board.rows().enumerate() {
            out.push_str(&format!("\n{:>2} ", r));
            for cell in row {
                out.push(cell.unwrap_or('.'));
                out.push(' ');
            }
        }
    }

    if let Some(last) = state.messages.last() {
        out.push_str(&format!("\n> {}", last.text));
    }
    out
}

// =============================================================================
// DEMO
// =============================================================================

/// Apply a command and wait until this peer has processed it.
async fn step(peer: &PeerHandle, command: PeerCommand) -> Result<GameState> {
    peer.send(command).await?;
    Ok(peer.snapshot().await?)
}

async fn demo(config: PeerConfig) -> Result<()> {
    info!("=== Starting Demo Game ===");

    let ((host_link, host_rx), (guest_link, guest_rx)) = channel_pair();
    let mut initial = config.initial_state();
    initial.target_score = 10;

    let host = spawn_peer(
        SessionController::with_state(host_link.clone(), Seat::Host, initial),
        host_rx,
        &config,
    );
    let guest = spawn_peer(SessionController::new(guest_link, Seat::Guest), guest_rx, &config);

    host_link.open();
    host.snapshot().await?;
    guest.snapshot().await?;

    step(&host, PeerCommand::SetPlayerName("Ana".into())).await?;
    guest.snapshot().await?;
    step(&guest, PeerCommand::SetPlayerName("Bo".into())).await?;
    step(&guest, PeerCommand::SetPlayerAvatar("🐉".into())).await?;
    host.snapshot().await?;
    step(&host, PeerCommand::StartGame).await?;

    let script: Vec<(&PeerHandle, Vec<PeerCommand>)> = vec![
        (&host, vec![
            PeerCommand::PlaceLetter { row: 0, col: 0, letter: "c".into() },
            PeerCommand::EndTurn,
        ]),
        (&guest, vec![
            PeerCommand::PlaceLetter { row: 0, col: 1, letter: "a".into() },
            PeerCommand::SelectCell { row: 0, col: 0 },
            PeerCommand::SelectCell { row: 0, col: 1 },
            PeerCommand::ClaimWord,
        ]),
        (&host, vec![
            PeerCommand::PlaceLetter { row: 0, col: 2, letter: "t".into() },
            PeerCommand::SelectCell { row: 0, col: 0 },
            PeerCommand::SelectCell { row: 0, col: 1 },
            PeerCommand::SelectCell { row: 0, col: 2 },
            PeerCommand::ClaimWord,
        ]),
        (&guest, vec![
            PeerCommand::PlaceLetter { row: 0, col: 3, letter: "s".into() },
            PeerCommand::SelectCell { row: 0, col: 0 },
            PeerCommand::SelectCell { row: 0, col: 1 },
            PeerCommand::SelectCell { row: 0, col: 2 },
            PeerCommand::SelectCell { row: 0, col: 3 },
            PeerCommand::ClaimWord,
        ]),
    ];

    for (peer, commands) in script {
        let other = if std::ptr::eq(peer, &host) { &guest } else { &host };
        for command in commands {
            step(peer, command).await?;
        }
        let state = other.snapshot().await?;
        if let Some(last) = state.messages.last() {
            info!("{}", last.text);
        }
    }

    let host_state = host.shutdown().await?;
    let guest_state = guest.shutdown().await?;

    info!("=== Game Results ===");
    for player in &host_state.players {
        info!("{}: {} pts", player.display_tag(), player.score);
    }

    let host_hash = host_state.digest()?;
    let guest_hash = guest_state.digest()?;
    info!("Host State Digest:  {}", hex::encode(host_hash));
    info!("Guest State Digest: {}", hex::encode(guest_hash));

    if host_hash == guest_hash {
        info!("CONVERGENCE VERIFIED: Digests match!");
    } else {
        warn!("DIVERGENCE: Digests differ!");
    }
    Ok(())
}
