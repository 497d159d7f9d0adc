//! # Plateful Taps
//!
//! A standalone CLI that replays like/save/follow tap patterns through the
//! Plateful SDK against an in-memory backend, printing what the screen shows,
//! what goes over the wire, and what the server confirms.
//!
//! ## Timeline of a tap
//!
//! ```text
//! tap ─▶ optimistic (UI flips now) ─▶ 300ms quiet ─▶ POST {desired_state} ─▶ confirmed
//!  └── another tap inside the window restarts the quiet period
//! ```

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::*;
use parking_lot::Mutex;
use plateful_sdk::prelude::*;
use plateful_sdk::{ClientConfigBuilder, EntityEvent, WireCall};
use tracing_subscriber::EnvFilter;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "plateful-taps")]
#[command(about = "Replay optimistic toggle scenarios (Plateful SDK)")]
#[command(version)]
struct Cli {
    /// Debounce window in milliseconds
    #[arg(long, default_value_t = 300)]
    debounce: u64,

    /// Simulated server latency in milliseconds
    #[arg(long, default_value_t = 150)]
    latency: u64,

    /// Attempts per sync while the server disagrees
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Print SDK logs (respects RUST_LOG)
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Triple-tap a like: three optimistic flips, one request
    Demo,
    /// Follow then immediately unfollow before the debounce fires
    Flipflop,
    /// Another client keeps overwriting the like; watch the re-sends
    Contention,
    /// Server unreachable: error reported, heart stays as tapped
    Offline,
    /// Interactive REPL for manual experimentation
    Interactive,
}

// ─── Screen: what a card shows for one toggle ──────────────────────────────

/// One on-screen toggle, updated only through the SDK callbacks.
#[derive(Clone)]
struct Card {
    label: String,
    shown: Arc<Mutex<ToggleSnapshot>>,
}

impl Card {
    fn new(label: &str, state: bool, count: u64) -> Self {
        Self {
            label: label.to_string(),
            shown: Arc::new(Mutex::new(ToggleSnapshot::new(state, count))),
        }
    }

    fn state(&self) -> bool {
        self.shown.lock().state
    }

    fn hooks(&self) -> ToggleCallbacks {
        let (optimistic, confirmed, failed) = (self.clone(), self.clone(), self.clone());
        ToggleCallbacks::new()
            .on_optimistic(move |state| {
                optimistic.shown.lock().apply_optimistic(state);
                event("optimistic", &optimistic, Color::BrightYellow);
            })
            .on_confirmed(move |state, count| {
                confirmed.shown.lock().apply_confirmed(state, count);
                event("confirmed", &confirmed, Color::BrightGreen);
            })
            .on_error(move |error| {
                println!(
                    "  {} {:<10} {} {}",
                    "✗".bright_red(),
                    "error".bright_red(),
                    failed.label.bright_magenta(),
                    error.to_string().red()
                );
                show_card(&failed);
            })
    }
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn event(kind: &str, card: &Card, color: Color) {
    let shown = *card.shown.lock();
    println!(
        "  {} {:<10} {} → {} ({})",
        "◆".color(color),
        kind.color(color),
        card.label.bright_magenta(),
        on_off(shown.state),
        shown.count
    );
}

fn on_off(state: bool) -> ColoredString {
    if state {
        "on".bright_green().bold()
    } else {
        "off".dimmed()
    }
}

fn show_card(card: &Card) {
    let shown = *card.shown.lock();
    let border = "─".repeat(44);
    println!("  ┌{}┐", border);
    let line = format!("{:<20} {:>5}  count {:>6}", card.label, if shown.state { "on" } else { "off" }, shown.count);
    println!("  │ {:<42} │", line);
    println!("  └{}┘", border);
}

fn show_calls(calls: &[WireCall]) {
    if calls.is_empty() {
        println!("  {}", "(no requests sent)".dimmed());
        return;
    }
    let start = calls[0].sent_at;
    for call in calls {
        println!(
            "  {} +{:>5}ms {} {}",
            "POST".bright_cyan(),
            call.sent_at.duration_since(start).as_millis(),
            call.path.bright_white(),
            serde_json::to_string(&call.body).unwrap_or_default().dimmed()
        );
    }
}

fn verdict(ok: bool, good: &str, bad: &str) {
    if ok {
        println!("\n  {} {}", "✓".bright_green().bold(), good.bright_green().bold());
    } else {
        println!("\n  {} {}", "✗".bright_red().bold(), bad.bright_red().bold());
    }
}

async fn pause(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Long enough for a debounce, a request and a few re-sends to finish.
fn quiet_period(cli: &Cli) -> u64 {
    cli.debounce + cli.latency * (u64::from(cli.max_attempts) + 1) + 200
}

fn client(cli: &Cli) -> plateful_sdk::Result<Client<MemoryServer>> {
    let config = ClientConfigBuilder::new()
        .debounce(cli.debounce)
        .max_attempts(cli.max_attempts)
        .build();
    let server = MemoryServer::with_latency(Duration::from_millis(cli.latency));
    Client::new(Arc::new(server), config)
}

// ─── Demo ──────────────────────────────────────────────────────────────────

async fn run_demo(cli: &Cli) -> plateful_sdk::Result<()> {
    header("DEMO: Triple-Tap Like, One Request");

    let client = client(cli)?;
    let visit = VisitId::new();
    client.transport().seed(Feature::Like, visit, false, 41);
    let feed = Card::new("feed card ♥", false, 41);

    // A second surface showing the same visit.
    let mut detail = client.visit_events().subscribe();

    section("Phase 1: Three taps, 100ms apart");
    for _ in 0..3 {
        client.likes().toggle(visit, feed.state(), feed.hooks());
        pause(100).await;
    }

    section("Phase 2: Quiet period, then one request carrying the final state");
    pause(quiet_period(cli)).await;
    let calls = client.transport().calls();
    show_calls(&calls);

    section("Phase 3: Fan-out to the detail screen");
    while let Ok(event) = detail.try_recv() {
        if let EntityEvent::StateChanged { state, count, .. } = event {
            step(&format!("detail screen heart → {} ({})", on_off(state), count));
        }
    }

    show_card(&feed);
    verdict(
        calls.len() == 1 && feed.state(),
        "Three taps coalesced into a single desired_state=true request",
        "Expected exactly one request carrying true",
    );
    Ok(())
}

// ─── Flipflop ──────────────────────────────────────────────────────────────

async fn run_flipflop(cli: &Cli) -> plateful_sdk::Result<()> {
    header("FLIPFLOP: Follow, Unfollow, Before the Debounce Fires");

    let client = client(cli)?;
    let user = UserId::new();
    client.transport().seed(Feature::Follow, user, false, 12);
    let profile = Card::new("profile follow", false, 12);

    section("Phase 1: Follow, then unfollow 50ms later");
    client.follows().toggle(user, profile.state(), profile.hooks());
    pause(50).await;
    client.follows().toggle(user, profile.state(), profile.hooks());

    section("Phase 2: The engine still sends the final intent");
    pause(quiet_period(cli)).await;
    let calls = client.transport().calls();
    show_calls(&calls);
    step("net intent equals the original state, but only the observed value is known");

    verdict(
        calls.len() == 1 && calls[0].body["desired_state"] == serde_json::json!(false),
        "One request carrying desired_state=false",
        "Unexpected requests for a cancelled-out follow",
    );
    Ok(())
}

// ─── Contention ────────────────────────────────────────────────────────────

async fn run_contention(cli: &Cli) -> plateful_sdk::Result<()> {
    header("CONTENTION: Server Disagrees, Same State Is Re-sent");

    let client = client(cli)?;
    let server = client.transport();

    section("Phase 1: Another client overwrites once; one re-send fixes it");
    let visit = VisitId::new();
    server.disagree_next(Feature::Save, visit, 1);
    let card = Card::new("saved ⚑", false, 0);
    client.saves().toggle(visit, card.state(), card.hooks());
    pause(quiet_period(cli)).await;
    show_calls(&server.calls_for(Feature::Save, visit));

    section("Phase 2: The server never agrees; give up after the cap");
    let stubborn = VisitId::new();
    server.disagree_next(Feature::Save, stubborn, u32::MAX);
    let stuck = Card::new("saved ⚑ (stubborn)", false, 0);
    client.saves().toggle(stubborn, stuck.state(), stuck.hooks());
    pause(quiet_period(cli)).await;
    let attempts = server.calls_for(Feature::Save, stubborn);
    show_calls(&attempts);

    verdict(
        attempts.len() == cli.max_attempts as usize,
        "Re-sends stopped at the attempt cap",
        "Re-sends did not respect the attempt cap",
    );
    Ok(())
}

// ─── Offline ───────────────────────────────────────────────────────────────

async fn run_offline(cli: &Cli) -> plateful_sdk::Result<()> {
    header("OFFLINE: Failed Sync Keeps the User's Tap");

    let client = client(cli)?;
    let visit = VisitId::new();
    client.transport().seed(Feature::Like, visit, false, 7);
    client.transport().set_offline(true);
    let card = Card::new("feed card ♥", false, 7);

    section("Phase 1: Tap while the server is unreachable");
    client.likes().toggle(visit, card.state(), card.hooks());
    let before = *card.shown.lock();
    pause(quiet_period(cli)).await;

    section("Phase 2: Back online, the next tap reconciles");
    client.transport().set_offline(false);
    let after_failure = *card.shown.lock();
    client.likes().toggle(visit, card.state(), card.hooks());
    client.likes().toggle(visit, card.state(), card.hooks());
    pause(quiet_period(cli)).await;

    verdict(
        before == after_failure,
        "Heart stayed as tapped through the failure",
        "Optimistic state was rolled back",
    );
    Ok(())
}

// ─── Interactive ───────────────────────────────────────────────────────────

struct Session {
    client: Client<MemoryServer>,
    visits: Vec<(VisitId, Card, Card)>,
    users: Vec<(UserId, Card)>,
}

impl Session {
    fn new(cli: &Cli) -> plateful_sdk::Result<Self> {
        let client = client(cli)?;
        let visits = (1..=3)
            .map(|n| {
                let id = VisitId::new();
                client.transport().seed(Feature::Like, id, false, 10 * n);
                client.transport().seed(Feature::Save, id, false, n);
                (
                    id,
                    Card::new(&format!("visit {} ♥", n), false, 10 * n),
                    Card::new(&format!("visit {} ⚑", n), false, n),
                )
            })
            .collect();
        let users = (1..=2)
            .map(|n| {
                let id = UserId::new();
                client.transport().seed(Feature::Follow, id, false, 100 * n);
                (id, Card::new(&format!("user {} +", n), false, 100 * n))
            })
            .collect();

        Ok(Self {
            client,
            visits,
            users,
        })
    }

    fn tap(&self, feature: Feature, index: usize) -> bool {
        match feature {
            Feature::Follow => match self.users.get(index) {
                Some((id, card)) => {
                    self.client.follows().toggle(*id, card.state(), card.hooks());
                    true
                }
                None => false,
            },
            Feature::Like | Feature::Save => match (self.visits.get(index), self.client.visit_feature(feature)) {
                (Some((id, like, save)), Some(reconciler)) => {
                    let card = if feature == Feature::Like { like } else { save };
                    reconciler.toggle(*id, card.state(), card.hooks());
                    true
                }
                _ => false,
            },
        }
    }

    fn show(&self) {
        for (id, like, save) in &self.visits {
            show_card(like);
            step(&format!("likes phase: {:?}", self.client.likes().phase(id)));
            show_card(save);
            step(&format!("saves phase: {:?}", self.client.saves().phase(id)));
        }
        for (id, card) in &self.users {
            show_card(card);
            step(&format!("follow phase: {:?}", self.client.follows().phase(id)));
        }
    }
}

fn parse_feature(word: &str) -> Option<Feature> {
    match word {
        "like" | "l" => Some(Feature::Like),
        "save" | "s" => Some(Feature::Save),
        "follow" | "f" => Some(Feature::Follow),
        _ => None,
    }
}

async fn read_line() -> Option<String> {
    tokio::task::spawn_blocking(|| {
        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(input),
        }
    })
    .await
    .ok()
    .flatten()
}

async fn run_interactive(cli: &Cli) -> plateful_sdk::Result<()> {
    header("INTERACTIVE: Tap Playground");

    let session = Session::new(cli)?;

    println!("  Commands:");
    println!(
        "    {} <n> [times]        Tap the like on visit n (1-3)",
        "like".bright_cyan()
    );
    println!(
        "    {} <n> [times]        Tap the save on visit n (1-3)",
        "save".bright_cyan()
    );
    println!(
        "    {} <n> [times]      Tap follow on user n (1-2)",
        "follow".bright_cyan()
    );
    println!(
        "    {} [ms]               Let time pass (default: quiet period)",
        "wait".bright_cyan()
    );
    println!(
        "    {} on|off          Take the server down or bring it back",
        "offline".bright_cyan()
    );
    println!(
        "    {} <feature> <n>  Next request for it is overwritten by another client",
        "disagree".bright_cyan()
    );
    println!(
        "    {}                    Show every card and its phase",
        "show".bright_cyan()
    );
    println!(
        "    {}                   Show requests sent so far",
        "calls".bright_cyan()
    );
    println!("    {}                    Exit", "quit".bright_cyan());
    println!();

    loop {
        print!("{}", "plateful> ".bright_cyan().bold());
        let _ = io::stdout().flush();

        let Some(input) = read_line().await else {
            break;
        };
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        if let Some(feature) = parse_feature(parts[0]) {
            let Some(index) = parts.get(1).and_then(|s| s.parse::<usize>().ok()) else {
                println!("  {} Usage: {} <n> [times]", "!".bright_red(), parts[0]);
                continue;
            };
            let times: usize = parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(1);
            for _ in 0..times {
                if !session.tap(feature, index.saturating_sub(1)) {
                    println!("  {} No {} target {}", "!".bright_red(), feature, index);
                    break;
                }
            }
            continue;
        }

        match parts[0] {
            "wait" | "w" => {
                let ms = parts
                    .get(1)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| quiet_period(cli));
                pause(ms).await;
                step(&format!("{}ms passed", ms));
            }

            "offline" => match parts.get(1) {
                Some(&"on") => {
                    session.client.transport().set_offline(true);
                    step("server is offline");
                }
                Some(&"off") => {
                    session.client.transport().set_offline(false);
                    step("server is back");
                }
                _ => println!("  {} Usage: offline on|off", "!".bright_red()),
            },

            "disagree" => {
                let target = parts.get(1).and_then(|w| parse_feature(w));
                let index = parts.get(2).and_then(|s| s.parse::<usize>().ok());
                match (target, index) {
                    (Some(Feature::Follow), Some(n)) => match session.users.get(n.saturating_sub(1)) {
                        Some((id, _)) => {
                            session.client.transport().disagree_next(Feature::Follow, id, 1);
                            step(&format!("next follow request for user {} will be overwritten", n));
                        }
                        None => println!("  {} Unknown user {}", "!".bright_red(), n),
                    },
                    (Some(feature), Some(n)) => match session.visits.get(n.saturating_sub(1)) {
                        Some((id, _, _)) => {
                            session.client.transport().disagree_next(feature, id, 1);
                            step(&format!("next {} request for visit {} will be overwritten", feature, n));
                        }
                        None => println!("  {} Unknown visit {}", "!".bright_red(), n),
                    },
                    _ => println!("  {} Usage: disagree <like|save|follow> <n>", "!".bright_red()),
                }
            }

            "show" | "ls" => session.show(),

            "calls" => show_calls(&session.client.transport().calls()),

            "quit" | "exit" | "q" => {
                let dropped = session.client.shutdown();
                if dropped > 0 {
                    step(&format!("dropped {} pending taps", dropped));
                }
                println!("  {}", "Goodbye!".dimmed());
                break;
            }

            "help" | "h" | "?" => {
                println!("  like <n> [times] | save <n> [times] | follow <n> [times]");
                println!("  wait [ms] | offline on|off | disagree <feature> <n>");
                println!("  show | calls | quit");
            }

            other => {
                println!(
                    "  {} Unknown command '{}': type 'help'",
                    "?".bright_yellow(),
                    other
                );
            }
        }
    }
    Ok(())
}

// ─── Entry point ───────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> plateful_sdk::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Demo => run_demo(&cli).await,
        Commands::Flipflop => run_flipflop(&cli).await,
        Commands::Contention => run_contention(&cli).await,
        Commands::Offline => run_offline(&cli).await,
        Commands::Interactive => run_interactive(&cli).await,
    }
}
