use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use voice_kiosk::catalog::Catalog;
use voice_kiosk::config::file::config_file_path;
use voice_kiosk::flow::{NavigationEvent, Snapshot};
use voice_kiosk::order::OrderId;
use voice_kiosk::payment::SimulatedPayment;
use voice_kiosk::resolver::{Candidate, resolve};
use voice_kiosk::speech::{ConsoleInput, ConsoleSpeech, NoSpeech, SpeechIo};
use voice_kiosk::{Config, DialogController, Kiosk, KioskHandle, Step, UiEvent};

/// Kiosk - Voice-guided drink ordering kiosk
#[derive(Parser)]
#[command(name = "kiosk", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to ~/.config/voice-kiosk/config.toml)
    #[arg(long, env = "KIOSK_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog JSON file (defaults to the built-in menu)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Disable voice features (tap-only kiosk)
    #[arg(long)]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the interactive console kiosk (default)
    Run,
    /// Print the catalog and its spoken vocabulary
    Menu,
    /// Resolve an utterance against a candidate set
    Resolve {
        /// What the customer said
        text: String,
        /// Match against this item's option group instead of items
        #[arg(long, requires = "group")]
        item: Option<String>,
        /// Option group key (with --item)
        #[arg(long, requires = "item")]
        group: Option<String>,
        /// Match against payment methods
        #[arg(long, conflicts_with_all = ["item", "group"])]
        payment: bool,
    },
    /// Print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,voice_kiosk=info",
        1 => "info,voice_kiosk=debug",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so the console kiosk owns stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref(), cli.disable_voice)?;
    if let Some(catalog) = cli.catalog {
        config.catalog_path = Some(catalog);
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_kiosk(config).await,
        Command::Menu => cmd_menu(&config.load_catalog()?),
        Command::Resolve {
            text,
            item,
            group,
            payment,
        } => cmd_resolve(
            &config.load_catalog()?,
            &text,
            item.as_deref().zip(group.as_deref()),
            payment,
        ),
        Command::CheckConfig => cmd_check_config(&config),
    }
}

async fn run_kiosk(config: Config) -> anyhow::Result<()> {
    let catalog = Arc::new(config.load_catalog()?);

    let (speech, heard): (Arc<dyn SpeechIo>, Option<ConsoleInput>) =
        if config.voice.enabled {
            let (speech, heard) =
                ConsoleSpeech::new(config.voice.recognition_timeout, config.voice.rate);
            (Arc::new(speech), Some(heard))
        } else {
            (Arc::new(NoSpeech), None)
        };
    let payment = Arc::new(SimulatedPayment::from(&config.payment));

    let controller = DialogController::new(catalog, speech, payment, &config);
    let (kiosk, mut handle) = Kiosk::new(controller);
    let events = kiosk.subscribe();
    let kiosk_task = tokio::spawn(kiosk.run());
    let printer = tokio::spawn(print_updates(events, handle.clone()));

    print_help(heard.is_some());
    print_screen(&handle.snapshot());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&line, &mut handle, heard.as_ref()).await? {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // The kiosk may already be gone; nothing left to tell it then
    let _ = handle.send(UiEvent::Shutdown).await;
    kiosk_task.await??;
    printer.abort();
    Ok(())
}

/// Act on one console line; returns false to quit
async fn handle_line(
    line: &str,
    handle: &mut KioskHandle,
    heard: Option<&ConsoleInput>,
) -> anyhow::Result<bool> {
    let line = line.trim();
    let (command, rest) = line
        .split_once(' ')
        .map_or((line, ""), |(command, rest)| (command, rest.trim()));

    match (command, rest) {
        ("", _) => {}
        ("quit" | "exit", _) => return Ok(false),
        ("help", _) => print_help(heard.is_some()),
        ("mic", _) => handle.send(UiEvent::MicPressed).await?,
        ("tap", "") => println!("usage: tap <id>"),
        ("tap", id) => handle.send(UiEvent::Tap(id.to_string())).await?,
        ("back", _) => handle.send(UiEvent::Back).await?,
        ("new", _) => handle.send(UiEvent::NewOrder).await?,
        ("status", _) => println!("{}", serde_json::to_string_pretty(&handle.snapshot())?),
        _ => {
            let Some(heard) = heard else {
                println!("voice is disabled; use `tap <id>`");
                return Ok(true);
            };
            if !handle.is_listening() {
                handle.send(UiEvent::MicPressed).await?;
                handle.wait_listening(true).await?;
            }
            heard.say(line).await?;
        }
    }
    Ok(true)
}

async fn print_updates(mut events: broadcast::Receiver<NavigationEvent>, mut screen: KioskHandle) {
    let mut shown = screen.snapshot().step_id;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(NavigationEvent::PaymentFailed { reason }) => println!("! payment failed: {reason}"),
                Ok(NavigationEvent::SessionAborted { reason }) => println!("! order aborted: {reason}"),
                Ok(NavigationEvent::GoTo { .. }) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            snapshot = screen.changed() => match snapshot {
                Ok(snapshot) if snapshot.step_id != shown => {
                    shown = snapshot.step_id;
                    print_screen(&snapshot);
                }
                Ok(_) => {}
                Err(_) => break,
            },
        }
    }
}

fn print_help(voice: bool) {
    println!("commands: tap <id> | back | new | status | help | quit");
    if voice {
        println!("          mic (toggle listening); any other line is spoken to the kiosk");
    }
}

fn print_screen(snapshot: &Snapshot) {
    println!();
    println!("── {} ──", snapshot.step);

    if let (Step::Done, Some(order)) = (snapshot.step, &snapshot.order) {
        println!("  receipt {}", order.order_id.as_ref().map_or("-", OrderId::as_str));
        if let Some(at) = order.completed_at {
            let local = at.with_timezone(&chrono::Local);
            println!("  주문 시간: {}", local.format("%Y-%m-%d %H:%M:%S"));
        }
        println!("  {} {}원", order.item_name, order.price);
        for option in &order.options {
            println!("    {}: {}", option.label, option.alias);
        }
        if let Some(payment) = &order.payment {
            println!("  결제: {}", payment.name);
        }
        println!("  합계: {}원", order.total);
        return;
    }

    if let Some(order) = &snapshot.order {
        let chosen: Vec<_> = order.options.iter().map(|o| o.alias.as_str()).collect();
        println!("  {} {}", order.item_name, chosen.join(" / "));
    }
    for candidate in &snapshot.candidates {
        println!("  [{}] {}", candidate.id, candidate.alias);
    }
}

#[allow(clippy::unnecessary_wraps)]
fn cmd_menu(catalog: &Catalog) -> anyhow::Result<()> {
    for category in catalog.categories() {
        println!("{} ({})", category.name, category.id);
        for item in &category.items {
            println!("  {} [{}] {}원", item.name, item.id, item.price);
            for group in &item.option_groups {
                let aliases: Vec<_> = group.values.iter().map(|v| v.alias.as_str()).collect();
                println!("    {} [{}]: {}", group.label, group.key, aliases.join(", "));
            }
        }
    }
    let methods: Vec<_> = catalog
        .payment_methods()
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    println!("결제 ({})", methods.join(", "));
    Ok(())
}

fn cmd_resolve(
    catalog: &Catalog,
    text: &str,
    group: Option<(&str, &str)>,
    payment: bool,
) -> anyhow::Result<()> {
    let candidates: Vec<Candidate> = match group {
        Some((item_id, key)) => catalog
            .item(item_id)
            .ok_or_else(|| anyhow::anyhow!("unknown item: {item_id}"))?
            .group(key)
            .ok_or_else(|| anyhow::anyhow!("{item_id} has no option group {key}"))?
            .candidates(),
        None if payment => catalog.payment_candidates(),
        None => catalog.item_candidates(),
    };

    match resolve(text, &candidates) {
        Some(candidate) => println!("{} ({})", candidate.id, candidate.alias),
        None => println!("no match among {} candidates", candidates.len()),
    }
    Ok(())
}

#[allow(clippy::unnecessary_wraps)]
fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    match config_file_path() {
        Some(path) => println!("config file: {}", path.display()),
        None => println!("config file: (no home directory)"),
    }
    println!("{config:#?}");
    Ok(())
}
