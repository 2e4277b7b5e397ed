/// Blindtest - blind listening test for sample rate and bit depth
use anyhow::Context;
use blindtest_audio::SymphoniaDecoder;
use blindtest_audio_desktop::CpalDevice;
use blindtest_cli::{
    console::HELP, controller::format_ms, parse_command, CliConfig, Controller, Flow,
};
use blindtest_core::{AudioDecoder, QualityFactor, TestType};
use blindtest_session::{PlaybackEngine, ResultLog, TestSession};
use clap::{Parser, Subcommand};
use crossbeam_channel::{select, tick, unbounded, Receiver};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "blindtest")]
#[command(about = "Blind listening test: can you hear the higher sample rate or bit depth?", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show stream details and the tests each file supports
    Probe {
        /// Audio files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Run one blind trial on a file
    Run {
        /// Audio file to test
        file: PathBuf,
        /// Test type: rate or depth
        #[arg(short, long)]
        test: TestType,
        /// HQ factor (Hz or bits); defaults from configuration
        #[arg(long)]
        hq: Option<u32>,
        /// LQ factor (Hz or bits); defaults from configuration
        #[arg(long)]
        lq: Option<u32>,
        /// Seed for the slot assignment
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List recorded answers
    Results {
        /// Result log path; defaults from configuration
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blindtest_cli=info,blindtest_session=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let config = CliConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Probe { files } => probe(&files),
        Commands::Run {
            file,
            test,
            hq,
            lq,
            seed,
        } => run(&config, &file, test, hq, lq, seed.or(config.session.seed)),
        Commands::Results { path } => {
            results(path.as_deref().unwrap_or(&config.results.log_path))
        }
    }
}

fn probe(files: &[PathBuf]) -> anyhow::Result<()> {
    let decoder = SymphoniaDecoder::new();

    for file in files {
        match decoder.probe(file) {
            Ok(info) => {
                let mut tests = Vec::new();
                if info.supports_rate_test() {
                    tests.push(TestType::SamplingRate.name());
                }
                if info.supports_depth_test() {
                    tests.push(TestType::BitDepth.name());
                }
                println!(
                    "{}: {} Hz, {} bit, {} ch; tests: {}",
                    file.display(),
                    info.sample_rate_hz,
                    info.bit_depth,
                    info.channel_count,
                    if tests.is_empty() {
                        "none".to_string()
                    } else {
                        tests.join(", ")
                    }
                );
            }
            Err(e) => println!("{}: {}", file.display(), e),
        }
    }

    Ok(())
}

fn run(
    config: &CliConfig,
    file: &Path,
    test_type: TestType,
    hq: Option<u32>,
    lq: Option<u32>,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let decoder = Box::new(SymphoniaDecoder::new());
    let mut session = match seed {
        Some(seed) => TestSession::with_seed(decoder, seed),
        None => TestSession::new(decoder),
    };

    session
        .open(file)
        .with_context(|| format!("cannot open {}", file.display()))?;
    let info = session
        .info()
        .context("session has no stream info after open")?;

    let (default_hq, default_lq) = config.test.factors(test_type, &info);
    let hq = hq.map_or(default_hq, QualityFactor);
    let lq = lq.map_or(default_lq, QualityFactor);
    session.configure(test_type, hq, lq)?;

    println!(
        "{} test: {} {unit} vs {} {unit}. Decoding...",
        test_type,
        hq,
        lq,
        unit = test_type.unit()
    );
    session.materialize()?;
    let duration = session.original().map_or(0, |b| b.duration_ms());
    println!(
        "Ready ({}). Which slot sounds better?",
        format_ms(u32::try_from(duration).unwrap_or(u32::MAX))
    );
    println!("{}", HELP);

    let engine = PlaybackEngine::with_buffer_ms(
        Box::new(CpalDevice::new()),
        config.playback.buffer_ms,
    );
    let mut controller = Controller::new(session, engine, config.results.log_path.clone());

    let lines = spawn_stdin_reader();
    let ticker = tick(Duration::from_secs(1));
    let mut stdout = io::stdout();

    loop {
        select! {
            recv(lines) -> line => {
                let Ok(line) = line else {
                    // stdin closed
                    break;
                };
                match parse_command(&line) {
                    Ok(command) => {
                        if controller.handle(command, &mut stdout)? == Flow::Finished {
                            break;
                        }
                    }
                    Err(e) => writeln!(stdout, "{}", e)?,
                }
            }
            recv(ticker) -> _ => {
                controller.tick(&mut stdout)?;
                controller.reap_finished(&mut stdout)?;
            }
        }
        stdout.flush()?;
    }

    Ok(())
}

/// Forward stdin lines to a channel so the prompt can wait alongside the ticker
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn results(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        println!("No results yet ({})", path.display());
        return Ok(());
    }

    let log = ResultLog::load(path).with_context(|| format!("cannot read {}", path.display()))?;

    println!(
        "{:<4} {:<32} {:<14} {:>8} {:>8} {:>6} {:>6} {:<5} Memo",
        "#", "File", "Test", "HQ", "LQ", "Better", "Chosen", "Result"
    );
    for (i, record) in log.iter().enumerate() {
        println!(
            "{:<4} {:<32} {:<14} {:>8} {:>8} {:>6} {:>6} {:<5} {}",
            i + 1,
            record.filename,
            record.test_type.name(),
            record.hq_factor,
            record.lq_factor,
            record.better_slot,
            record.chosen_slot,
            record.outcome(),
            record.memo
        );
    }
    println!("{} of {} correct", log.passes(), log.len());

    Ok(())
}
