//! Pagefeed CLI — drives the loader against the fixture backend.
//!
//! Usage:
//!   pagefeed run [--subject NAME] [--category KIND] [--delay-ms N]
//!   pagefeed switch [--delay-ms N]
//!   pagefeed pages

use clap::{Parser, Subcommand};
use pagefeed::{FixtureSource, LoadPhase, Loader, Query};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "pagefeed",
    version,
    about = "Cancellation-safe incremental loading engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a dataset page by page, retrying failures, until exhausted
    Run {
        /// Whose data to browse
        #[arg(long, default_value = "bill")]
        subject: String,
        /// Which kind of data ("error" exercises the failure injector)
        #[arg(long, default_value = "browser")]
        category: String,
        /// Artificial backend delay in milliseconds
        #[arg(long, default_value_t = 300)]
        delay_ms: u64,
        /// Give up after this many retries of a failed page
        #[arg(long, default_value_t = 5)]
        max_retries: u32,
    },
    /// Switch identity while the first fetch is in flight, showing that
    /// the superseded result is discarded
    Switch {
        /// Artificial backend delay in milliseconds
        #[arg(long, default_value_t = 300)]
        delay_ms: u64,
    },
    /// Dump the fixture dataset as JSON
    Pages,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run {
            subject,
            category,
            delay_ms,
            max_retries,
        } => cmd_run(&subject, &category, delay_ms, max_retries).await,
        Commands::Switch { delay_ms } => cmd_switch(delay_ms).await,
        Commands::Pages => cmd_pages(),
    };
    std::process::exit(code);
}

async fn cmd_run(subject: &str, category: &str, delay_ms: u64, max_retries: u32) -> i32 {
    let source = Arc::new(FixtureSource::new(Duration::from_millis(delay_ms)));
    let loader = Loader::spawn(source);
    let mut states = loader.subscribe();

    if let Err(e) = loader.observe(Query::new(subject, category)).await {
        eprintln!("Error: {}", e);
        return 1;
    }

    let mut retries = 0;
    loop {
        if states.changed().await.is_err() {
            eprintln!("Error: loader stopped unexpectedly");
            return 1;
        }
        let state = states.borrow_and_update().clone();
        match serde_json::to_string(&state) {
            Ok(line) => println!("{}", line),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }

        let result = match state.phase {
            LoadPhase::Ready if state.can_request_more() => loader.request_more().await,
            LoadPhase::Ready => break,
            LoadPhase::InitialError | LoadPhase::UpdateError => {
                retries += 1;
                if retries > max_retries {
                    eprintln!("Error: giving up after {} retries", max_retries);
                    return 1;
                }
                loader.retry().await
            }
            LoadPhase::InitialLoading | LoadPhase::LoadingMore => continue,
        };
        if let Err(e) = result {
            eprintln!("Error: {}", e);
            return 1;
        }
    }

    loader.detach().await;
    0
}

async fn cmd_switch(delay_ms: u64) -> i32 {
    let source = Arc::new(FixtureSource::new(Duration::from_millis(delay_ms)));
    let loader = Loader::spawn(source);

    // The first identity's fetch is still in flight when the second one
    // arrives; its late reply is discarded, not applied.
    let script = [Query::new("bill", "browser"), Query::new("susan", "voice")];
    for identity in script {
        if let Err(e) = loader.observe(identity).await {
            eprintln!("Error: {}", e);
            return 1;
        }
    }

    let state = match loader.wait_for(|s| s.phase == LoadPhase::Ready).await {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match serde_json::to_string(&state) {
        Ok(line) => println!("{}", line),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    }

    loader.detach().await;
    0
}

fn cmd_pages() -> i32 {
    let source = FixtureSource::new(Duration::ZERO);
    match serde_json::to_string_pretty(&source.pages()) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}
