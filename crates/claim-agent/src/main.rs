//! Writes the accident report of a claim case from the terminal.
//!
//! ```text
//! OPENAI_API_KEY=... claim-agent Write the report of case 00012025
//! ```

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::process::ExitCode;
use std::time::Duration;

use claim_agent::SessionBuilder;
use claim_agent::core::{ClaimConfigBuilder, TranscriptSource};
use claim_agent_openai::{OpenAIConfigBuilder, OpenAIProvider};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

enum SessionEvent {
    Delta(String),
    Transcript(String, TranscriptSource),
}

const BAR_CHAR: &str = "▎";
const DEFAULT_INSTRUCTION: &str =
    "Write the claim report of the next case in the inbox.";
const TOOL_PREVIEW_CHARS: usize = 96;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return ExitCode::from(2);
    };
    let mut openai_config = OpenAIConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        openai_config = openai_config.with_base_url(base_url);
    }
    if let Ok(model) = env::var("OPENAI_MODEL") {
        openai_config = openai_config.with_model(model);
    }
    let provider = OpenAIProvider::new(openai_config.build());

    let root = env::var("CLAIM_AGENT_ROOT").unwrap_or_else(|_| ".".to_owned());
    let config = ClaimConfigBuilder::with_root(root).build();

    let instruction = env::args().skip(1).collect::<Vec<_>>().join(" ");
    let instruction = if instruction.trim().is_empty() {
        DEFAULT_INSTRUCTION.to_owned()
    } else {
        instruction
    };

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut session = SessionBuilder::with_openai(provider)
        .with_config(config)
        .on_message_delta({
            let event_tx = event_tx.clone();
            move |delta| {
                event_tx.send(SessionEvent::Delta(delta.to_owned())).ok();
            }
        })
        .on_transcript(move |transcript, source| {
            event_tx
                .send(SessionEvent::Transcript(transcript.to_owned(), source))
                .ok();
        })
        .build();
    let cancel_handle = session.cancel_handle();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let mut progress_bar: Option<ProgressBar> = None;
    let mut streaming = false;

    let run = session.send_message(&instruction);
    tokio::pin!(run);

    let result = loop {
        select! {
            result = &mut run => break result,
            Some(event) = event_rx.recv() => {
                // Finish the progress bar before printing anything else.
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                streaming = print_event(event, streaming);
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, cancelling the session");
                cancel_handle.cancel();
            }
            _ = sleep(Duration::from_millis(100)) => {
                if !streaming {
                    progress_bar
                        .get_or_insert_with(|| {
                            let progress_bar = ProgressBar::new_spinner();
                            progress_bar.set_style(progress_style.clone());
                            progress_bar.set_message("🤔 Working on the claim...");
                            progress_bar
                        })
                        .inc(1);
                }
            }
        }
    };

    if let Some(progress_bar) = progress_bar.take() {
        progress_bar.finish_and_clear();
    }
    while let Ok(event) = event_rx.try_recv() {
        streaming = print_event(event, streaming);
    }
    if streaming {
        println!();
    }

    match result {
        Ok(answer) => {
            println!(
                "{}{}",
                BAR_CHAR.bright_green(),
                format!("Done in {} turns", answer.turns).bright_white()
            );
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!(
                "{}{}",
                BAR_CHAR.bright_red(),
                failure.to_string().bright_red().bold()
            );
            ExitCode::FAILURE
        }
    }
}

/// Prints an event and returns whether assistant text is still streaming.
fn print_event(event: SessionEvent, streaming: bool) -> bool {
    match event {
        SessionEvent::Delta(delta) => {
            if !streaming {
                print!("{}🤖 ", BAR_CHAR.bright_cyan());
            }
            print!("{}", delta.bright_white());
            std::io::stdout().flush().ok();
            true
        }
        SessionEvent::Transcript(_, TranscriptSource::Assistant) => {
            if streaming {
                println!();
            }
            false
        }
        SessionEvent::Transcript(transcript, TranscriptSource::Tool) => {
            let preview = transcript
                .chars()
                .take(TOOL_PREVIEW_CHARS)
                .collect::<String>();
            let ellipsis = if transcript.chars().count() > TOOL_PREVIEW_CHARS {
                "…"
            } else {
                ""
            };
            println!(
                "{}🔧 {}{}",
                BAR_CHAR.bright_yellow(),
                preview.dimmed(),
                ellipsis.dimmed()
            );
            streaming
        }
        SessionEvent::Transcript(_, _) => streaming,
    }
}
