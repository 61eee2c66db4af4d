// Chatstream CLI — terminal front-end for the streaming chat service.
//
// Thin layer over the engine: argument parsing, transcript rendering, and
// the interactive input loop. All streaming/retry/framing logic lives in
// the library.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use log::error;

use chatstream::engine::chat::{ChatClient, ChatSink};
use chatstream::engine::config::ChatConfig;

/// User-facing fallback line when the service is unreachable.
const CONNECT_FALLBACK: &str = "Error: Could not connect to the AI service.";

#[derive(Parser)]
#[command(name = "chatstream", version, about = "Terminal client for an SSE-streaming chat service")]
struct Cli {
    /// Chat service base URL (overrides CHATSTREAM_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a prompt and stream the reply. With no prompt, starts an
    /// interactive session (one turn per input line, Ctrl-D to exit).
    Chat {
        /// Model identifier (overrides CHATSTREAM_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Skip client-side model validation against GET /models
        #[arg(long)]
        no_verify: bool,

        /// Prompt text; joined with spaces when given as multiple words
        prompt: Vec<String>,
    },

    /// List model names available on the service
    Models,

    /// Probe the service health endpoint
    Health,
}

// ── Transcript sink ────────────────────────────────────────────────────────

/// Streams payload text straight to stdout, flushed per payload so the
/// reply renders incrementally.
struct StdoutSink;

#[async_trait]
impl ChatSink for StdoutSink {
    async fn on_payload(&mut self, text: &str) {
        print!("{}", text);
        let _ = io::stdout().flush();
    }
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Chat { model, no_verify, prompt } => {
            run_chat(cli.endpoint, model, no_verify, prompt).await
        }
        Command::Models => run_models(cli.endpoint).await,
        Command::Health => run_health(cli.endpoint).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_client(endpoint: Option<String>, model: Option<String>) -> Result<ChatClient, String> {
    let config = ChatConfig::from_env().with_overrides(endpoint, model);
    config.validate().map_err(|e| e.to_string())?;
    Ok(ChatClient::new(config))
}

// ── Commands ───────────────────────────────────────────────────────────────

async fn run_chat(
    endpoint: Option<String>,
    model: Option<String>,
    no_verify: bool,
    prompt: Vec<String>,
) -> Result<(), String> {
    let client = build_client(endpoint, model)?;
    let model = client.config().model.clone();

    if !no_verify {
        client.ensure_model(&model).await.map_err(|e| e.to_string())?;
    }

    if !prompt.is_empty() {
        let prompt = prompt.join(" ");
        return run_turn(&client, &model, &prompt).await;
    }

    // Interactive session: one turn per input line.
    println!("chatstream — model {} @ {}  (Ctrl-D to exit)", model, client.config().endpoint);
    let stdin = io::stdin();
    loop {
        print!("you> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => return Err(format!("stdin read failed: {}", e)),
        }
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        // In the interactive loop a failed turn is reported in the
        // transcript and the session keeps going.
        if let Err(e) = run_turn(&client, &model, prompt).await {
            error!("[cli] turn failed: {}", e);
        }
    }
    println!();
    Ok(())
}

/// One request/response exchange, rendered transcript-style with a
/// timestamp header.
async fn run_turn(client: &ChatClient, model: &str, prompt: &str) -> Result<(), String> {
    let now = chrono::Local::now();
    println!("[{}]", now.format("%a, %b %-d, %Y, %I:%M:%S %p"));
    print!("assistant> ");
    let _ = io::stdout().flush();

    let mut sink = StdoutSink;
    match client.stream_chat(prompt, model, &mut sink).await {
        Ok(_) => {
            println!();
            Ok(())
        }
        Err(e) => {
            // Distinct failure path: the transcript gets the fallback line,
            // the details go to the log.
            println!("{}", CONNECT_FALLBACK);
            Err(e.to_string())
        }
    }
}

async fn run_models(endpoint: Option<String>) -> Result<(), String> {
    let client = build_client(endpoint, None)?;
    let models = client.list_models().await.map_err(|e| e.to_string())?;
    if models.is_empty() {
        println!("(no models available)");
    }
    for m in models {
        println!("{}", m);
    }
    Ok(())
}

async fn run_health(endpoint: Option<String>) -> Result<(), String> {
    let client = build_client(endpoint, None)?;
    let health = client.health().await.map_err(|e| e.to_string())?;
    println!("status:  {}", health.status.as_deref().unwrap_or("unknown"));
    if let Some(ollama) = &health.ollama {
        println!("ollama:  {}", ollama);
    }
    if let Some(version) = &health.version {
        println!("version: {}", version);
    }
    if let Some(err) = &health.error {
        println!("error:   {}", err);
    }
    Ok(())
}
