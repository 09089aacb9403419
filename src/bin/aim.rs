use anyhow::{Context, Result};
use avaron_aim::api::CompletionClient;
use avaron_aim::config::Config;
use avaron_aim::health::{
    classify, diagnose, follow_up, health_request, parse_health_index, HealthStatus,
};
use avaron_aim::runtime::{drive_turn, TurnOutcome};
use avaron_aim::state::{ChatSession, RequestTicket};
use avaron_aim::tools::{run_code_line, ShellExecutor, SystemShell};
use avaron_aim::transcript::{decode, render_transcript};
use avaron_aim::types::{BlockNode, InlineNode, RenderedTurn, Role};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "aim")]
#[command(version)]
#[command(about = "Transcript rendering and streaming chat for llama-server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a transcript into turns and blocks
    Render {
        /// Transcript file (default: stdin)
        file: Option<PathBuf>,

        /// Print the document tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send messages and stream the replies
    Chat {
        /// Messages to send, one turn each
        #[arg(required = true)]
        messages: Vec<String>,

        /// Resume from and save back to this transcript file
        #[arg(long, value_name = "FILE")]
        transcript: Option<PathBuf>,
    },

    /// Classify a health-check transcript
    Health {
        /// Transcript file (default: stdin)
        file: Option<PathBuf>,

        /// Treat the input as a JSON index of past verdicts
        #[arg(long)]
        index: bool,
    },

    /// Check this host's network health, running the commands the model asks for
    Diagnose {
        /// Stop after this many completions
        #[arg(long, default_value_t = 5)]
        rounds: usize,

        /// Command whose output starts the check
        #[arg(long, value_name = "CMD", default_value = "ip -br addr show")]
        observe: String,

        /// Save the conversation to this transcript file
        #[arg(long, value_name = "FILE")]
        transcript: Option<PathBuf>,
    },

    /// Run an executable code line and print its wrapped output
    Run {
        /// Command line, with or without a leading `$`
        line: String,

        /// Append the output to this transcript file
        #[arg(long, value_name = "FILE")]
        transcript: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render { file, json } => render(file.as_deref(), json),
        Commands::Chat {
            messages,
            transcript,
        } => chat(&messages, transcript.as_deref()).await,
        Commands::Health { file, index } => health(file.as_deref(), index),
        Commands::Diagnose {
            rounds,
            observe,
            transcript,
        } => run_diagnosis(rounds, &observe, transcript.as_deref()).await,
        Commands::Run { line, transcript } => run(&line, transcript.as_deref()),
    }
}

fn render(file: Option<&Path>, json: bool) -> Result<()> {
    let text = read_input(file)?;
    let turns = render_transcript(&text)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&turns)?);
    } else {
        print!("{}", format_turns(&turns));
    }
    Ok(())
}

async fn chat(messages: &[String], transcript: Option<&Path>) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    let client = Arc::new(CompletionClient::new(&config)?);

    let mut session = match transcript {
        Some(path) if path.exists() => ChatSession::from_transcript(read_input(Some(path))?),
        _ => ChatSession::new(),
    };

    for message in messages {
        let mut interrupt = None;
        let mut stdout = std::io::stdout();

        let outcome = drive_turn(
            &mut session,
            client.clone(),
            message,
            |ticket| interrupt = Some(cancel_on_ctrl_c(ticket)),
            |token| {
                let _ = stdout.write_all(token.as_bytes());
                let _ = stdout.flush();
            },
        )
        .await;

        if let Some(interrupt) = interrupt {
            interrupt.abort();
        }
        println!();

        if let Some(path) = transcript {
            std::fs::write(path, session.transcript())
                .with_context(|| format!("failed to save transcript to {}", path.display()))?;
        }

        if outcome? == TurnOutcome::Cancelled {
            eprintln!("(cancelled)");
            break;
        }
    }
    Ok(())
}

fn health(file: Option<&Path>, index: bool) -> Result<()> {
    let text = read_input(file)?;

    if index {
        for (time, status) in parse_health_index(&text)? {
            println!("{time}\t{}", status_label(status));
        }
        return Ok(());
    }

    let turns = decode(&text)?;
    let status = classify(&turns);
    println!("{}", status_label(status));

    if let Some(command) = follow_up(&turns) {
        println!("suggested: $ {command}");
    }
    Ok(())
}

async fn run_diagnosis(rounds: usize, observe: &str, transcript: Option<&Path>) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    let client = Arc::new(CompletionClient::new(&config)?);
    let shell = SystemShell::new(config.working_dir.clone());

    let observation = shell.run(observe)?;
    let mut session = ChatSession::new();
    let mut interrupt: Option<tokio::task::JoinHandle<()>> = None;
    let mut stdout = std::io::stdout();

    let diagnosis = diagnose(
        &mut session,
        client,
        &shell,
        &health_request(observe, &observation),
        rounds,
        |ticket| {
            if let Some(previous) = interrupt.replace(cancel_on_ctrl_c(ticket)) {
                previous.abort();
            }
        },
        |token| {
            let _ = stdout.write_all(token.as_bytes());
            let _ = stdout.flush();
        },
    )
    .await;

    if let Some(interrupt) = interrupt {
        interrupt.abort();
    }
    println!();

    if let Some(path) = transcript {
        std::fs::write(path, session.transcript())
            .with_context(|| format!("failed to save transcript to {}", path.display()))?;
    }

    let diagnosis = diagnosis?;
    for command in &diagnosis.commands {
        eprintln!("ran: $ {command}");
    }
    if diagnosis.cancelled {
        eprintln!("(cancelled)");
    }
    println!("{}", status_label(diagnosis.status));
    Ok(())
}

fn run(line: &str, transcript: Option<&Path>) -> Result<()> {
    let config = Config::load()?;
    let shell = SystemShell::new(config.working_dir);
    let wrapped = run_code_line(&shell, line)?;
    print!("{wrapped}");

    if let Some(path) = transcript {
        let existing = if path.exists() {
            read_input(Some(path))?
        } else {
            String::new()
        };
        let mut session = ChatSession::from_transcript(existing);
        session.append_assistant(&wrapped);
        std::fs::write(path, session.transcript())
            .with_context(|| format!("failed to save transcript to {}", path.display()))?;
    }
    Ok(())
}

fn cancel_on_ctrl_c(ticket: &RequestTicket) -> tokio::task::JoinHandle<()> {
    let cancel = ticket.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    })
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

fn status_label(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "HEALTHY",
        HealthStatus::Unhealthy => "UNHEALTHY",
        HealthStatus::Unknown => "UNKNOWN",
    }
}

fn format_turns(turns: &[RenderedTurn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let label = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        out.push_str(&format!("[{label}]\n"));
        for block in &turn.blocks {
            format_block(block, &mut out);
            out.push('\n');
        }
    }
    out
}

fn format_block(block: &BlockNode, out: &mut String) {
    match block {
        BlockNode::Paragraph { lines } => {
            for line in lines {
                out.push_str(&format_inline(line));
                out.push('\n');
            }
        }
        BlockNode::OrderedList { items } => {
            for (index, item) in items.iter().enumerate() {
                out.push_str(&format!("{}) {}\n", index + 1, format_inline(item)));
            }
        }
        BlockNode::UnorderedList { items } => {
            for item in items {
                out.push_str(&format!("- {}\n", format_inline(item)));
            }
        }
        BlockNode::CodeBlock { language, lines } => {
            out.push_str(&format!("```{}\n", language.as_deref().unwrap_or_default()));
            for line in lines {
                let marker = if line.executable { "> " } else { "  " };
                out.push_str(&format!("{marker}{}\n", line.text));
            }
            out.push_str("```\n");
        }
    }
}

fn format_inline(nodes: &[InlineNode]) -> String {
    nodes
        .iter()
        .map(|node| match node {
            InlineNode::Text { text } => text.clone(),
            InlineNode::Emphasis { children } => format!("*{}*", format_inline(children)),
            InlineNode::Strong { children } => format!("**{}**", format_inline(children)),
            InlineNode::Code { children, .. } => format!("`{}`", format_inline(children)),
        })
        .collect()
}
