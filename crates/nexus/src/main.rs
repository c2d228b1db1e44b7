//! Answers questions in the terminal with the multi-agent workflow.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use nexus::config::Config;
use nexus::core::AgentEvent;
use nexus::{Node, RunError, RunOutcome, Step, Workflow};
use owo_colors::{OwoColorize, Style};
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::sleep;

/// Routes each question through a supervisor, an enhancer, a researcher, a
/// coder and a validator until an answer is approved.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Question to answer. Starts an interactive prompt when omitted.
    query: Option<String>,

    /// Rejections the validator may issue before a run gives up.
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Model used by every role.
    #[arg(long)]
    model: Option<String>,
}

enum RunEvent {
    Transition {
        node: Node,
        content: String,
        next: Step,
    },
    Agent(Node, AgentEvent),
}

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}: {err}", "error".bright_red().bold());
            return ExitCode::FAILURE;
        }
    };
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(max_rounds) = args.max_rounds {
        config.max_rounds = Some(max_rounds);
    }
    debug!("using {config:?}");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let workflow = config
        .workflow_builder()
        .on_transition({
            let event_tx = event_tx.clone();
            move |transition| {
                event_tx
                    .send(RunEvent::Transition {
                        node: transition.node,
                        content: transition.message.content().to_owned(),
                        next: transition.next,
                    })
                    .ok();
            }
        })
        .on_agent_event(move |node, event| {
            event_tx.send(RunEvent::Agent(node, event)).ok();
        })
        .build();
    let workflow = Arc::new(workflow);

    if let Some(query) = args.query {
        if !answer(&workflow, query, &mut event_rx).await {
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        answer(&workflow, query.to_owned(), &mut event_rx).await;
        println!();
    }
    ExitCode::SUCCESS
}

/// Runs one query to the end, printing every transition on the way.
/// Returns `true` if an answer was approved.
async fn answer(
    workflow: &Arc<Workflow>,
    query: String,
    event_rx: &mut UnboundedReceiver<RunEvent>,
) -> bool {
    let mut run = tokio::spawn({
        let workflow = Arc::clone(workflow);
        async move { workflow.run(query).await }
    });

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let mut progress_bar: Option<ProgressBar> = None;

    let joined = loop {
        progress_bar
            .get_or_insert_with(|| {
                let progress_bar = ProgressBar::new_spinner();
                progress_bar.set_style(progress_style.clone());
                progress_bar.set_message("🤔 Thinking...");
                progress_bar
            })
            .inc(1);

        // Events are sent before the run returns, draining them first keeps
        // the output complete.
        select! {
            biased;
            Some(event) = event_rx.recv() => {
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                print_event(event);
            }
            joined = &mut run => break joined,
            _ = sleep(Duration::from_millis(100)) => {}
        }
    };

    if let Some(progress_bar) = progress_bar.take() {
        progress_bar.finish_and_clear();
    }
    while let Ok(event) = event_rx.try_recv() {
        print_event(event);
    }

    match joined {
        Ok(Ok(outcome)) => {
            print_outcome(&outcome);
            true
        }
        Ok(Err(err)) => {
            print_failure(&err);
            false
        }
        Err(err) => {
            error!("run task failed: {err}");
            false
        }
    }
}

fn print_event(event: RunEvent) {
    match event {
        RunEvent::Transition {
            node,
            content,
            next,
        } => {
            let bar = BAR_CHAR.style(node_style(node));
            println!(
                "{bar}Output from node '{}' {}",
                node.style(node_style(node).bold()),
                format!("-> {next}").dimmed()
            );
            for line in content.lines() {
                println!("{bar}{line}");
            }
            println!();
        }
        RunEvent::Agent(node, AgentEvent::ToolCall(call)) => {
            println!(
                "{}🔧 {} calls {} {}",
                BAR_CHAR.style(node_style(node)),
                node,
                call.name.bright_white().bold(),
                call.arguments.dimmed()
            );
        }
        RunEvent::Agent(node, AgentEvent::ToolResult(result)) => {
            let first_line = result.content.lines().next().unwrap_or_default();
            println!(
                "{}   {}",
                BAR_CHAR.style(node_style(node)),
                first_line.dimmed()
            );
        }
        // Messages are printed whole once appended.
        RunEvent::Agent(
            _,
            AgentEvent::Transcript(_) | AgentEvent::TurnRestarted,
        ) => {}
    }
}

fn print_outcome(outcome: &RunOutcome) {
    debug!(
        "approved after {} visits and {} rounds",
        outcome.visits, outcome.rounds
    );
    println!("{}", "Final Answer:".bright_green().bold());
    match outcome.final_answer() {
        Some(answer) => println!("{}", answer.bright_white()),
        None => println!("{}", "(no answer)".dimmed()),
    }
}

fn print_failure(err: &RunError) {
    eprintln!("{}: {err}", "error".bright_red().bold());
    if let Some(answer) = err.conversation().final_answer() {
        println!("{}", "Last answer (not approved):".bright_yellow().bold());
        println!("{}", answer.content());
    }
}

fn node_style(node: Node) -> Style {
    match node {
        Node::Supervisor => Style::new().bright_magenta(),
        Node::Enhancer => Style::new().bright_blue(),
        Node::Researcher => Style::new().bright_cyan(),
        Node::Coder => Style::new().bright_green(),
        Node::Validator => Style::new().bright_yellow(),
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
