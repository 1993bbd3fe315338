//! Stepwise - a plan-and-execute agent

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    chat_command, init_command, serve_tools_command, status_command, threads_clear_command,
    threads_list_command, threads_show_command, tools_command,
};

/// Stepwise - plans, executes and replans until it can answer
#[derive(Parser)]
#[command(name = "stepwise")]
#[command(about = "◆ A plan-and-execute agent for your terminal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config, workspace and prompt templates
    Init,
    /// Chat with the agent
    Chat {
        /// Message to send
        #[arg(short, long)]
        message: Option<String>,
        /// Conversation thread
        #[arg(short, long)]
        thread: Option<String>,
        /// Discard an interrupted turn instead of resuming it
        #[arg(long)]
        new: bool,
    },
    /// List the available tools
    Tools,
    /// Inspect saved conversation threads
    Threads {
        #[command(subcommand)]
        command: ThreadCommands,
    },
    /// Show system status
    Status,
    /// Serve the builtin tools over MCP on stdio
    ServeTools,
}

#[derive(Subcommand)]
enum ThreadCommands {
    /// List saved threads
    List,
    /// Show a thread's history
    Show { id: String },
    /// Delete a thread
    Clear { id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries answers and, for serve-tools, protocol frames
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init => init_command().await,
        Commands::Chat {
            message,
            thread,
            new,
        } => chat_command(message, thread, new).await,
        Commands::Tools => tools_command().await,
        Commands::Threads { command } => match command {
            ThreadCommands::List => threads_list_command().await,
            ThreadCommands::Show { id } => threads_show_command(id).await,
            ThreadCommands::Clear { id } => threads_clear_command(id).await,
        },
        Commands::Status => status_command().await,
        Commands::ServeTools => serve_tools_command().await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
