//! Stepwise command implementations

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

use stepwise_agent::{AgentSettings, Orchestrator, PromptTemplates};
use stepwise_capability::{
    mcp, CapabilityProvider, CapabilityRegistry, LocalCapabilities, McpCapabilities,
};
use stepwise_config::{self, Config};
use stepwise_provider::OpenAiProvider;
use stepwise_session::{Checkpointer, ConversationState, FileCheckpointer};

/// Initialize config, workspace and prompt templates
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing Stepwise...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = stepwise_config::init().await?;
    let workspace = config.workspace_path();

    for name in PromptTemplates::write_defaults(&workspace)
        .await
        .context("cannot write prompt templates")?
    {
        info!("◆ Created {}", workspace.join(&name).display());
        println!("  + {}", name);
    }
    stepwise_config::paths::ensure_dir(&stepwise_config::threads_dir()).await?;

    println!("\n◆ Stepwise initialized");
    println!("\nNext steps:");
    println!(
        "  1. Add your API key to {}",
        stepwise_config::config_path().display()
    );
    println!("     or export STEPWISE_API_KEY");
    println!("  2. Start chatting: stepwise chat -m \"Hello!\"");

    Ok(())
}

/// Chat with the agent, one-shot or interactively
pub async fn chat_command(message: Option<String>, thread: Option<String>, new: bool) -> Result<()> {
    let config = Config::load().await?;
    let thread = thread.unwrap_or_else(|| config.default_thread());
    let orchestrator = build_orchestrator(&config).await?;

    if let Some(pending) = orchestrator.pending_turn(&thread).await? {
        if new {
            orchestrator.abandon(&thread).await?;
            println!("◆ Discarded interrupted turn: {}", pending.input);
        } else {
            println!(
                "◆ Resuming interrupted turn at {}: {}",
                pending.next, pending.input
            );
            // A failed resume is already closed, so the session carries on
            match orchestrator.resume(&thread).await {
                Ok(answer) => println!("\n◆ {}\n", answer),
                Err(e) => eprintln!("\n✗ {}\n", e),
            }
        }
    }

    if let Some(msg) = message {
        let answer = orchestrator.run_turn(&thread, &msg).await?;
        println!("\n◆ {}", answer);
        return Ok(());
    }

    println!("◆ Interactive mode on thread '{}' (type 'exit' to quit)", thread);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    loop {
        print!("◆ ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit_command(input) {
            break;
        }

        match orchestrator.run_turn(&thread, input).await {
            Ok(answer) => println!("\n◆ {}\n", answer),
            // The failed turn is closed; the thread takes the next request
            Err(e) => eprintln!("\n✗ {}\n", e),
        }
    }

    Ok(())
}

/// `exit`, `quit` or `q` in any letter case
fn is_exit_command(input: &str) -> bool {
    ["exit", "quit", "q"]
        .iter()
        .any(|word| input.eq_ignore_ascii_case(word))
}

/// List the tools the configured provider exposes
pub async fn tools_command() -> Result<()> {
    let config = Config::load().await?;
    let (caps, source) = open_capabilities(&config).await?;
    let registry = CapabilityRegistry::discover(caps)
        .await
        .context("tool discovery failed")?;

    println!("◆ {} tools from {}", registry.len(), source);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for tool in registry.descriptors() {
        println!("  {} - {}", tool.name, tool.description);
    }

    Ok(())
}

/// List saved threads
pub async fn threads_list_command() -> Result<()> {
    let store = checkpointer();
    let ids = store.list().await?;

    if ids.is_empty() {
        println!("No saved threads");
        return Ok(());
    }

    println!("Threads:");
    for id in ids {
        match store.load(&id).await? {
            Some(state) => println!("  {}", describe(&state)),
            None => println!("  {}", id),
        }
    }

    Ok(())
}

/// Show one thread's history and any pending turn
pub async fn threads_show_command(id: String) -> Result<()> {
    let state = checkpointer()
        .load(&id)
        .await?
        .with_context(|| format!("thread '{}' not found", id))?;

    println!("◆ {}", describe(&state));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for message in &state.global_history {
        let who = if message.role == "user" { "you" } else { "◆" };
        println!("{}: {}", who, message.text());
    }

    if state.is_mid_turn() {
        println!("\nInterrupted turn ({}): {}", state.next, state.input);
        for step in &state.past_steps {
            println!("  ✓ {}", step);
        }
        for step in &state.plan {
            println!("  · {}", step);
        }
    }

    Ok(())
}

/// Delete a thread's checkpoint
pub async fn threads_clear_command(id: String) -> Result<()> {
    if checkpointer().delete(&id).await? {
        println!("✓ Thread {} removed", id);
    } else {
        println!("✗ Thread {} not found", id);
    }
    Ok(())
}

/// Show status
pub async fn status_command() -> Result<()> {
    let config_path = stepwise_config::config_path();

    println!("◆ Stepwise Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = Config::load().await?;
    let workspace = config.workspace_path();
    println!(
        "Workspace: {} {}",
        workspace.display(),
        if workspace.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );
    println!("Model:     {}", config.default_model());
    println!(
        "API Key:   {}",
        if config.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!("Tools:     {}", capability_source(&config));
    println!("Thread:    {}", config.default_thread());
    println!(
        "Limits:    {} node runs per turn, {} model calls per step, {}s per tool call",
        config.recursion_limit(),
        config.executor_max_iterations(),
        config.tool_timeout().as_secs()
    );

    println!("\n◆ Ready");

    Ok(())
}

/// Serve the builtin tools on stdin/stdout until the client disconnects
pub async fn serve_tools_command() -> Result<()> {
    let config = Config::load().await?;
    let workspace = config.workspace_path();
    stepwise_config::paths::ensure_dir(&workspace).await?;

    info!("serving builtin tools for {}", workspace.display());
    let caps: Arc<dyn CapabilityProvider> = Arc::new(LocalCapabilities::builtin(&workspace));
    mcp::serve(caps, tokio::io::stdin(), tokio::io::stdout()).await?;
    info!("tool client disconnected");

    Ok(())
}

async fn build_orchestrator(config: &Config) -> Result<Orchestrator<OpenAiProvider>> {
    let api_key = config.api_key().with_context(|| {
        format!(
            "No API key configured. Set one in {} or export STEPWISE_API_KEY",
            stepwise_config::config_path().display()
        )
    })?;
    let provider = OpenAiProvider::new(api_key, config.api_base(), Some(config.default_model()));

    let (caps, source) = open_capabilities(config).await?;
    let registry = CapabilityRegistry::discover(caps)
        .await
        .context("tool discovery failed")?;
    info!("{} tools from {}", registry.len(), source);
    if registry.is_empty() {
        warn!("no tools available; plans can only be answered from the model");
    }

    let prompts = PromptTemplates::load(&config.workspace_path()).await;
    let checkpointer: Arc<dyn Checkpointer> = Arc::new(checkpointer());

    Ok(Orchestrator::new(
        provider,
        registry,
        checkpointer,
        prompts,
        AgentSettings::from_config(config),
    ))
}

async fn open_capabilities(config: &Config) -> Result<(Arc<dyn CapabilityProvider>, String)> {
    let source = capability_source(config);
    let caps: Arc<dyn CapabilityProvider> = match &config.capabilities.server {
        Some(server) => Arc::new(
            McpCapabilities::spawn(server)
                .await
                .with_context(|| format!("cannot connect to {}", source))?,
        ),
        None => Arc::new(LocalCapabilities::builtin(&config.workspace_path())),
    };
    Ok((caps, source))
}

fn capability_source(config: &Config) -> String {
    match &config.capabilities.server {
        Some(server) if server.args.is_empty() => format!("MCP server `{}`", server.command),
        Some(server) => format!(
            "MCP server `{} {}`",
            server.command,
            server.args.join(" ")
        ),
        None => "builtin".to_string(),
    }
}

fn checkpointer() -> FileCheckpointer {
    FileCheckpointer::new(stepwise_config::threads_dir())
}

fn describe(state: &ConversationState) -> String {
    let mut line = format!(
        "{} ({} turns, updated {})",
        state.thread_id,
        state.turn_count(),
        state.updated_at.format("%Y-%m-%d %H:%M")
    );
    if state.is_mid_turn() {
        line.push_str(&format!(" [interrupted at {}]", state.next));
    }
    line
}
