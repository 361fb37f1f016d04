//! `taskloom run`: build a runnable for a mode and stream its progress.

use anyhow::{Context, bail};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use taskloom_agent::{AgentStreamEvent, CancellationToken, ChannelSink};
use taskloom_config::{AppConfig, ConfigStore, FileConfigStore, Settings};
use taskloom_controller::{Controller, ControllerContext, Mode};
use taskloom_providers::OpenAiCompatProvider;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use super::apply_assignments;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// The task to run
    #[arg(required = true)]
    task: Vec<String>,

    /// Mode: standard, chat, coder or flow (defaults to the config's default_mode)
    #[arg(short, long)]
    mode: Option<String>,

    /// Start from a saved configuration for the mode
    #[arg(short, long)]
    config: Option<String>,

    /// Override a setting, as key=value (repeatable)
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let mode = Mode::resolve(args.mode.as_deref().unwrap_or(&config.default_mode));
    let task = args.task.join(" ");

    let saved = match &args.config {
        Some(id) => FileConfigStore::new(config.store_dir())
            .load(mode.name(), id)?
            .with_context(|| format!("No saved configuration {mode}/{id}"))?,
        None => Settings::new(),
    };
    let overrides = apply_assignments(saved, &args.set)?;

    if !config.has_api_key() && !is_local(&config.api_url) {
        bail!(
            "No API key configured. Set TASKLOOM_API_KEY or OPENAI_API_KEY, or add api_key to {}",
            AppConfig::config_dir().join("config.toml").display()
        );
    }
    let provider = OpenAiCompatProvider::with_timeout(
        "openai_compat",
        config.api_url.clone(),
        config.api_key.clone().unwrap_or_default(),
        Duration::from_secs(config.request_timeout_secs),
    )?;

    let shutdown = CancellationToken::new();
    let context = ControllerContext::new(Arc::new(provider))
        .with_base_settings(config.base_settings())
        .with_shutdown_token(shutdown.clone());
    let mut runnable = Controller::new(context).create_mode(mode, &overrides)?;
    info!(mode = %mode, kind = runnable.kind(), "Starting run");

    let cancel = runnable.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            shutdown.cancel();
            cancel.cancel();
        }
    });

    let (sink, mut events) = ChannelSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            print_event(&event);
        }
    });

    let report = runnable.execute(&task, &sink).await;
    drop(sink);
    printer.await.ok();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("{}", report.text());
    }
    Ok(())
}

fn is_local(url: &str) -> bool {
    url.contains("://localhost") || url.contains("://127.0.0.1")
}

fn print_event(event: &AgentStreamEvent) {
    match event {
        AgentStreamEvent::MemberStarted { pass, role } => {
            eprintln!("== pass {pass}: {role} ==");
        }
        AgentStreamEvent::ToolCall { name, input, .. } => {
            eprintln!("  -> {name} {input}");
        }
        AgentStreamEvent::ToolResult {
            name,
            output,
            is_error,
            ..
        } => {
            let marker = if *is_error { "!!" } else { "<-" };
            eprintln!("  {marker} {name}: {}", first_line(output));
        }
        AgentStreamEvent::Step {
            agent,
            step,
            output,
        } => {
            println!("[{agent}] step {step}: {output}");
        }
        AgentStreamEvent::Nudge { agent, step } => {
            eprintln!("  [{agent}] repeated responses at step {step}, nudging");
        }
        AgentStreamEvent::Done {
            agent,
            termination,
            steps,
        } => {
            eprintln!("  [{agent}] {termination} after {steps} step(s)");
        }
        AgentStreamEvent::Error { agent, message } => {
            eprintln!("  [{agent}] error: {message}");
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_urls_need_no_key() {
        assert!(is_local("http://localhost:11434/v1"));
        assert!(is_local("http://127.0.0.1:8080"));
        assert!(!is_local("https://api.openai.com/v1"));
    }

    #[test]
    fn first_line_of_output() {
        assert_eq!(first_line("a\nb"), "a");
        assert_eq!(first_line(""), "");
    }
}
