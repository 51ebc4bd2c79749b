//! parley – terminal chat client.
//!
//! Reads lines from stdin, sends them through a [`ChatStore`] and prints the
//! reply as it streams in. Ctrl-C during a reply abandons it and returns to
//! the prompt; Ctrl-C at the prompt exits.

mod cli;
mod input;
mod render;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use parley_core::types::Attachment;
use parley_core::{
    Authenticator, ChatError, ChatStore, ClientConfig, CredentialTable, Credentials,
    HttpTransport, TurnOutcome, attachment,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use cli::{Cli, Command, HELP};
use input::Input;
use render::Renderer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if cli.login {
        login(&mut lines).await?;
    }

    let mut config = ClientConfig::from_env();
    if let Some(endpoint) = cli.endpoint {
        config = config.with_endpoint(endpoint);
    }
    debug!(endpoint = %config.endpoint, "using chat endpoint");
    let store = Arc::new(ChatStore::new(Arc::new(HttpTransport::new(&config)?)));

    let mut pending: Vec<Attachment> = Vec::new();
    for path in &cli.attach {
        pending.push(
            attachment::from_path(path)
                .await
                .with_context(|| format!("cannot attach {}", path.display()))?,
        );
    }

    let watcher = spawn_watcher(&store);
    let mut interrupts = input::forward_interrupts();
    println!("Connected to {}. Type /help for commands.", config.endpoint);

    loop {
        prompt("you> ");
        let line = match input::next_input(&mut lines, &mut interrupts).await? {
            Input::Line(line) => line,
            Input::Interrupt => {
                println!();
                break;
            }
            Input::Eof => break,
        };
        match Command::parse(&line) {
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Unknown(cmd) => println!("unknown command {cmd}; try /help"),
            Command::Clear => {
                store.clear_chat();
                pending.clear();
                println!("(new conversation)");
            }
            Command::Attach(path) => match attachment::from_path(&path).await {
                Ok(att) => {
                    println!(
                        "attached {} ({})",
                        att.name,
                        attachment::format_file_size(att.size)
                    );
                    pending.push(att);
                }
                Err(e) => println!("{e}"),
            },
            Command::Send(text) => {
                let files = std::mem::take(&mut pending);
                let outcome = tokio::select! {
                    outcome = store.send_message(&text, files) => outcome,
                    Some(()) = interrupts.recv() => {
                        println!(" [interrupted]");
                        continue;
                    }
                };
                input::discard_pending(&mut interrupts);
                match outcome {
                    Ok(TurnOutcome::Skipped) => {}
                    Ok(_) => println!(),
                    Err(ChatError::TurnInFlight) => println!("still answering; please wait"),
                    Err(e) => println!("{e}"),
                }
            }
        }
    }

    watcher.abort();
    Ok(())
}

/// Print every snapshot change until the store is dropped.
fn spawn_watcher(store: &ChatStore) -> tokio::task::JoinHandle<()> {
    let mut updates = store.subscribe();
    tokio::spawn(async move {
        let mut renderer = Renderer::default();
        while updates.changed().await.is_ok() {
            let snap = updates.borrow_and_update().clone();
            let out = renderer.render(&snap);
            if !out.is_empty() {
                prompt(&out);
            }
        }
    })
}

async fn login(lines: &mut Lines<BufReader<Stdin>>) -> Result<()> {
    let table = CredentialTable::from_env("PARLEY_CREDENTIALS")?;
    if table.is_empty() {
        bail!("--login needs PARLEY_CREDENTIALS (email:password[:name],...)");
    }

    prompt("email: ");
    let email = lines.next_line().await?.unwrap_or_default();
    prompt("password: ");
    let password = lines.next_line().await?.unwrap_or_default();

    let identity = table
        .authenticate(&Credentials {
            email: email.trim().to_owned(),
            password,
        })
        .await?;
    println!("Signed in as {} <{}>", identity.name, identity.email);
    Ok(())
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}
