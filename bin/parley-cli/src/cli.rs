use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about = "Chat with a parley server from the terminal")]
pub struct Cli {
    /// Chat endpoint (defaults to http://127.0.0.1:3000/api/chat)
    #[arg(long, env = "PARLEY_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Ask for an email and password first, checked against PARLEY_CREDENTIALS
    #[arg(long)]
    pub login: bool,

    /// Attach a file to the first message (repeatable)
    #[arg(long, value_name = "PATH")]
    pub attach: Vec<PathBuf>,

    /// Enable verbose logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Attach(PathBuf),
    Clear,
    Quit,
    Help,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.trim_start().strip_prefix('/') else {
            return Command::Send(line.to_owned());
        };
        let (name, arg) = rest
            .split_once(char::is_whitespace)
            .map(|(n, a)| (n, a.trim()))
            .unwrap_or((rest, ""));
        match name {
            "attach" if !arg.is_empty() => Command::Attach(PathBuf::from(arg)),
            "clear" => Command::Clear,
            "quit" | "exit" => Command::Quit,
            "help" => Command::Help,
            _ => Command::Unknown(line.trim().to_owned()),
        }
    }
}

pub const HELP: &str = "\
/attach <path>  attach a file to the next message
/clear          start a new conversation
/quit           leave
Anything else is sent as a message.";
