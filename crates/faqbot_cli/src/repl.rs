use anyhow::Result;
use faqbot_core::{Config, Session, Transcript};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::{activate, ChatResolver};

const HELP: &str = "\
Type a question to ask it. Commands:
  /dataset NAME|PATH   switch dataset and rebuild the index
  /datasets            list configured datasets
  /history             show this session's conversation
  /clear               start a new session
  /help                show this help
  exit | quit          leave";

#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Empty,
    Ask(&'a str),
    Dataset(&'a str),
    Datasets,
    History,
    Clear,
    Help,
    Exit,
    Unknown(&'a str),
}

pub fn parse_line(line: &str) -> ReplCommand<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplCommand::Empty;
    }
    if matches!(trimmed.to_ascii_lowercase().as_str(), "exit" | "quit") {
        return ReplCommand::Exit;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return ReplCommand::Ask(trimmed);
    };

    let (cmd, arg) = match rest.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (rest, ""),
    };
    match cmd {
        "dataset" if !arg.is_empty() => ReplCommand::Dataset(arg),
        "datasets" => ReplCommand::Datasets,
        "history" => ReplCommand::History,
        "clear" => ReplCommand::Clear,
        "help" => ReplCommand::Help,
        "exit" | "quit" => ReplCommand::Exit,
        _ => ReplCommand::Unknown(trimmed),
    }
}

fn print_active(resolver: &ChatResolver) {
    if let Some(active) = resolver.active() {
        println!(
            "[dataset {} ({} entries)]",
            active.name(),
            active.index().len()
        );
    }
}

fn switch_dataset(resolver: &mut ChatResolver, config: &Config, selection: &str) {
    match activate(resolver, config, selection) {
        Ok(()) => print_active(resolver),
        Err(err) => {
            eprintln!("error: {err:#}");
            eprintln!("No dataset is active. Use /dataset to select one.");
        }
    }
}

/// Interactive loop. One question is fully answered before the next line
/// is read. The session lives until the loop ends or `/clear` replaces it.
pub fn run(resolver: &mut ChatResolver, config: &Config, initial: &str) -> Result<()> {
    println!("Welcome! Ask me anything. Type /help for commands.");
    switch_dataset(resolver, config, initial);

    let mut session = Session::new();
    let mut rl = DefaultEditor::new()?;

    loop {
        let line = match rl.readline("faqbot> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let command = parse_line(&line);
        if command != ReplCommand::Empty {
            rl.add_history_entry(line.trim()).ok();
        }

        match command {
            ReplCommand::Empty => {}
            ReplCommand::Exit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::History => {
                if session.is_empty() {
                    println!("(no conversation yet)");
                } else {
                    println!("{}", session.render_history());
                }
            }
            ReplCommand::Clear => {
                session = Session::new();
                println!("Session cleared.");
            }
            ReplCommand::Datasets => {
                for (name, location) in &config.datasets {
                    println!("  {name}\t{location}");
                }
            }
            ReplCommand::Dataset(selection) => switch_dataset(resolver, config, selection),
            ReplCommand::Unknown(input) => {
                println!("Unknown command {input}. Type /help for commands.")
            }
            ReplCommand::Ask(question) => match resolver.handle_turn(&mut session, question) {
                Ok(report) => println!("{}", report.reply),
                Err(err) => eprintln!("error: {err}"),
            },
        }
    }

    Ok(())
}
