// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `moana shell` command implementation.
//!
//! Interactive REPL with a colored prompt and readline history. Each line
//! is one agent turn; `/memories` prints what is stored about the user and
//! `/exit` flushes pending extraction before quitting.

use colored::Colorize;
use moana_config::MoanaConfig;
use moana_core::MoanaError;
use moana_memory::MemoryKind;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::app::App;

/// A parsed line of shell input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    Memories,
    Empty,
    Unknown(&'a str),
    Message(&'a str),
}

fn parse(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    match trimmed {
        "" => Input::Empty,
        "/exit" | "/quit" => Input::Exit,
        "/memories" => Input::Memories,
        cmd if cmd.starts_with('/') => Input::Unknown(cmd),
        text => Input::Message(text),
    }
}

/// Runs the `moana shell` interactive REPL.
pub async fn run_shell(config: MoanaConfig, resume: Option<String>) -> Result<(), MoanaError> {
    let app = App::build(&config).await?;
    let user_id = app.agent.user_id().to_string();

    let session = match resume {
        Some(id) => app.agent.resume(&id).await?,
        None => app.agent.start_session().await?,
    };

    let mut rl = DefaultEditor::new()
        .map_err(|e| MoanaError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "moana shell".bold().green());
    println!(
        "user {} / session {}",
        user_id.cyan(),
        session.id.as_str().dimmed()
    );
    println!(
        "Type {} to list memories, {} to exit.\n",
        "/memories".yellow(),
        "/exit".yellow()
    );

    let prompt = format!("{}> ", "moana".green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => match parse(&line) {
                Input::Exit => break,
                Input::Empty => continue,
                Input::Memories => app.print_memories(&user_id, &MemoryKind::ALL).await,
                Input::Unknown(cmd) => {
                    eprintln!("{}: unknown command {cmd}", "error".red());
                }
                Input::Message(text) => {
                    let _ = rl.add_history_entry(line.as_str());
                    match app.agent.send(&session.id, text).await {
                        Ok(outcome) if outcome.exhausted => {
                            println!("{}\n", outcome.reply.yellow());
                        }
                        Ok(outcome) => println!("{}\n", outcome.reply),
                        Err(e) => eprintln!("{}: {e}", "error".red()),
                    }
                }
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    println!("{}", "saving memories...".dimmed());
    app.close().await?;
    println!("{}", "goodbye".dimmed());
    Ok(())
}
