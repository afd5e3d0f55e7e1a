use anyhow::Result;
use chrono::Utc;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat::{ChatIndex, Message, SessionController, date_label};
use crate::core::AppConfig;

#[derive(Debug, PartialEq)]
enum ReplCommand<'a> {
    Send(&'a str),
    New,
    Search(bool),
    List,
    Load(&'a str),
    Delete(&'a str),
    Rename(&'a str),
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> ReplCommand<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Send(line);
        };
        let (cmd, arg) = match rest.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (rest, ""),
        };
        match (cmd, arg) {
            ("new", _) => Self::New,
            ("search", "on") => Self::Search(true),
            ("search", "off") => Self::Search(false),
            ("list", _) => Self::List,
            ("load", id) if !id.is_empty() => Self::Load(id),
            ("delete", id) if !id.is_empty() => Self::Delete(id),
            ("rename", title) if !title.is_empty() => Self::Rename(title),
            ("help", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Unknown(line),
        }
    }
}

const HELP: &str = "Commands:
  /new              start a new chat
  /search on|off    toggle web search mode
  /list             show chat history
  /load <id>        open a chat from history
  /delete <id>      delete a chat
  /rename <title>   rename the current chat
  /quit             exit";

fn render_message(msg: &Message) -> String {
    if !msg.is_search_results() {
        return msg.text.clone().unwrap_or_default();
    }

    let mut out = msg.summary.clone().unwrap_or_default();
    for (i, r) in msg.results.iter().flatten().enumerate() {
        let host = r.hostname().unwrap_or_default();
        out.push_str(&format!("\n\n{}. {} ({})\n   {}", i + 1, r.title, host, r.url));
    }
    out
}

fn render_index(index: &ChatIndex) -> String {
    if index.is_empty() {
        return "No recent interactions".to_string();
    }
    let today = Utc::now().date_naive();
    index
        .groups()
        .iter()
        .map(|group| {
            let chats = group
                .chats
                .iter()
                .map(|c| format!("  {}  {}", c.id, c.title))
                .collect::<Vec<_>>()
                .join("\n");
            format!("{}\n{}", date_label(group.date, today), chats)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_transcript(controller: &SessionController) -> String {
    let session = controller.session();
    let mut out = format!("# {}", session.title);
    for msg in session.transcript.iter() {
        let who = if msg.is_user { ">>>" } else { "<<<" };
        out.push_str(&format!("\n{} {}", who, render_message(msg)));
    }
    out
}

async fn handle(controller: &mut SessionController, cmd: ReplCommand<'_>) -> String {
    match cmd {
        ReplCommand::Send(text) => match controller.send_message(text).await {
            Ok(reply) => {
                let mut out = render_message(&reply);
                let unsaved = controller.session().unsaved_messages;
                if let Some(e) = controller.persist_error() {
                    out.push_str(&format!("\n[not saved: {}]", e));
                } else if unsaved > 0 {
                    out.push_str(&format!("\n[{} earlier message(s) were not saved]", unsaved));
                }
                out
            }
            Err(e) => e.to_string(),
        },
        ReplCommand::New => {
            controller.create_new_chat();
            "Started a new chat".to_string()
        }
        ReplCommand::Search(enabled) => {
            controller.set_search_mode(enabled);
            format!("Search mode {}", if enabled { "on" } else { "off" })
        }
        ReplCommand::List => match controller.refresh_index().await {
            Ok(index) => render_index(index),
            Err(e) => format!("Error fetching chats: {}", e),
        },
        ReplCommand::Load(id) => {
            if controller.load_chat(id).await {
                render_transcript(controller)
            } else {
                format!("Chat {} not found, started a new chat", id)
            }
        }
        ReplCommand::Delete(id) => match controller.delete_chat(id).await {
            Ok(()) => format!("Deleted {}", id),
            Err(e) => format!("Error deleting chat: {}", e),
        },
        ReplCommand::Rename(title) => {
            let Some(id) = controller.session().chat_id.clone() else {
                return "Nothing to rename until the first reply is saved".to_string();
            };
            match controller.rename_chat(&id, title).await {
                Ok(()) => format!("Renamed to {}", controller.session().title),
                Err(e) => format!("Error renaming chat: {}", e),
            }
        }
        ReplCommand::Help => HELP.to_string(),
        ReplCommand::Unknown(line) => format!("Unknown command: {}\n{}", line, HELP),
        ReplCommand::Quit => String::new(),
    }
}

pub async fn run(config: &AppConfig, search: bool) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut controller = super::session_controller(config).await?;
    controller.set_search_mode(search);
    if let Err(e) = controller.refresh_index().await {
        tracing::error!("Error fetching chats: {}", e);
    }

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                let cmd = ReplCommand::parse(&line);
                if cmd == ReplCommand::Quit {
                    break;
                }
                println!("{}", handle(&mut controller, cmd).await);
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{SearchResult, reindex};

    #[test]
    fn it_parses_commands() {
        assert_eq!(ReplCommand::parse("hello there"), ReplCommand::Send("hello there"));
        assert_eq!(ReplCommand::parse("/new"), ReplCommand::New);
        assert_eq!(ReplCommand::parse("/search on"), ReplCommand::Search(true));
        assert_eq!(ReplCommand::parse("/search off"), ReplCommand::Search(false));
        assert_eq!(ReplCommand::parse("/load  abc-123 "), ReplCommand::Load("abc-123"));
        assert_eq!(ReplCommand::parse("/rename Rust News"), ReplCommand::Rename("Rust News"));
        assert_eq!(ReplCommand::parse("/exit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/load"), ReplCommand::Unknown("/load"));
        assert_eq!(ReplCommand::parse("/search maybe"), ReplCommand::Unknown("/search maybe"));
    }

    #[test]
    fn it_renders_search_results() {
        let msg = Message::search_results(
            vec![SearchResult {
                title: "Announcing Rust 1.80.0".to_string(),
                url: "https://blog.rust-lang.org/2024/07/25/Rust-1.80.0.html".to_string(),
                snippet: None,
                text: None,
            }],
            "Rust 1.80 released...",
        );
        assert_eq!(
            render_message(&msg),
            "Rust 1.80 released...\n\n1. Announcing Rust 1.80.0 (blog.rust-lang.org)\n   https://blog.rust-lang.org/2024/07/25/Rust-1.80.0.html"
        );
        assert_eq!(render_message(&Message::assistant("hi there")), "hi there");
    }

    #[test]
    fn it_renders_an_empty_index() {
        assert_eq!(render_index(&reindex(Vec::new())), "No recent interactions");
    }
}
