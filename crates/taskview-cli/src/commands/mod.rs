//! Slash commands for interactive mode

mod staging;

pub use staging::StagingCommand;

use taskview_core::Session;

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Show a message to the user
    Message(String),
    /// Show an error the user has to acknowledge
    Error(String),
    /// Ask before deleting all tasks
    ConfirmClearHistory,
    /// History was reloaded; show it
    ShowHistory,
    /// Switch between dark and light
    ToggleTheme,
    /// The view changed; nothing else to show
    Done,
    /// Exit the application
    Exit,
}

/// Parse and execute a slash command. Returns `None` if `input` is not a
/// command. `prompt` receives the upload note after `/upload`.
pub async fn execute_command(
    input: &str,
    session: &mut Session,
    prompt: &mut String,
) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message().to_string()),

        "quit" | "exit" | "q" => CommandResult::Exit,

        "load" | "l" => {
            if args.is_empty() {
                return Some(CommandResult::Message("Usage: /load <task-id>".to_string()));
            }
            // Failures are rendered in the view
            let _ = session.load_task(args).await;
            CommandResult::Done
        }

        "history" => {
            session.refresh_history().await;
            CommandResult::ShowHistory
        }

        "clear-history" => CommandResult::ConfirmClearHistory,

        "theme" => CommandResult::ToggleTheme,

        "attach" | "detach" | "files" | "upload" | "cancel-upload" => {
            StagingCommand::execute(&command, args, session, prompt).await
        }

        _ => CommandResult::Message(format!(
            "Unknown command: /{}\nType /help for available commands.",
            command
        )),
    })
}

pub fn help_message() -> &'static str {
    r#"Available commands:
  /help, /h, /?           Show this help message
  /load, /l <task-id>     Show a task; running tasks are followed live
  /history                Reload the task history
  /clear-history          Delete all tasks (asks first)
  /attach <path>...       Stage files for upload (quote paths with spaces)
  /detach <name>          Unstage a file
  /files                  List staged files
  /upload                 Upload staged files and note them in the prompt
  /cancel-upload          Drop all staged files
  /theme                  Switch between dark and light
  /quit, /exit, /q        Exit taskview

Anything else is sent as a new task."#
}
