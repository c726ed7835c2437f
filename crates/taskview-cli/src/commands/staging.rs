//! /attach, /detach, /files, /upload and /cancel-upload

use super::CommandResult;
use std::path::Path;
use taskview_core::{Session, StagedFile};

pub struct StagingCommand;

impl StagingCommand {
    pub async fn execute(
        command: &str,
        args: &str,
        session: &mut Session,
        prompt: &mut String,
    ) -> CommandResult {
        match command {
            "attach" => Self::attach(args, session),
            "detach" => Self::detach(args, session),
            "files" => CommandResult::Message(Self::list(session)),
            "upload" => Self::upload(session, prompt).await,
            "cancel-upload" => {
                session.staging_mut().cancel();
                CommandResult::Message("Upload cancelled".to_string())
            }
            _ => CommandResult::Message(format!("Unknown command: /{}", command)),
        }
    }

    fn attach(args: &str, session: &mut Session) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message("Usage: /attach <path>...".to_string());
        }

        let paths = match shell_words::split(args) {
            Ok(paths) => paths,
            Err(e) => return CommandResult::Error(format!("Invalid path list: {}", e)),
        };
        let (found, missing): (Vec<String>, Vec<String>) =
            paths.into_iter().partition(|p| Path::new(p).is_file());
        session
            .staging_mut()
            .add(found.iter().map(StagedFile::from_path));

        if !missing.is_empty() {
            return CommandResult::Error(format!("No such file: {}", missing.join(", ")));
        }
        CommandResult::Message(Self::list(session))
    }

    fn detach(args: &str, session: &mut Session) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message("Usage: /detach <name>".to_string());
        }
        if session.staging_mut().remove(args) {
            CommandResult::Message(format!("Removed {}", args))
        } else {
            CommandResult::Message(format!("{} is not staged", args))
        }
    }

    fn list(session: &Session) -> String {
        let staging = session.staging();
        if staging.is_empty() {
            "No files staged".to_string()
        } else {
            format!("Staged files: {}", staging.names().join(", "))
        }
    }

    async fn upload(session: &mut Session, prompt: &mut String) -> CommandResult {
        let count = session.staging().len();
        match session.commit_uploads(prompt).await {
            Ok(Some(_)) => CommandResult::Message(format!("Uploaded {} files", count)),
            Ok(None) => CommandResult::Message("No files staged".to_string()),
            Err(e) => CommandResult::Error(format!("Upload failed: {}", e)),
        }
    }
}
