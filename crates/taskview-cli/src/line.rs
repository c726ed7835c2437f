//! Plain stdin/stdout mode

use crate::commands::{self, CommandResult};
use crate::config::Config;
use crate::utils::{confirm_on_stdin, truncate_chars};
use std::io::{self, Write};
use std::path::PathBuf;
use taskview_api::TaskEvent;
use taskview_core::{
    LineKind, Session, StagedFile, StatusLine, TaskView, UpdateReceiver, ViewLine, ViewUpdate,
    step_header,
};

/// A view line as plain text
pub fn format_line(line: &ViewLine) -> String {
    let mut out = line.header.clone();
    for body in line.body.lines() {
        out.push_str("\n  ");
        out.push_str(body);
    }
    out
}

pub fn print_view(view: &TaskView) {
    for line in view.lines() {
        match line.kind {
            LineKind::Error | LineKind::Failed => eprintln!("{}", format_line(&line)),
            _ => println!("{}", format_line(&line)),
        }
    }
}

/// Text for an update that can be printed before it is applied
fn describe(update: &ViewUpdate) -> Vec<String> {
    match update {
        ViewUpdate::Event { event, at } => match event {
            TaskEvent::Status(snapshot) => {
                let mut out = vec![format!("[snapshot: {} steps]", snapshot.steps.len())];
                out.extend(snapshot.steps.iter().map(|step| {
                    format_line(&ViewLine {
                        kind: LineKind::Step(step.kind.clone()),
                        header: step_header(&step.kind, step.timestamp.or(Some(*at))),
                        body: step.result.clone(),
                    })
                }));
                out
            }
            TaskEvent::Step { kind, result } | TaskEvent::Message { kind, result } => {
                vec![format_line(&ViewLine {
                    kind: LineKind::Step(kind.clone()),
                    header: step_header(kind, Some(*at)),
                    body: result.clone(),
                })]
            }
            TaskEvent::Complete | TaskEvent::Error { .. } => vec![],
        },
        ViewUpdate::Heartbeat => vec!["·".to_string()],
        ViewUpdate::StatusPolled { status, error } => vec![format!(
            "[{}]",
            StatusLine {
                status: *status,
                error: error.clone(),
            }
            .text()
        )],
        _ => vec![],
    }
}

fn print_update(session: &mut Session, update: taskview_core::SessionUpdate) {
    let text = describe(&update.update);
    let notice = matches!(
        update.update,
        ViewUpdate::Reconnecting { .. } | ViewUpdate::ConnectionFailed
    );
    let terminal = update.update.releases_subscription();

    if !session.apply(update) {
        return;
    }
    for line in text {
        println!("{}", line);
    }
    if notice {
        if let Some(n) = session.view().notices().last() {
            eprintln!("{}", n.text);
        }
    }
    if terminal {
        for line in session.view().lines() {
            if matches!(line.kind, LineKind::Completed | LineKind::Failed) {
                println!("\n{}", format_line(&line));
            }
        }
    }
}

/// Print updates until the subscription ends or Ctrl+C
pub async fn follow(session: &mut Session, rx: &mut UpdateReceiver) -> anyhow::Result<()> {
    while session.subscribed_task().is_some() {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.close_subscription().await;
                eprintln!("\nStopped following the task.");
                break;
            }
            update = rx.recv() => match update {
                Some(update) => print_update(session, update),
                None => break,
            },
        }
    }
    Ok(())
}

/// `-c`: upload attachments, submit, follow to the end
pub async fn run_command(
    session: &mut Session,
    rx: &mut UpdateReceiver,
    prompt: &str,
    attach: &[PathBuf],
) -> anyhow::Result<()> {
    let mut prompt = prompt.to_string();
    if !attach.is_empty() {
        session.staging_mut().add(attach.iter().map(StagedFile::from_path));
        session.commit_uploads(&mut prompt).await?;
        println!("Uploaded {} files", attach.len());
    }

    println!("taskview> {}", prompt);
    println!();

    match session.submit(&prompt).await {
        Ok(task_id) => tracing::debug!(task_id = %task_id, "following task"),
        Err(e) if e.is_validation() => anyhow::bail!("{}", e),
        Err(_) => {
            print_view(session.view());
            anyhow::bail!("task was not created");
        }
    }

    follow(session, rx).await?;
    if session.view().phase() == taskview_core::ViewPhase::Failed {
        anyhow::bail!("task failed");
    }
    Ok(())
}

/// `--load`: show a task, following it if it is still running
pub async fn run_load(session: &mut Session, rx: &mut UpdateReceiver, task_id: &str) -> anyhow::Result<()> {
    if session.load_task(task_id).await.is_err() {
        print_view(session.view());
        anyhow::bail!("could not load task {}", task_id);
    }
    if session.subscribed_task().is_some() {
        follow(session, rx).await
    } else {
        print_view(session.view());
        Ok(())
    }
}

fn print_history_entries(session: &Session) {
    if let Some(message) = session.history().state().message() {
        println!("{}", message);
        return;
    }
    for entry in session.history().entries() {
        println!(
            "{} {:<16} {:<10} {}",
            entry.glyph(),
            entry.created_label(),
            truncate_chars(&entry.id, 8),
            truncate_chars(&entry.prompt.replace('\n', " "), 60)
        );
    }
}

/// `--history`
pub async fn print_history(session: &mut Session) -> anyhow::Result<()> {
    session.refresh_history().await;
    print_history_entries(session);
    Ok(())
}

/// `--clear-history`
pub async fn clear_history(session: &mut Session, yes: bool) -> anyhow::Result<()> {
    let cleared = session
        .clear_history(|| yes || confirm_on_stdin("Delete all tasks?"))
        .await?;
    println!("{}", if cleared { "History cleared." } else { "Cancelled." });
    Ok(())
}

/// Interactive stdin loop
pub async fn run_interactive(
    session: &mut Session,
    rx: &mut UpdateReceiver,
    config: &Config,
) -> anyhow::Result<()> {
    let mut dark = config.is_dark();
    // Upload note waiting for the next prompt
    let mut draft = String::new();

    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        eprintln!("taskview ({})", config.server_url(None));
        eprintln!("Type a prompt to start a task, /help for commands.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(result) = commands::execute_command(input, session, &mut draft).await {
            match result {
                CommandResult::Message(msg) => println!("{}", msg),
                CommandResult::Error(msg) => eprintln!("{}", msg),
                CommandResult::ConfirmClearHistory => clear_history(session, false).await?,
                CommandResult::ShowHistory => print_history_entries(session),
                CommandResult::ToggleTheme => {
                    dark = !dark;
                    match Config::persist_dark_mode(dark) {
                        Ok(()) => println!(
                            "Theme set to {} (used by the TUI).",
                            if dark { "dark" } else { "light" }
                        ),
                        Err(e) => eprintln!("Failed to save config: {}", e),
                    }
                }
                CommandResult::Done => {
                    if session.subscribed_task().is_some() {
                        follow(session, rx).await?;
                    } else {
                        print_view(session.view());
                    }
                }
                CommandResult::Exit => break,
            }
            if !draft.is_empty() && session.staging().is_empty() {
                println!("The upload note will be added to your next prompt.");
            }
            println!();
            continue;
        }

        let prompt = format!("{}{}", input, std::mem::take(&mut draft));
        match session.submit(&prompt).await {
            Ok(_) => follow(session, rx).await?,
            Err(e) if e.is_validation() => eprintln!("{}", e),
            Err(_) => print_view(session.view()),
        }
        println!();
    }

    session.close_subscription().await;
    Ok(())
}
