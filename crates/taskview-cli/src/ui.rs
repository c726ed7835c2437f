//! TUI implementation for taskview

use crate::commands::{CommandResult, execute_command};
use crate::config::Config;
use crossterm::event::{Event, EventStream, KeyEventKind, MouseEventKind};
use futures::StreamExt;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use std::time::{Duration, Instant};
use taskview_core::{Session, SessionUpdate, UpdateReceiver, ViewPhase};
use taskview_tui::{
    App, Theme,
    input::{Action, key_to_action},
    widgets::{
        HistoryPanel, Popup, PromptInput, Spinner, StagingBar, TaskPanel, task_panel::content_height,
    },
};

/// Narrower terminals hide the history panel
const HISTORY_MIN_WIDTH: u16 = 90;
const HISTORY_WIDTH: u16 = 36;
const PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Prompt,
    History,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Modal {
    ConfirmClearHistory,
    Notice { title: String, message: String },
}

/// Session work queued by a key press, run after the next redraw
#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Submit(String),
    Command(String),
    OpenEntry(usize),
    RefreshHistory,
    ClearHistory,
    Upload,
}

impl Op {
    fn label(&self) -> &'static str {
        match self {
            Op::Submit(_) => "Submitting...",
            Op::Command(_) => "Running command...",
            Op::OpenEntry(_) => "Loading task...",
            Op::RefreshHistory => "Loading history...",
            Op::ClearHistory => "Clearing history...",
            Op::Upload => "Uploading...",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
    Run(Op),
}

/// TUI application state
pub struct TuiState {
    session: Session,
    prompt: PromptInput,
    /// First visible row of the task panel
    scroll: usize,
    /// Stick to the bottom as rows arrive
    follow: bool,
    /// Largest useful scroll at the last render
    max_scroll: usize,
    focus: Focus,
    history_selected: usize,
    theme: Theme,
    modal: Option<Modal>,
    /// Label of the request in flight
    busy: Option<&'static str>,
    status: String,
    spinner_start: Instant,
}

impl TuiState {
    pub fn new(session: Session, theme: Theme) -> Self {
        let mut prompt = PromptInput::new()
            .with_placeholder("Describe a task, or /help...")
            .with_title("Prompt");
        prompt.set_focused(true);

        Self {
            session,
            prompt,
            scroll: 0,
            follow: true,
            max_scroll: 0,
            focus: Focus::Prompt,
            history_selected: 0,
            theme,
            modal: None,
            busy: None,
            status: "Ready".to_string(),
            spinner_start: Instant::now(),
        }
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.prompt.set_focused(focus == Focus::Prompt);
    }

    fn notice(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.modal = Some(Modal::Notice {
            title: title.into(),
            message: message.into(),
        });
    }

    fn scroll_up(&mut self, rows: usize) {
        if self.follow {
            self.scroll = self.max_scroll;
        }
        self.follow = false;
        self.scroll = self.scroll.saturating_sub(rows);
    }

    fn scroll_down(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_add(rows);
        if self.scroll >= self.max_scroll {
            self.follow = true;
        }
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        self.status = match Config::persist_dark_mode(self.theme.dark) {
            Ok(()) => format!("Theme: {}", if self.theme.dark { "dark" } else { "light" }),
            Err(e) => format!("Failed to save theme: {}", e),
        };
    }

    /// Apply a subscription update. Returns whether history should be
    /// reloaded.
    fn apply(&mut self, update: SessionUpdate) -> bool {
        let releases = update.update.releases_subscription();
        self.session.apply(update) && releases
    }

    fn handle_modal_key(&mut self, modal: Modal, action: &Action) -> Flow {
        match modal {
            Modal::ConfirmClearHistory => match action {
                Action::Char('y') | Action::Char('Y') | Action::Submit => {
                    self.modal = None;
                    Flow::Run(Op::ClearHistory)
                }
                Action::Char('n') | Action::Char('N') | Action::Escape | Action::Interrupt => {
                    self.modal = None;
                    self.status = "Cancelled".to_string();
                    Flow::Continue
                }
                _ => Flow::Continue,
            },
            Modal::Notice { .. } => {
                self.modal = None;
                Flow::Continue
            }
        }
    }

    fn handle_action(&mut self, action: Action, width: u16) -> Flow {
        if let Some(modal) = self.modal.clone() {
            return self.handle_modal_key(modal, &action);
        }

        match action {
            Action::Quit => Flow::Quit,
            Action::Interrupt => {
                if self.prompt.content().is_empty() {
                    Flow::Quit
                } else {
                    self.prompt.clear();
                    Flow::Continue
                }
            }
            Action::ToggleTheme => {
                self.toggle_theme();
                Flow::Continue
            }
            Action::RefreshHistory => Flow::Run(Op::RefreshHistory),
            Action::ClearHistory => {
                self.modal = Some(Modal::ConfirmClearHistory);
                Flow::Continue
            }
            Action::Upload => Flow::Run(Op::Upload),
            Action::Tab | Action::BackTab => {
                let next = match self.focus {
                    Focus::Prompt => Focus::History,
                    Focus::History => Focus::Prompt,
                };
                self.set_focus(next);
                Flow::Continue
            }
            Action::PageUp => {
                self.scroll_up(PAGE);
                Flow::Continue
            }
            Action::PageDown => {
                self.scroll_down(PAGE);
                Flow::Continue
            }
            action if self.focus == Focus::History => self.handle_history_action(action),
            Action::Submit => {
                let content = self.prompt.content().to_string();
                if content.trim_start().starts_with('/') {
                    Flow::Run(Op::Command(self.prompt.take()))
                } else {
                    Flow::Run(Op::Submit(content))
                }
            }
            Action::Up => {
                self.scroll_up(1);
                Flow::Continue
            }
            Action::Down => {
                self.scroll_down(1);
                Flow::Continue
            }
            action => {
                self.prompt.handle_action(&action, width);
                Flow::Continue
            }
        }
    }

    fn handle_history_action(&mut self, action: Action) -> Flow {
        let count = self.session.history().entries().len();
        match action {
            Action::Up => {
                self.history_selected = self.history_selected.saturating_sub(1);
                Flow::Continue
            }
            Action::Down => {
                if self.history_selected + 1 < count {
                    self.history_selected += 1;
                }
                Flow::Continue
            }
            Action::Submit if self.history_selected < count => {
                Flow::Run(Op::OpenEntry(self.history_selected))
            }
            Action::Escape => {
                self.set_focus(Focus::Prompt);
                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }

    /// Run a queued operation. Returns false to quit.
    async fn run(&mut self, op: Op) -> bool {
        tracing::debug!(?op, "running ui operation");
        match op {
            Op::Submit(prompt) => match self.session.submit(&prompt).await {
                Ok(_) => {
                    self.prompt.clear();
                    self.follow = true;
                    self.status = "Task created".to_string();
                }
                Err(e) if e.is_validation() => self.notice("Invalid prompt", e.to_string()),
                Err(_) => self.status = "Request failed".to_string(),
            },
            Op::Command(input) => return self.run_command(&input).await,
            Op::OpenEntry(index) => {
                // Failures are rendered in the task panel
                let _ = self.session.open_history_entry(index).await;
                self.follow = true;
                self.set_focus(Focus::Prompt);
            }
            Op::RefreshHistory => {
                self.session.refresh_history().await;
                self.clamp_history_selection();
            }
            Op::ClearHistory => match self.session.clear_history(|| true).await {
                Ok(_) => {
                    self.history_selected = 0;
                    self.scroll = 0;
                    self.follow = true;
                    self.status = "History cleared".to_string();
                }
                Err(e) => self.notice("Error", format!("Failed to clear history: {}", e)),
            },
            Op::Upload => {
                let mut content = self.prompt.content().to_string();
                match self.session.commit_uploads(&mut content).await {
                    Ok(Some(_)) => {
                        self.prompt.edit(|p| *p = content);
                        self.status = "Files uploaded".to_string();
                    }
                    Ok(None) => self.status = "No files staged".to_string(),
                    Err(e) => self.notice("Upload failed", e.to_string()),
                }
            }
        }
        true
    }

    async fn run_command(&mut self, input: &str) -> bool {
        let mut note = String::new();
        let result = execute_command(input, &mut self.session, &mut note).await;
        if !note.is_empty() {
            self.prompt.edit(|p| p.push_str(&note));
        }

        match result {
            Some(CommandResult::Message(msg)) if msg.contains('\n') => self.notice("taskview", msg),
            Some(CommandResult::Message(msg)) => self.status = msg,
            Some(CommandResult::Error(msg)) => self.notice("Error", msg),
            Some(CommandResult::ConfirmClearHistory) => self.modal = Some(Modal::ConfirmClearHistory),
            Some(CommandResult::ShowHistory) => {
                self.clamp_history_selection();
                self.set_focus(Focus::History);
            }
            Some(CommandResult::ToggleTheme) => self.toggle_theme(),
            Some(CommandResult::Done) => self.follow = true,
            Some(CommandResult::Exit) => return false,
            None => {}
        }
        true
    }

    fn clamp_history_selection(&mut self) {
        let count = self.session.history().entries().len();
        self.history_selected = self.history_selected.min(count.saturating_sub(1));
    }

    /// Render the UI
    pub fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        let (main, side) = if size.width >= HISTORY_MIN_WIDTH {
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(40), Constraint::Length(HISTORY_WIDTH)])
                .split(size);
            (cols[0], Some(cols[1]))
        } else {
            (size, None)
        };

        let staging_height = if self.session.staging().is_empty() { 0 } else { 1 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),                 // Task
                Constraint::Length(1),              // Status
                Constraint::Length(staging_height), // Staged files
                Constraint::Length(3),              // Prompt
            ])
            .split(main);

        self.render_task(frame, chunks[0]);
        self.render_status(frame, chunks[1]);
        frame.render_widget(
            StagingBar::new(self.session.staging(), &self.theme),
            chunks[2],
        );
        self.prompt
            .render(chunks[3], frame.buffer_mut(), &self.theme);

        if let Some(side) = side {
            let selected = (self.focus == Focus::History).then_some(self.history_selected);
            let panel = HistoryPanel::new(self.session.history(), &self.theme)
                .selected(selected)
                .focused(self.focus == Focus::History);
            frame.render_widget(panel, side);
        }

        match &self.modal {
            Some(Modal::ConfirmClearHistory) => frame.render_widget(
                Popup::confirm(
                    "Clear history",
                    "Delete all tasks? This cannot be undone.",
                    &self.theme,
                ),
                size,
            ),
            Some(Modal::Notice { title, message }) => {
                frame.render_widget(Popup::notice(title, message, &self.theme), size)
            }
            None => {}
        }
    }

    fn render_task(&mut self, frame: &mut Frame, area: Rect) {
        let view = self.session.view();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(format!(" taskview │ {} ", view.title()));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 || view.phase() == ViewPhase::Idle {
            frame.render_widget(welcome(&self.theme), inner);
            return;
        }

        let content_height = content_height(view, &self.theme, inner.width as usize);
        self.max_scroll = content_height.saturating_sub(inner.height as usize);
        self.scroll = if self.follow {
            self.max_scroll
        } else {
            self.scroll.min(self.max_scroll)
        };

        let panel = TaskPanel::new(view, &self.theme).scroll(self.scroll);
        frame.render_widget(panel, inner);

        if content_height > inner.height as usize {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");

            let mut scrollbar_state = ScrollbarState::new(content_height)
                .position(self.scroll)
                .viewport_content_length(inner.height as usize);

            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
        }
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let view = self.session.view();
        let live_label = view
            .status_line()
            .map(|s| s.text())
            .unwrap_or_else(|| "Waiting for events...".to_string());

        if let Some(label) = self.busy {
            let spinner = Spinner::new(label, &self.theme).with_start_time(self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }
        if view.phase().is_live() {
            let spinner =
                Spinner::new(&live_label, &self.theme).with_start_time(self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }

        let left = match view.status_line() {
            Some(line) => format!("{} │ {}", line.text(), self.status),
            None => self.status.clone(),
        };
        let right = "Tab: history │ Ctrl+O: upload │ Ctrl+T: theme │ Ctrl+Q: quit";

        let left_width = left.chars().count();
        let right_width = right.chars().count();
        let available = area.width as usize;

        let line = if left_width + right_width + 2 <= available {
            let spacing = available - left_width - right_width;
            Line::from(vec![
                Span::styled(left, self.theme.dim_style()),
                Span::raw(" ".repeat(spacing)),
                Span::styled(right, self.theme.dim_style()),
            ])
        } else {
            Line::from(Span::styled(left, self.theme.dim_style()))
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn welcome(theme: &Theme) -> Paragraph<'static> {
    let key = |k: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(format!("    {:<10}", k), theme.accent_style()),
            Span::styled(what, theme.base_style()),
        ])
    };

    Paragraph::new(vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  ⚙ ", theme.accent_bold()),
            Span::styled("taskview", theme.accent_bold()),
            Span::styled(" - follow tasks as they run", theme.dim_style()),
        ]),
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled("  Keybindings", theme.warning_style())),
        Line::from(""),
        key("Enter", "Start a task"),
        key("Tab", "Switch to history (Enter opens a task)"),
        key("Ctrl+R", "Reload history"),
        key("Ctrl+X", "Clear history"),
        key("Ctrl+O", "Upload staged files"),
        key("Ctrl+T", "Switch theme"),
        key("PgUp/Dn", "Scroll the task"),
        key("Ctrl+C", "Clear prompt / Quit"),
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled(
            "  Type a prompt to get started, or /help for commands...",
            theme.dim_style(),
        )),
    ])
}

/// Run the TUI application
pub async fn run_tui(session: Session, mut rx: UpdateReceiver, config: &Config) -> anyhow::Result<()> {
    let mut app = App::new()?;
    let mut state = TuiState::new(session, Theme::from_dark_mode(config.is_dark()));

    let mut event_stream = EventStream::new();

    // Tick interval for animations (80ms for smooth spinner)
    let mut tick_interval = tokio::time::interval(Duration::from_millis(80));

    // Run at the start of the next iteration, after the spinner is drawn
    let mut pending: Option<Op> = Some(Op::RefreshHistory);

    let result = loop {
        state.busy = pending.as_ref().map(Op::label);
        app.draw(|frame| state.render(frame))?;

        if let Some(op) = pending.take() {
            state.spinner_start = Instant::now();
            let keep_going = state.run(op).await;
            state.busy = None;
            if !keep_going {
                break Ok(());
            }
            continue;
        }

        let area_width = app.width()?;

        tokio::select! {
            biased;

            update = rx.recv() => {
                if let Some(update) = update {
                    if state.apply(update) {
                        pending = Some(Op::RefreshHistory);
                    }
                }
            }

            event = event_stream.next() => {
                match event {
                    Some(Ok(Event::Key(key))) if key.kind != KeyEventKind::Release => {
                        match state.handle_action(key_to_action(key), area_width) {
                            Flow::Continue => {}
                            Flow::Quit => break Ok(()),
                            Flow::Run(op) => pending = Some(op),
                        }
                    }
                    Some(Ok(Event::Paste(text))) => {
                        state.handle_action(Action::Paste(text), area_width);
                    }
                    Some(Ok(Event::Mouse(mouse))) => match mouse.kind {
                        MouseEventKind::ScrollUp => state.scroll_up(3),
                        MouseEventKind::ScrollDown => state.scroll_down(3),
                        _ => {}
                    },
                    Some(Err(e)) => break Err(anyhow::anyhow!("Event error: {}", e)),
                    None => break Ok(()),
                    _ => {}
                }
            }

            _ = tick_interval.tick() => {}
        }
    };

    state.session.close_subscription().await;
    drop(app);
    result
}
