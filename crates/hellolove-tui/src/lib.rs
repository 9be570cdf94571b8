use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use hellolove_bus::{EventBus, Topic};
use hellolove_core::{SessionController, SessionSnapshot, SettingsPatch, UiState};
use hellolove_schema::{
    BusMessage, Message, MessageId, Panel, Priority, Role, Settings, Task, TaskId, Theme,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;

const WELCOME_TITLE: &str = "Welcome to Hello Love";
const WELCOME_TEXT: &str = "Start a conversation by typing a message or using voice commands. \
Try /task to create a new task or /settings to customize your experience.";
const NO_TASKS_TEXT: &str = "No tasks yet. Create one using /task command.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Chat,
    Tasks,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsField {
    AssistantName,
    DarkMode,
    VoiceEnabled,
    Notifications,
    TaskReminders,
}

impl SettingsField {
    const ALL: [SettingsField; 5] = [
        SettingsField::AssistantName,
        SettingsField::DarkMode,
        SettingsField::VoiceEnabled,
        SettingsField::Notifications,
        SettingsField::TaskReminders,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::AssistantName => "Assistant Name",
            Self::DarkMode => "Dark Mode",
            Self::VoiceEnabled => "Voice Enabled",
            Self::Notifications => "Enable Notifications",
            Self::TaskReminders => "Task Reminders",
        }
    }

    fn toggle_patch(self, settings: &Settings) -> Option<SettingsPatch> {
        let patch = match self {
            Self::AssistantName => return None,
            Self::DarkMode => SettingsPatch {
                theme: Some(settings.theme.toggled()),
                ..Default::default()
            },
            Self::VoiceEnabled => SettingsPatch {
                voice_enabled: Some(!settings.voice_enabled),
                ..Default::default()
            },
            Self::Notifications => SettingsPatch {
                notifications: Some(!settings.notifications),
                ..Default::default()
            },
            Self::TaskReminders => SettingsPatch {
                task_reminders: Some(!settings.task_reminders),
                ..Default::default()
            },
        };
        Some(patch)
    }
}

/// Session mutation requested by a key press.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    Submit(String),
    ToggleTasks,
    ToggleSettings,
    ToggleListening,
    ToggleTask(TaskId),
    DeleteTask(TaskId),
    ToggleSpeech(MessageId),
    UpdateSettings(SettingsPatch),
}

struct Palette {
    text: Color,
    muted: Color,
    accent: Color,
    user: Color,
    error: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                text: Color::White,
                muted: Color::DarkGray,
                accent: Color::Magenta,
                user: Color::LightMagenta,
                error: Color::LightRed,
            },
            Theme::Light => Self {
                text: Color::Black,
                muted: Color::Gray,
                accent: Color::Blue,
                user: Color::Blue,
                error: Color::Red,
            },
        }
    }
}

struct App {
    messages: Vec<Message>,
    tasks: Vec<Task>,
    settings: Settings,
    ui: UiState,
    input: String,
    focus: Focus,
    selected_message: Option<usize>,
    selected_task: usize,
    selected_field: usize,
    name_edit: Option<String>,
    status: Option<String>,
    should_quit: bool,
}

impl App {
    fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        let focus = if snapshot.ui.show_settings {
            Focus::Settings
        } else {
            Focus::Chat
        };
        Self {
            messages: snapshot.messages,
            tasks: snapshot.tasks,
            settings: snapshot.settings,
            ui: snapshot.ui,
            input: String::new(),
            focus,
            selected_message: None,
            selected_task: 0,
            selected_field: 0,
            name_edit: None,
            status: None,
            should_quit: false,
        }
    }

    fn focus_order(&self) -> Vec<Focus> {
        let mut order = vec![if self.ui.show_settings {
            Focus::Settings
        } else {
            Focus::Chat
        }];
        if self.ui.show_tasks {
            order.push(Focus::Tasks);
        }
        order
    }

    fn fix_focus(&mut self) {
        let order = self.focus_order();
        if !order.contains(&self.focus) {
            self.focus = order[0];
        }
        if self.focus != Focus::Settings {
            self.name_edit = None;
        }
    }

    fn handle_bus_message(&mut self, msg: BusMessage) {
        match msg {
            BusMessage::MessageAppended { message } => {
                self.messages.push(message);
            }
            BusMessage::TaskCreated { task } => {
                self.tasks.push(task);
            }
            BusMessage::TaskToggled { task_id, completed } => {
                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                    task.completed = completed;
                }
            }
            BusMessage::TaskDeleted { task_id } => {
                self.tasks.retain(|t| t.id != task_id);
                self.selected_task = self.selected_task.min(self.tasks.len().saturating_sub(1));
            }
            BusMessage::SettingsChanged { settings } => {
                self.settings = settings;
            }
            BusMessage::PanelChanged { panel, visible } => {
                match panel {
                    Panel::Tasks => self.ui.show_tasks = visible,
                    Panel::Settings => {
                        self.ui.show_settings = visible;
                        if visible {
                            self.focus = Focus::Settings;
                        }
                    }
                }
                self.fix_focus();
            }
            BusMessage::ListeningChanged { listening } => {
                self.ui.listening = listening;
                if !listening {
                    self.ui.interim_transcript.clear();
                }
            }
            BusMessage::InterimTranscript { text } => {
                self.ui.interim_transcript = text;
            }
            BusMessage::VoiceUnavailable { reason } => {
                self.ui.voice_error = Some(reason);
            }
            BusMessage::SpeakingChanged { message_id } => {
                self.ui.speaking = message_id;
            }
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => {
                self.should_quit = true;
                return None;
            }
            KeyCode::F(2) => return Some(Action::ToggleTasks),
            KeyCode::F(3) => return Some(Action::ToggleSettings),
            KeyCode::F(4) => return Some(Action::ToggleListening),
            KeyCode::Tab => {
                let order = self.focus_order();
                let idx = order.iter().position(|f| *f == self.focus).unwrap_or(0);
                self.focus = order[(idx + 1) % order.len()];
                self.name_edit = None;
                return None;
            }
            _ => {}
        }

        match self.focus {
            Focus::Chat => self.on_chat_key(key),
            Focus::Tasks => self.on_tasks_key(key),
            Focus::Settings => self.on_settings_key(key),
        }
    }

    fn on_chat_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Enter => {
                let text = std::mem::take(&mut self.input);
                if text.trim().is_empty() {
                    return None;
                }
                self.selected_message = None;
                Some(Action::Submit(text.trim().to_string()))
            }
            KeyCode::Backspace => {
                self.input.pop();
                None
            }
            KeyCode::Esc => {
                self.selected_message = None;
                None
            }
            KeyCode::Up => {
                self.selected_message = match self.selected_message {
                    _ if self.messages.is_empty() => None,
                    None => Some(self.messages.len() - 1),
                    Some(idx) => Some(idx.saturating_sub(1)),
                };
                None
            }
            KeyCode::Down => {
                self.selected_message = match self.selected_message {
                    Some(idx) if idx + 1 < self.messages.len() => Some(idx + 1),
                    _ => None,
                };
                None
            }
            KeyCode::F(5) => {
                let idx = self.selected_message?;
                let message = self.messages.get(idx)?;
                Some(Action::ToggleSpeech(message.id.clone()))
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                None
            }
            _ => None,
        }
    }

    fn on_tasks_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Up => {
                self.selected_task = self.selected_task.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if self.selected_task + 1 < self.tasks.len() {
                    self.selected_task += 1;
                }
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let task = self.tasks.get(self.selected_task)?;
                Some(Action::ToggleTask(task.id.clone()))
            }
            KeyCode::Delete | KeyCode::Char('d') => {
                let task = self.tasks.get(self.selected_task)?;
                Some(Action::DeleteTask(task.id.clone()))
            }
            _ => None,
        }
    }

    fn on_settings_key(&mut self, key: KeyEvent) -> Option<Action> {
        if let Some(buffer) = self.name_edit.as_mut() {
            match key.code {
                KeyCode::Enter => {
                    let name = std::mem::take(buffer);
                    self.name_edit = None;
                    return Some(Action::UpdateSettings(SettingsPatch {
                        assistant_name: Some(name),
                        ..Default::default()
                    }));
                }
                KeyCode::Esc => self.name_edit = None,
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) => buffer.push(c),
                _ => {}
            }
            return None;
        }

        let field = SettingsField::ALL[self.selected_field];
        match key.code {
            KeyCode::Up => {
                self.selected_field = self.selected_field.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if self.selected_field + 1 < SettingsField::ALL.len() {
                    self.selected_field += 1;
                }
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') => match field {
                SettingsField::AssistantName => {
                    self.name_edit = Some(self.settings.assistant_name.clone());
                    None
                }
                other => other.toggle_patch(&self.settings).map(Action::UpdateSettings),
            },
            _ => None,
        }
    }
}

pub async fn run_tui(session: SessionController, bus: &EventBus) -> Result<()> {
    let receiver = bus.subscribe_many(&Topic::ALL).await;
    let mut app = App::from_snapshot(session.snapshot().await);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = run_app(&mut terminal, &mut app, &session, receiver).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    session: &SessionController,
    mut receiver: mpsc::Receiver<BusMessage>,
) -> Result<()> {
    loop {
        while let Ok(msg) = receiver.try_recv() {
            app.handle_bus_message(msg);
        }

        terminal.draw(|frame| ui(frame, app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = app.on_key(key) {
                        apply_action(session, app, action).await;
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

async fn apply_action(session: &SessionController, app: &mut App, action: Action) {
    app.status = None;
    match action {
        Action::Submit(text) => {
            session.submit_input(&text).await;
        }
        Action::ToggleTasks => {
            session.toggle_tasks().await;
        }
        Action::ToggleSettings => {
            session.toggle_settings().await;
        }
        Action::ToggleListening => {
            session.toggle_listening().await;
        }
        Action::ToggleTask(id) => {
            session.toggle_task(&id).await;
        }
        Action::DeleteTask(id) => {
            session.delete_task(&id).await;
        }
        Action::ToggleSpeech(id) => {
            session.toggle_speech(&id).await;
        }
        Action::UpdateSettings(patch) => {
            if let Err(err) = session.update_settings(patch).await {
                tracing::debug!("settings update rejected: {err}");
                app.status = Some(err.to_string());
            }
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let palette = Palette::for_theme(app.settings.theme);
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ♥ ", Style::default().fg(Color::Red)),
        Span::styled(
            format!("Hello {}", app.settings.assistant_name),
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ),
    ]));
    frame.render_widget(header, main_layout[0]);

    let body = if app.ui.show_tasks {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(40)])
            .split(main_layout[1])
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(100)])
            .split(main_layout[1])
    };

    if app.ui.show_settings {
        render_settings(frame, body[0], app, &palette);
    } else {
        render_chat(frame, body[0], app, &palette);
    }
    if app.ui.show_tasks {
        render_tasks(frame, body[1], app, &palette);
    }

    render_status(frame, main_layout[2], app, &palette);
}

fn panel_block<'a>(title: &'a str, focused: bool, palette: &Palette) -> Block<'a> {
    let border_style = if focused {
        Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.muted)
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style)
}

fn render_chat(frame: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let error_height = u16::from(app.ui.voice_error.is_some());
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(error_height),
        ])
        .split(area);

    let focused = app.focus == Focus::Chat;
    if app.messages.is_empty() {
        let welcome = Paragraph::new(vec![
            Line::from(Span::styled(
                WELCOME_TITLE,
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(WELCOME_TEXT, Style::default().fg(palette.muted))),
        ])
        .wrap(Wrap { trim: true })
        .block(panel_block(" Chat ", focused, palette));
        frame.render_widget(welcome, rows[0]);
    } else {
        let visible = rows[0].height.saturating_sub(2) as usize;
        let end = app
            .selected_message
            .map(|idx| idx + 1)
            .unwrap_or(app.messages.len());
        let start = end.saturating_sub(visible.max(1));
        let items: Vec<ListItem> = app.messages[start..end]
            .iter()
            .enumerate()
            .map(|(offset, message)| {
                message_item(message, app, Some(start + offset) == app.selected_message, palette)
            })
            .collect();
        let list = List::new(items).block(panel_block(" Chat ", focused, palette));
        frame.render_widget(list, rows[0]);
    }

    let input_line = if !app.ui.interim_transcript.is_empty() {
        Line::from(vec![
            Span::styled("🎤 ", Style::default().fg(palette.accent)),
            Span::styled(
                app.ui.interim_transcript.as_str(),
                Style::default().fg(palette.muted),
            ),
        ])
    } else {
        Line::from(vec![
            Span::styled("> ", Style::default().fg(palette.accent)),
            Span::styled(app.input.as_str(), Style::default().fg(palette.text)),
            Span::styled("_", Style::default().fg(palette.muted)),
        ])
    };
    let mic_title = if app.ui.listening {
        " Message [listening] "
    } else {
        " Message "
    };
    frame.render_widget(
        Paragraph::new(input_line).block(panel_block(mic_title, focused, palette)),
        rows[1],
    );

    if let Some(error) = &app.ui.voice_error {
        frame.render_widget(
            Paragraph::new(Span::styled(error.as_str(), Style::default().fg(palette.error))),
            rows[2],
        );
    }
}

fn message_item<'a>(
    message: &'a Message,
    app: &App,
    selected: bool,
    palette: &Palette,
) -> ListItem<'a> {
    let ts = message
        .timestamp
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S");
    let (speaker, color) = match message.role {
        Role::User => ("You".to_string(), palette.user),
        Role::Assistant => (app.settings.assistant_name.clone(), palette.accent),
    };
    let speaking = app.ui.speaking.as_ref() == Some(&message.id);

    let mut spans = vec![
        Span::styled(format!("[{ts}] "), Style::default().fg(palette.muted)),
        Span::styled(
            format!("{speaker}: "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(message.text.as_str(), Style::default().fg(palette.text)),
    ];
    if speaking {
        spans.push(Span::styled(" 🔊", Style::default().fg(palette.accent)));
    }

    let style = if selected {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };
    ListItem::new(Line::from(spans)).style(style)
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    }
}

fn render_tasks(frame: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let focused = app.focus == Focus::Tasks;
    let block = panel_block(" Tasks ", focused, palette);

    if app.tasks.is_empty() {
        let empty = Paragraph::new(Span::styled(NO_TASKS_TEXT, Style::default().fg(palette.muted)))
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| {
            let check = if task.completed { "[x] " } else { "[ ] " };
            let title_style = if task.completed {
                Style::default()
                    .fg(palette.muted)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default().fg(palette.text)
            };
            let mut style = Style::default();
            if focused && idx == app.selected_task {
                style = style.add_modifier(Modifier::REVERSED);
            }
            ListItem::new(Line::from(vec![
                Span::styled("● ", Style::default().fg(priority_color(task.priority))),
                Span::raw(check),
                Span::styled(task.title.as_str(), title_style),
            ]))
            .style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_settings(frame: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let focused = app.focus == Focus::Settings;
    let items: Vec<ListItem> = SettingsField::ALL
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let value = match field {
                SettingsField::AssistantName => match &app.name_edit {
                    Some(buffer) => format!("{buffer}_"),
                    None => app.settings.assistant_name.clone(),
                },
                SettingsField::DarkMode => on_off(app.settings.theme == Theme::Dark),
                SettingsField::VoiceEnabled => on_off(app.settings.voice_enabled),
                SettingsField::Notifications => on_off(app.settings.notifications),
                SettingsField::TaskReminders => on_off(app.settings.task_reminders),
            };
            let mut style = Style::default().fg(palette.text);
            if focused && idx == app.selected_field {
                style = style.add_modifier(Modifier::REVERSED);
            }
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<22}", field.label()), style),
                Span::styled(value, Style::default().fg(palette.accent)),
            ]))
        })
        .collect();

    frame.render_widget(
        List::new(items).block(panel_block(" Settings ", focused, palette)),
        area,
    );
}

fn on_off(value: bool) -> String {
    if value { "on" } else { "off" }.to_string()
}

fn render_status(frame: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let key_style = Style::default()
        .fg(palette.text)
        .add_modifier(Modifier::BOLD);
    let hint_style = Style::default().fg(palette.muted);

    let mut spans = vec![
        Span::styled(" [^C]", key_style),
        Span::styled(" quit ", hint_style),
        Span::styled("[F2]", key_style),
        Span::styled(" tasks ", hint_style),
        Span::styled("[F3]", key_style),
        Span::styled(" settings ", hint_style),
        Span::styled("[F4]", key_style),
        Span::styled(" mic ", hint_style),
        Span::styled("[F5]", key_style),
        Span::styled(" speak ", hint_style),
        Span::styled("[Tab]", key_style),
        Span::styled(" focus ", hint_style),
    ];
    if let Some(status) = &app.status {
        spans.push(Span::styled(
            format!("| {status} "),
            Style::default().fg(palette.error),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_app() -> App {
        App::from_snapshot(SessionSnapshot {
            messages: vec![],
            tasks: vec![],
            settings: Settings::default(),
            ui: UiState::default(),
        })
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            assert!(app.on_key(press(KeyCode::Char(c))).is_none());
        }
    }

    #[test]
    fn enter_submits_trimmed_input() {
        let mut app = empty_app();
        type_text(&mut app, " /task Walk dog ");

        let action = app.on_key(press(KeyCode::Enter));
        assert_eq!(action, Some(Action::Submit("/task Walk dog".into())));
        assert!(app.input.is_empty());
    }

    #[test]
    fn blank_input_is_not_submitted() {
        let mut app = empty_app();
        type_text(&mut app, "   ");
        assert!(app.on_key(press(KeyCode::Enter)).is_none());
    }

    #[test]
    fn bus_messages_update_view() {
        let mut app = empty_app();
        let task = Task::new("Walk dog", Priority::Medium);
        let task_id = task.id.clone();

        app.handle_bus_message(BusMessage::MessageAppended {
            message: Message::user("/task Walk dog", Some("task".into())),
        });
        app.handle_bus_message(BusMessage::TaskCreated { task });
        app.handle_bus_message(BusMessage::TaskToggled {
            task_id: task_id.clone(),
            completed: true,
        });

        assert_eq!(app.messages.len(), 1);
        assert!(app.tasks[0].completed);

        app.handle_bus_message(BusMessage::TaskDeleted { task_id });
        assert!(app.tasks.is_empty());
    }

    #[test]
    fn settings_panel_takes_focus() {
        let mut app = empty_app();
        app.handle_bus_message(BusMessage::PanelChanged {
            panel: Panel::Settings,
            visible: true,
        });
        assert_eq!(app.focus, Focus::Settings);

        app.handle_bus_message(BusMessage::PanelChanged {
            panel: Panel::Settings,
            visible: false,
        });
        assert_eq!(app.focus, Focus::Chat);
    }

    #[test]
    fn task_panel_keys_target_selected_task() {
        let mut app = empty_app();
        let first = Task::new("a", Priority::Low);
        let second = Task::new("b", Priority::High);
        let second_id = second.id.clone();
        app.handle_bus_message(BusMessage::TaskCreated { task: first });
        app.handle_bus_message(BusMessage::TaskCreated { task: second });
        app.handle_bus_message(BusMessage::PanelChanged {
            panel: Panel::Tasks,
            visible: true,
        });

        assert!(app.on_key(press(KeyCode::Tab)).is_none());
        assert_eq!(app.focus, Focus::Tasks);
        app.on_key(press(KeyCode::Down));

        assert_eq!(
            app.on_key(press(KeyCode::Char(' '))),
            Some(Action::ToggleTask(second_id.clone()))
        );
        assert_eq!(
            app.on_key(press(KeyCode::Delete)),
            Some(Action::DeleteTask(second_id))
        );
    }

    #[test]
    fn settings_form_edits_name_and_toggles() {
        let mut app = empty_app();
        app.handle_bus_message(BusMessage::PanelChanged {
            panel: Panel::Settings,
            visible: true,
        });

        assert!(app.on_key(press(KeyCode::Enter)).is_none());
        for _ in 0.."Love".len() {
            app.on_key(press(KeyCode::Backspace));
        }
        type_text(&mut app, "Juno");
        assert_eq!(
            app.on_key(press(KeyCode::Enter)),
            Some(Action::UpdateSettings(SettingsPatch {
                assistant_name: Some("Juno".into()),
                ..Default::default()
            }))
        );

        app.on_key(press(KeyCode::Down));
        assert_eq!(
            app.on_key(press(KeyCode::Char(' '))),
            Some(Action::UpdateSettings(SettingsPatch {
                theme: Some(Theme::Light),
                ..Default::default()
            }))
        );
    }

    #[test]
    fn speak_key_targets_selected_message() {
        let mut app = empty_app();
        let reply = Message::assistant("Hello!");
        let reply_id = reply.id.clone();
        app.handle_bus_message(BusMessage::MessageAppended { message: reply });

        assert!(app.on_key(press(KeyCode::F(5))).is_none());
        app.on_key(press(KeyCode::Up));
        assert_eq!(
            app.on_key(press(KeyCode::F(5))),
            Some(Action::ToggleSpeech(reply_id))
        );
    }

    #[test]
    fn ctrl_c_quits() {
        let mut app = empty_app();
        app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }
}
