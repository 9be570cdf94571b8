//! Slash command parser and handler registry.
//!
//! Interpretation is pure: handlers describe the state change they want as an
//! [`Effect`] and the session controller applies it. Text that is not a slash
//! command yields an empty [`Interpretation`] so the caller can fall back to
//! the default assistant reply.

use std::collections::BTreeMap;
use std::sync::Arc;

use hellolove_schema::Priority;

/// State change requested by a command, applied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    CreateTask { title: String, priority: Priority },
    OpenSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interpretation {
    pub response_text: Option<String>,
    pub effect: Option<Effect>,
    /// Command name when the input was a slash command, known or not
    pub command: Option<String>,
}

impl Interpretation {
    pub fn passthrough() -> Self {
        Self::default()
    }

    pub fn is_command(&self) -> bool {
        self.command.is_some()
    }
}

/// A slash command split into name and raw argument string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub name: &'a str,
    pub args: &'a str,
}

/// Line terminators that end the argument string.
const LINE_TERMINATORS: [char; 4] = ['\n', '\r', '\u{2028}', '\u{2029}'];

/// Matches `^/(\w+)\s*(.*)` against trimmed input. `\w` is ASCII word
/// characters; the arguments stop at the first line terminator.
pub fn parse_command(text: &str) -> Option<ParsedCommand<'_>> {
    let rest = text.trim().strip_prefix('/')?;
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }

    let (name, tail) = rest.split_at(name_len);
    let tail = tail.trim_start();
    let args = tail
        .find(LINE_TERMINATORS)
        .map_or(tail, |end| &tail[..end]);
    Some(ParsedCommand { name, args })
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn handle(&self, args: &str) -> Interpretation;
}

/// `/task <title>` creates a medium-priority task.
pub struct TaskCommand;

impl CommandHandler for TaskCommand {
    fn name(&self) -> &str {
        "task"
    }

    fn description(&self) -> &str {
        "Create a new task: /task <title>"
    }

    fn handle(&self, args: &str) -> Interpretation {
        Interpretation {
            response_text: Some(format!("Created new task: {args}")),
            effect: Some(Effect::CreateTask {
                title: args.to_string(),
                priority: Priority::Medium,
            }),
            command: Some(self.name().to_string()),
        }
    }
}

/// `/settings` opens the settings panel.
pub struct SettingsCommand;

impl CommandHandler for SettingsCommand {
    fn name(&self) -> &str {
        "settings"
    }

    fn description(&self) -> &str {
        "Open the settings panel"
    }

    fn handle(&self, _args: &str) -> Interpretation {
        Interpretation {
            response_text: Some("Opening settings...".to_string()),
            effect: Some(Effect::OpenSettings),
            command: Some(self.name().to_string()),
        }
    }
}

#[derive(Default, Clone)]
pub struct CommandRegistry {
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any previous handler with the same name.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.insert(handler.name().to_string(), handler)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(name)
    }

    /// `(name, description)` pairs sorted by name.
    pub fn describe(&self) -> Vec<(&str, &str)> {
        self.handlers
            .values()
            .map(|h| (h.name(), h.description()))
            .collect()
    }
}

#[derive(Clone)]
pub struct CommandInterpreter {
    registry: CommandRegistry,
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CommandInterpreter {
    pub fn new(registry: CommandRegistry) -> Self {
        Self { registry }
    }

    pub fn with_builtins() -> Self {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(TaskCommand));
        registry.register(Arc::new(SettingsCommand));
        Self { registry }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    pub fn interpret(&self, raw: &str) -> Interpretation {
        let Some(parsed) = parse_command(raw) else {
            return Interpretation::passthrough();
        };

        match self.registry.get(parsed.name) {
            Some(handler) => handler.handle(parsed.args),
            None => Interpretation {
                response_text: Some(format!("Unknown command: {}", parsed.name)),
                effect: None,
                command: Some(parsed.name.to_string()),
            },
        }
    }
}
