use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_ASSISTANT_NAME: &str = "Love";

/// Identifier of a conversation message. Time-ordered, unique per session.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    /// Name of the slash command this message invoked, if any
    #[serde(default)]
    pub command: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>, command: Option<String>) -> Self {
        Self {
            id: MessageId::generate(),
            text: text.into(),
            role: Role::User,
            timestamp: Utc::now(),
            command,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            text: text.into(),
            role: Role::Assistant,
            timestamp: Utc::now(),
            command: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub completed: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Task {
    pub fn new(title: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: TaskId::generate(),
            title: title.into(),
            completed: false,
            priority,
            created_at: Utc::now(),
            due_date: None,
            tags: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub assistant_name: String,
    pub voice_enabled: bool,
    pub theme: Theme,
    pub language: String,
    pub notifications: bool,
    pub task_reminders: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            voice_enabled: true,
            theme: Theme::Dark,
            language: "en".to_string(),
            notifications: true,
            task_reminders: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Tasks,
    Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusMessage {
    MessageAppended {
        message: Message,
    },
    TaskCreated {
        task: Task,
    },
    TaskToggled {
        task_id: TaskId,
        completed: bool,
    },
    TaskDeleted {
        task_id: TaskId,
    },
    SettingsChanged {
        settings: Settings,
    },
    PanelChanged {
        panel: Panel,
        visible: bool,
    },
    ListeningChanged {
        listening: bool,
    },
    /// Partial transcript for live display only
    InterimTranscript {
        text: String,
    },
    VoiceUnavailable {
        reason: String,
    },
    SpeakingChanged {
        message_id: Option<MessageId>,
    },
}
