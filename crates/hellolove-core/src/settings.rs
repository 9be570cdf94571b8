use hellolove_bus::BusPublisher;
use hellolove_schema::{BusMessage, Settings, Theme};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("assistant name must not be empty")]
    EmptyAssistantName,
}

/// Partial settings change. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub assistant_name: Option<String>,
    #[serde(default)]
    pub voice_enabled: Option<bool>,
    #[serde(default)]
    pub theme: Option<Theme>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub notifications: Option<bool>,
    #[serde(default)]
    pub task_reminders: Option<bool>,
}

impl SettingsPatch {
    pub fn apply_to(self, current: &Settings) -> Settings {
        Settings {
            assistant_name: self
                .assistant_name
                .unwrap_or_else(|| current.assistant_name.clone()),
            voice_enabled: self.voice_enabled.unwrap_or(current.voice_enabled),
            theme: self.theme.unwrap_or(current.theme),
            language: self.language.unwrap_or_else(|| current.language.clone()),
            notifications: self.notifications.unwrap_or(current.notifications),
            task_reminders: self.task_reminders.unwrap_or(current.task_reminders),
        }
    }
}

/// Trims the assistant name and rejects it when nothing is left.
pub fn normalize_settings(mut settings: Settings) -> Result<Settings, SettingsError> {
    let trimmed = settings.assistant_name.trim();
    if trimmed.is_empty() {
        return Err(SettingsError::EmptyAssistantName);
    }
    if trimmed.len() != settings.assistant_name.len() {
        settings.assistant_name = trimmed.to_string();
    }
    Ok(settings)
}

/// Singleton settings record, replaced wholesale on every change.
pub struct SettingsStore {
    current: RwLock<Settings>,
    publisher: BusPublisher,
}

impl SettingsStore {
    pub fn new(initial: Settings, publisher: BusPublisher) -> Result<Self, SettingsError> {
        Ok(Self {
            current: RwLock::new(normalize_settings(initial)?),
            publisher,
        })
    }

    pub async fn get(&self) -> Settings {
        self.current.read().await.clone()
    }

    pub async fn assistant_name(&self) -> String {
        self.current.read().await.assistant_name.clone()
    }

    pub async fn update(&self, patch: SettingsPatch) -> Result<Settings, SettingsError> {
        let next = {
            let mut current = self.current.write().await;
            let next = normalize_settings(patch.apply_to(&current))?;
            *current = next.clone();
            next
        };
        self.notify(&next).await;
        Ok(next)
    }

    pub async fn replace(&self, settings: Settings) -> Result<Settings, SettingsError> {
        let next = normalize_settings(settings)?;
        *self.current.write().await = next.clone();
        self.notify(&next).await;
        Ok(next)
    }

    async fn notify(&self, settings: &Settings) {
        tracing::debug!(assistant = %settings.assistant_name, theme = ?settings.theme, "settings replaced");
        if let Err(err) = self
            .publisher
            .publish(BusMessage::SettingsChanged {
                settings: settings.clone(),
            })
            .await
        {
            tracing::warn!("failed to publish SettingsChanged: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hellolove_bus::EventBus;

    fn store() -> SettingsStore {
        SettingsStore::new(Settings::default(), EventBus::new(4).publisher()).unwrap()
    }

    #[tokio::test]
    async fn patch_changes_only_given_fields() {
        let store = store();
        let updated = store
            .update(SettingsPatch {
                theme: Some(Theme::Light),
                notifications: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.theme, Theme::Light);
        assert!(!updated.notifications);
        assert_eq!(updated.assistant_name, "Love");
        assert!(updated.task_reminders);
        assert_eq!(store.get().await, updated);
    }

    #[tokio::test]
    async fn empty_assistant_name_is_rejected() {
        let store = store();
        let err = store
            .update(SettingsPatch {
                assistant_name: Some("   ".into()),
                theme: Some(Theme::Light),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err, SettingsError::EmptyAssistantName);
        assert_eq!(store.get().await, Settings::default());
    }

    #[tokio::test]
    async fn replace_trims_name() {
        let store = store();
        let replaced = store
            .replace(Settings {
                assistant_name: "  Juno ".into(),
                ..Settings::default()
            })
            .await
            .unwrap();
        assert_eq!(replaced.assistant_name, "Juno");
        assert_eq!(store.assistant_name().await, "Juno");
    }

    #[test]
    fn new_rejects_empty_initial_name() {
        let result = SettingsStore::new(
            Settings {
                assistant_name: String::new(),
                ..Settings::default()
            },
            EventBus::new(1).publisher(),
        );
        assert!(matches!(result, Err(SettingsError::EmptyAssistantName)));
    }
}
