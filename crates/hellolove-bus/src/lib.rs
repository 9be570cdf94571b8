use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use hellolove_schema::BusMessage;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Topic {
    MessageAppended,
    TaskCreated,
    TaskToggled,
    TaskDeleted,
    SettingsChanged,
    PanelChanged,
    ListeningChanged,
    InterimTranscript,
    VoiceUnavailable,
    SpeakingChanged,
}

impl Topic {
    pub const ALL: [Topic; 10] = [
        Topic::MessageAppended,
        Topic::TaskCreated,
        Topic::TaskToggled,
        Topic::TaskDeleted,
        Topic::SettingsChanged,
        Topic::PanelChanged,
        Topic::ListeningChanged,
        Topic::InterimTranscript,
        Topic::VoiceUnavailable,
        Topic::SpeakingChanged,
    ];

    pub fn from_message(msg: &BusMessage) -> Self {
        match msg {
            BusMessage::MessageAppended { .. } => Topic::MessageAppended,
            BusMessage::TaskCreated { .. } => Topic::TaskCreated,
            BusMessage::TaskToggled { .. } => Topic::TaskToggled,
            BusMessage::TaskDeleted { .. } => Topic::TaskDeleted,
            BusMessage::SettingsChanged { .. } => Topic::SettingsChanged,
            BusMessage::PanelChanged { .. } => Topic::PanelChanged,
            BusMessage::ListeningChanged { .. } => Topic::ListeningChanged,
            BusMessage::InterimTranscript { .. } => Topic::InterimTranscript,
            BusMessage::VoiceUnavailable { .. } => Topic::VoiceUnavailable,
            BusMessage::SpeakingChanged { .. } => Topic::SpeakingChanged,
        }
    }
}

type Subscriber = mpsc::Sender<BusMessage>;
type SubscriberMap = Arc<RwLock<HashMap<Topic, Vec<Subscriber>>>>;

pub struct EventBus {
    subscribers: SubscriberMap,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        subs.entry(topic).or_default().push(tx);
        rx
    }

    /// Subscribes one receiver to several topics, preserving publish order
    /// across them.
    pub async fn subscribe_many(&self, topics: &[Topic]) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscribers.write().await;
        for topic in topics {
            subs.entry(*topic).or_default().push(tx.clone());
        }
        rx
    }

    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        deliver(&self.subscribers, msg).await
    }

    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            subscribers: self.subscribers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BusPublisher {
    subscribers: SubscriberMap,
}

impl BusPublisher {
    pub async fn publish(&self, msg: BusMessage) -> Result<()> {
        deliver(&self.subscribers, msg).await
    }
}

async fn deliver(subscribers: &SubscriberMap, msg: BusMessage) -> Result<()> {
    let topic = Topic::from_message(&msg);
    let mut subs = subscribers.write().await;
    if let Some(list) = subs.get_mut(&topic) {
        list.retain(|tx| !tx.is_closed());
        for tx in list.iter() {
            if tx.try_send(msg.clone()).is_err() {
                tracing::debug!(?topic, "subscriber queue full, event dropped");
            }
        }
    }
    Ok(())
}
