use hellolove_bus::BusPublisher;
use hellolove_schema::{BusMessage, Message, MessageId};
use tokio::sync::RwLock;

/// Append-only message log. Insertion order is display order, newest last.
pub struct ConversationStore {
    messages: RwLock<Vec<Message>>,
    publisher: BusPublisher,
}

impl ConversationStore {
    pub fn new(publisher: BusPublisher) -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            publisher,
        }
    }

    pub async fn append(&self, message: Message) -> Message {
        self.messages.write().await.push(message.clone());
        tracing::debug!(id = %message.id, role = ?message.role, "message appended");
        if let Err(err) = self
            .publisher
            .publish(BusMessage::MessageAppended {
                message: message.clone(),
            })
            .await
        {
            tracing::warn!("failed to publish MessageAppended: {err}");
        }
        message
    }

    pub async fn get(&self, id: &MessageId) -> Option<Message> {
        self.messages
            .read()
            .await
            .iter()
            .find(|m| &m.id == id)
            .cloned()
    }

    pub async fn list(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hellolove_bus::{EventBus, Topic};
    use hellolove_schema::Role;

    #[tokio::test]
    async fn append_preserves_order_and_notifies() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe(Topic::MessageAppended).await;
        let store = ConversationStore::new(bus.publisher());

        let first = store.append(Message::user("hi", None)).await;
        let second = store.append(Message::assistant("hello")).await;

        let list = store.list().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, first.id);
        assert_eq!(list[1].id, second.id);
        assert_eq!(list[1].role, Role::Assistant);

        for expected in [&first, &second] {
            match rx.recv().await.unwrap() {
                BusMessage::MessageAppended { message } => assert_eq!(&message.id, &expected.id),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn get_finds_by_id() {
        let store = ConversationStore::new(EventBus::new(1).publisher());
        assert!(store.is_empty().await);
        let msg = store.append(Message::assistant("hello")).await;

        assert_eq!(store.get(&msg.id).await.unwrap().text, "hello");
        assert!(store.get(&MessageId("missing".into())).await.is_none());
    }
}
