//! Text-to-speech output boundary. At most one utterance plays at a time.

use anyhow::Result;
use hellolove_schema::MessageId;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub message_id: MessageId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Finished { message_id: MessageId, seq: u64 },
}

/// Completion callback for one utterance. `seq` distinguishes repeated
/// playback of the same message.
#[derive(Debug, Clone)]
pub struct SpeechSink {
    message_id: MessageId,
    seq: u64,
    tx: mpsc::UnboundedSender<SpeechEvent>,
}

impl SpeechSink {
    pub fn new(message_id: MessageId, seq: u64, tx: mpsc::UnboundedSender<SpeechEvent>) -> Self {
        Self { message_id, seq, tx }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn finished(&self) -> bool {
        self.tx
            .send(SpeechEvent::Finished {
                message_id: self.message_id.clone(),
                seq: self.seq,
            })
            .is_ok()
    }
}

pub trait SpeechOutput: Send + Sync {
    fn speak(&self, utterance: Utterance, sink: SpeechSink) -> Result<()>;

    fn cancel(&self);
}

/// Output backend with no audio device: every utterance finishes at once.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSpeechOutput;

impl SpeechOutput for SilentSpeechOutput {
    fn speak(&self, utterance: Utterance, sink: SpeechSink) -> Result<()> {
        tracing::debug!(message_id = %utterance.message_id, "silent speech output");
        sink.finished();
        Ok(())
    }

    fn cancel(&self) {}
}
