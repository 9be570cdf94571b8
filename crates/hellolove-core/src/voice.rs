//! Speech-to-text capture boundary.
//!
//! The host environment supplies a [`VoiceCapture`] implementation. Each time
//! listening starts the adapter receives a [`VoiceSink`] stamped with the
//! listening generation; results from an older generation are discarded by
//! the session controller.

use anyhow::Result;
use tokio::sync::mpsc;

pub const VOICE_UNSUPPORTED_MESSAGE: &str =
    "Speech recognition is not supported in this environment.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    /// Partial result, display only
    Interim { generation: u64, text: String },
    /// Complete utterance, submitted as user input
    Final { generation: u64, text: String },
    /// The recogniser stopped on its own
    Ended { generation: u64 },
}

impl VoiceEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Interim { generation, .. }
            | Self::Final { generation, .. }
            | Self::Ended { generation } => *generation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VoiceSink {
    generation: u64,
    tx: mpsc::UnboundedSender<VoiceEvent>,
}

impl VoiceSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<VoiceEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `false` once the session is gone.
    pub fn interim(&self, text: impl Into<String>) -> bool {
        self.send(VoiceEvent::Interim {
            generation: self.generation,
            text: text.into(),
        })
    }

    pub fn finalize(&self, text: impl Into<String>) -> bool {
        self.send(VoiceEvent::Final {
            generation: self.generation,
            text: text.into(),
        })
    }

    pub fn ended(&self) -> bool {
        self.send(VoiceEvent::Ended {
            generation: self.generation,
        })
    }

    fn send(&self, event: VoiceEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

pub trait VoiceCapture: Send + Sync {
    fn is_available(&self) -> bool;

    fn start(&self, sink: VoiceSink) -> Result<()>;

    fn stop(&self);
}

/// Capture backend for hosts without speech recognition.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableVoiceCapture;

impl VoiceCapture for UnavailableVoiceCapture {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&self, _sink: VoiceSink) -> Result<()> {
        Err(anyhow::anyhow!(VOICE_UNSUPPORTED_MESSAGE))
    }

    fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_stamps_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = VoiceSink::new(7, tx);

        assert!(sink.interim("wal"));
        assert!(sink.finalize("walk dog"));

        assert_eq!(
            rx.try_recv().unwrap(),
            VoiceEvent::Interim {
                generation: 7,
                text: "wal".into()
            }
        );
        assert_eq!(rx.try_recv().unwrap().generation(), 7);
    }

    #[test]
    fn sink_reports_closed_session() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = VoiceSink::new(1, tx);
        drop(rx);
        assert!(!sink.ended());
    }

    #[test]
    fn unavailable_capture_refuses_to_start() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let capture = UnavailableVoiceCapture;
        assert!(!capture.is_available());
        assert!(capture.start(VoiceSink::new(1, tx)).is_err());
    }
}
