//! Message types carried through a pipeline

use bytes::Bytes;

/// A published message
///
/// Cheap to clone: the payload is reference-counted `Bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Topic the message was published on
    pub topic: String,
    /// Message body
    pub payload: Bytes,
    /// MQTT quality of service level
    pub qos: u8,
    /// MQTT retain flag
    pub retain: bool,
}

impl Packet {
    /// Create a QoS 0, non-retained packet
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: 0,
            retain: false,
        }
    }

    /// Set the QoS level
    pub fn qos(mut self, qos: u8) -> Self {
        self.qos = qos.min(2);
        self
    }

    /// Set the retain flag
    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// Replace the payload, keeping topic and flags
    pub fn with_payload(self, payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            ..self
        }
    }
}

/// One item flowing through a pipeline
///
/// `buffer` turns single messages into ordered batches; everything
/// downstream of it sees batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    /// A single message
    Message(Packet),
    /// Messages grouped by a `buffer` operator, in arrival order
    Batch(Vec<Packet>),
}

impl Emission {
    /// Number of messages carried
    pub fn len(&self) -> usize {
        match self {
            Emission::Message(_) => 1,
            Emission::Batch(batch) => batch.len(),
        }
    }

    /// Whether this is an empty batch
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into messages, in order
    pub fn into_packets(self) -> Vec<Packet> {
        match self {
            Emission::Message(packet) => vec![packet],
            Emission::Batch(batch) => batch,
        }
    }
}

impl From<Packet> for Emission {
    fn from(packet: Packet) -> Self {
        Emission::Message(packet)
    }
}
