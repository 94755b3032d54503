use sankey_core::{DataFrame, Msg};

#[derive(Debug, Clone)]
pub struct Incoming {
    pub stream: String,
    pub kind: IncomingKind,
}

#[derive(Debug, Clone)]
pub enum IncomingKind {
    Connected,
    Disconnected,
    Frame(DataFrame),
    Other(Msg),
    Error(String),
}

impl Incoming {
    pub fn connected(stream: String) -> Self {
        Self {
            stream,
            kind: IncomingKind::Connected,
        }
    }

    pub fn disconnected(stream: String) -> Self {
        Self {
            stream,
            kind: IncomingKind::Disconnected,
        }
    }

    pub fn frame(stream: String, frame: DataFrame) -> Self {
        Self {
            stream,
            kind: IncomingKind::Frame(frame),
        }
    }

    pub fn other(stream: String, msg: Msg) -> Self {
        Self {
            stream,
            kind: IncomingKind::Other(msg),
        }
    }

    pub fn error(stream: String, msg: String) -> Self {
        Self {
            stream,
            kind: IncomingKind::Error(msg),
        }
    }
}
