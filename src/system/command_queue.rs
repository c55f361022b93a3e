use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::connection::key::ConnectionKey;
use crate::messages::inbound::InboundEnvelope;

pub(crate) enum ConnectionCommand {
    Connect(ConnectionKey, Receiver<InboundEnvelope>),
    Disconnect(ConnectionKey),
}

struct QueueInner {
    next_key: u64,
    commands: Vec<ConnectionCommand>,
}

/// Transport-facing handle for registering and removing connections.
///
/// Safe to use from I/O threads concurrently with `tick()`: commands are
/// parked behind the lock and drained at the next tick boundary, so a tick
/// either fully includes or fully excludes a connection, never partially.
#[derive(Clone)]
pub struct ConnectionCommandQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl ConnectionCommandQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                next_key: 1,
                commands: Vec::new(),
            })),
        }
    }

    /// Announces a transport-level connect. Returns the connection's key and
    /// the sender its I/O task feeds raw inbound messages into.
    pub fn connect(&self) -> (ConnectionKey, Sender<InboundEnvelope>) {
        let (sender, receiver) = channel();
        let mut inner = self.inner.lock().expect("connection command queue poisoned");
        let key = ConnectionKey::new(inner.next_key);
        inner.next_key += 1;
        inner.commands.push(ConnectionCommand::Connect(key, receiver));
        (key, sender)
    }

    /// Announces a transport-level disconnect. Idempotent.
    pub fn disconnect(&self, key: ConnectionKey) {
        let mut inner = self.inner.lock().expect("connection command queue poisoned");
        inner.commands.push(ConnectionCommand::Disconnect(key));
    }

    pub(crate) fn drain(&self) -> Vec<ConnectionCommand> {
        let mut inner = self.inner.lock().expect("connection command queue poisoned");
        std::mem::take(&mut inner.commands)
    }
}
