use uuid::Uuid;

/// Non-owning reference from a message back to the session that created it.
///
/// Resolving it means looking the session up by id; holding one never keeps the
/// session alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    pub session_id: Uuid,
    pub index: usize,
}

/// One mail transaction inside a session.
///
/// Sender, recipients, body and verdict belong to the message-processing side and are
/// not modelled here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    handle: MessageHandle,
}

impl Message {
    pub(crate) fn new(session_id: Uuid, index: usize) -> Self {
        Self {
            handle: MessageHandle { session_id, index },
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.handle.session_id
    }

    /// Position of this message within its session, starting at 0.
    pub fn index(&self) -> usize {
        self.handle.index
    }

    pub fn handle(&self) -> MessageHandle {
        self.handle
    }
}
