use crate::Id;

/// Information and statistics about a [super::Client].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    id: Id,
    known_nodes: usize,
    active_nodes: usize,
    closed: bool,
}

impl Info {
    pub(crate) fn new(id: Id, known_nodes: usize, active_nodes: usize, closed: bool) -> Self {
        Self {
            id,
            known_nodes,
            active_nodes,
            closed,
        }
    }

    /// This client's [Id]
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Number of validated nodes known, active ones included.
    pub fn known_nodes(&self) -> usize {
        self.known_nodes
    }

    /// Number of nodes with an open peer handle.
    pub fn active_nodes(&self) -> usize {
        self.active_nodes
    }

    /// Returns `true` once [super::Client::close] was called.
    pub fn closed(&self) -> bool {
        self.closed
    }
}
