/// The current state of a logical fetch.
///
/// A fetch moves `Building → Sending → Received` and then ends in `Done`
/// or `Failed`, or loops back through `Redirecting` to `Building`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing started yet.
    #[default]
    Idle,

    /// Assembling URL, headers, cookies and body.
    Building,

    /// Acquiring a connection and writing the request.
    Sending,

    /// Response headers and body read; status not yet classified.
    Received,

    /// Following a `Location` header.
    Redirecting,

    /// A response was produced for the caller.
    Done,

    /// The fetch ended with an error.
    Failed,
}

impl LoadState {
    /// Whether the state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Done | LoadState::Failed)
    }
}
