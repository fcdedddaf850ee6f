//! Named coordinator policies.

/// What happens to a user's open team leadership when they are transferred
/// to another team.
///
/// The administration backend historically left the old leadership interval
/// open, so a team could end up led by someone who is no longer an active
/// member. That behavior is kept available as `Retain` for deployments that
/// depend on it; `Release` closes the leadership interval in the same
/// transaction as the transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LeadershipOnTransfer {
    /// Close the open leadership interval of the source team.
    #[default]
    Release,
    /// Leave the leadership interval open and log a warning.
    Retain,
}
