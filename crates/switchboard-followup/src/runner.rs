use crate::{FollowupTurn, RunError};
use async_trait::async_trait;

/// Execution engine boundary. One call runs one turn to completion.
///
/// Implementations report contention on the session's durable state as
/// [`RunError::Locked`]; engines that only expose message text can build the error
/// with [`RunError::classify`].
#[async_trait]
pub trait FollowupRunner: Send + Sync {
    async fn run(&self, turn: FollowupTurn) -> Result<(), RunError>;
}
