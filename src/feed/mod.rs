//! Feed synchronization: paginated merge, dedup by id, optimistic mutations.

mod comments;
mod page;
mod synchronizer;

pub use comments::CommentThread;
pub use page::{LoadGate, LoadMode, LoadTicket, PageBuffer};
pub use synchronizer::{FeedState, FeedSynchronizer, LoadOutcome};
