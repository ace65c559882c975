//! Messages left on a tree: submission, live listing and the unlock gate.

pub mod mailbox;
pub mod subscription;
pub mod unlock;

pub use mailbox::{share_path, Dashboard, Mailbox, TreeInfo};
pub use subscription::MessageSubscription;
pub use unlock::{can_reveal, MessageView};
