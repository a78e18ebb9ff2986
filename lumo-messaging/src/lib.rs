pub mod echo;
pub mod inbox;
pub mod pipeline;
pub mod registry;

pub use echo::EchoGuard;
pub use inbox::{ConversationEntry, InboxFilter, InboxState};
pub use pipeline::{ChatHandle, Delivery, MessageRef, MessageView, SendFailure, Timeline};
pub use registry::InboxHandle;
