pub mod bus;
pub mod memory;
pub mod models;
pub mod store;

pub use bus::{StoreBus, StoreEvent};
pub use memory::MemoryStore;
pub use models::{
    Chat, Like, Match, Message, MessageKind, MessageStatus, NewLike, NewMessage, NewProfile,
    PairKey, Profile, ProfilePatch,
};
pub use store::{Store, StoreResult};
