pub mod recency_list;
pub mod slot_arena;

pub use recency_list::{RecencyIter, RecencyList, RecencyRevIter};
pub use slot_arena::{SlotArena, SlotId};
