pub mod arena;
pub mod key_list;
pub mod order_list;

pub use arena::{NodeArena, NodeId};
pub use key_list::KeyList;
pub use order_list::OrderList;
