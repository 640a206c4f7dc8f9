//! Task records, id allocation, and the persisted store.

pub mod ids;
pub mod model;
pub mod store;

pub use ids::IdAllocator;
pub use model::{Task, TaskCreated, TaskStatus, TaskUpdate, render_list};
pub use store::TaskStore;
