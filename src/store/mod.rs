pub mod traits;
pub mod memory;

pub use memory::InMemoryStore;
pub use traits::DataStore;
