pub mod cache;
pub mod ordering;

pub use cache::{TagCache, TagLookup};
pub use ordering::TagOrderer;
