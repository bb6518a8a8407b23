pub mod primary_key;
pub mod walk;

pub use primary_key::{primary_key, primary_key_for, PrimaryKey};
pub use walk::{FileStat, FileTree, Listing, LocalTree};
