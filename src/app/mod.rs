pub mod context;
pub mod error;

pub use context::{one_shot_synchronizer, open_store, AppContext};
pub use error::{Result, SavedFeedError};
