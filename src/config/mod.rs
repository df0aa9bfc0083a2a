mod loader;
mod types;

pub use loader::{CONFIG_FILE, load};
pub use types::{Config, Jobs, PullPolicy};
