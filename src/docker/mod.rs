// Docker driver: container runs with streaming output, stats sampling, image inspection.

pub mod engine;
pub mod inspect;
pub mod run;
pub mod stats;
pub mod types;

pub use engine::{ensure_available, remove_container};
pub use inspect::{ImageInfo, image_present, inspect_image, pull_image};
pub use run::{run_to_end, spawn};
pub use types::{CancelToken, ContainerCommand, ContainerResult, OutputLine, ResourcePeak};
