mod discovery;
mod parser;
mod types;

pub use discovery::{WELL_KNOWN_NAMES, discover_suites, resolve_suite_paths};
pub use parser::{load_suite, parse_suite};
pub use types::{
    CommandSpec, ExitExpect, Expect, ImageExpect, OutputExpect, Skip, Suite, TestCase,
    TestDefaults,
};
