pub mod block;
pub mod extract;
pub mod layout;
pub mod normalize;
pub mod prepared;
pub mod session;

pub use block::*;
pub use extract::*;
pub use layout::*;
pub use normalize::*;
pub use prepared::*;
pub use session::*;

use regex::Regex;
use std::sync::OnceLock;

/// Compile a hard-coded pattern once and hand out the shared instance
pub(crate) fn cached_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("hard-coded pattern"))
}
