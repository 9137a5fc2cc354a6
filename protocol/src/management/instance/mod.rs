mod app_state;
mod metric;
mod module;
mod raw;
mod sanitized;

pub use app_state::*;
pub use metric::*;
pub use module::*;
pub use raw::*;
pub use sanitized::*;
