mod activate;
mod diff;
mod download;
mod gc;
mod info;
mod resolve;
mod settings;

pub use activate::{cmd_activate, cmd_mark_success, cmd_reload};
pub use diff::cmd_diff;
pub use download::{Download, cmd_download};
pub use gc::cmd_gc;
pub use info::cmd_info;
pub use resolve::cmd_resolve;
pub use settings::{cmd_block, cmd_uuid};
