//! tracedrill core library: trace store, call graph builder and drill-down queries.

mod analysis;
mod calltree;
mod config;
mod drill;
mod error;
mod fsutil;
mod row;
mod session_cmd;
mod store;
mod template;

pub use analysis::*;
pub use calltree::*;
pub use config::*;
pub use drill::*;
pub use error::*;
pub use fsutil::*;
pub use row::*;
pub use session_cmd::*;
pub use store::*;
pub use template::*;
