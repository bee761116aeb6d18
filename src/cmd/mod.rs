//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `board`  | `Show`, `Move`   |
//! | `serve`  | `Serve`          |
//! | `config` | `Config`         |

pub mod board;
pub mod config;
pub mod serve;

pub use board::{cmd_move, cmd_show};
pub use config::cmd_config;
pub use serve::cmd_serve;
