//! Tiered configuration.
//!
//! Sources, lowest to highest priority, merged field by field:
//! 1. **Defaults** - built into the binary
//! 2. **Project** - `$CWD/task-tree/config.yaml`
//! 3. **User** - `~/.task-tree/config.yaml`
//! 4. **Environment** - the variables below
//!
//! CLI flags are applied on top by `main`.
//!
//! ## Environment Variables
//! - `TASK_TREE_CONFIG_PATH` - Explicit config file (replaces project and user tiers)
//! - `TASK_TREE_PROJECT_DIR` - Project config dir (default: `./task-tree`)
//! - `TASK_TREE_USER_DIR` - User config dir (default: `~/.task-tree`)
//! - `TASK_TREE_DB_PATH` - Database path
//! - `TASK_TREE_HOST` / `TASK_TREE_PORT` - Bind address
//! - `TASK_TREE_ARCHIVE_INTERVAL` - Seconds between archive sweeps

mod loader;
mod merge;
mod types;

pub use loader::{CONFIG_FILE_NAME, ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{merge_tiers, overlay};
pub use types::*;
