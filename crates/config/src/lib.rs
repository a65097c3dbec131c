//! Settings loading, persistence, and env substitution.
//!
//! Settings live in a single per-user `settings.json`, searched in `./` then
//! the platform config dir (`~/.config/hikari/` on Linux). Supports
//! `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_config_dir, config_dir, discover_and_load, find_or_default_settings_path,
        load_settings, save_settings, set_config_dir,
    },
    schema::{McpServerEntry, ServerSettings, Settings, TransportKind},
};
