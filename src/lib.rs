//! FoodCraft - terminal studio for food businesses
//!
//! A TUI that generates restaurant menus, logos, food photos, pricing
//! strategies, social calendars, promotion texts, catalog copy and brand
//! identities with an AI provider, charging image generations against a
//! per-user credit balance.

pub mod account;
pub mod adjust;
pub mod billing;
pub mod color_space;
pub mod config;
pub mod coordinator;
pub mod export;
pub mod forms;
pub mod image_loader;
pub mod input;
pub mod ledger;
pub mod logging;
pub mod perf_monitor;
pub mod prefs;
pub mod provider;
pub mod render;
pub mod scene;
pub mod session;
pub mod state;
pub mod supabase;
pub mod terminal_capabilities;
pub mod text;
pub mod tools;
pub mod ui;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
pub use tools::Tool;
