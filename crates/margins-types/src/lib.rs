pub mod api;
pub mod build_info;
pub mod manifest;
pub mod settings;
pub mod synced;
