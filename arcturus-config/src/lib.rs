pub mod loader;
pub mod staging;

pub use loader::{
    list_maps, list_sources, load_map_style, load_tileserver_config, parse_tileserver_config,
};
pub use staging::StagedConfig;
