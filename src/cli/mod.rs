pub mod catalog_cmd;
pub mod config_cmd;
pub mod estimate_cmd;
pub mod output;
pub mod renderer;
pub mod track_cmd;
