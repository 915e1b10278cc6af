pub mod cost;
pub mod model;
