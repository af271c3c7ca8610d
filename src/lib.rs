pub mod api;
pub mod component;
pub mod graph;
pub mod io;
pub mod render;
pub mod settings;
pub mod viewer;
