mod plan;
mod replay;
mod root;
mod schema;
mod state;

pub use root::Cli;
