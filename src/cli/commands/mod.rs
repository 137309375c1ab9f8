mod config;
mod run;

pub use config::ConfigCommand;
pub use run::{OverrideArgs, RunArgs};

pub use config::handle_config;
pub use run::handle_run;
