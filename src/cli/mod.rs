mod commands;
mod helpers;
mod processor;
mod session;

pub use commands::{Command, CommandContext, CommandResult};
pub use processor::CommandProcessor;
pub use session::Session;
