mod commands;

pub use commands::{Cli, Commands, NamespaceCommands, RoleCommands, TokenCommands};
