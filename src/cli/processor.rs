use super::commands::{Command, CommandContext, CommandResult};
use super::session::Session;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command as ClapCommand};
use colored::*;
use log::{debug, error};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::collections::HashMap;
use std::fs::create_dir_all;
use std::path::PathBuf;
use std::sync::Arc;

/// 创建clap应用程序，定义所有可用的命令和参数
fn create_cli_app() -> ClapCommand {
    let peer = || Arg::new("peer").help("Peer user ID").required(true).index(1);

    ClapCommand::new("brightid")
        .no_binary_name(true)
        .disable_help_subcommand(true)
        .subcommand(ClapCommand::new("help").about("Show help"))
        .subcommand(ClapCommand::new("exit").alias("quit").about("Exit the application"))
        .subcommand(ClapCommand::new("refresh").about("Reconcile local state with the node"))
        .subcommand(ClapCommand::new("whoami").about("Show identity information"))
        .subcommand(ClapCommand::new("connections").about("List connections"))
        .subcommand(
            ClapCommand::new("level")
                .about("Set the trust level of a connection")
                .arg(peer())
                .arg(Arg::new("level").help("Trust level").required(true).num_args(1..).index(2)),
        )
        .subcommand(
            ClapCommand::new("flag")
                .about("Flag a connection")
                .arg(peer())
                .arg(Arg::new("option").help("Option number from flag-options").required(true).index(2)),
        )
        .subcommand(ClapCommand::new("flag-options").about("List flag options"))
        .subcommand(ClapCommand::new("overlap").about("Show mutual connections").arg(peer()))
        .subcommand(
            ClapCommand::new("link")
                .about("Link an app account")
                .arg(Arg::new("link").help("brightid:// deep link").required(true).index(1)),
        )
        .subcommand(
            ClapCommand::new("name")
                .about("Change your display name")
                .arg(Arg::new("name").help("New name").required(true).num_args(1..).index(1)),
        )
}

fn command_table() -> HashMap<&'static str, Command> {
    HashMap::from([
        ("help", Command::Help),
        ("exit", Command::Exit),
        ("quit", Command::Exit),
        ("refresh", Command::Refresh),
        ("whoami", Command::WhoAmI),
        ("connections", Command::Connections),
        ("level", Command::Level),
        ("flag", Command::Flag),
        ("flag-options", Command::FlagOptions),
        ("overlap", Command::Overlap),
        ("link", Command::Link),
        ("name", Command::Name),
    ])
}

/// Positional argument names, in the order commands expect them
const ARG_ORDER: [&str; 5] = ["peer", "level", "option", "link", "name"];

/// 收集子命令的位置参数
fn positional_args(matches: &ArgMatches) -> Vec<String> {
    let mut args = Vec::new();
    for id in ARG_ORDER {
        if let Ok(Some(values)) = matches.try_get_many::<String>(id) {
            args.extend(values.cloned());
        }
    }
    args
}

/// 命令处理器
pub struct CommandProcessor {
    session: Arc<Session>,
    commands: HashMap<&'static str, Command>,
    app: ClapCommand,
    history_path: PathBuf,
}

impl CommandProcessor {
    pub fn new(session: Arc<Session>) -> Self {
        let mut history_path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        history_path.push("brightid");
        history_path.push("history.txt");

        if let Some(parent) = history_path.parent() {
            let _ = create_dir_all(parent);
        }

        Self {
            session,
            commands: command_table(),
            app: create_cli_app(),
            history_path,
        }
    }

    /// 运行交互循环，直到 exit 或 EOF
    pub async fn run(&self) -> Result<()> {
        println!("{}", self.welcome_message().await);

        let mut editor = DefaultEditor::new()?;
        let _ = editor.load_history(&self.history_path);

        loop {
            let line = match editor.readline(&format!("{} ", "brightid>".green())) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    error!("Error reading line: {}", e);
                    break;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let _ = editor.add_history_entry(line);

            let result = match self.execute_line(line).await {
                Ok(result) => result,
                Err(e) => CommandResult::Error(e.to_string()),
            };
            if Self::print_result(result) {
                break;
            }
        }

        if let Err(e) = editor.save_history(&self.history_path) {
            debug!("Failed to save command history: {}", e);
        }
        Ok(())
    }

    /// Parses one input line and runs the command it names
    pub async fn execute_line(&self, line: &str) -> Result<CommandResult> {
        let line = line.trim().trim_start_matches('/');
        let words = shlex::split(line).ok_or_else(|| anyhow!("Unbalanced quotes in: {}", line))?;

        let matches = self
            .app
            .clone()
            .try_get_matches_from(words)
            .map_err(|e| anyhow!("Command parsing error: {}", e))?;

        let (name, sub_matches) = match matches.subcommand() {
            Some((name, sub_matches)) => (name, positional_args(sub_matches)),
            None => ("help", Vec::new()),
        };

        let command = self
            .commands
            .get(name)
            .ok_or_else(|| anyhow!("Unknown command: {}", name))?;

        let context = CommandContext {
            session: self.session.clone(),
            args: sub_matches,
        };
        Ok(command.execute(context).await)
    }

    /// Prints a result. Returns true when the loop should stop.
    fn print_result(result: CommandResult) -> bool {
        match result {
            CommandResult::Success(message) => println!("{} {}", "Success:".green().bold(), message),
            CommandResult::Info(message) => println!("{}", message),
            CommandResult::Warning(message) => println!("{} {}", "Warning:".yellow().bold(), message),
            CommandResult::Error(message) => eprintln!("{} {}", "Error:".red().bold(), message),
            CommandResult::Exit => {
                println!("Exiting...");
                return true;
            }
        }
        false
    }

    async fn welcome_message(&self) -> String {
        let user = self.session.store().user().await;

        format!(
            "\n{}\n{}\n\nType {} for a list of available commands.\n\nYour Identity:\n  User ID: {}\n  Name:    {}\n",
            format!("BrightID v{}", crate::utils::version()).green().bold(),
            "Trust-graph client for a BrightID node".cyan(),
            "help".yellow(),
            user.id.to_string().green(),
            user.name
        )
    }
}
