use super::helpers::{format_level, format_overlap, format_refresh_report, format_table};
use super::session::Session;
use crate::apps::{ContextLinker, DeepLink, LinkOutcome};
use crate::identity::{TrustLevel, UserId, BRIGHTID_VERIFICATION};
use crate::trust::fetch_overlap;
use crate::utils::{format_timestamp, now_millis};

use colored::*;
use indoc::indoc;
use log::{error, info};
use std::sync::Arc;

/// 命令结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Success(String),
    Info(String),
    Warning(String),
    Error(String),
    Exit,
}

/// 命令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    Refresh,
    WhoAmI,
    Connections,
    Level,
    Flag,
    FlagOptions,
    Overlap,
    Link,
    Name,
}

/// 命令上下文
#[derive(Clone)]
pub struct CommandContext {
    pub session: Arc<Session>,
    pub args: Vec<String>,
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl Command {
    /// 执行命令
    pub async fn execute(&self, context: CommandContext) -> CommandResult {
        match self {
            Command::Help => Self::help(),
            Command::Exit => CommandResult::Exit,
            Command::Refresh => Self::refresh(context).await,
            Command::WhoAmI => Self::whoami(context).await,
            Command::Connections => Self::connections(context).await,
            Command::Level => Self::level(context).await,
            Command::Flag => Self::flag(context).await,
            Command::FlagOptions => Self::flag_options(context),
            Command::Overlap => Self::overlap(context).await,
            Command::Link => Self::link(context).await,
            Command::Name => Self::name(context).await,
        }
    }

    fn help() -> CommandResult {
        let help_text = indoc! {"
            Available commands:

            help                        - Show this help message
            exit, quit                  - Exit the application
            refresh                     - Reconcile local state with the node
            whoami                      - Show your identity and notifications
            connections                 - List connections and trust levels
            level <peer> <level>        - Set the trust level of a connection
            flag <peer> <n>             - Apply flag option <n> (see flag-options)
            flag-options                - List available flag options
            overlap <peer>              - Show mutual connections and groups
            link <deep link>            - Link an app account
            name <new name>             - Change your display name

            Levels: reported, suspicious, just-met, already-known, recovery
        "};

        CommandResult::Info(help_text.to_string())
    }

    async fn refresh(context: CommandContext) -> CommandResult {
        match context.session.sync.refresh_self().await {
            Ok(report) => {
                let text = format_refresh_report(&report);
                if report.is_complete() {
                    CommandResult::Success(text)
                } else {
                    CommandResult::Warning(text)
                }
            }
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }

    async fn whoami(context: CommandContext) -> CommandResult {
        let snapshot = context.session.store().snapshot().await;
        let user = &snapshot.user;

        let mut lines = vec![
            format!("User ID:       {}", user.id.to_string().green()),
            format!("Name:          {}", user.name),
            format!("Public key:    {}", context.session.keypair.public.to_hex()),
            format!("Sponsored:     {}", if user.sponsored { "yes" } else { "no" }),
            format!(
                "Unique:        {}",
                if user.has_verification(BRIGHTID_VERIFICATION) { "yes" } else { "no" }
            ),
            format!("Verifications: {}", user.verification_names().join(", ")),
            format!(
                "Connections:   {} ({} recovery)",
                snapshot.connections.len(),
                snapshot.recovery_connections().len()
            ),
            format!("Groups:        {}", snapshot.memberships.len()),
        ];
        for notification in &snapshot.notifications {
            lines.push(format!("{} {}", "!".yellow().bold(), notification));
        }

        CommandResult::Info(lines.join("\n"))
    }

    async fn connections(context: CommandContext) -> CommandResult {
        let connections = context.session.store().connections().await;
        if connections.is_empty() {
            return CommandResult::Info("No connections yet".to_string());
        }

        let rows: Vec<Vec<String>> = connections
            .iter()
            .map(|c| {
                vec![
                    c.display_name().to_string(),
                    c.id.to_string(),
                    format_level(c.level),
                    c.incoming_level.map(format_level).unwrap_or_else(|| "-".to_string()),
                    c.flag.map(|f| f.label().to_string()).unwrap_or_default(),
                    format_timestamp(c.timestamp),
                ]
            })
            .collect();

        CommandResult::Info(format_table(
            &["Name", "ID", "Level", "Incoming", "Flag", "Updated"],
            &rows,
            &[16, 40, 14, 14, 24, 19],
        ))
    }

    async fn level(context: CommandContext) -> CommandResult {
        if context.args.len() < 2 {
            return CommandResult::Error("Usage: level <peer> <level>".to_string());
        }

        let peer = UserId::from(context.args[0].as_str());
        let level = match context.args[1..].join(" ").parse::<TrustLevel>() {
            Ok(level) => level,
            Err(e) => return CommandResult::Error(e.to_string()),
        };

        let session = &context.session;
        let self_id = session.store().self_id().await;
        match session.trust.set_level(&self_id, &peer, level, None, now_millis()).await {
            Ok(transition) => {
                let mut message = format!("{} is now {}", peer, format_level(transition.to));
                if transition.entered_recovery() {
                    message.push_str(" (added as recovery connection)");
                } else if transition.left_recovery() {
                    message.push_str(" (removed from recovery connections)");
                }
                CommandResult::Success(message)
            }
            Err(e) => {
                error!("setting level failed: {}", e);
                CommandResult::Error(e.to_string())
            }
        }
    }

    async fn flag(context: CommandContext) -> CommandResult {
        if context.args.len() < 2 {
            return CommandResult::Error("Usage: flag <peer> <n>".to_string());
        }

        let peer = UserId::from(context.args[0].as_str());
        let flagging = &context.session.flagging;
        let disposition = match context.args[1].parse::<usize>() {
            Ok(n) if n >= 1 => flagging.option_at(n - 1),
            _ => None,
        };
        let Some(disposition) = disposition else {
            return CommandResult::Error(format!("No flag option {}", context.args[1]));
        };

        let result = flagging
            .apply_flag(&peer, disposition, None, |outcome| {
                info!("flag completed: {:?}", outcome);
            })
            .await;

        match result {
            Ok(_) => CommandResult::Success(format!("{}: {}", disposition.label(), peer)),
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }

    fn flag_options(context: CommandContext) -> CommandResult {
        let lines: Vec<String> = context
            .session
            .flagging
            .options()
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let label = if d.is_debug() { d.label().dimmed().to_string() } else { d.label().to_string() };
                format!("{:>2}. {}", i + 1, label)
            })
            .collect();

        CommandResult::Info(lines.join("\n"))
    }

    async fn overlap(context: CommandContext) -> CommandResult {
        let Some(peer) = context.args.first() else {
            return CommandResult::Error("Usage: overlap <peer>".to_string());
        };

        let session = &context.session;
        match fetch_overlap(session.node.as_ref(), session.store(), &UserId::from(peer.as_str())).await {
            Ok(overlap) => CommandResult::Info(format_overlap(&overlap)),
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }

    async fn link(context: CommandContext) -> CommandResult {
        let Some(raw) = context.args.first() else {
            return CommandResult::Error("Usage: link <deep link>".to_string());
        };

        let link = match DeepLink::parse(raw) {
            Ok(link) => link,
            Err(e) => return CommandResult::Error(e.to_string()),
        };

        let session = &context.session;
        let node = session.node_for(&link.node_url);
        let user = session.store().user().await;

        match ContextLinker::link(node.as_ref(), session.sink.as_ref(), &user, &link.context, &link.account_id).await {
            Ok(LinkOutcome::Linked { context, account_id }) => {
                CommandResult::Success(format!("Linked {} account {}", context, account_id))
            }
            Ok(LinkOutcome::NotRequired) => {
                CommandResult::Info(format!("{} does not require a verification", link.context))
            }
            Ok(LinkOutcome::MissingVerification(name)) => {
                CommandResult::Warning(format!("You need the {} verification to link {}", name, link.context))
            }
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }

    async fn name(context: CommandContext) -> CommandResult {
        let name = context.args.join(" ");
        let result = context.session.store().update_user(|user| user.set_name(&name)).await;

        match result {
            Ok(()) => CommandResult::Success(format!("Name changed to {}", name.trim())),
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::VerificationSink;
    use crate::crypto::KeyPair;
    use crate::identity::{Connection, User};
    use crate::node::{ContextVerification, MemoryNode, NodeError};
    use crate::state::{PendingOperations, StateStore};
    use crate::utils::Config;
    use async_trait::async_trait;

    struct NullSink;

    #[async_trait]
    impl VerificationSink for NullSink {
        async fn publish(&self, _: &str, _: &str, _: &ContextVerification) -> Result<(), NodeError> {
            Ok(())
        }
    }

    async fn context(args: &[&str]) -> (MemoryNode, CommandContext) {
        let keypair = KeyPair::generate().unwrap();
        let node = MemoryNode::new();
        let store = StateStore::new(User::new(UserId::from("alice"), "Alice"));
        store.add_connection(Connection::new("bob", TrustLevel::JustMet, 0).with_name("Bob")).await;

        let session = Session::new(
            Arc::new(node.clone()),
            Arc::new(NullSink),
            store,
            PendingOperations::new(),
            keypair,
            &Config::default(),
        );
        let context = CommandContext {
            session: Arc::new(session),
            args: args.iter().map(|s| s.to_string()).collect(),
        };
        (node, context)
    }

    #[tokio::test]
    async fn test_level_command() {
        let (node, ctx) = context(&["bob", "already", "known"]).await;
        let result = Command::Level.execute(ctx).await;

        assert!(matches!(result, CommandResult::Success(_)));
        assert_eq!(
            node.edge_level(&UserId::from("alice"), &UserId::from("bob")),
            Some(TrustLevel::AlreadyKnown)
        );
    }

    #[tokio::test]
    async fn test_flag_command_rejects_hidden_option() {
        let (_, ctx) = context(&["bob", "5"]).await;
        let result = Command::Flag.execute(ctx).await;
        assert_eq!(result, CommandResult::Error("No flag option 5".to_string()));
    }

    #[tokio::test]
    async fn test_name_command() {
        let (_, ctx) = context(&["  "]).await;
        assert!(matches!(Command::Name.execute(ctx).await, CommandResult::Error(_)));

        let (_, ctx) = context(&["Alice", "B."]).await;
        let session = ctx.session.clone();
        assert!(matches!(Command::Name.execute(ctx).await, CommandResult::Success(_)));
        assert_eq!(session.store().user().await.name, "Alice B.");
    }

    #[tokio::test]
    async fn test_refresh_command() {
        let (_, ctx) = context(&[]).await;
        let session = ctx.session.clone();
        assert!(matches!(Command::Refresh.execute(ctx).await, CommandResult::Success(_)));
        // 节点上没有连接，本地连接被替换
        assert!(session.store().connections().await.is_empty());
    }
}
