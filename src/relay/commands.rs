//! Static `/start` and `/help` commands.

use teloxide::types::{MessageEntity, MessageEntityKind};
use teloxide::utils::command::BotCommands;

pub const WELCOME_TEXT: &str = "🤖 Welcome to the AI relay bot!\n\n\
I'm an AI assistant. Just send me a message and I'll help you with your questions.\n\n\
Use /help to see available commands.";

pub const HELP_TEXT: &str = "📚 Available Commands:\n\n\
/start - Start the bot\n\
/help - Show this help message\n\n\
💡 Just send me any message and I'll respond using AI!";

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "show this help message")]
    Help,
}

impl Command {
    pub fn reply(&self) -> &'static str {
        match self {
            Command::Start => WELCOME_TEXT,
            Command::Help => HELP_TEXT,
        }
    }
}

/// `true` when Telegram marked the message as opening with a bot command.
///
/// Text that merely starts with `/` (a path, "/ hi") has no such entity and
/// is relayed like any other message.
pub fn starts_with_bot_command(entities: Option<&[MessageEntity]>) -> bool {
    entities
        .and_then(|e| e.first())
        .is_some_and(|e| matches!(e.kind, MessageEntityKind::BotCommand) && e.offset == 0)
}
