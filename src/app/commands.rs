/// Bot commands, in menu order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Chat,
    Process,
    Analyze,
    Tag { label: Option<String> },
    History,
    Show { id: String },
    Status,
    Help,
    WhoAmI,
    Cancel,
    Start,
}

impl BotCommand {
    /// `name` is already lowercased and stripped of any `@bot` suffix.
    pub fn parse(name: &str, args: &str) -> Option<Self> {
        let args = args.trim();
        let command = match name {
            "chat" => Self::Chat,
            "process" => Self::Process,
            "analyze" | "analyse" => Self::Analyze,
            "tag" => Self::Tag {
                label: if args.is_empty() {
                    None
                } else {
                    Some(args.to_string())
                },
            },
            "history" => Self::History,
            "show" => Self::Show {
                id: args.split_whitespace().next().unwrap_or_default().to_string(),
            },
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "whoami" => Self::WhoAmI,
            "cancel" => Self::Cancel,
            "start" => Self::Start,
            _ => return None,
        };
        Some(command)
    }

    /// Available without authorization.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Start | Self::Help | Self::WhoAmI)
    }
}

/// Entries published with `setMyCommands`.
pub fn menu() -> Vec<(&'static str, String)> {
    vec![
        ("chat", t!("commands.chat").to_string()),
        ("process", t!("commands.process").to_string()),
        ("analyze", t!("commands.analyze").to_string()),
        ("tag", t!("commands.tag").to_string()),
        ("history", t!("commands.history").to_string()),
        ("show", t!("commands.show").to_string()),
        ("status", t!("commands.status").to_string()),
        ("help", t!("commands.help").to_string()),
        ("whoami", t!("commands.whoami").to_string()),
        ("cancel", t!("commands.cancel").to_string()),
    ]
}
