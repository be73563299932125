use crate::config::settings::KNOWN_MODELS;
use crate::config::themes::theme_names;

#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Message(String),
    /// Add a todo directly, bypassing the model.
    Add(String),
    Clear,
    Exit,
    SetModel(String),
    SetTheme(String),
    None,
}

pub fn handle_command(input: &str) -> CommandResult {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return CommandResult::None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim().to_string()),
        None => (trimmed.to_lowercase(), String::new()),
    };

    match cmd.as_str() {
        "/clear" => CommandResult::Clear,
        "/exit" | "/quit" => CommandResult::Exit,

        "/add" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /add <todo text>".to_string())
            } else {
                CommandResult::Add(arg)
            }
        }

        "/model" => {
            if arg.is_empty() {
                let list: Vec<String> = KNOWN_MODELS
                    .iter()
                    .map(|(id, desc)| format!("  - {} ({})", id, desc))
                    .collect();
                return CommandResult::Message(format!(
                    "Known models:\n{}\n\nUsage: /model <name>",
                    list.join("\n")
                ));
            }
            // Any id the endpoint accepts is allowed; known ids get canonical casing.
            let model = KNOWN_MODELS
                .iter()
                .find(|(id, _)| id.eq_ignore_ascii_case(&arg))
                .map(|(id, _)| id.to_string())
                .unwrap_or(arg);
            CommandResult::SetModel(model)
        }

        "/theme" => {
            let names = theme_names();
            if arg.is_empty() {
                let list: Vec<String> = names.iter().map(|t| format!("  - {}", t)).collect();
                return CommandResult::Message(format!(
                    "Available themes:\n{}\n\nUsage: /theme <name>",
                    list.join("\n")
                ));
            }
            let key = arg.to_lowercase();
            if names.iter().any(|name| *name == key) {
                CommandResult::SetTheme(key)
            } else {
                CommandResult::Message(format!(
                    "Unknown theme \"{}\". Available: {}",
                    arg,
                    names.join(", ")
                ))
            }
        }

        "/help" => CommandResult::Message(
            "Available commands:\n\
              /add <text> - Add a todo\n\
              /model      - Change or list models\n\
              /theme      - Change or list themes\n\
              /clear      - Clear the conversation\n\
              /exit       - Exit\n\
              /help       - Show this help\n\n\
             Keys: Tab switches between input and todo list. In the list, \
             Space toggles and d removes."
                .to_string(),
        ),

        _ => CommandResult::Message(format!(
            "Unknown command: {}. Type /help for available commands.",
            cmd
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_command_returns_none() {
        assert_eq!(handle_command("I bought the milk"), CommandResult::None);
        assert_eq!(handle_command("not a /command"), CommandResult::None);
    }

    #[test]
    fn basic_commands() {
        assert_eq!(handle_command("/clear"), CommandResult::Clear);
        assert_eq!(handle_command("/exit"), CommandResult::Exit);
        assert_eq!(handle_command("/QUIT"), CommandResult::Exit);
    }

    #[test]
    fn add_command_keeps_full_text() {
        assert_eq!(
            handle_command("/add   Walk the  dog "),
            CommandResult::Add("Walk the  dog".to_string())
        );
        match handle_command("/add") {
            CommandResult::Message(msg) => assert!(msg.starts_with("Usage")),
            other => panic!("Expected usage message, got {:?}", other),
        }
    }

    #[test]
    fn model_command() {
        assert_eq!(
            handle_command("/model GEMINI-1.5-PRO"),
            CommandResult::SetModel("gemini-1.5-pro".to_string())
        );
        assert_eq!(
            handle_command("/model gpt-4o-mini"),
            CommandResult::SetModel("gpt-4o-mini".to_string())
        );
        match handle_command("/model") {
            CommandResult::Message(msg) => assert!(msg.contains("gemini-1.5-flash")),
            _ => panic!("Expected Message with model list"),
        }
    }

    #[test]
    fn theme_command() {
        assert_eq!(
            handle_command("/theme Gruvbox"),
            CommandResult::SetTheme("gruvbox".to_string())
        );
        match handle_command("/theme neon") {
            CommandResult::Message(msg) => assert!(msg.contains("Unknown theme")),
            _ => panic!("Expected unknown theme message"),
        }
    }

    #[test]
    fn help_and_unknown() {
        match handle_command("/help") {
            CommandResult::Message(msg) => {
                assert!(msg.contains("/add"));
                assert!(msg.contains("/exit"));
            }
            _ => panic!("Expected help message"),
        }
        match handle_command("/foobar") {
            CommandResult::Message(msg) => assert!(msg.contains("Unknown command")),
            _ => panic!("Expected unknown command message"),
        }
    }
}
