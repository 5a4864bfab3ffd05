//! Interactive console commands
//!
//! Lines typed while `k-forward run` is active are parsed into
//! [`ConsoleCommand`]s and executed against the forward service.

use kf_supervisor::Action;
use thiserror::Error;

/// Help text listing console commands
pub const HELP: &str = "\
Commands:
  status | list          show all forwards
  start <target>         start a forward
  stop <target>          stop a forward
  restart <target>       restart a forward
  toggle <target>        stop if active, otherwise start
  start-all | stop-all   start or stop every forward
  reload | refresh       reload the profiles file
  help                   show this help
  quit | exit            stop all forwards and exit

<target> is a forward's name, resource or key.";

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Apply an action to one forward
    Apply { action: Action, target: String },
    StartAll,
    StopAll,
    Reload,
    Status,
    Help,
    Quit,
}

/// Console parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}' (type 'help' for a list)")]
    UnknownCommand(String),

    #[error("'{0}' needs a target")]
    MissingTarget(Action),

    #[error("'{0}' takes no arguments")]
    UnexpectedArguments(String),
}

/// Parse one console line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let word = word.to_ascii_lowercase();

    let action = match word.as_str() {
        "start" => Some(Action::Start),
        "stop" => Some(Action::Stop),
        "restart" => Some(Action::Restart),
        "toggle" => Some(Action::Toggle),
        _ => None,
    };
    if let Some(action) = action {
        if rest.is_empty() {
            return Err(ParseError::MissingTarget(action));
        }
        return Ok(Some(ConsoleCommand::Apply {
            action,
            target: rest.to_string(),
        }));
    }

    let command = match word.as_str() {
        "start-all" => ConsoleCommand::StartAll,
        "stop-all" => ConsoleCommand::StopAll,
        "reload" | "refresh" => ConsoleCommand::Reload,
        "status" | "list" | "ls" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        _ => return Err(ParseError::UnknownCommand(word)),
    };

    if !rest.is_empty() {
        return Err(ParseError::UnexpectedArguments(word));
    }
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn test_actions_take_rest_of_line_as_target() {
        assert_eq!(
            parse("  restart  svc/api  "),
            Ok(Some(ConsoleCommand::Apply {
                action: Action::Restart,
                target: "svc/api".to_string()
            }))
        );
        assert_eq!(
            parse("TOGGLE my api"),
            Ok(Some(ConsoleCommand::Apply {
                action: Action::Toggle,
                target: "my api".to_string()
            }))
        );
    }

    #[test]
    fn test_action_without_target() {
        assert_eq!(parse("stop"), Err(ParseError::MissingTarget(Action::Stop)));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("start-all"), Ok(Some(ConsoleCommand::StartAll)));
        assert_eq!(parse("stop-all"), Ok(Some(ConsoleCommand::StopAll)));
        assert_eq!(parse("refresh"), Ok(Some(ConsoleCommand::Reload)));
        assert_eq!(parse("list"), Ok(Some(ConsoleCommand::Status)));
        assert_eq!(parse("?"), Ok(Some(ConsoleCommand::Help)));
        assert_eq!(parse("exit"), Ok(Some(ConsoleCommand::Quit)));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse("launch api"),
            Err(ParseError::UnknownCommand("launch".to_string()))
        );
        assert_eq!(
            parse("status now"),
            Err(ParseError::UnexpectedArguments("status".to_string()))
        );
        assert_eq!(
            parse("stop").unwrap_err().to_string(),
            "'stop' needs a target"
        );
    }
}
