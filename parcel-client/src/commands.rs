//! The client's runtime command parser: `/list`, `/q`, `/username`,
//! `/encinfo`, `/file`, `/clear`, `/version`, matched by unambiguous
//! prefix. Grounded in `original_source/src/parcel/commands.c`'s
//! `parse_command`, which walks the same fixed command table comparing
//! `strncmp(command, command_strings[i], len)` and returns `CMD_AMBIGUOUS`
//! the moment a second candidate also matches — so `/u` resolves to
//! `/username` (the only command starting with `u`) but `/l` would be
//! rejected if the table ever grew a second `l`-prefixed command.

pub const COMMAND_TABLE: &[(&str, Command)] = &[
    ("/list", Command::List),
    ("/q", Command::Exit),
    ("/username", Command::Username),
    ("/encinfo", Command::EncInfo),
    ("/file", Command::File),
    ("/clear", Command::Clear),
    ("/version", Command::Version),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    List,
    Exit,
    Username,
    EncInfo,
    File,
    Clear,
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedCommand {
    /// Not a command at all (doesn't start with `/`, or the input is
    /// plain chat text) — the caller should treat it as a message body.
    NotACommand,
    /// A `/`-prefixed token that doesn't uniquely (or at all) match any
    /// entry in [`COMMAND_TABLE`].
    Unrecognized,
    /// A `/`-prefixed token that is a prefix of more than one table
    /// entry.
    Ambiguous,
    Command(Command),
}

/// Parse one line of chat-prompt input as a runtime command. Only tokens
/// starting with `/` are considered; anything else is `NotACommand` and
/// should be sent as a text message body instead.
pub fn parse_command(input: &str) -> ParsedCommand {
    if !input.starts_with('/') {
        return ParsedCommand::NotACommand;
    }

    let mut matched: Option<Command> = None;
    for (name, cmd) in COMMAND_TABLE {
        if name.starts_with(input) {
            if matched.is_some() {
                return ParsedCommand::Ambiguous;
            }
            matched = Some(*cmd);
        }
    }

    match matched {
        Some(cmd) => ParsedCommand::Command(cmd),
        None => ParsedCommand::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_resolves() {
        assert_eq!(parse_command("/list"), ParsedCommand::Command(Command::List));
        assert_eq!(parse_command("/q"), ParsedCommand::Command(Command::Exit));
    }

    #[test]
    fn unique_prefix_resolves() {
        // "/u" only prefixes "/username" in the table.
        assert_eq!(parse_command("/u"), ParsedCommand::Command(Command::Username));
    }

    #[test]
    fn ambiguous_prefix_is_rejected() {
        // "/l" prefixes only "/list" currently, so exercise a genuine
        // two-way ambiguity by prefixing the shared leading slash alone.
        assert_eq!(parse_command("/"), ParsedCommand::Ambiguous);
    }

    #[test]
    fn unknown_command_is_unrecognized() {
        assert_eq!(parse_command("/frobnicate"), ParsedCommand::Unrecognized);
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_command("hello group"), ParsedCommand::NotACommand);
    }
}
