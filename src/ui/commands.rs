// Session command grammar
//
// Each input line is split with shell quoting rules and parsed with clap, so the
// shell and `acsm exec` accept exactly the same commands.

use crate::models::MAX_GRID_QUANTITY;
use clap::{Parser, Subcommand};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true, name = "acsm")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Show every field, or a single one
    Show { field: Option<String> },

    /// List field names with their file, section and key
    Fields,

    /// Set a field (enum fields accept "<index> - <label>", an index or a label)
    Set {
        field: String,
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },

    /// Show or change the game and server folders
    Paths {
        #[arg(long)]
        game: Option<String>,
        #[arg(long)]
        server: Option<String>,
    },

    /// Rescan cars and tracks, then reload the server's cfg files
    Refresh,

    /// List installed cars, optionally filtered by name
    Cars { filter: Option<String> },

    /// Show the car grid
    Grid,

    /// Add a car to the grid
    AddCar {
        model: String,
        #[arg(default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_GRID_QUANTITY)))]
        quantity: u32,
    },

    /// Remove a grid row by its number
    RemoveCar { index: usize },

    /// Remove every car from the grid
    ClearGrid,

    /// List tracks and the selected track's layouts
    Tracks,

    /// Select a track, and optionally its layout
    Track { name: String, layout: Option<String> },

    /// Select a layout of the current track
    Layout { name: String },

    /// List weather presets
    Weather,

    /// Write server_cfg.ini and csp_extra_options.ini
    Save {
        /// Refuse to save instead of raising MAX_CLIENTS to fit the grid
        #[arg(long)]
        keep_max_clients: bool,
    },

    /// Write entry_list.ini from the car grid
    EntryList,

    /// Download the latest AssettoServer into the server folder
    Install {
        /// Delete the server folder's current content first
        #[arg(long)]
        clean: bool,
    },

    /// Start the server
    Start,

    /// Stop the server started from this session
    Stop,

    /// Kill every server process by executable name
    Kill,

    /// Stop, kill leftovers, then start again
    Restart,

    /// Show the server process state
    Status,

    /// Open the server folder in the file browser
    Open,

    /// Leave the session
    #[command(alias = "exit")]
    Quit,
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid quoting: {0}")]
    Quoting(#[from] shell_words::ParseError),

    #[error("{0}")]
    Usage(#[from] clap::Error),
}

impl CommandError {
    /// Help and version requests are reported through clap errors but are not failures.
    pub fn is_informational(&self) -> bool {
        match self {
            CommandError::Usage(e) => matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ),
            CommandError::Quoting(_) => false,
        }
    }
}

/// Parse one input line; blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<SessionCommand>, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let words = shell_words::split(line)?;
    let parsed = CommandLine::try_parse_from(words)?;
    Ok(Some(parsed.command))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> SessionCommand {
        parse_line(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# set up grid").unwrap().is_none());
    }

    #[test]
    fn test_set_joins_value_words() {
        assert_eq!(
            parse("set welcome_msg Welcome to the league"),
            SessionCommand::Set {
                field: "welcome_msg".into(),
                value: vec!["Welcome".into(), "to".into(), "the".into(), "league".into()],
            }
        );
        assert_eq!(
            parse("set sun_angle -16"),
            SessionCommand::Set {
                field: "sun_angle".into(),
                value: vec!["-16".into()],
            }
        );
        assert_eq!(
            parse(r#"set abs_mode "2 - Forced On""#),
            SessionCommand::Set {
                field: "abs_mode".into(),
                value: vec!["2 - Forced On".into()],
            }
        );
    }

    #[test]
    fn test_add_car_quantity() {
        assert_eq!(
            parse("add-car ks_mazda_mx5_cup"),
            SessionCommand::AddCar {
                model: "ks_mazda_mx5_cup".into(),
                quantity: 1
            }
        );
        assert_eq!(
            parse("add-car abarth500 12"),
            SessionCommand::AddCar {
                model: "abarth500".into(),
                quantity: 12
            }
        );
        assert!(parse_line("add-car abarth500 51").is_err());
        assert!(parse_line("add-car abarth500 0").is_err());
    }

    #[test]
    fn test_paths_and_flags() {
        assert_eq!(
            parse(r#"paths --game "C:/Program Files/assettocorsa" --server D:/acserver"#),
            SessionCommand::Paths {
                game: Some("C:/Program Files/assettocorsa".into()),
                server: Some("D:/acserver".into()),
            }
        );
        assert_eq!(parse("save --keep-max-clients"), SessionCommand::Save { keep_max_clients: true });
        assert_eq!(parse("install"), SessionCommand::Install { clean: false });
        assert_eq!(parse("exit"), SessionCommand::Quit);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse_line("set \"unterminated"), Err(CommandError::Quoting(_))));

        let unknown = parse_line("teleport").unwrap_err();
        assert!(!unknown.is_informational());

        let help = parse_line("help").unwrap_err();
        assert!(help.is_informational());
    }
}
