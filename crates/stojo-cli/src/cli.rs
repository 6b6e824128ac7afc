use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stojo",
    about = "Stojo: persistent name-to-object store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database file (overrides the config file's location)
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    /// TOML config with location and statement overrides
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the object table if it does not exist
    Init,
    /// Store a JSON value under a name
    Put(PutArgs),
    /// Print the JSON value stored under a name
    Get(GetArgs),
    /// Report whether a record exists for a name
    Has(HasArgs),
}

#[derive(Args)]
pub struct PutArgs {
    pub name: String,
    /// JSON value; omit with --stdin
    #[arg(required_unless_present = "stdin")]
    pub value: Option<String>,
    #[arg(long, conflicts_with = "value")]
    pub stdin: bool,
}

#[derive(Args)]
pub struct GetArgs {
    pub name: String,
    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

#[derive(Args)]
pub struct HasArgs {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_put_with_value() {
        let cli = Cli::try_parse_from(["stojo", "put", "test.foo", r#"{"foo":"foo"}"#]).unwrap();
        match cli.command {
            Command::Put(args) => {
                assert_eq!(args.name, "test.foo");
                assert_eq!(args.value.as_deref(), Some(r#"{"foo":"foo"}"#));
                assert!(!args.stdin);
            }
            _ => panic!("expected put"),
        }
    }

    #[test]
    fn put_requires_value_or_stdin() {
        assert!(Cli::try_parse_from(["stojo", "put", "k"]).is_err());
        assert!(Cli::try_parse_from(["stojo", "put", "k", "--stdin"]).is_ok());
        assert!(Cli::try_parse_from(["stojo", "put", "k", "1", "--stdin"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["stojo", "get", "k", "--file", "x.sqlite3", "-v"]).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("x.sqlite3")));
        assert!(cli.verbose);
        assert!(cli.config.is_none());
    }
}
