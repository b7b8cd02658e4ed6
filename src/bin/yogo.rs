use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use std::io::IsTerminal;
use std::process::ExitCode;
use yogo::{
    Config, Error, Inbox, MailKind, Render, Result, YopmailClientBuilder, check_offset, parse_offset,
};

#[derive(Parser, Debug)]
#[command(
    name = "yogo",
    version,
    about = "Interact with Yopmail disposable inboxes (unofficial)",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true, help = "Print output as JSON")]
    json: bool,

    #[arg(long, global = true, help = "Dump every request and response")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Handle inbox operations
    #[command(subcommand)]
    Inbox(InboxCommand),
}

#[derive(Subcommand, Debug)]
enum InboxCommand {
    /// List the first messages of an inbox
    List {
        /// Mailbox name (without @yopmail.com)
        inbox: String,
        #[arg(default_value_t = 15)]
        limit: usize,
    },
    /// Show one message, counting from 1
    Show {
        inbox: String,
        offset: String,
        #[arg(long, help = "Show the raw MIME source")]
        source: bool,
    },
    /// Delete one message, counting from 1
    Delete { inbox: String, offset: String },
    /// Delete every message
    Flush { inbox: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { "warn,yogo=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            exit_code(&err)
        }
    }
}

fn exit_code(err: &Error) -> ExitCode {
    if err.is_captcha() {
        ExitCode::from(2)
    } else if err.is_validation() {
        ExitCode::from(3)
    } else {
        ExitCode::FAILURE
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    config.debug = cli.debug;
    let colour = std::io::stdout().is_terminal();

    let Commands::Inbox(command) = cli.command;
    match command {
        InboxCommand::List { inbox, limit } => {
            let mut inbox = open(&inbox, config).await?;
            inbox.parse_inbox_pages(limit).await?;
            print(&inbox, cli.json, colour)?;
        }
        InboxCommand::Show {
            inbox,
            offset,
            source,
        } => {
            let offset = parse_offset(&offset)?;
            let mut inbox = open(&inbox, config).await?;
            inbox.parse_inbox_pages(offset).await?;
            check_offset(inbox.count(), offset)?;

            let kind = if source { MailKind::Source } else { MailKind::Html };
            let mail = inbox.fetch(kind, offset - 1).await?;
            print(&mail, cli.json, colour)?;
        }
        InboxCommand::Delete { inbox, offset } => {
            let offset = parse_offset(&offset)?;
            let mut inbox = open(&inbox, config).await?;
            inbox.parse_inbox_pages(offset).await?;
            check_offset(inbox.count(), offset)?;
            inbox.delete(offset - 1).await?;
            success(&deleted_message(offset), colour);
        }
        InboxCommand::Flush { inbox: name } => {
            let mut inbox = open(&name, config).await?;
            inbox.parse_inbox_pages(1).await?;
            inbox.flush().await?;
            success(&flushed_message(&name), colour);
        }
    }

    Ok(())
}

async fn open(name: &str, config: Config) -> Result<Inbox> {
    let client = YopmailClientBuilder::from_config(config).build().await?;
    Ok(Inbox::new(name, client))
}

fn deleted_message(offset: usize) -> String {
    format!(r#"Email "{offset}" successfully deleted"#)
}

fn flushed_message(inbox: &str) -> String {
    format!(r#"Inbox "{inbox}" successfully flushed"#)
}

fn success(message: &str, colour: bool) {
    if colour {
        println!("{}", message.green());
    } else {
        println!("{message}");
    }
}

fn print(value: &impl Render, json: bool, colour: bool) -> Result<()> {
    let out = if json {
        value.to_json()?
    } else {
        value.render(colour)?
    };
    println!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn success_messages() {
        assert_eq!(deleted_message(1), r#"Email "1" successfully deleted"#);
        assert_eq!(flushed_message("test"), r#"Inbox "test" successfully flushed"#);
    }

    #[test]
    fn version_flag() {
        let err = Cli::try_parse_from(["yogo", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["yogo", "inbox", "show", "test", "2", "--source", "--json"]).unwrap();
        assert!(cli.json);
        assert!(!cli.debug);
        match cli.command {
            Commands::Inbox(InboxCommand::Show { inbox, offset, source }) => {
                assert_eq!((inbox.as_str(), offset.as_str(), source), ("test", "2", true));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
