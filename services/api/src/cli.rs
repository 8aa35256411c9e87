use crate::inspect::{run_quote_show, QuoteShowArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use tidyhome::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Tidyhome back-office",
    about = "Serve and inspect the quote back-office from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Look up quote records through the configured backend
    Quote {
        #[command(subcommand)]
        command: QuoteCommand,
    },
}

#[derive(Subcommand, Debug)]
enum QuoteCommand {
    /// Print a quote and its audit trail, newest event first
    Show(QuoteShowArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Quote {
            command: QuoteCommand::Show(args),
        } => run_quote_show(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve_without_subcommand() {
        let cli = Cli::try_parse_from(["tidyhome-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_quote_show() {
        let cli = Cli::try_parse_from(["tidyhome-api", "quote", "show", "q-1", "--json"])
            .expect("parses");
        match cli.command {
            Some(Command::Quote {
                command: QuoteCommand::Show(args),
            }) => {
                assert_eq!(args.id, "q-1");
                assert!(args.json);
            }
            other => panic!("expected quote show, got {other:?}"),
        }
    }

    #[test]
    fn serve_accepts_port_override() {
        let cli = Cli::try_parse_from(["tidyhome-api", "serve", "--port", "8080"]).expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => assert_eq!(args.port, Some(8080)),
            other => panic!("expected serve, got {other:?}"),
        }
    }
}
