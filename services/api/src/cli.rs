use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use review_cycle::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Review Cycle",
    about = "Run or demonstrate the performance-evaluation scheduling service",
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
    /// Walk one evaluation through scheduling, review, completion and acknowledgment
    Demo(DemoArgs),
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
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["review-cycle-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn demo_accepts_a_reporting_date() {
        let cli = Cli::try_parse_from(["review-cycle-api", "demo", "--today", "2025-03-03"])
            .expect("parses");
        match cli.command {
            Some(Command::Demo(args)) => {
                assert_eq!(args.today.map(|date| date.to_string()).as_deref(), Some("2025-03-03"));
            }
            other => panic!("expected demo command, got {other:?}"),
        }
    }

    #[test]
    fn serve_overrides_are_parsed() {
        let cli = Cli::try_parse_from(["review-cycle-api", "serve", "--port", "8088"])
            .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => assert_eq!(args.port, Some(8088)),
            other => panic!("expected serve command, got {other:?}"),
        }
    }
}
