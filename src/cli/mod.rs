pub mod commands;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "FEEDSTASH_TOKEN";

#[derive(Parser)]
#[command(name = "feedstash")]
#[command(about = "Archive social timelines into dated parquet partitions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch new items from a server's timeline
    Fetch(FetchArgs),
    /// Print stored items, newest first
    Show(ShowArgs),
    /// List stored partitions of a feed
    Partitions {
        #[command(flatten)]
        target: FeedTarget,

        /// First day to list (YYYY-MM-DD)
        #[arg(long, value_parser = parse_day, requires = "to")]
        from: Option<NaiveDate>,

        /// Last day to list, inclusive (YYYY-MM-DD)
        #[arg(long, value_parser = parse_day, requires = "from")]
        to: Option<NaiveDate>,
    },
    /// Serve stored partitions and the web frontend over HTTP
    Serve {
        /// Address to listen on (default from config)
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Which feed of which server.
#[derive(Args, Debug, Clone)]
pub struct FeedTarget {
    /// Server host name, e.g. mastodon.social
    #[arg(short, long)]
    pub server: String,

    /// Timeline name
    #[arg(short, long, default_value = "home")]
    pub feed: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FetchMode {
    /// Newest items, walking back until stored data is reached
    Latest,
    /// Only items newer than the newest stored id
    Fill,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[command(flatten)]
    pub target: FeedTarget,

    /// Bearer token (default: $FEEDSTASH_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Maximum number of items to request
    #[arg(short, long, default_value_t = 40)]
    pub limit: usize,

    #[arg(short, long, value_enum, default_value_t = FetchMode::Latest)]
    pub mode: FetchMode,

    /// Print new items instead of storing them
    #[arg(long)]
    pub print: bool,

    /// Timeline endpoint (default: https://<server>/api/v1/timelines/<feed>)
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub target: FeedTarget,

    /// Number of items to print
    #[arg(short, long, default_value_t = 40)]
    pub limit: usize,

    /// Drop reposted copies and order by engagement
    #[arg(long)]
    pub popular: bool,

    /// First day to read (YYYY-MM-DD)
    #[arg(long, value_parser = parse_day, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last day to read, inclusive (YYYY-MM-DD)
    #[arg(long, value_parser = parse_day, requires = "from")]
    pub to: Option<NaiveDate>,
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    crate::store::parse_date(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from([
            "feedstash", "fetch", "--server", "example.social", "--limit", "120", "--mode", "fill",
        ])
        .unwrap();
        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.target.server, "example.social");
        assert_eq!(args.target.feed, "home");
        assert_eq!(args.limit, 120);
        assert_eq!(args.mode, FetchMode::Fill);
        assert!(!args.print);
    }

    #[test]
    fn test_date_range_needs_both_ends() {
        let parsed = Cli::try_parse_from([
            "feedstash", "partitions", "-s", "example.social", "--from", "2024-01-01",
        ]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "feedstash", "show", "-s", "example.social", "--from", "2024-01-01", "--to", "2024-01-31",
        ]);
        assert!(parsed.is_ok());

        let parsed = Cli::try_parse_from([
            "feedstash", "show", "-s", "example.social", "--from", "January", "--to", "2024-01-31",
        ]);
        assert!(parsed.is_err());
    }
}
