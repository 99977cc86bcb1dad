use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "weft",
    about = "Weft: content-addressed blocks, DAGs and signed records",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository directory
    #[arg(long, global = true, default_value = ".weft")]
    pub repo: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new repository
    Init(InitArgs),
    /// Show this node's identity
    Id,
    /// Work with raw blocks
    #[command(subcommand)]
    Block(BlockCommand),
    /// Work with DAG nodes
    #[command(subcommand)]
    Dag(DagCommand),
    /// Publish and read signed records
    #[command(subcommand)]
    Record(RecordCommand),
    /// Announce this node as a provider of a block
    Provide(ProvideArgs),
    /// List peers announcing a block
    Providers(ProvidersArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Hash algorithm for new addresses (blake3, sha2-256)
    #[arg(long, default_value = "blake3")]
    pub hash: String,
}

#[derive(Subcommand)]
pub enum BlockCommand {
    /// Store files as blocks; directories are walked
    Put { paths: Vec<PathBuf> },
    /// Print a block's bytes, or write them to a file
    Get {
        key: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show a block's size and algorithm
    Stat { key: String },
    /// Delete blocks
    Rm { keys: Vec<String> },
    /// List stored blocks
    Ls,
}

#[derive(Subcommand)]
pub enum DagCommand {
    /// Store a node described by a JSON file
    Put { file: PathBuf },
    /// Show a node
    Get { target: String },
    /// List a node's links
    Links { target: String },
    /// Resolve a path to the address of its final node
    Resolve { path: String },
}

#[derive(Subcommand)]
pub enum RecordCommand {
    /// Sign and publish a record
    Put {
        key: String,
        value: String,
        #[arg(long)]
        version: u64,
    },
    /// Show the current record under a key
    Get {
        key: String,
        /// Show every valid record, not just the current one
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args)]
pub struct ProvideArgs {
    pub key: String,
}

#[derive(Args)]
pub struct ProvidersArgs {
    pub key: String,
    /// Stop looking after this many milliseconds
    #[arg(long, default_value = "2000")]
    pub timeout_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["weft", "init"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert_eq!(args.hash, "blake3");
        } else {
            panic!("wrong command");
        }
        assert_eq!(cli.repo, PathBuf::from(".weft"));
    }

    #[test]
    fn parse_repo_and_format() {
        let cli = Cli::try_parse_from(["weft", "--repo", "/tmp/r", "--format", "json", "id"]).unwrap();
        assert_eq!(cli.repo, PathBuf::from("/tmp/r"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Id));
    }

    #[test]
    fn parse_block_put() {
        let cli = Cli::try_parse_from(["weft", "block", "put", "a.txt", "dir"]).unwrap();
        if let Command::Block(BlockCommand::Put { paths }) = cli.command {
            assert_eq!(paths, vec![PathBuf::from("a.txt"), PathBuf::from("dir")]);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_block_get_output() {
        let cli = Cli::try_parse_from(["weft", "block", "get", "1e20ab", "-o", "out.bin"]).unwrap();
        if let Command::Block(BlockCommand::Get { key, output }) = cli.command {
            assert_eq!(key, "1e20ab");
            assert_eq!(output, Some(PathBuf::from("out.bin")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_dag_resolve() {
        let cli = Cli::try_parse_from(["weft", "dag", "resolve", "/ipfs/abc/x"]).unwrap();
        assert!(matches!(cli.command, Command::Dag(DagCommand::Resolve { .. })));
    }

    #[test]
    fn parse_record_put_requires_version() {
        assert!(Cli::try_parse_from(["weft", "record", "put", "/names/a", "v"]).is_err());
        let cli = Cli::try_parse_from(["weft", "record", "put", "/names/a", "v", "--version", "3"]).unwrap();
        if let Command::Record(RecordCommand::Put { version, .. }) = cli.command {
            assert_eq!(version, 3);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_providers_timeout() {
        let cli = Cli::try_parse_from(["weft", "providers", "abc", "--timeout-ms", "50"]).unwrap();
        if let Command::Providers(args) = cli.command {
            assert_eq!(args.timeout_ms, 50);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["weft", "-v", "block", "ls"]).unwrap();
        assert!(cli.verbose);
    }
}
