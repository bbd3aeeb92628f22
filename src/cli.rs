use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "loctally")]
#[command(about = "Incremental lines-of-code tally across your GitHub repositories")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "GitHub login to tally")]
    pub login: Option<String>,

    #[arg(long, help = "API token (falls back to GITHUB_TOKEN)")]
    pub token: Option<String>,

    #[arg(long, default_value = "cache", help = "Directory holding the cache ledger")]
    pub cache_dir: PathBuf,

    #[arg(long, default_value_t = 7, help = "Comment lines reserved at the top of the ledger")]
    pub comment_size: usize,

    #[arg(long, help = "Comma-separated owner/name list to exclude")]
    pub exclude: Option<String>,

    #[arg(
        long = "affiliation",
        value_delimiter = ',',
        help = "Repository affiliations to include (default: OWNER,COLLABORATOR,ORGANIZATION_MEMBER)"
    )]
    pub affiliations: Option<Vec<String>>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile the cache against live repositories and print LOC totals
    Tally {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output per-repository cache entries as NDJSON")]
        ndjson: bool,

        #[arg(long, help = "Discard the cache and re-walk every repository")]
        rebuild: bool,

        #[arg(long, help = "Fold the static archive of deleted repositories into the totals")]
        include_archive: bool,

        #[arg(long, help = "Path to the archive ledger")]
        archive_path: Option<PathBuf>,
    },
    /// Print the commit total recorded in the cache, without network calls
    Commits,
    /// Print the archived-repository snapshot
    Archive {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Path to the archive ledger")]
        path: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Tally {
                json,
                ndjson,
                rebuild,
                include_archive,
                archive_path,
            } => crate::tally::exec(self.common, json, ndjson, rebuild, include_archive, archive_path),
            Commands::Commits => {
                let login = self
                    .common
                    .login
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("A GitHub login is required (--login)"))?;
                let total = crate::tally::commit_count_from_cache(&self.common, &login)?;
                println!("{total}");
                Ok(())
            }
            Commands::Archive { json, path } => crate::archive::exec(self.common, json, path),
        }
    }
}
