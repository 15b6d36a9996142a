use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "weedfs",
    version,
    about = "Transfer files and folders to and from a SeaweedFS-style filer",
    long_about = "`weedfs` uploads, downloads and synchronises files against a filer REST service, \
running many transfers concurrently under a fixed limit.

Remote paths are relative to --root.

EXAMPLE:
    # Upload a local folder to <root>/images, 32 transfers at a time
    weedfs --filer-url http://localhost:8888 --max-concurrent 32 push-folder ./images

    # Download it back
    weedfs --filer-url http://localhost:8888 pull-folder images ./images-copy --summary"
)]
struct Args {
    // Filer connection
    /// Filer base URL, the scheme defaults to http
    #[arg(
        long,
        env = "WEEDFS_FILER_URL",
        default_value = "http://localhost:8888",
        value_name = "URL",
        help_heading = "Filer connection"
    )]
    filer_url: String,

    /// Remote directory every remote path is resolved under
    #[arg(
        long,
        env = "WEEDFS_ROOT",
        default_value = common::config::DEFAULT_ROOT,
        value_name = "PATH",
        help_heading = "Filer connection"
    )]
    root: String,

    /// Per-request timeout, e.g. "30s" or "2min"; unset means no deadline
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration, help_heading = "Filer connection")]
    timeout: Option<std::time::Duration>,

    /// Number of entries requested per listing page; unset uses the filer default
    #[arg(long, value_name = "N", help_heading = "Filer connection")]
    page_size: Option<usize>,

    // Transfer options
    /// Maximum number of transfers in flight, 0 means no limit
    #[arg(
        long,
        default_value_t = common::config::DEFAULT_MAX_CONCURRENT_TRANSFERS,
        value_name = "N",
        help_heading = "Transfer options"
    )]
    max_concurrent: usize,

    /// Abort a batch on its first failed file
    #[arg(short = 'e', long = "fail-early", help_heading = "Transfer options")]
    fail_early: bool,

    // Progress & output
    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads, 0 means number of cores
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads, 0 means Tokio runtime default (512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Upload local files into an existing remote directory
    Push {
        /// Local file(s) to upload
        #[arg(required = true)]
        files: Vec<std::path::PathBuf>,

        /// Remote directory to upload into, it must already exist
        #[arg(long, value_name = "DIR")]
        to: String,

        /// Store the files under these names instead of their own, one per file
        #[arg(long, value_name = "NAME", action = clap::ArgAction::Append)]
        name: Vec<String>,
    },
    /// Upload a local folder recursively
    PushFolder {
        /// Local folder to upload
        local: std::path::PathBuf,

        /// Remote folder name, defaults to the local folder's name
        #[arg(long = "as", value_name = "NAME")]
        remote_name: Option<String>,
    },
    /// Download remote files into a local directory
    Pull {
        /// Remote file(s) to download
        #[arg(required = true)]
        remote: Vec<String>,

        /// Local directory to write into
        #[arg(long, value_name = "DIR", default_value = ".")]
        out: std::path::PathBuf,
    },
    /// Download a remote folder recursively
    PullFolder {
        /// Remote folder to download
        remote: String,

        /// Local folder receiving the folder's contents
        local: std::path::PathBuf,
    },
    /// List a remote directory
    Ls {
        /// Remote directory, defaults to the root
        #[arg(default_value = "")]
        remote: String,

        /// Show type, size and modification time
        #[arg(short = 'l', long)]
        long: bool,
    },
    /// Create a remote directory and any missing parents
    Mkdirs {
        /// Remote directory to create
        remote: String,
    },
    /// Check that a remote directory exists, exit status 1 when it does not
    Exists {
        /// Remote directory to probe
        remote: String,
    },
    /// Remove a remote file or directory
    Rm {
        /// Remote path to remove
        remote: String,

        /// Remove non-empty directories with everything under them
        #[arg(short = 'r', long)]
        recursive: bool,
    },
}

fn client_config(args: &Args) -> common::ClientConfig {
    let mut config = common::ClientConfig::new(&args.filer_url)
        .with_root(&args.root)
        .with_max_concurrent_transfers(args.max_concurrent)
        .with_fail_early(args.fail_early);
    if let Some(timeout) = args.timeout {
        config = config.with_request_timeout(timeout);
    }
    if let Some(page_size) = args.page_size {
        config = config.with_page_size(page_size);
    }
    config
}

fn check_failures(summary: common::Summary, print_summary: bool) -> Result<common::Summary> {
    if summary.failures == 0 {
        return Ok(summary);
    }
    if print_summary {
        return Err(anyhow!("weedfs encountered errors\n\n{}", &summary));
    }
    Err(anyhow!("weedfs encountered errors"))
}

fn log_failures<'a, T: 'a>(
    results: impl IntoIterator<Item = (&'a String, &'a common::TransferResult<T>)>,
) {
    for (name, result) in results {
        if let Err(error) = result {
            tracing::error!("{}: {:#}", name, error);
        }
    }
}

async fn push(
    client: &common::FilerClient,
    files: Vec<std::path::PathBuf>,
    to: &str,
    names: Vec<String>,
) -> Result<common::Summary> {
    let mut sizes = Vec::with_capacity(files.len());
    for file in &files {
        let metadata = tokio::fs::metadata(file)
            .await
            .with_context(|| format!("weedfs: failed reading metadata from {:?}", &file))?;
        sizes.push(metadata.len());
    }
    let labels: Vec<String> = if names.is_empty() {
        files
            .iter()
            .map(|file| file.display().to_string())
            .collect()
    } else {
        names.clone()
    };
    let request = if names.is_empty() {
        common::PushRequest::files(files)
    } else {
        let mut payloads = Vec::with_capacity(files.len());
        for file in &files {
            let data = tokio::fs::read(file)
                .await
                .with_context(|| format!("weedfs: failed reading {:?}", &file))?;
            payloads.push(common::Payload::from(data));
        }
        common::PushRequest::batch(payloads, Some(names))
    };
    let results = match client.push(request, to).await? {
        common::PushOutcome::Many(results) => results,
        common::PushOutcome::One(status) => vec![Ok(status)],
    };
    for (label, result) in labels.iter().zip(&results) {
        match result {
            Ok(status) if !status.is_success() => {
                tracing::error!("{}: filer answered {}", label, status);
            }
            Ok(_) => tracing::info!("{}: uploaded", label),
            Err(error) => tracing::error!("{}: {:#}", label, error),
        }
    }
    let mut summary = common::Summary::from_uploads(&results);
    summary.bytes_pushed = results
        .iter()
        .zip(&sizes)
        .filter(|(result, _)| result.as_ref().is_ok_and(|status| status.is_success()))
        .map(|(_, size)| size)
        .sum();
    Ok(summary)
}

#[instrument]
async fn async_main(args: Args) -> Result<common::Summary> {
    let client = common::FilerClient::new(client_config(&args))?;
    let print_summary = args.summary || args.verbose > 0;
    match args.command {
        Command::Push { files, to, name } => {
            let summary = push(&client, files, &to, name).await?;
            check_failures(summary, print_summary)
        }
        Command::PushFolder { local, remote_name } => {
            let outcome = client
                .push_folder(&local, remote_name.as_deref())
                .await?;
            let summary = common::Summary::from_folder_upload(&outcome);
            for group in &outcome.groups {
                tracing::info!("{}: {} files", group.relative_path, group.results.len());
                log_failures(group.results.iter().map(|(name, result)| (name, result)));
            }
            check_failures(summary, print_summary)
        }
        Command::Pull { remote, out } => {
            let results = client.pull_to_dir(&remote, &out, true).await?;
            log_failures(remote.iter().zip(&results));
            check_failures(common::Summary::from_downloads(&results), print_summary)
        }
        Command::PullFolder { remote, local } => {
            let outcome = client.pull_folder(&remote, &local).await?;
            let summary = common::Summary::from_folder_download(&outcome);
            for group in &outcome.groups {
                log_failures(group.results.iter().map(|(name, result)| (name, result)));
            }
            check_failures(summary, print_summary)
        }
        Command::Ls { remote, long } => {
            if long {
                for entry in client.list_entries(&remote).await? {
                    let modified = entry
                        .last_modified
                        .map(|mtime| mtime.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{} {:>12} {} {}",
                        if entry.is_file { "-" } else { "d" },
                        entry.size.unwrap_or(0),
                        modified,
                        entry.name()
                    );
                }
            } else {
                for name in client.listdir(&remote).await? {
                    println!("{name}");
                }
            }
            Ok(common::Summary::default())
        }
        Command::Mkdirs { remote } => {
            client.mkdirs(&remote).await?;
            Ok(common::Summary {
                directories_created: 1,
                ..Default::default()
            })
        }
        Command::Exists { remote } => {
            if !client.exists(&remote).await? {
                return Err(anyhow!(
                    "{} does not exist",
                    client.resolver().resolve(&remote).as_directory()
                ));
            }
            Ok(common::Summary::default())
        }
        Command::Rm { remote, recursive } => {
            client.remove(&remote, recursive).await?;
            Ok(common::Summary {
                entries_removed: 1,
                ..Default::default()
            })
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let res = common::run(output, runtime, func);
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
