use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use chrono::Local;
use env_logger::Builder;
use failure::{Error, ResultExt};
use log::{debug, log_enabled, Level, LevelFilter};
use structopt::StructOpt;

use git_backup::{
    CollisionStrategy, Config, ConfigError, Driver, FlattenLevel, LevelSet, PathSpec,
    UpdateFailure,
};

fn main() {
    let args = Args::from_args();

    if let Err(e) = run(&args) {
        if let Some(update_failure) = e.downcast_ref::<UpdateFailure>() {
            let mut stderr = io::stderr();
            let _ = update_failure.display(&mut stderr);
        } else {
            eprintln!("Error: {}", e);

            for cause in e.iter_causes() {
                eprintln!("\tCaused By: {}", cause);
            }

            eprintln!("{}", e.backtrace());
        }

        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Error> {
    initialize_logging(args)?;
    let cfg = args.config()?;

    if log_enabled!(Level::Debug) {
        for line in format!("{:#?}", cfg).lines() {
            debug!("{}", line);
        }
    }
    if args.verbosity > 0 {
        print!("{}", cfg.summary());
    }

    Driver::with_config(cfg).run()
}

#[derive(Debug, Clone, PartialEq, StructOpt)]
#[structopt(
    name = "git-backup",
    about = "Back up your git repos in your local filesystem."
)]
struct Args {
    #[structopt(help = "The usernames to back up.")]
    usernames: Vec<String>,
    #[structopt(
        short = "p",
        long = "provider",
        help = "Adds custom GitLab providers."
    )]
    custom_providers: Vec<String>,
    #[structopt(long = "exclude-github", help = "Exclude github.com from the backup.")]
    exclude_github: bool,
    #[structopt(long = "exclude-gitlab", help = "Exclude gitlab.com from the backup.")]
    exclude_gitlab: bool,
    #[structopt(
        short = "F",
        long = "flatten",
        help = "Hierarchy levels (ROOT, USER, PROVIDER, ORGANIZATION) to leave out of the \
                folder structure of the backup."
    )]
    flatten: Vec<FlattenLevel>,
    #[structopt(
        short = "R",
        long = "rename-strategy",
        help = "How to rename a repo whose clone path collides with another's (SHORTEST, \
                SHORTEST_SYSTEMATIC, SYSTEMATIC, IGNORE)."
    )]
    strategy: Option<CollisionStrategy>,
    #[structopt(
        short = "y",
        long = "keep-hierarchy",
        help = "Keep the user and organization hierarchy in the backup folder."
    )]
    keep_hierarchy: bool,
    #[structopt(
        short = "n",
        long = "backup-name",
        help = "Custom name for the root backup folder (defaults to a timestamp)."
    )]
    backup_name: Option<String>,
    #[structopt(
        short = "b",
        long = "backup-directory",
        default_value = "backup",
        help = "The folder the backups are stored in."
    )]
    backup_directory: String,
    #[structopt(short = "j", long = "json", help = "Generate a JSON report of the backup.")]
    json: bool,
    #[structopt(
        short = "J",
        long = "json-path",
        help = "Custom path for the JSON report. Implies -j."
    )]
    json_path: Option<String>,
    #[structopt(
        short = "v",
        long = "verbose",
        parse(from_occurrences),
        help = "Verbose output (repeat for more verbosity)."
    )]
    verbosity: u64,
}

impl Args {
    fn config(&self) -> Result<Config, Error> {
        let flattened: LevelSet = self.flatten.iter().copied().collect();

        // Keeping the full hierarchy already guarantees unique paths, so a
        // strategy on top of that is a sign of a confused invocation.
        if self.keep_hierarchy && flattened.is_empty() && self.strategy.is_some() {
            return Err(ConfigError::NeedlessStrategy.into());
        }

        // Generated exactly once and threaded through every identity.
        let backup_name = self
            .backup_name
            .clone()
            .unwrap_or_else(|| Local::now().format("%Y-%m-%dT%H:%M:%S").to_string());

        let backup_root = expand(&self.backup_directory)?;
        fs::create_dir_all(&backup_root).with_context(|_| {
            format!(
                "The backup folder {} cannot be created",
                backup_root.display()
            )
        })?;

        let json_report = match (&self.json_path, self.json) {
            (Some(path), _) => Some(expand(path)?),
            (None, true) => Some(PathBuf::from(format!("backup{}.json", backup_name))),
            (None, false) => None,
        };

        let cfg = Config {
            usernames: self.usernames.clone(),
            backup_name,
            backup_root,
            github: !self.exclude_github,
            gitlab: !self.exclude_gitlab,
            custom_hosts: self.custom_providers.clone(),
            keep_hierarchy: self.keep_hierarchy,
            path_spec: PathSpec {
                flattened,
                strategy: self.strategy.unwrap_or_default(),
            },
            json_report,
        };

        cfg.validate()?;
        Ok(cfg)
    }
}

fn expand(raw: &str) -> Result<PathBuf, Error> {
    let expanded = shellexpand::full(raw).context("Unable to expand wildcards")?;
    Ok(PathBuf::from(expanded.into_owned()))
}

fn initialize_logging(args: &Args) -> Result<(), Error> {
    let mut builder = Builder::new();

    let level = match args.verbosity {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };

    if let Some(lvl) = level {
        builder.filter(Some("git_backup"), lvl);
    }

    if let Ok(filter) = env::var("RUST_LOG") {
        builder.parse(&filter);
    }

    builder.format(|out, record| match record.line() {
        Some(line) => writeln!(
            out,
            "{} [{:5}] ({}#{}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            line,
            record.args()
        ),
        None => writeln!(
            out,
            "{} [{:5}] ({}): {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        ),
    });

    builder.try_init()?;

    Ok(())
}
