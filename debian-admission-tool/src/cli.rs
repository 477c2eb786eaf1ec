// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::logging::logger_from_verbosity,
    clap::{Arg, ArgMatches, Command},
    debian_admission::{
        checkin::Admitter,
        config::{Distribution, RepositoryConfig},
        error::{AdmissionError, ErrorKind},
        index::InMemoryPackageIndex,
        policy::{ForcePolicy, Overrides},
        pool::FilesystemPool,
    },
    fs2::FileExt,
    slog::{debug, info, Logger},
    std::{io::Write, path::Path},
    thiserror::Error,
};

const CONFIG_ABOUT: &str = "\
Repository Configuration

Every command reads a YAML file describing the repository. It has the
following keys:

base_dir (required) (string)
   Root directory of the repository. It holds the `pool/`, `dists/` and `db/`
   directories. Relative paths are resolved against the directory of the
   configuration file.

distributions (required) (list)
   Distributions of the repository. Each entry has the following keys:

   codename (required) (string)
      Name of the distribution. Indices live in `dists/<codename>`.

   suite (optional) (string)
      Alternate name of the distribution, e.g. `stable`.

   components (required) (list[string])
      Components of the distribution, e.g. `main` and `contrib`.

   architectures (required) (list[string])
      Binary architectures of the distribution. Packages of architecture
      `all` are registered under each of them.
";

const INCLUDE_ABOUT: &str = "\
Admit uploads described by .changes files.

Every file listed by a .changes file must be in the same directory as the
.changes file. Files are copied into the pool and the packages are registered
into the indices of the given distribution.

Files already in the pool with identical content are left alone. Files in the
pool with different content cause the upload to be rejected.

Nothing is undone when an upload is rejected after files were copied. Admitting
the same upload again is safe.
";

const INCLUDEDEB_ABOUT: &str = "\
Admit binary packages.

Section and priority are read from the package unless overridden. Packages
lacking either must have it specified with --section or --priority.
";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("argument parsing error: {0:?}")]
    Clap(#[from] clap::Error),

    #[error("{0}")]
    Admission(#[from] AdmissionError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),
}

impl CliError {
    /// Process exit code to report this error with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Admission(err) => match err.kind() {
                ErrorKind::MalformedGrammar
                | ErrorKind::MissingField
                | ErrorKind::InconsistentDeclaration
                | ErrorKind::IntegrityMismatch => 1,
                ErrorKind::DownstreamFailure | ErrorKind::ResourceExhaustion => 2,
            },
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

fn add_override_args(command: Command<'static>) -> Command<'static> {
    command
        .arg(
            Arg::new("component")
                .long("component")
                .short('C')
                .takes_value(true)
                .help("Component to put packages in instead of guessing it"),
        )
        .arg(
            Arg::new("section")
                .long("section")
                .short('S')
                .takes_value(true)
                .help("Section to put packages in"),
        )
        .arg(
            Arg::new("priority")
                .long("priority")
                .short('P')
                .takes_value(true)
                .help("Priority to give packages"),
        )
        .arg(
            Arg::new("codename")
                .required(true)
                .help("Codename of the distribution to admit into"),
        )
}

fn app() -> Command<'static> {
    let app = Command::new("Debian Upload Admission Tool")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Admit uploads into Debian repositories")
        .after_long_help(CONFIG_ABOUT)
        .arg_required_else_help(true);

    let app = app
        .arg(
            Arg::new("config")
                .long("config")
                .takes_value(true)
                .required(true)
                .allow_invalid_utf8(true)
                .help("Path to a YAML file describing the repository"),
        )
        .arg(
            Arg::new("force")
                .long("force")
                .global(true)
                .help("Proceed past every problem that can be tolerated"),
        )
        .arg(
            Arg::new("tolerate-missing")
                .long("tolerate-missing")
                .takes_value(true)
                .multiple_occurrences(true)
                .global(true)
                .help("Tolerate absence of the named .changes field"),
        )
        .arg(
            Arg::new("allow-undeclared-architecture")
                .long("allow-undeclared-architecture")
                .global(true)
                .help("Admit binaries of architectures the distribution does not declare"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        );

    let app = app.subcommand(
        add_override_args(
            Command::new("include")
                .about("Admit uploads described by .changes files")
                .long_about(INCLUDE_ABOUT),
        )
        .arg(
            Arg::new("changes")
                .required(true)
                .multiple_values(true)
                .allow_invalid_utf8(true)
                .help(".changes files to admit"),
        ),
    );

    let app = app.subcommand(
        add_override_args(
            Command::new("includedeb")
                .about("Admit .deb and .udeb files")
                .long_about(INCLUDEDEB_ABOUT),
        )
        .arg(
            Arg::new("deb")
                .required(true)
                .multiple_values(true)
                .allow_invalid_utf8(true)
                .help(".deb or .udeb files to admit"),
        ),
    );

    app.subcommand(
        Command::new("dump")
            .about("Print the indices of a distribution")
            .arg(
                Arg::new("codename")
                    .required(true)
                    .help("Codename of the distribution to print"),
            ),
    )
}

pub fn run_cli() -> Result<()> {
    let mut app = app();
    let matches = app.clone().get_matches();

    match matches.subcommand() {
        Some(_) => dispatch(&matches),
        None => {
            app.print_help()?;
            Ok(())
        }
    }
}

fn dispatch(matches: &ArgMatches) -> Result<()> {
    let logger = logger_from_verbosity(matches.occurrences_of("verbose"));

    match matches.subcommand() {
        Some(("include", args)) => command_include(&logger, matches, args),
        Some(("includedeb", args)) => command_includedeb(&logger, matches, args),
        Some(("dump", args)) => command_dump(&logger, matches, args),
        Some((command, _)) => Err(CliError::InvalidSubCommand(command.to_string())),
        None => Ok(()),
    }
}

/// A repository opened for the duration of a command.
///
/// Holds an exclusive lock on the repository until dropped.
struct Repository {
    config: RepositoryConfig,
    _lock: std::fs::File,
}

impl Repository {
    fn open(logger: &Logger, matches: &ArgMatches) -> Result<Self> {
        let config_path = matches
            .value_of_os("config")
            .expect("config argument is required");

        let config = RepositoryConfig::from_path(config_path)?;

        let db_dir = config.base_dir.join("db");
        std::fs::create_dir_all(&db_dir)?;

        let lock_path = db_dir.join("lockfile");
        let lock = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        debug!(logger, "locking {}", lock_path.display());
        lock.lock_exclusive()?;

        Ok(Self {
            config,
            _lock: lock,
        })
    }

    fn distribution(&self, args: &ArgMatches) -> Result<&Distribution> {
        let codename = args
            .value_of("codename")
            .expect("codename argument is required");

        Ok(self.config.distribution(codename)?)
    }

    fn load_index(&self, distribution: &Distribution) -> Result<InMemoryPackageIndex> {
        let index = InMemoryPackageIndex::default();
        index.load_dists(&self.config.base_dir, distribution)?;

        Ok(index)
    }
}

fn force_policy(matches: &ArgMatches) -> Result<ForcePolicy> {
    let mut policy = if matches.is_present("force") {
        ForcePolicy::forced()
    } else {
        ForcePolicy::strict()
    };

    if let Some(fields) = matches.values_of("tolerate-missing") {
        for field in fields {
            policy = policy.tolerate_missing(field)?;
        }
    }

    if matches.is_present("allow-undeclared-architecture") {
        policy = policy.allow_undeclared_architecture(true);
    }

    Ok(policy)
}

fn overrides(args: &ArgMatches) -> Overrides {
    Overrides {
        component: args.value_of("component").map(|s| s.to_string()),
        section: args.value_of("section").map(|s| s.to_string()),
        priority: args.value_of("priority").map(|s| s.to_string()),
    }
}

/// Run `f` for every path argument named `name`, then persist the indices.
///
/// Stops at the first failing path. Indices are written regardless, as packages
/// registered before a failure stay registered.
fn admit_each(
    logger: &Logger,
    matches: &ArgMatches,
    args: &ArgMatches,
    name: &str,
    f: impl Fn(&Admitter, &Distribution, &Path) -> Result<()>,
) -> Result<()> {
    let repo = Repository::open(logger, matches)?;
    let distribution = repo.distribution(args)?;
    let base_dir = &repo.config.base_dir;

    let pool = FilesystemPool::new(logger.clone(), base_dir);
    let index = repo.load_index(distribution)?;

    let admitter = Admitter::new(logger.clone(), &pool, &index)
        .with_force(force_policy(matches)?)
        .with_overrides(overrides(args));

    let mut res = Ok(());

    for path in args
        .values_of_os(name)
        .expect("path arguments are required")
    {
        if let Err(err) = f(&admitter, distribution, Path::new(path)) {
            res = Err(err);
            break;
        }
    }

    for path in index.write_dists(base_dir)? {
        debug!(logger, "wrote {}", path.display());
    }

    res
}

fn command_include(logger: &Logger, matches: &ArgMatches, args: &ArgMatches) -> Result<()> {
    admit_each(logger, matches, args, "changes", |admitter, distribution, path| {
        let report = admitter.admit_upload(distribution, path)?;

        info!(
            logger,
            "{}: {} {} in {} ({} files, {} packages)",
            path.display(),
            report.source,
            report.version,
            report.component,
            report.files.len(),
            report.registrations.len()
        );

        Ok(())
    })
}

fn command_includedeb(logger: &Logger, matches: &ArgMatches, args: &ArgMatches) -> Result<()> {
    admit_each(logger, matches, args, "deb", |admitter, distribution, path| {
        for registration in admitter.admit_binary(distribution, path)? {
            info!(
                logger,
                "{}: {} {} for {} in {}",
                path.display(),
                registration.package,
                registration.version,
                registration.architecture,
                registration.component
            );
        }

        Ok(())
    })
}

fn command_dump(logger: &Logger, matches: &ArgMatches, args: &ArgMatches) -> Result<()> {
    let repo = Repository::open(logger, matches)?;
    let distribution = repo.distribution(args)?;
    let index = repo.load_index(distribution)?;

    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();

    for record in index.records() {
        writeln!(
            stdout,
            "# {}/{} {} {}",
            record.component,
            record.architecture,
            record.kind.as_ref(),
            record.file_keys.primary()
        )?;
        record.control.write(&mut stdout)?;
        writeln!(stdout)?;
    }

    Ok(())
}
