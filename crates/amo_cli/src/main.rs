use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use amo_core::{AddonColumn, AddonType, FileRecord, FileStatus};
use amo_engine::{
    default_rc_path, load_config, AddonListing, BugzillaClient, ConsoleConfig, ConsoleError,
    RedashClient, ReqwestSession, SessionSettings, Transport, UserAdminPage, HOST_ENV,
};
use amo_logging::{amo_error, amo_info, amo_warn, LogDestination};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

#[derive(Debug, Parser)]
#[command(
    name = "amo",
    version,
    about = "Moderate add-on files and users through the AMO admin console"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Config file [default: ~/.amorc]")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "ID", help = "Console sessionid cookie")]
    session_id: Option<String>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "JSON cookie file exported from a browser"
    )]
    cookies: Option<PathBuf>,
    #[arg(long, global = true, help = "Print what would change without submitting")]
    dry_run: bool,
    #[arg(long, global = true, help = "Enable debug logging")]
    debug: bool,
    #[arg(long, global = true, value_name = "PATH", help = "Also write the log to a file")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "List the files of an add-on")]
    Files(FilesArgs),
    #[command(about = "Disable all files, or the files of the given versions")]
    Disable(StatusArgs),
    #[command(about = "Approve all files, or the files of the given versions")]
    Enable(StatusArgs),
    #[command(about = "Ban one or more users")]
    Ban(BanArgs),
    #[command(about = "Map add-on identifiers through Redash")]
    Ids(IdsArgs),
    #[command(about = "List the developer accounts of add-ons through Redash")]
    Users(UsersArgs),
    #[command(about = "List add-ons sharing a developer with the given GUIDs")]
    Related(RelatedArgs),
    #[command(subcommand, about = "Read and update Bugzilla bugs")]
    Bug(BugCommands),
}

#[derive(Debug, Args)]
struct FilesArgs {
    #[arg(help = "Add-on id, slug or GUID")]
    addon: String,
    #[arg(long, help = "Print the files as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[arg(help = "Add-on id, slug or GUID")]
    addon: String,
    #[arg(long, value_name = "VERSION", num_args = 1.., help = "Only touch these versions")]
    versions: Vec<String>,
}

#[derive(Debug, Args)]
struct BanArgs {
    #[arg(required = true, value_name = "USER_ID")]
    users: Vec<String>,
}

#[derive(Debug, Args)]
struct IdsArgs {
    #[arg(long, default_value = "guid", help = "Column the ids are given in (id, guid, slug)")]
    from: AddonColumn,
    #[arg(long, default_value = "id", help = "Column to map to (id, guid, slug)")]
    to: AddonColumn,
    #[arg(required = true)]
    ids: Vec<String>,
}

#[derive(Debug, Args)]
struct UsersArgs {
    #[arg(long, default_value = "guid", help = "Column the ids are given in (id, guid, slug)")]
    column: AddonColumn,
    #[arg(required = true)]
    ids: Vec<String>,
}

#[derive(Debug, Args)]
struct RelatedArgs {
    #[arg(
        long = "type",
        value_name = "TYPE",
        help = "Add-on types to include [default: extension]"
    )]
    types: Vec<AddonType>,
    #[arg(required = true, value_name = "GUID")]
    guids: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum BugCommands {
    #[command(about = "Show bug summaries")]
    Show {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    #[command(about = "Print the comments of bugs")]
    Comments {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    #[command(about = "Add a comment to a bug")]
    Comment { id: u64, text: String },
    #[command(about = "Show the account the api key belongs to")]
    Whoami,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileAction {
    Enable,
    Disable,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match cli.log_file.clone() {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    amo_logging::initialize(destination, level);

    let config = resolve_config(&cli)?;
    match cli.command {
        Commands::Files(args) => run_files(console(&config)?, &config, args).await,
        Commands::Disable(args) => {
            run_file_action(console(&config)?, &config, args, FileAction::Disable).await
        }
        Commands::Enable(args) => {
            run_file_action(console(&config)?, &config, args, FileAction::Enable).await
        }
        Commands::Ban(args) => run_ban(console(&config)?, &config, args).await,
        Commands::Ids(args) => run_ids(redash(&config)?, args).await,
        Commands::Users(args) => run_users(redash(&config)?, args).await,
        Commands::Related(args) => run_related(redash(&config)?, args).await,
        Commands::Bug(command) => run_bug(bugzilla(&config)?, command).await,
    }
}

fn console(config: &ConsoleConfig) -> Result<Arc<dyn Transport>> {
    if config.auth.session_id.is_none() && config.auth.cookie_file.is_none() {
        amo_warn!("No session configured; the console will redirect to sign-in");
    }
    let session =
        ReqwestSession::from_config(config).context("failed to set up the console session")?;
    Ok(Arc::new(session))
}

/// Plain session for the REST APIs. Redash queries are POSTs even though they
/// change nothing, so the console's dry run does not apply here.
fn api_transport(config: &ConsoleConfig) -> Result<Arc<dyn Transport>> {
    let settings = SessionSettings {
        dry_run: false,
        ..SessionSettings::from_config(config)
    };
    let session = ReqwestSession::new(settings).context("failed to set up the api session")?;
    Ok(Arc::new(session))
}

fn redash(config: &ConsoleConfig) -> Result<RedashClient> {
    if config.redash.api_key.is_none() {
        bail!("no redash api key configured; set redash.api_key in the config file");
    }
    Ok(RedashClient::new(api_transport(config)?, &config.redash))
}

fn bugzilla(config: &ConsoleConfig) -> Result<BugzillaClient> {
    let client = BugzillaClient::new(api_transport(config)?, &config.bugzilla);
    let readonly = client.is_readonly() || config.dry_run;
    Ok(client.readonly(readonly))
}

/// Config file, then `AMO_HOST`, then command line flags.
fn resolve_config(cli: &Cli) -> Result<ConsoleConfig> {
    let mut config = match cli.config.clone().or_else(default_rc_path) {
        Some(path) => {
            if cli.config.is_some() && !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            load_config(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))?
        }
        None => ConsoleConfig::default().with_host_override(env::var(HOST_ENV).ok().as_deref()),
    };

    if let Some(id) = &cli.session_id {
        config.auth.session_id = Some(id.clone());
    }
    if let Some(path) = &cli.cookies {
        config.auth.cookie_file = Some(path.clone());
    }
    if cli.dry_run {
        config.dry_run = true;
    }
    Ok(config)
}

async fn run_files(transport: Arc<dyn Transport>, config: &ConsoleConfig, args: FilesArgs) -> Result<()> {
    let mut listing = AddonListing::new(transport, config, args.addon.clone());
    let state = listing
        .load()
        .await
        .with_context(|| format!("failed to load the files of {}", args.addon))?;

    if args.json {
        let files: Vec<&FileRecord> = state.files().collect();
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    println!(
        "{}: {} files on {} pages, add-on status {}",
        state.slug,
        state.file_count(),
        state.page_count(),
        state.status
    );
    for file in state.files() {
        print_file(file);
    }
    Ok(())
}

async fn run_file_action(
    transport: Arc<dyn Transport>,
    config: &ConsoleConfig,
    args: StatusArgs,
    action: FileAction,
) -> Result<()> {
    let mut listing =
        AddonListing::new(transport, config, args.addon.clone()).with_autocommit(!config.dry_run);
    let before: HashMap<u64, FileStatus> = listing
        .ensure_loaded()
        .await
        .with_context(|| format!("failed to load the files of {}", args.addon))?
        .files()
        .map(|file| (file.id, file.status))
        .collect();

    let result = match (action, args.versions.is_empty()) {
        (FileAction::Enable, true) => listing.enable_all_files().await,
        (FileAction::Enable, false) => listing.enable_versions(args.versions.as_slice()).await,
        (FileAction::Disable, true) => listing.disable_all_files().await,
        (FileAction::Disable, false) => listing.disable_versions(args.versions.as_slice()).await,
    };
    let touched = match result {
        Ok(touched) => touched,
        Err(ConsoleError::Commit(aggregate)) => {
            for failure in &aggregate.failures {
                amo_error!("Page {} was not saved: {}", failure.page, failure.cause);
            }
            if !aggregate.committed.is_empty() {
                amo_warn!("Pages {:?} were saved and stay changed", aggregate.committed);
            }
            if aggregate.is_authorization() {
                amo_error!("The console session was rejected; sign in again and rerun");
            }
            return Err(ConsoleError::Commit(aggregate))
                .with_context(|| format!("failed to save the files of {}", listing.addon_slug()));
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to update the files of {}", listing.addon_slug()))
        }
    };

    let changed: Vec<&FileRecord> = listing
        .files()
        .filter(|file| before.get(&file.id) != Some(&file.status))
        .collect();
    if config.dry_run {
        println!(
            "Dry run: {} of {} matching files of {} would change",
            changed.len(),
            touched,
            listing.addon_slug()
        );
    } else {
        amo_info!("Saved {} pages of {}", listing.page_count().unwrap_or(0), listing.addon_slug());
        println!(
            "Changed {} of {} matching files of {}",
            changed.len(),
            touched,
            listing.addon_slug()
        );
    }
    for file in changed {
        print_file(file);
    }
    Ok(())
}

async fn run_ban(transport: Arc<dyn Transport>, config: &ConsoleConfig, args: BanArgs) -> Result<()> {
    let mut failed = Vec::new();
    for user in args.users {
        let mut page = UserAdminPage::new(transport.clone(), config, user.clone());
        let outcome = if config.dry_run {
            page.load().await.map(|form| {
                println!("Dry run: would ban user {user} ({} form fields)", form.len());
            })
        } else {
            page.ban().await.map(|()| println!("Banned user {user}"))
        };
        match outcome {
            Ok(()) => {}
            // no point trying the others with a dead session
            Err(err @ ConsoleError::Authorization(_)) => return Err(err.into()),
            Err(err) => {
                amo_error!("{}", err);
                failed.push(user);
            }
        }
    }
    if !failed.is_empty() {
        bail!("failed to ban {}", failed.join(", "));
    }
    Ok(())
}

async fn run_ids(redash: RedashClient, args: IdsArgs) -> Result<()> {
    let mapped = redash
        .map_ids(args.from, args.to, args.ids.as_slice())
        .await
        .context("id lookup failed")?;
    for id in &args.ids {
        match mapped.get(id.trim()) {
            Some(value) => println!("{id}\t{}", plain(value)),
            None => amo_warn!("No add-on with {} {}", args.from, id),
        }
    }
    Ok(())
}

async fn run_users(redash: RedashClient, args: UsersArgs) -> Result<()> {
    let users = redash
        .users_for_ids(args.column, args.ids.as_slice())
        .await
        .context("user lookup failed")?;
    for user in users {
        println!(
            "{:>10}  {:<24} {}",
            user.user_id,
            user.username.unwrap_or_default(),
            user.display_name.unwrap_or_default()
        );
    }
    Ok(())
}

async fn run_related(redash: RedashClient, args: RelatedArgs) -> Result<()> {
    let guids = redash
        .involved_accounts(args.guids.as_slice(), &args.types)
        .await
        .context("related add-on lookup failed")?;
    amo_info!("{} add-ons share a developer with {}", guids.len(), args.guids.join(", "));
    for guid in guids {
        println!("{guid}");
    }
    Ok(())
}

async fn run_bug(bugzilla: BugzillaClient, command: BugCommands) -> Result<()> {
    match command {
        BugCommands::Show { ids } => {
            for bug in bugzilla.get(&ids).await.context("failed to fetch bugs")? {
                println!(
                    "{:>8}  {:<10} {:<10} {}",
                    bug.id, bug.status, bug.resolution, bug.summary
                );
            }
        }
        BugCommands::Comments { ids } => {
            let comments = bugzilla.comments(&ids).await.context("failed to fetch comments")?;
            for (id, comments) in comments {
                for comment in comments {
                    println!(
                        "--- bug {id} comment {} by {} at {}",
                        comment.id, comment.creator, comment.creation_time
                    );
                    println!("{}", comment.text);
                }
            }
        }
        BugCommands::Comment { id, text } => {
            match bugzilla
                .add_comment(id, &text)
                .await
                .with_context(|| format!("failed to comment on bug {id}"))?
            {
                Some(_) => println!("Commented on bug {id}"),
                None => println!("Read-only: would comment on bug {id}"),
            }
        }
        BugCommands::Whoami => {
            let account = bugzilla.whoami().await.context("whoami failed")?;
            println!(
                "{} ({}) id {}",
                account.name,
                account.real_name.unwrap_or_default(),
                account.id
            );
        }
    }
    Ok(())
}

fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn print_file(file: &FileRecord) {
    println!(
        "{:>10}  {:<12} {:<9} {:<14} {}",
        file.id, file.version.name, file.status, file.platforms, file.name
    );
}
