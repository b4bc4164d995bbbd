use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

use mirror_console::config;
use mirror_console::console::{ActionKind, AssumeYes, Confirm, ConfigForm, Console, Listing};
use mirror_console::errors::ConsoleError;
use mirror_console::models::config::LauncherConfig;
use mirror_console::models::files::DirectoryPath;
use mirror_console::notification::{self, NoticeKind, Notifier};
use mirror_console::session::cookie::CookieFileChannel;
use mirror_console::session::storage::FileTokenStorage;
use mirror_console::session::{DeliveryChannel, SessionStatus, SessionStore};

mod cli;

/// Confirmation read from the terminal. Anything but y/yes declines.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        match read_line(&format!("{} [y/N] ", prompt)) {
            Ok(Some(answer)) => matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "mirror_console=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::Cli::parse();
    let mut cfg = config::load()?;
    if let Some(server) = args.server {
        url::Url::parse(&server).with_context(|| format!("invalid --server URL: {}", server))?;
        cfg.server_url = server;
    }
    if let cli::Commands::Files {
        command: cli::FilesCommands::Get { out: Some(dir), .. },
    } = &args.command
    {
        cfg.download_dir = dir.clone();
    }

    let session = open_session(&cfg)?;
    let confirm: Arc<dyn Confirm> = if args.yes {
        Arc::new(AssumeYes)
    } else {
        Arc::new(StdinConfirm)
    };
    let mut console = Console::new(&cfg, session, confirm, Notifier::console())?;

    match args.command {
        cli::Commands::Login {
            username,
            password,
            otp,
        } => login(&mut console, username, password, otp).await,
        cli::Commands::Logout => {
            console.logout();
            println!("Logged out.");
            Ok(())
        }
        cli::Commands::Status => {
            match console.check_session() {
                SessionStatus::Authenticated => println!("Logged in to {}", cfg.server_url),
                SessionStatus::Unauthenticated => println!("Not logged in ({})", cfg.server_url),
            }
            Ok(())
        }
        command => {
            if !console.is_authenticated() {
                anyhow::bail!("not logged in; run `mirror-admin login` first");
            }
            let result = match command {
                cli::Commands::Config { command } => handle_config_command(&mut console, command).await,
                cli::Commands::Files { command } => handle_files_command(&mut console, command).await,
                cli::Commands::Blacklist { command } => {
                    handle_blacklist_command(&mut console, command).await
                }
                cli::Commands::Login { .. } | cli::Commands::Logout | cli::Commands::Status => Ok(()),
            };
            finish(&mut console, result)
        }
    }
}

fn open_session(cfg: &config::Config) -> anyhow::Result<Arc<SessionStore>> {
    let storage = FileTokenStorage::new(&cfg.session_file);
    let channel = cfg.cookie_file.as_ref().map(CookieFileChannel::new);
    let store = SessionStore::open(
        Box::new(storage),
        channel.as_ref().map(|c| c as &dyn DeliveryChannel),
    )
    .with_context(|| format!("failed to open session file {}", cfg.session_file.display()))?;
    Ok(Arc::new(store))
}

/// Map an expired session to a login hint once the console has reset.
fn finish(console: &mut Console, result: anyhow::Result<()>) -> anyhow::Result<()> {
    console.check_session();
    match result {
        Err(e) if matches!(e.downcast_ref::<ConsoleError>(), Some(ConsoleError::AuthExpired)) => {
            anyhow::bail!("{}; run `mirror-admin login`", ConsoleError::AuthExpired)
        }
        other => other,
    }
}

async fn login(
    console: &mut Console,
    username: Option<String>,
    password: Option<String>,
    otp: Option<String>,
) -> anyhow::Result<()> {
    console.auth.check_two_factor().await;

    console.auth.form.username = match username {
        Some(u) => u,
        None => read_line("Username [admin]: ")?.unwrap_or_default(),
    };
    let password = match password {
        Some(p) => p,
        None => read_line("Password: ")?.unwrap_or_default(),
    };
    console.auth.form.password = Zeroizing::new(password);
    if console.auth.requires_otp() {
        console.auth.form.otp_code = match otp {
            Some(code) => code,
            None => read_line("Verification code: ")?.unwrap_or_default(),
        };
    }

    console.auth.login().await.context("login failed")?;
    console.check_session();
    println!("Logged in.");
    Ok(())
}

async fn handle_config_command(console: &mut Console, cmd: cli::ConfigCommands) -> anyhow::Result<()> {
    console.config.load().await?;

    match cmd {
        cli::ConfigCommands::Show => {
            let form = console.config.form_mut()?;
            print_config(form)?;
            return Ok(());
        }
        cli::ConfigCommands::Set { field, value } => {
            console.config.form_mut()?.set_field(&field, &value)?;
        }
        cli::ConfigCommands::Launcher { command } => {
            let form = console.config.form_mut()?;
            match command {
                cli::LauncherCommands::Add {
                    name,
                    source_url,
                    repo_selector,
                } => {
                    form.add_row(LauncherConfig::new(&name, &source_url, repo_selector.as_deref()));
                }
                cli::LauncherCommands::Rm { index } => {
                    let id = form
                        .row_at(index)
                        .ok_or_else(|| anyhow::anyhow!("no launcher at position {}", index))?;
                    form.remove_row(id);
                }
            }
        }
        cli::ConfigCommands::Password { value } => {
            let value = Zeroizing::new(match value {
                Some(v) => v,
                None => read_line("New admin password: ")?.unwrap_or_default(),
            });
            if value.is_empty() {
                anyhow::bail!("password left blank, nothing changed");
            }
            console.config.form_mut()?.set_password(&value);
        }
        cli::ConfigCommands::GithubToken { value } => {
            let value = Zeroizing::new(match value {
                Some(v) => v,
                None => read_line("Token: ")?.unwrap_or_default(),
            });
            if value.is_empty() {
                anyhow::bail!("token left blank, nothing changed");
            }
            console.config.form_mut()?.set_github_token(&value);
        }
        cli::ConfigCommands::TwoFactor { action } => {
            let form = console.config.form_mut()?;
            match action {
                cli::TwoFactorAction::Enable => form.set_two_factor_enabled(true),
                cli::TwoFactorAction::Disable => form.set_two_factor_enabled(false),
                cli::TwoFactorAction::Regenerate => form.regenerate_secret(),
            }
        }
    }

    console.config.save().await?;
    print_notice(console.notifier(), notification::CONFIG);

    if let Some(form) = console.config.form() {
        if let Some(qr) = &form.two_factor.qr_url {
            println!("2FA secret: {}", form.two_factor.secret);
            println!("Scan:       {}", qr);
        }
    }
    Ok(())
}

fn print_config(form: &ConfigForm) -> anyhow::Result<()> {
    let fields = serde_json::to_value(&form.fields)?;
    if let Some(map) = fields.as_object() {
        for (key, value) in map {
            if matches!(key.as_str(), "launchers" | "two_factor_enabled" | "two_factor_secret") {
                continue;
            }
            println!("{:<26} {}", key, value);
        }
    }

    println!();
    if form.rows().is_empty() {
        println!("No launchers configured.");
    } else {
        println!("{:<4} {:<20} {:<50} {}", "#", "NAME", "SOURCE", "SELECTOR");
        for (i, row) in form.rows().iter().enumerate() {
            println!("{:<4} {:<20} {:<50} {}", i, row.name, row.source_url, row.repo_selector);
        }
    }

    println!();
    println!("2FA enabled: {}", form.two_factor.enabled);
    if let Some(qr) = &form.two_factor.qr_url {
        println!("2FA secret:  {}", form.two_factor.secret);
        println!("Scan:        {}", qr);
    }
    Ok(())
}

async fn handle_files_command(console: &mut Console, cmd: cli::FilesCommands) -> anyhow::Result<()> {
    match cmd {
        cli::FilesCommands::Ls { path } => {
            console.files.navigate(DirectoryPath::parse(&path)).await?;
            print_listing(console.files.listing());
        }
        cli::FilesCommands::Get { path, .. } => {
            let saved = console.files.download(&DirectoryPath::parse(&path)).await?;
            println!("Saved {}", saved.display());
        }
        cli::FilesCommands::Put { file, dir } => {
            console.files.navigate(DirectoryPath::parse(&dir)).await?;
            console.files.select_upload(file);
            let target = console.files.upload().await?;
            println!("Uploaded to {}", target);
        }
        cli::FilesCommands::Rm { path } => {
            let path = DirectoryPath::parse(&path);
            if path.is_root() {
                anyhow::bail!("refusing to delete the storage root");
            }
            if console.files.delete(&path).await? {
                println!("Deleted {}", path);
            } else {
                println!("Cancelled.");
            }
        }
        cli::FilesCommands::Browse { path } => browse(console, DirectoryPath::parse(&path)).await?,
    }
    Ok(())
}

const BROWSE_HELP: &str = "commands: open N | get N | rm N | up | ls | put FILE | help | quit";

/// Line-oriented browser over the listing's action table.
async fn browse(console: &mut Console, start: DirectoryPath) -> anyhow::Result<()> {
    console.files.navigate(start).await?;
    println!("{}", BROWSE_HELP);

    loop {
        print_listing(console.files.listing());
        let prompt = format!("/{}> ", console.files.current());
        let Some(line) = read_line(&prompt)? else {
            break;
        };
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line.as_str(), ""),
        };

        let outcome = match verb {
            "" => continue,
            "q" | "quit" | "exit" => break,
            "help" => {
                println!("{}", BROWSE_HELP);
                continue;
            }
            "ls" => console.files.refresh().await,
            "up" => match console.files.current().parent() {
                Some(parent) => console.files.navigate(parent).await,
                None => continue,
            },
            "put" if !arg.is_empty() => {
                console.files.select_upload(arg);
                console.files.upload().await.map(|_| ())
            }
            "open" | "get" | "rm" => {
                let action = match verb {
                    "open" => ActionKind::Open,
                    "get" => ActionKind::Download,
                    _ => ActionKind::Delete,
                };
                let command = arg
                    .parse::<usize>()
                    .ok()
                    .and_then(|row| console.files.listing().command(row, action));
                match command {
                    Some(command) => console.files.dispatch(command).await,
                    None => {
                        println!("row '{}' has no '{}' action", arg, verb);
                        continue;
                    }
                }
            }
            _ => {
                println!("{}", BROWSE_HELP);
                continue;
            }
        };

        print_notice(console.notifier(), notification::FILES);
        if let Err(ConsoleError::AuthExpired) = outcome {
            console.check_session();
            eprintln!("{}", ConsoleError::AuthExpired);
            login(console, None, None, None).await?;
            console.files.navigate(DirectoryPath::root()).await?;
        }
    }
    Ok(())
}

fn print_listing(listing: &Listing) {
    println!("/{}", listing.path);
    if listing.rows.is_empty() {
        println!("  (empty)");
        return;
    }
    for (i, row) in listing.rows.iter().enumerate() {
        println!("{:>4}  {:<40} {:>12}  {}", i, row.name, row.size, row.modified);
    }
}

async fn handle_blacklist_command(
    console: &mut Console,
    cmd: cli::BlacklistCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::BlacklistCommands::Ls => {
            console.blacklist.load().await?;
            let rows = console.blacklist.rows();
            if rows.is_empty() {
                println!("No blocked addresses.");
            } else {
                println!("{:<40} {:<30} {}", "IP", "REASON", "CREATED");
                for r in rows {
                    println!("{:<40} {:<30} {}", r.ip, r.reason, r.created);
                }
            }
        }
        cli::BlacklistCommands::Add { ip, reason } => {
            console.blacklist.form.ip = ip;
            console.blacklist.form.reason = reason;
            console.blacklist.add().await?;
            print_notice(console.notifier(), notification::BLACKLIST);
        }
        cli::BlacklistCommands::Rm { ip } => {
            if console.blacklist.remove(&ip).await? {
                print_notice(console.notifier(), notification::BLACKLIST);
            } else {
                println!("Cancelled.");
            }
        }
    }
    Ok(())
}

fn print_notice(notifier: &Notifier, region: &str) {
    if let Some(notice) = notifier.current(region) {
        match notice.kind {
            NoticeKind::Success => println!("{}", notice.text),
            NoticeKind::Error => eprintln!("{}", notice.text),
        }
    }
}

/// Read one trimmed line from stdin. `None` on end of input.
fn read_line(prompt: &str) -> anyhow::Result<Option<String>> {
    eprint!("{}", prompt);
    std::io::stderr().flush()?;
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
