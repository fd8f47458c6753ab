use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use compreface_core::flow::{ConfigFlow, FlowResult, OptionsFlow, ERROR_BASE};
use compreface_core::{Capability, DnsResolver, EntryData, Store};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

const DEFAULT_PORT: u16 = 8000;

#[derive(Parser)]
#[command(name = "compreface", about = "CompreFace face recognition bridge CLI")]
struct Cli {
    /// Store file (defaults to $COMPREFACE_STORE_PATH or the XDG config dir)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Talk to the daemon on the system bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the CompreFace entry
    Setup,
    /// Choose the cameras used per capability
    Options,
    /// Run recognition on a sensor (entity id or camera device id)
    Update { target: String },
    /// List sensors and their state
    List,
    /// Show daemon status
    Status,
    /// Ask the daemon to reload the entry from the store
    Reload,
}

#[zbus::proxy(
    interface = "org.compreface.Bridge1",
    default_service = "org.compreface.Bridge1",
    default_path = "/org/compreface/Bridge1"
)]
trait Bridge {
    async fn update(&self, target: &str) -> zbus::Result<String>;
    async fn list_sensors(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
    async fn reload(&self) -> zbus::Result<bool>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store_path = cli.store.clone().unwrap_or_else(default_store_path);
    let system = cli.system || std::env::var("COMPREFACE_SYSTEM_BUS").is_ok_and(|v| v == "1");

    match cli.command {
        Commands::Setup => setup(&store_path).await?,
        Commands::Options => {
            options(&store_path)?;
            match reload(system).await {
                Ok(()) => println!("comprefaced reloaded"),
                Err(e) => println!("comprefaced not reachable ({e:#}); options apply on next start"),
            }
        }
        Commands::Update { target } => {
            let proxy = connect(system).await?;
            print_json(&proxy.update(&target).await?);
        }
        Commands::List => {
            let proxy = connect(system).await?;
            print_json(&proxy.list_sensors().await?);
        }
        Commands::Status => {
            let proxy = connect(system).await?;
            print_json(&proxy.status().await?);
        }
        Commands::Reload => {
            reload(system).await?;
            println!("comprefaced reloaded");
        }
    }

    Ok(())
}

fn default_store_path() -> PathBuf {
    std::env::var("COMPREFACE_STORE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| compreface_core::store::default_path())
}

async fn connect(system: bool) -> Result<BridgeProxy<'static>> {
    let conn = if system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    }
    .context("cannot connect to D-Bus")?;
    tracing::debug!(system, "connected to D-Bus");
    let proxy = BridgeProxy::new(&conn)
        .await
        .context("comprefaced is not running")?;
    Ok(proxy)
}

async fn reload(system: bool) -> Result<()> {
    connect(system).await?.reload().await?;
    Ok(())
}

fn print_json(reply: &str) {
    match serde_json::from_str::<serde_json::Value>(reply) {
        Ok(value) => println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| reply.to_string())
        ),
        Err(_) => println!("{reply}"),
    }
}

async fn setup(store_path: &Path) -> Result<()> {
    let mut store = Store::load(store_path)?;
    let entry_exists = store.entry.is_some();
    let resolver = DnsResolver;
    let flow = ConfigFlow::new(&resolver);

    let mut result = flow.step_user(None, entry_exists).await;
    loop {
        match result {
            FlowResult::Form { errors, .. } => {
                if let Some(error) = errors.get(ERROR_BASE) {
                    println!("Invalid input ({error}): the host must resolve and at least one API key is required.");
                }
                let input = prompt_entry()?;
                result = flow.step_user(Some(input), entry_exists).await;
            }
            FlowResult::CreateEntry { title, data } => {
                store.entry = Some(data);
                store.save(store_path)?;
                println!("Created entry {title} in {}", store_path.display());
                return Ok(());
            }
            FlowResult::Abort { reason } => bail!("setup aborted: {reason}"),
        }
    }
}

fn options(store_path: &Path) -> Result<()> {
    let mut store = Store::load(store_path)?;
    let Some(data) = store.entry.clone() else {
        bail!("no entry configured; run `compreface setup` first");
    };

    if !store.cameras.is_empty() {
        println!("Known cameras:");
        for camera in &store.cameras {
            println!("  {:<16} {}", camera.id, camera.name);
        }
    }
    println!("Enter comma-separated device ids. Blank keeps the current selection, `-` clears it.");

    let mut flow = OptionsFlow::new(&data, &store.options);
    let mut result = flow.step_init();
    loop {
        match result {
            FlowResult::Form { step_id, .. } => {
                let capability = Capability::from_step_id(&step_id)
                    .with_context(|| format!("unexpected step {step_id}"))?;
                let current = store.options.devices(capability).unwrap_or_default().join(",");
                let line = prompt(&format!("{capability} cameras"), Some(&current))?;
                let devices = parse_devices(&line);
                for id in unknown_devices(&store, &devices) {
                    println!("warning: {id} is not a known camera");
                }
                result = flow.step(capability, Some(devices));
            }
            FlowResult::CreateEntry { data, .. } => {
                store.options = data;
                store.save(store_path)?;
                println!("Options saved to {}", store_path.display());
                return Ok(());
            }
            FlowResult::Abort { reason } => bail!("options aborted: {reason}"),
        }
    }
}

fn prompt_entry() -> Result<EntryData> {
    let host = prompt("Host", None)?;
    let port = parse_port(&prompt("Port", Some(&DEFAULT_PORT.to_string()))?)?;
    Ok(EntryData {
        host,
        port,
        recognize_api_key: prompt(Capability::Recognition.api_key_field(), Some(""))?,
        verify_api_key: prompt(Capability::Verification.api_key_field(), Some(""))?,
        detect_api_key: prompt(Capability::Detection.api_key_field(), Some(""))?,
    })
}

/// Read one trimmed line; a blank answer yields `default` when given.
fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) if !d.is_empty() => print!("{label} [{d}]: "),
        _ => print!("{label}: "),
    }
    std::io::stdout().flush()?;

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("input closed");
    }
    let answer = line.trim();
    Ok(match default {
        Some(d) if answer.is_empty() => d.to_string(),
        _ => answer.to_string(),
    })
}

fn parse_port(input: &str) -> Result<u16> {
    input
        .trim()
        .parse()
        .with_context(|| format!("invalid port: {input}"))
}

fn parse_devices(input: &str) -> Vec<String> {
    if input.trim() == "-" {
        return Vec::new();
    }
    input
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// Selected ids missing from the store's camera list. Without a camera list
/// nothing can be checked.
fn unknown_devices<'a>(store: &Store, devices: &'a [String]) -> Vec<&'a str> {
    if store.cameras.is_empty() {
        return Vec::new();
    }
    devices
        .iter()
        .filter(|id| store.camera(id).is_none())
        .map(String::as_str)
        .collect()
}
