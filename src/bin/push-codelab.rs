use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use push_codelab::{
    AppConfig, MemoryView, Permission, PlatformError, SimulatedPlatform, SimulatedPushManager,
    Startup, SubscriptionController,
};

fn print_usage() {
    eprintln!("Usage: push-codelab [OPTIONS]");
    eprintln!();
    eprintln!("Serves the push notification codelab page.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --host <HOST>          Bind address (default: 0.0.0.0)");
    eprintln!("  --port <PORT>          Listening port (default: 8080)");
    eprintln!("  --assets <DIR>         Serve DIR instead of the built-in page");
    eprintln!("  --config <FILE>        Read configuration from FILE");
    eprintln!("  --simulate [MODE]      Run the subscription flow against a simulated");
    eprintln!("                         platform and exit (MODE: ok, deny, reject)");
    eprintln!("  -h, --help             Show this help");
}

/// Platform behaviour for `--simulate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimulateMode {
    Ok,
    Deny,
    Reject,
}

impl SimulateMode {
    fn parse(mode: &str) -> Option<Self> {
        match mode {
            "ok" => Some(Self::Ok),
            "deny" => Some(Self::Deny),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

fn value(args: &[String], i: usize, flag: &str) -> String {
    args.get(i).cloned().unwrap_or_else(|| {
        eprintln!("Error: {flag} requires a value");
        std::process::exit(1);
    })
}

/// Drives one subscribe and one unsubscribe through the simulated platform,
/// logging what the page would show after each step.
async fn simulate(config: &AppConfig, mode: SimulateMode) -> push_codelab::Result<()> {
    let push = match mode {
        SimulateMode::Deny => SimulatedPushManager::new().with_permission(Permission::Denied),
        SimulateMode::Reject => SimulatedPushManager::new()
            .rejecting_subscribe(PlatformError::new("AbortError", "push service unreachable")),
        SimulateMode::Ok => SimulatedPushManager::new(),
    };
    let platform = SimulatedPlatform::new(push);
    let view = Arc::new(MemoryView::new());

    let startup = SubscriptionController::start(
        &platform,
        Arc::clone(&view),
        config.push.application_server_key.clone(),
    )
    .await?;
    log::info!("startup: {:?} {:?}", startup.state(), view.snapshot());

    let Startup::Ready(controller) = startup else {
        return Ok(());
    };
    for step in ["first click", "second click"] {
        controller.on_button_activated().await?;
        log::info!("{step}: {:?} {:?}", controller.state(), view.snapshot());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> push_codelab::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut host = None;
    let mut port = None;
    let mut assets = None;
    let mut config_path = None;
    let mut simulate_mode = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "--host" => {
                i += 1;
                host = Some(value(&args, i, "--host"));
            }
            "--port" => {
                i += 1;
                let raw = value(&args, i, "--port");
                port = Some(raw.parse::<u16>().unwrap_or_else(|_| {
                    eprintln!("Error: invalid port '{raw}'");
                    std::process::exit(1);
                }));
            }
            "--assets" => {
                i += 1;
                assets = Some(PathBuf::from(value(&args, i, "--assets")));
            }
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(value(&args, i, "--config")));
            }
            "--simulate" => {
                // Optional mode argument
                match args.get(i + 1) {
                    Some(mode) if !mode.starts_with('-') => {
                        i += 1;
                        simulate_mode = Some(SimulateMode::parse(mode).unwrap_or_else(|| {
                            eprintln!("Error: unknown --simulate mode '{mode}'");
                            print_usage();
                            std::process::exit(1);
                        }));
                    }
                    _ => simulate_mode = Some(SimulateMode::Ok),
                }
            }
            other => {
                eprintln!("Error: unknown argument '{other}'");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => AppConfig::load_from(&path)?.with_env_overrides(),
        None => AppConfig::load()?,
    };
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(dir) = assets {
        config.server.asset_dir = Some(dir);
    }

    if let Some(mode) = simulate_mode {
        return simulate(&config, mode).await;
    }

    push_codelab::server::run(config).await
}
