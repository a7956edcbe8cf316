//! evtrigger - input event daemon
//!
//! Usage: `evtrigger [CONFIG]`

use anyhow::{Context, Result};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use evtrigger::{
    config::Config,
    dispatch::{DispatchEngine, ProcessLauncher},
    input::EventCodeTable,
    rules::RuleLoader,
    watcher::{Control, DeviceWatcher, DumpOutput, DynamicWatcher, StaticWatcher},
};

fn main() {
    if let Err(e) = run() {
        eprintln!("evtrigger: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let (config, source) = Config::load(explicit.as_deref()).context("loading settings")?;

    let default_filter = config.log_level.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    match &source {
        Some(path) => info!("Settings from {}", path.display()),
        None => info!("No settings file, using defaults"),
    }

    let codes = EventCodeTable::load(&config.event_table).context("loading event code table")?;
    info!("{} event names known", codes.len());
    let codes = Arc::new(codes);

    let control = Control::new().context("creating control channel")?;
    control
        .install_signal_handlers()
        .context("installing signal handlers")?;

    let loader = RuleLoader::new(&config.rules, Arc::clone(&codes));
    let launcher = ProcessLauncher::new().context("starting child reaper")?;
    let mut engine = DispatchEngine::with_loader(launcher, loader);
    for code in config.ignored_codes(&codes) {
        engine.ignore(code);
    }
    let dump_out = DumpOutput::stdout();
    engine.set_dump(config.dump);
    engine.set_dump_output(dump_out.clone());

    let mut watcher: Box<dyn DeviceWatcher> = if config.hotplug {
        if !config.devices.is_empty() {
            warn!("hotplug is on; the devices list is ignored");
        }
        Box::new(
            DynamicWatcher::new(control, Arc::clone(&codes))
                .context("starting hotplug monitor")?,
        )
    } else {
        if config.devices.is_empty() {
            warn!("No devices configured");
        }
        Box::new(
            StaticWatcher::open(&config.devices, control, Arc::clone(&codes))
                .context("opening devices")?,
        )
    };

    watcher.set_dump(config.dump);
    watcher.set_dump_output(dump_out);
    watcher.add_listener(Box::new(engine));
    watcher.watch().context("watching devices")?;
    Ok(())
}
