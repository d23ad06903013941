use clap::{Arg, Command};
use std::time::Duration;
use std::{panic, process};

pub mod config;
pub mod demo;
pub mod output;
pub mod session;
pub mod sync;

use crate::config::SessionConfig;

fn main() {
    tracing_subscriber::fmt::init();

    let matches = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Session configuration file (JSON)")
                .required(false),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_name("SECONDS")
                .help("How long to run the synthetic playback demo")
                .default_value("10"),
        )
        .get_matches();

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // invoke the default handler and exit the process
        orig_hook(panic_info);
        process::exit(105);
    }));

    // gracefully close the app when receiving SIGINT, SIGTERM, or SIGHUP
    ctrlc::set_handler(move || {
        process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let config = match matches.get_one::<String>("config") {
        Some(path) => match SessionConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{e:#}");
                process::exit(1);
            }
        },
        None => SessionConfig::default(),
    };

    let duration = matches
        .get_one::<String>("duration")
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(10));

    let runtime = tokio::runtime::Runtime::new().expect("failed to build tokio runtime");
    if let Err(e) = runtime.block_on(demo::run(config, duration)) {
        log::error!("playback session failed: {e:#}");
        process::exit(1);
    }
}
