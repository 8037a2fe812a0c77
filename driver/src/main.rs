use std::env;
use std::path::PathBuf;

use deckhand_core::cache::CacheBuilder;
use deckhand_core::config::Configuration;
use deckhand_core::session::Session;

use crate::command::ShellRunner;
use crate::device::Deck;

mod command;
mod device;

const DEFAULT_CACHE_DIR: &str = "imagecache";
const DEFAULT_BUTTON_ICON: &str = "icons/template.png";

fn usage() -> ! {
    eprintln!("Usage: deckhand -f <configuration-file>");
    std::process::exit(2);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config_path = None;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-f" => config_path = args.next(),
            _ => usage(),
        }
    }
    let Some(config_path) = config_path else {
        usage()
    };

    // A rejected configuration leaves the process alive but idle: device
    // errors still get logged, nothing is navigable.
    let config = match Configuration::load(config_path.as_ref()) {
        Ok(config) => {
            log::info!("loaded configuration {config_path}");
            config
        }
        Err(err) => {
            log::error!("configuration load failed: {err}");
            Configuration::empty()
        }
    };

    let mut deck = match Deck::open() {
        Ok(deck) => deck,
        Err(err) => {
            log::error!("cannot open stream deck: {err}");
            std::process::exit(1);
        }
    };
    log::info!(
        "connected to {} ({} keys, {}px icons)",
        deck.name(),
        deck.key_count(),
        deck.icon_size()
    );

    let cache_dir = PathBuf::from(DEFAULT_CACHE_DIR);
    let builder = CacheBuilder::new(
        cache_dir.clone(),
        PathBuf::from(DEFAULT_BUTTON_ICON),
        deck.icon_size(),
    );
    if let Err(err) = builder.build(&config) {
        log::error!("image cache build failed: {err}");
    }

    let mut session = Session::new(config, cache_dir);
    let mut runner = ShellRunner;
    loop {
        for event in deck.poll_events() {
            session.handle_event(event, &mut deck, &mut runner);
        }
    }
}
