use std::path::PathBuf;
use std::thread;

use crate::config::Configuration;
use crate::navigation::{Action, NavigationState};
use crate::projection::{self, ImageSink};

/// Raw device events, delivered in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeckEvent {
    Down(u8),
    Up(u8),
    Error(String),
}

/// Fire-and-forget command dispatch; nothing is awaited.
pub trait CommandRunner {
    fn execute(&mut self, command: &str);
}

/// Ties the navigation state machine to the image cache and the deck.
/// Lives for the whole process; every key event funnels through
/// `handle_event`, one at a time.
pub struct Session {
    config: Configuration,
    cache_dir: PathBuf,
    nav: NavigationState,
}

impl Session {
    pub fn new(config: Configuration, cache_dir: PathBuf) -> Self {
        Self {
            config,
            cache_dir,
            nav: NavigationState::Root,
        }
    }

    pub fn navigation(&self) -> NavigationState {
        self.nav
    }

    /// Handle one event to completion before the next is read. The deck
    /// gives no feedback about its current page, so this ordering is
    /// the only thing keeping software and device in sync.
    pub fn handle_event(
        &mut self,
        event: DeckEvent,
        sink: &mut impl ImageSink,
        runner: &mut impl CommandRunner,
    ) {
        match event {
            DeckEvent::Down(_) => {}
            DeckEvent::Error(message) => log::error!("device error: {message}"),
            DeckEvent::Up(button_id) => {
                let action = self.nav.on_key_up(button_id, &self.config);
                log::debug!("key {button_id} up -> {action:?} (state {:?})", self.nav);
                self.apply(action, sink, runner);
            }
        }
    }

    fn apply(
        &mut self,
        action: Action,
        sink: &mut impl ImageSink,
        runner: &mut impl CommandRunner,
    ) {
        match action {
            Action::EnterFolder(folder_id) => {
                // The deck needs time to finish its own page-switch
                // animation before it accepts image writes.
                let delay = self.config.settle_delay;
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                if let Some(folder) = self.config.folder(folder_id) {
                    projection::render_folder(&self.cache_dir, folder_id, folder, sink);
                }
            }
            // Root imagery is static and pre-rendered; nothing to push.
            Action::ReturnToRoot => {}
            Action::Invoke(command) => {
                log::info!("executing {command:?}");
                runner.execute(&command);
            }
            Action::NoOp => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ButtonSpec, Folder};
    use crate::navigation::BACK_BUTTON_ID;
    use crate::projection::DeviceIoError;
    use image::RgbImage;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    struct NullSink {
        pushes: usize,
    }

    impl ImageSink for NullSink {
        fn push_image(&mut self, _button_id: u8, _image: &RgbImage) -> Result<(), DeviceIoError> {
            self.pushes += 1;
            Ok(())
        }
    }

    struct RecordingRunner {
        commands: Vec<String>,
    }

    impl CommandRunner for RecordingRunner {
        fn execute(&mut self, command: &str) {
            self.commands.push(command.to_string());
        }
    }

    fn session() -> Session {
        let mut buttons = BTreeMap::new();
        buttons.insert(
            0,
            ButtonSpec {
                image: PathBuf::from("x.png"),
                text: "A".into(),
                command: "run A".into(),
            },
        );
        let mut config = Configuration::empty();
        config.settle_delay = Duration::ZERO;
        config.root_folder_button_ids.insert(5);
        config.folders.insert(5, Folder { buttons });
        // Nonexistent cache dir: projection finds no entries and pushes
        // nothing, which is exactly the partial-cache policy.
        Session::new(config, PathBuf::from("missing-cache"))
    }

    #[test]
    fn key_sequence_drives_navigation_and_commands() {
        let mut session = session();
        let mut sink = NullSink { pushes: 0 };
        let mut runner = RecordingRunner {
            commands: Vec::new(),
        };

        session.handle_event(DeckEvent::Up(5), &mut sink, &mut runner);
        assert_eq!(session.navigation(), NavigationState::InFolder(5));

        session.handle_event(DeckEvent::Up(0), &mut sink, &mut runner);
        assert_eq!(runner.commands, vec!["run A".to_string()]);

        session.handle_event(DeckEvent::Up(BACK_BUTTON_ID), &mut sink, &mut runner);
        assert_eq!(session.navigation(), NavigationState::Root);
        assert_eq!(sink.pushes, 0);
    }

    #[test]
    fn down_and_error_events_leave_state_untouched() {
        let mut session = session();
        let mut sink = NullSink { pushes: 0 };
        let mut runner = RecordingRunner {
            commands: Vec::new(),
        };

        session.handle_event(DeckEvent::Down(5), &mut sink, &mut runner);
        session.handle_event(DeckEvent::Error("usb gone".into()), &mut sink, &mut runner);
        assert_eq!(session.navigation(), NavigationState::Root);
        assert!(runner.commands.is_empty());
    }
}
