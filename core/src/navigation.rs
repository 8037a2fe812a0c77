use crate::config::Configuration;

/// Key index that returns to the root page while a folder is open.
/// Never carries a button spec and never names a folder.
pub const BACK_BUTTON_ID: u8 = 4;

/// What a key release means in the current navigation state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    EnterFolder(u8),
    ReturnToRoot,
    Invoke(String),
    NoOp,
}

/// Sole authority for "which page is the deck showing". The device
/// cannot be queried, so a missed event desynchronizes navigation until
/// a manual restart; that is accepted, never silently corrected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NavigationState {
    #[default]
    Root,
    InFolder(u8),
}

impl NavigationState {
    pub fn on_key_up(&mut self, button_id: u8, config: &Configuration) -> Action {
        match *self {
            NavigationState::Root => {
                if config.root_folder_button_ids.contains(&button_id)
                    && config.folders.contains_key(&button_id)
                {
                    *self = NavigationState::InFolder(button_id);
                    Action::EnterFolder(button_id)
                } else {
                    Action::NoOp
                }
            }
            NavigationState::InFolder(folder_id) => {
                if button_id == BACK_BUTTON_ID {
                    *self = NavigationState::Root;
                    return Action::ReturnToRoot;
                }
                match config
                    .folder(folder_id)
                    .and_then(|folder| folder.buttons.get(&button_id))
                {
                    Some(spec) => Action::Invoke(spec.command.clone()),
                    None => Action::NoOp,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ButtonSpec, Folder};
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::PathBuf;

    fn config() -> Configuration {
        let mut buttons = BTreeMap::new();
        buttons.insert(
            0,
            ButtonSpec {
                image: PathBuf::from("x.png"),
                text: "A".into(),
                command: "run A".into(),
            },
        );
        let mut folders = BTreeMap::new();
        folders.insert(5, Folder { buttons });
        let mut config = Configuration::empty();
        config.root_folder_button_ids = BTreeSet::from([5, 6]);
        config.folders = folders;
        config
    }

    #[test]
    fn enter_invoke_and_back() {
        let config = config();
        let mut nav = NavigationState::default();

        assert_eq!(nav.on_key_up(5, &config), Action::EnterFolder(5));
        assert_eq!(nav, NavigationState::InFolder(5));

        assert_eq!(nav.on_key_up(0, &config), Action::Invoke("run A".into()));
        assert_eq!(nav, NavigationState::InFolder(5));

        assert_eq!(nav.on_key_up(BACK_BUTTON_ID, &config), Action::ReturnToRoot);
        assert_eq!(nav, NavigationState::Root);
    }

    #[test]
    fn unmapped_root_key_is_noop() {
        let config = config();
        let mut nav = NavigationState::default();
        assert_eq!(nav.on_key_up(9, &config), Action::NoOp);
        assert_eq!(nav, NavigationState::Root);
    }

    #[test]
    fn listed_folder_without_contents_entry_is_noop() {
        // Button 6 is in the root list but no folder was declared for it.
        let config = config();
        let mut nav = NavigationState::default();
        assert_eq!(nav.on_key_up(6, &config), Action::NoOp);
        assert_eq!(nav, NavigationState::Root);
    }

    #[test]
    fn back_key_in_root_is_noop() {
        let config = config();
        let mut nav = NavigationState::default();
        assert_eq!(nav.on_key_up(BACK_BUTTON_ID, &config), Action::NoOp);
        assert_eq!(nav, NavigationState::Root);
    }

    #[test]
    fn unmapped_folder_key_is_noop() {
        let config = config();
        let mut nav = NavigationState::default();
        nav.on_key_up(5, &config);
        assert_eq!(nav.on_key_up(7, &config), Action::NoOp);
        assert_eq!(nav, NavigationState::InFolder(5));
    }

    #[test]
    fn replay_is_deterministic() {
        let config = config();
        let sequence = [5u8, 0, 7, BACK_BUTTON_ID, 9, 5, 0];

        let run = || {
            let mut nav = NavigationState::default();
            let actions: Vec<Action> = sequence
                .iter()
                .map(|key| nav.on_key_up(*key, &config))
                .collect();
            (nav, actions)
        };

        let (first_state, first_actions) = run();
        let (second_state, second_actions) = run();
        assert_eq!(first_state, second_state);
        assert_eq!(first_actions, second_actions);
        assert_eq!(first_state, NavigationState::InFolder(5));
    }
}
