use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::navigation::BACK_BUTTON_ID;

/// Number of addressable keys on one page of the deck.
pub const KEYS_PER_PAGE: u8 = 15;

const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("button id {0} is outside the key range 0..{KEYS_PER_PAGE}")]
    ButtonIdOutOfRange(u8),
    #[error("folder {0} is declared more than once")]
    DuplicateFolder(u8),
    #[error("folder {0} is not listed in main_folder_button_id_list")]
    UnlistedFolder(u8),
    #[error("folder id {0} collides with the reserved back button")]
    FolderOnBackButton(u8),
    #[error("folder {0} assigns a button to the reserved back key")]
    ReservedBackButton(u8),
    #[error("button {button} in folder {folder} is declared more than once")]
    DuplicateButton { folder: u8, button: u8 },
}

// Raw file shape, one struct per schema object. Validation happens in a
// separate pass so a rejected file never produces a partial load.

#[derive(Debug, Deserialize)]
struct ConfigFile {
    streamdeck_info: StreamdeckInfo,
    folder_list: Vec<FolderEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamdeckInfo {
    main_folder_button_id_list: Vec<u8>,
    #[serde(default = "default_settle_delay_ms")]
    page_settle_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
struct FolderEntry {
    main_folder_button_id: u8,
    #[serde(default)]
    folder_contents: Vec<ButtonEntry>,
}

#[derive(Debug, Deserialize)]
struct ButtonEntry {
    button_id: u8,
    image: String,
    #[serde(default)]
    text: String,
    command: String,
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

/// One configured key: the icon it shows, the text drawn over it and
/// the command it fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonSpec {
    pub image: PathBuf,
    pub text: String,
    pub command: String,
}

/// Buttons of one sub-page, keyed by key index. A folder is addressed
/// by the root-page button that opens it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Folder {
    pub buttons: BTreeMap<u8, ButtonSpec>,
}

#[derive(Clone, Debug)]
pub struct Configuration {
    pub root_folder_button_ids: BTreeSet<u8>,
    pub folders: BTreeMap<u8, Folder>,
    pub settle_delay: Duration,
}

impl Configuration {
    /// Configuration with nothing navigable. Used when a load fails so
    /// the process can stay alive and keep reporting device errors.
    pub fn empty() -> Self {
        Self {
            root_folder_button_ids: BTreeSet::new(),
            folders: BTreeMap::new(),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = serde_json::from_str(&content)?;
        Self::from_file(file)
    }

    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let mut root_folder_button_ids = BTreeSet::new();
        for id in &file.streamdeck_info.main_folder_button_id_list {
            check_key_range(*id)?;
            root_folder_button_ids.insert(*id);
        }

        let mut folders = BTreeMap::new();
        for entry in file.folder_list {
            let folder_id = entry.main_folder_button_id;
            check_key_range(folder_id)?;
            if folder_id == BACK_BUTTON_ID {
                return Err(ConfigError::FolderOnBackButton(folder_id));
            }
            if !root_folder_button_ids.contains(&folder_id) {
                return Err(ConfigError::UnlistedFolder(folder_id));
            }
            let mut buttons = BTreeMap::new();
            for button in entry.folder_contents {
                check_key_range(button.button_id)?;
                if button.button_id == BACK_BUTTON_ID {
                    return Err(ConfigError::ReservedBackButton(folder_id));
                }
                let previous = buttons.insert(
                    button.button_id,
                    ButtonSpec {
                        image: PathBuf::from(button.image),
                        text: button.text,
                        command: button.command,
                    },
                );
                if previous.is_some() {
                    return Err(ConfigError::DuplicateButton {
                        folder: folder_id,
                        button: button.button_id,
                    });
                }
            }
            if folders.insert(folder_id, Folder { buttons }).is_some() {
                return Err(ConfigError::DuplicateFolder(folder_id));
            }
        }

        Ok(Self {
            root_folder_button_ids,
            folders,
            settle_delay: Duration::from_millis(file.streamdeck_info.page_settle_delay_ms),
        })
    }

    pub fn folder(&self, folder_id: u8) -> Option<&Folder> {
        self.folders.get(&folder_id)
    }
}

fn check_key_range(id: u8) -> Result<(), ConfigError> {
    if id >= KEYS_PER_PAGE {
        return Err(ConfigError::ButtonIdOutOfRange(id));
    }
    Ok(())
}
