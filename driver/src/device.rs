use std::time::Duration;

use elgato_streamdeck::{StreamDeck, StreamDeckInput, list_devices, new_hidapi};
use image::{DynamicImage, RgbImage};

use deckhand_core::projection::{DeviceIoError, ImageSink};
use deckhand_core::session::DeckEvent;

const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Shim over the first Stream Deck on the bus: key events out, key
/// images in.
pub struct Deck {
    deck: StreamDeck,
    name: String,
    buttons: Vec<bool>,
}

impl Deck {
    pub fn open() -> Result<Self, DeviceIoError> {
        let hidapi = new_hidapi().map_err(|err| DeviceIoError(err.to_string()))?;
        let (kind, serial) = list_devices(&hidapi)
            .into_iter()
            .next()
            .ok_or_else(|| DeviceIoError("no stream deck found".into()))?;
        let deck = StreamDeck::connect(&hidapi, kind, &serial)
            .map_err(|err| DeviceIoError(err.to_string()))?;
        let buttons = vec![false; kind.key_count() as usize];
        Ok(Self {
            deck,
            name: format!("{kind:?} {serial}"),
            buttons,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_count(&self) -> u8 {
        self.deck.kind().key_count()
    }

    pub fn icon_size(&self) -> u32 {
        let (width, _) = self.deck.kind().key_image_format().size;
        width as u32
    }

    /// Block up to the poll timeout and translate button state
    /// snapshots into per-key up/down events, in key order.
    pub fn poll_events(&mut self) -> Vec<DeckEvent> {
        match self.deck.read_input(Some(POLL_TIMEOUT)) {
            Ok(StreamDeckInput::ButtonStateChange(states)) => {
                let mut events = Vec::new();
                for (key, pressed) in states.iter().enumerate() {
                    let previous = self.buttons.get(key).copied().unwrap_or(false);
                    if *pressed && !previous {
                        events.push(DeckEvent::Down(key as u8));
                    } else if !*pressed && previous {
                        events.push(DeckEvent::Up(key as u8));
                    }
                }
                self.buttons = states;
                events
            }
            Ok(_) => Vec::new(),
            Err(err) => vec![DeckEvent::Error(err.to_string())],
        }
    }
}

impl ImageSink for Deck {
    fn push_image(&mut self, button_id: u8, image: &RgbImage) -> Result<(), DeviceIoError> {
        self.deck
            .set_button_image(button_id, DynamicImage::ImageRgb8(image.clone()))
            .map_err(|err| DeviceIoError(err.to_string()))
    }
}
