// Radio model registry: per-model capability tables

use crate::civ::commands::{CommandTable, ICOM_COMMANDS};
use crate::civ::mode::Mode;
use std::collections::HashMap;
use std::sync::Mutex;

/// HF/VHF modes common to the IC-7100 and IC-705
const ALL_MODE_RIG: &[Mode] = &[
    Mode::Lsb,
    Mode::Usb,
    Mode::Am,
    Mode::Cw,
    Mode::Rtty,
    Mode::Fm,
    Mode::Wfm,
    Mode::CwR,
    Mode::RttyR,
    Mode::Dv,
];

const IC7300_MODES: &[Mode] = &[
    Mode::Lsb,
    Mode::Usb,
    Mode::Am,
    Mode::Cw,
    Mode::Rtty,
    Mode::Fm,
    Mode::CwR,
    Mode::RttyR,
];

const IC9700_MODES: &[Mode] = &[
    Mode::Lsb,
    Mode::Usb,
    Mode::Am,
    Mode::Cw,
    Mode::Rtty,
    Mode::Fm,
    Mode::CwR,
    Mode::RttyR,
    Mode::Dv,
];

/// Everything model-specific the control layer needs
#[derive(Debug, Clone)]
pub struct RadioModel {
    pub name: &'static str,
    /// Factory-default CI-V address
    pub address: u8,
    /// Decimal digits in the frequency payload
    pub frequency_digits: usize,
    pub modes: &'static [Mode],
    pub commands: CommandTable,
}

impl RadioModel {
    pub const fn new(
        name: &'static str,
        address: u8,
        frequency_digits: usize,
        modes: &'static [Mode],
        commands: CommandTable,
    ) -> Self {
        Self {
            name,
            address,
            frequency_digits,
            modes,
            commands,
        }
    }

    pub fn supports_mode(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }
}

/// Models shipped with the crate
pub const BUILTIN_MODELS: &[RadioModel] = &[
    RadioModel::new("IC-7100", 0x88, 10, ALL_MODE_RIG, CommandTable::new(ICOM_COMMANDS)),
    RadioModel::new("IC-7300", 0x94, 10, IC7300_MODES, CommandTable::new(ICOM_COMMANDS)),
    RadioModel::new("IC-705", 0xA4, 10, ALL_MODE_RIG, CommandTable::new(ICOM_COMMANDS)),
    RadioModel::new("IC-9700", 0xA2, 10, IC9700_MODES, CommandTable::new(ICOM_COMMANDS)),
];

fn key(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// Global model registry
lazy_static::lazy_static! {
    static ref MODEL_REGISTRY: Mutex<HashMap<String, RadioModel>> = Mutex::new(
        BUILTIN_MODELS
            .iter()
            .map(|model| (key(model.name), model.clone()))
            .collect()
    );
}

/// Register (or replace) a model
pub fn register_model(model: RadioModel) {
    if let Ok(mut registry) = MODEL_REGISTRY.lock() {
        registry.insert(key(model.name), model);
    }
}

/// Look up a model by name, ignoring case
pub fn get_model(name: &str) -> Option<RadioModel> {
    MODEL_REGISTRY.lock().ok()?.get(&key(name)).cloned()
}

/// List all registered models, sorted by name
pub fn list_models() -> Vec<RadioModel> {
    let mut models: Vec<RadioModel> = MODEL_REGISTRY
        .lock()
        .map(|registry| registry.values().cloned().collect())
        .unwrap_or_default();
    models.sort_by(|a, b| a.name.cmp(b.name));
    models
}
