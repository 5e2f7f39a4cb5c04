//! Application mode and menu state machine.
//!
//! Owned by the input task. Gesture rules, in priority order:
//!
//! 1. Long press on either button toggles power and collapses the menu to `Off`
//! 2. Power on, menu `Off`: short `Select` opens `MainMenu`
//! 3. Inside a menu: `Scroll` advances the highlight; `Select` descends from
//!    `MainMenu`, or commits the highlighted option at a leaf and closes the menu
//!
//! Anything else is ignored.

use log::{debug, info};

use super::buttons::{Button, Gesture};
use super::settings::Settings;

/// Entries of the main menu, in display order.
pub const MAIN_MENU_ITEMS: [&str; 2] = ["Language", "Font Size"];

/// Whole-application power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    Off,
    On,
}

impl Power {
    pub fn toggled(self) -> Self {
        match self {
            Power::Off => Power::On,
            Power::On => Power::Off,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Power::Off => "off",
            Power::On => "on",
        }
    }
}

/// Menu depth. `Off` means no menu is open and sampling runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Off,
    MainMenu,
    LanguageSelect,
    FontSelect,
}

/// Mode change produced by a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Menu,
    pub to: Menu,
    pub power: Power,
}

impl Transition {
    /// Sampling runs only while no menu is open.
    #[inline]
    pub fn sampling_enabled(&self) -> bool {
        self.to == Menu::Off
    }
}

/// What a gesture did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEffect {
    /// Gesture has no meaning in the current mode.
    Ignored,
    /// Highlight moved; only the screen changes.
    Moved,
    /// Power or menu changed.
    Transition(Transition),
}

/// Power, menu and settings, mutated only by [`apply`](AppState::apply).
#[derive(Debug, Clone)]
pub struct AppState {
    power: Power,
    menu: Menu,
    selection: usize,
    settings: Settings,
}

impl AppState {
    /// Start-up state: power off, menu off.
    pub fn new(settings: Settings) -> Self {
        Self {
            power: Power::Off,
            menu: Menu::Off,
            selection: 0,
            settings,
        }
    }

    pub fn power(&self) -> Power {
        self.power
    }

    pub fn menu(&self) -> Menu {
        self.menu
    }

    pub fn selection(&self) -> usize {
        self.selection
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Number of entries in the open menu (0 when closed).
    pub fn option_count(&self) -> usize {
        match self.menu {
            Menu::Off => 0,
            Menu::MainMenu => MAIN_MENU_ITEMS.len(),
            Menu::LanguageSelect => self.settings.languages().len(),
            Menu::FontSelect => self.settings.font_sizes().len(),
        }
    }

    /// Labels of the open menu's entries.
    pub fn option_labels(&self) -> Vec<String> {
        match self.menu {
            Menu::Off => Vec::new(),
            Menu::MainMenu => MAIN_MENU_ITEMS.iter().map(|s| s.to_string()).collect(),
            Menu::LanguageSelect => self.settings.languages().to_vec(),
            Menu::FontSelect => self.settings.font_sizes().iter().map(u8::to_string).collect(),
        }
    }

    /// Resolve one gesture.
    pub fn apply(&mut self, gesture: Gesture) -> MenuEffect {
        let from = self.menu;

        match (gesture, self.menu) {
            (Gesture::Long(_), _) => {
                self.power = self.power.toggled();
                info!(target: "input", "Power {}", self.power.as_str());
                self.enter(Menu::Off);
            }
            (Gesture::Short(Button::Select), Menu::Off) if self.power == Power::On => {
                self.enter(Menu::MainMenu);
            }
            (Gesture::Short(_), Menu::Off) => return MenuEffect::Ignored,
            (Gesture::Short(Button::Scroll), _) => {
                let count = self.option_count();
                if count == 0 {
                    return MenuEffect::Ignored;
                }
                self.selection = (self.selection + 1) % count;
                debug!(target: "input", "Selection {}/{}", self.selection, count);
                return MenuEffect::Moved;
            }
            (Gesture::Short(Button::Select), Menu::MainMenu) => {
                match self.selection {
                    0 => self.enter(Menu::LanguageSelect),
                    _ => self.enter(Menu::FontSelect),
                }
            }
            (Gesture::Short(Button::Select), Menu::LanguageSelect) => {
                if let Some(lang) = self.settings.languages().get(self.selection).cloned() {
                    // Options come from the same list, so this cannot be rejected.
                    let _ = self.settings.set_language(&lang);
                }
                self.enter(Menu::Off);
            }
            (Gesture::Short(Button::Select), Menu::FontSelect) => {
                if let Some(&size) = self.settings.font_sizes().get(self.selection) {
                    let _ = self.settings.set_font_size(size);
                }
                self.enter(Menu::Off);
            }
        }

        MenuEffect::Transition(Transition {
            from,
            to: self.menu,
            power: self.power,
        })
    }

    /// Control command describing power and settings,
    /// e.g. `state:on,lang:French,font:12`.
    pub fn control_command(&self) -> String {
        format!(
            "state:{},lang:{},font:{}",
            self.power.as_str(),
            self.settings.language(),
            self.settings.font_size()
        )
    }

    fn enter(&mut self, menu: Menu) {
        if menu != self.menu {
            debug!(target: "input", "Menu {:?} -> {:?}", self.menu, menu);
        }
        self.menu = menu;
        self.selection = 0;
    }
}
