// theme.rs

use crate::error::{DashError, Result};
#[cfg(test)]
use crate::storage::load_value;
use crate::storage::{Key, Storage, entry};
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Theme {
    #[default]
    DaybreakBlue,
    GoldenPurple,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::DaybreakBlue => "daybreakBlue",
            Theme::GoldenPurple => "goldenPurple",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::DaybreakBlue => Theme::GoldenPurple,
            Theme::GoldenPurple => Theme::DaybreakBlue,
        }
    }

    /// Primary accent: #1890ff or #722ed1.
    pub fn accent_color(self) -> Color {
        match self {
            Theme::DaybreakBlue => Color::Rgb(0x18, 0x90, 0xff),
            Theme::GoldenPurple => Color::Rgb(0x72, 0x2e, 0xd1),
        }
    }
}

impl FromStr for Theme {
    type Err = DashError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daybreakBlue" => Ok(Theme::DaybreakBlue),
            "goldenPurple" => Ok(Theme::GoldenPurple),
            other => Err(DashError::validation(format!("unknown theme `{}`", other))),
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ThemePreference<S> {
    store: S,
    current: Theme,
}

impl<S: Storage> ThemePreference<S> {
    pub fn new(store: S, current: Theme) -> Self {
        Self { store, current }
    }

    #[cfg(test)]
    pub fn load(store: S) -> Result<Self> {
        let current = load_value(&store, Key::Theme)?.unwrap_or_default();
        Ok(Self::new(store, current))
    }

    pub fn get(&self) -> Theme {
        self.current
    }

    #[tracing::instrument(skip(self))]
    pub fn set(&mut self, theme: Theme) -> Result<()> {
        self.store.set(entry(Key::Theme, &theme)?)?;
        info!(from = %self.current, to = %theme, "theme changed");
        self.current = theme;
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<Theme> {
        let next = self.current.toggled();
        self.set(next)?;
        Ok(next)
    }
}
