use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// Reads a stored preference. Anything but `dark` means the light theme.
    #[must_use]
    #[inline]
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("dark") => Self::Dark,
            _ => Self::Light,
        }
    }

    #[must_use]
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    #[must_use]
    #[inline]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    #[must_use]
    #[inline]
    pub const fn palette(self) -> Palette {
        match self {
            Self::Light => Palette::LIGHT,
            Self::Dark => Palette::DARK,
        }
    }
}

/// Colors of a theme, as hex strings.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Palette {
    pub background: &'static str,
    pub card_background: &'static str,
    pub primary_text: &'static str,
    pub secondary_text: &'static str,
    pub tertiary_text: &'static str,
    pub accent: &'static str,
    pub accent_dark: &'static str,
    pub border: &'static str,
    pub danger: &'static str,
}

impl Palette {
    pub const LIGHT: Self = Self {
        background: "#E8E2D8",
        card_background: "#FFFFFF",
        primary_text: "#5C4A3D",
        secondary_text: "#8B7355",
        tertiary_text: "#D4CFC5",
        accent: "#8B7355",
        accent_dark: "#5C4A3D",
        border: "#E8E2D8",
        danger: "#D04444",
    };

    pub const DARK: Self = Self {
        background: "#1A1613",
        card_background: "#2D2721",
        primary_text: "#E8E2D8",
        secondary_text: "#C4BDB0",
        tertiary_text: "#8B7355",
        accent: "#B8A896",
        accent_dark: "#D4CFC5",
        border: "#3D3731",
        danger: "#E87676",
    };
}

/// Display preferences of the app. Passed explicitly to whatever renders or persists them.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct Preferences {
    pub theme: Theme,
}

impl Preferences {
    #[must_use]
    #[inline]
    pub const fn new(theme: Theme) -> Self {
        Self { theme }
    }

    #[must_use]
    #[inline]
    pub fn is_dark(&self) -> bool {
        self.theme == Theme::Dark
    }

    /// Switches between light and dark, returning the new theme.
    #[inline]
    pub const fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }
}
