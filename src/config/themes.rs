pub const DEFAULT_THEME: &str = "tokyo-night";

/// Palette used by every widget.
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: &'static str,
    pub bg: Color,
    pub surface: Color,
    pub border: Color,
    pub text: Color,
    pub dim_text: Color,
    pub accent: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub assistant: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse "#rrggbb". Returns `None` on anything else.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<Color> for ratatui::style::Color {
    fn from(c: Color) -> Self {
        ratatui::style::Color::Rgb(c.r, c.g, c.b)
    }
}

pub const THEMES: &[(&str, Theme)] = &[
    (
        "tokyo-night",
        Theme {
            name: "Tokyo Night",
            bg: Color::rgb(0x1a, 0x1b, 0x26),
            surface: Color::rgb(0x24, 0x28, 0x3b),
            border: Color::rgb(0x3b, 0x42, 0x61),
            text: Color::rgb(0xc0, 0xca, 0xf5),
            dim_text: Color::rgb(0x56, 0x5f, 0x89),
            accent: Color::rgb(0x7a, 0xa2, 0xf7),
            success: Color::rgb(0x9e, 0xce, 0x6a),
            warning: Color::rgb(0xe0, 0xaf, 0x68),
            error: Color::rgb(0xf7, 0x76, 0x8e),
            assistant: Color::rgb(0xbb, 0x9a, 0xf7),
        },
    ),
    (
        "rose-pine",
        Theme {
            name: "Rose Pine",
            bg: Color::rgb(0x19, 0x17, 0x24),
            surface: Color::rgb(0x1f, 0x1d, 0x2e),
            border: Color::rgb(0x40, 0x3d, 0x52),
            text: Color::rgb(0xe0, 0xde, 0xf4),
            dim_text: Color::rgb(0x6e, 0x6a, 0x86),
            accent: Color::rgb(0x31, 0x74, 0x8f),
            success: Color::rgb(0x9c, 0xcf, 0xd8),
            warning: Color::rgb(0xf6, 0xc1, 0x77),
            error: Color::rgb(0xeb, 0x6f, 0x92),
            assistant: Color::rgb(0xc4, 0xa7, 0xe7),
        },
    ),
    (
        "gruvbox",
        Theme {
            name: "Gruvbox",
            bg: Color::rgb(0x28, 0x28, 0x28),
            surface: Color::rgb(0x3c, 0x38, 0x36),
            border: Color::rgb(0x50, 0x49, 0x45),
            text: Color::rgb(0xeb, 0xdb, 0xb2),
            dim_text: Color::rgb(0x92, 0x83, 0x74),
            accent: Color::rgb(0x83, 0xa5, 0x98),
            success: Color::rgb(0xb8, 0xbb, 0x26),
            warning: Color::rgb(0xfa, 0xbd, 0x2f),
            error: Color::rgb(0xfb, 0x49, 0x34),
            assistant: Color::rgb(0xd3, 0x86, 0x9b),
        },
    ),
];

/// Look up a theme by key, falling back to the default.
pub fn get_theme(name: &str) -> &'static Theme {
    THEMES
        .iter()
        .find(|(key, _)| *key == name)
        .or_else(|| THEMES.iter().find(|(key, _)| *key == DEFAULT_THEME))
        .map(|(_, theme)| theme)
        .unwrap_or(&THEMES[0].1)
}

pub fn theme_names() -> Vec<&'static str> {
    THEMES.iter().map(|(key, _)| *key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_color_parsing() {
        let c = Color::from_hex("#1a1b26").unwrap();
        assert_eq!(c, Color::rgb(0x1a, 0x1b, 0x26));
        assert_eq!(c.to_hex(), "#1a1b26");
    }

    #[test]
    fn bad_hex_is_rejected() {
        assert!(Color::from_hex("#12345").is_none());
        assert!(Color::from_hex("zzzzzz").is_none());
    }

    #[test]
    fn default_theme_is_listed() {
        assert!(theme_names().contains(&DEFAULT_THEME));
        assert_eq!(theme_names().len(), 3);
    }

    #[test]
    fn get_theme_fallback() {
        assert_eq!(get_theme("gruvbox").name, "Gruvbox");
        assert_eq!(get_theme("nonexistent").name, "Tokyo Night");
    }

    #[test]
    fn converts_to_terminal_color() {
        let c: ratatui::style::Color = Color::rgb(1, 2, 3).into();
        assert_eq!(c, ratatui::style::Color::Rgb(1, 2, 3));
    }
}
