use gamerec_core::config::ThemeConfig;
use ratatui::style::Color;

#[derive(Debug, Clone)]
pub(super) struct Theme {
    pub(super) primary_fg: Color,
    pub(super) accent: Color,
    pub(super) muted: Color,
    pub(super) selection_bg: Color,
    pub(super) success: Color,
    pub(super) warning: Color,
    pub(super) danger: Color,
    pub(super) on_accent: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
            on_accent: Color::Black,
        }
    }
}

impl Theme {
    /// Default palette with the configured overrides applied, plus a note
    /// for the status line.
    pub(super) fn from_config(config: &ThemeConfig) -> (Self, String) {
        let mut theme = Theme::default();
        let mut applied: Vec<&str> = Vec::new();
        let mut rejected: Vec<&str> = Vec::new();
        let slots: [(&str, &Option<String>, &mut Color); 5] = [
            ("accent", &config.accent, &mut theme.accent),
            ("success", &config.success, &mut theme.success),
            ("warning", &config.warning, &mut theme.warning),
            ("danger", &config.danger, &mut theme.danger),
            ("muted", &config.muted, &mut theme.muted),
        ];
        for (name, raw, slot) in slots {
            let Some(raw) = raw else { continue };
            match parse_hex_color(raw) {
                Some(color) => {
                    *slot = color;
                    applied.push(name);
                }
                None => rejected.push(name),
            }
        }
        theme.on_accent = contrast_color(&theme.accent, theme.on_accent);

        let note = match (applied.is_empty(), rejected.is_empty()) {
            (true, true) => "Default palette".to_string(),
            (false, true) => format!("Theme overrides: {}", applied.join(", ")),
            (_, false) => format!("Ignored invalid colours: {}", rejected.join(", ")),
        };
        (theme, note)
    }
}

fn parse_hex_color(input: &str) -> Option<Color> {
    let trimmed = input.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

fn contrast_color(color: &Color, fallback: Color) -> Color {
    match color {
        Color::Rgb(r, g, b) => {
            let luminance = 0.299 * f64::from(*r) + 0.587 * f64::from(*g) + 0.114 * f64::from(*b);
            if luminance > 186.0 {
                Color::Black
            } else {
                Color::White
            }
        }
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colours_parse_in_long_and_short_form() {
        assert_eq!(parse_hex_color("#e0524c"), Some(Color::Rgb(0xe0, 0x52, 0x4c)));
        assert_eq!(parse_hex_color("0xfff"), Some(Color::Rgb(0xff, 0xff, 0xff)));
        assert_eq!(parse_hex_color("teal"), None);
    }

    #[test]
    fn overrides_apply_and_bad_values_are_reported() {
        let config = ThemeConfig {
            accent: Some("#ffffff".to_string()),
            danger: Some("nope".to_string()),
            ..ThemeConfig::default()
        };
        let (theme, note) = Theme::from_config(&config);
        assert_eq!(theme.accent, Color::Rgb(255, 255, 255));
        assert_eq!(theme.on_accent, Color::Black);
        assert_eq!(theme.danger, Color::Red);
        assert!(note.contains("danger"));
    }
}
