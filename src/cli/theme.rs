use crate::config::{
    HexColor, StyleOverride, ThemeConfig as UserThemeConfig, ThemeModifier, ThemePreset, ThemeToken,
};
use crossterm::style::{Attribute, Attributes, Color, ContentStyle};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Theme {
    enabled: bool,
    styles: HashMap<ThemeToken, ContentStyle>,
}

impl Theme {
    #[cfg(test)]
    pub fn new(enabled: bool) -> Self {
        Self::from_config(enabled, &UserThemeConfig::default())
    }

    pub fn from_config(enabled: bool, config: &UserThemeConfig) -> Self {
        let mut styles = preset_styles(config.preset);
        for (token, override_style) in &config.styles {
            let base = styles.get(token).copied().unwrap_or_default();
            styles.insert(*token, merge_style(base, override_style));
        }

        Self { enabled, styles }
    }

    /// Styling is on unless `NO_COLOR` is set to a non-empty value.
    pub fn from_env(config: &UserThemeConfig) -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
        Self::from_config(!no_color, config)
    }

    pub fn style(&self, token: ThemeToken) -> ContentStyle {
        if !self.enabled {
            return ContentStyle::new();
        }

        self.styles.get(&token).copied().unwrap_or_default()
    }

    pub fn paint(&self, token: ThemeToken, text: &str) -> String {
        self.style(token).apply(text).to_string()
    }
}

fn preset_styles(preset: ThemePreset) -> HashMap<ThemeToken, ContentStyle> {
    ThemeToken::all()
        .iter()
        .copied()
        .map(|token| (token, preset_style(preset, token)))
        .collect()
}

fn preset_style(preset: ThemePreset, token: ThemeToken) -> ContentStyle {
    match preset {
        ThemePreset::Default => default_preset_style(token),
        ThemePreset::Light => light_preset_style(token),
        ThemePreset::Plain => plain_preset_style(token),
    }
}

fn styled(fg: Color, attributes: &[Attribute]) -> ContentStyle {
    let mut style = ContentStyle::new();
    style.foreground_color = Some(fg);
    for attribute in attributes {
        style.attributes.set(*attribute);
    }
    style
}

fn default_preset_style(token: ThemeToken) -> ContentStyle {
    match token {
        ThemeToken::UserPrompt => styled(Color::Rgb { r: 224, g: 175, b: 104 }, &[Attribute::Bold]),
        ThemeToken::AssistantLabel => {
            styled(Color::Rgb { r: 158, g: 206, b: 106 }, &[Attribute::Bold])
        }
        ThemeToken::AssistantText => styled(Color::Rgb { r: 192, g: 202, b: 245 }, &[]),
        ThemeToken::SearchStep => {
            styled(Color::Rgb { r: 138, g: 138, b: 138 }, &[Attribute::Italic])
        }
        ThemeToken::SystemInfo => styled(Color::Rgb { r: 86, g: 95, b: 137 }, &[]),
        ThemeToken::SystemError => {
            styled(Color::Rgb { r: 247, g: 118, b: 142 }, &[Attribute::Bold])
        }
    }
}

fn light_preset_style(token: ThemeToken) -> ContentStyle {
    match token {
        ThemeToken::UserPrompt => styled(Color::Rgb { r: 176, g: 64, b: 0 }, &[Attribute::Bold]),
        ThemeToken::AssistantLabel => styled(Color::Rgb { r: 5, g: 80, b: 40 }, &[Attribute::Bold]),
        ThemeToken::AssistantText => styled(Color::Rgb { r: 36, g: 41, b: 47 }, &[]),
        ThemeToken::SearchStep => styled(Color::Rgb { r: 80, g: 90, b: 110 }, &[Attribute::Italic]),
        ThemeToken::SystemInfo => styled(Color::Rgb { r: 36, g: 70, b: 120 }, &[]),
        ThemeToken::SystemError => styled(Color::Rgb { r: 176, g: 0, b: 32 }, &[Attribute::Bold]),
    }
}

fn plain_preset_style(token: ThemeToken) -> ContentStyle {
    let mut style = ContentStyle::new();
    if matches!(token, ThemeToken::UserPrompt | ThemeToken::AssistantLabel) {
        style.attributes.set(Attribute::Bold);
    }
    style
}

fn merge_style(base: ContentStyle, override_style: &StyleOverride) -> ContentStyle {
    let mut merged = base;

    if let Some(fg) = override_style.fg {
        merged.foreground_color = Some(color_from_hex(fg));
    }

    if let Some(modifiers) = &override_style.modifiers {
        merged.attributes = modifiers_to_attributes(modifiers);
    }

    merged
}

fn color_from_hex(color: HexColor) -> Color {
    Color::Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
    }
}

fn modifiers_to_attributes(modifiers: &[ThemeModifier]) -> Attributes {
    let mut attributes = Attributes::default();
    for modifier in modifiers {
        attributes.set(modifier_to_attribute(*modifier));
    }
    attributes
}

fn modifier_to_attribute(modifier: ThemeModifier) -> Attribute {
    match modifier {
        ThemeModifier::Bold => Attribute::Bold,
        ThemeModifier::Dim => Attribute::Dim,
        ThemeModifier::Italic => Attribute::Italic,
        ThemeModifier::Underlined => Attribute::Underlined,
        ThemeModifier::Reversed => Attribute::Reverse,
    }
}
