use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelColor {
    BerryRed,
    Red,
    Orange,
    Yellow,
    OliveGreen,
    LimeGreen,
    Green,
    MintGreen,
    Teal,
    SkyBlue,
    LightBlue,
    Blue,
    Grape,
    Violet,
    Lavender,
    Magenta,
    Salmon,
    Charcoal,
    Grey,
    Taupe,
    #[serde(other)]
    Unknown,
}

impl LabelColor {
    pub fn emoji(self) -> &'static str {
        match self {
            Self::BerryRed => "🍓",
            Self::Red => "🔴",
            Self::Orange => "🟠",
            Self::Yellow => "🟡",
            Self::OliveGreen => "🫒",
            Self::LimeGreen => "🟩",
            Self::Green => "🟢",
            Self::MintGreen => "🌿",
            Self::Teal => "🐬",
            Self::SkyBlue => "🩵",
            Self::LightBlue => "💧",
            Self::Blue => "🔵",
            Self::Grape => "🍇",
            Self::Violet => "🟣",
            Self::Lavender => "🪻",
            Self::Magenta => "🌸",
            Self::Salmon => "🍣",
            Self::Charcoal => "⚫",
            Self::Grey => "🩶",
            Self::Taupe => "🟤",
            Self::Unknown => "🏷️",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: LabelColor,
    #[serde(default)]
    pub is_favorite: bool,
}

impl Label {
    pub fn decorated(&self) -> String {
        format!("{} {}", self.color.emoji(), self.name)
    }
}

/// Display form of a task's label name: decorated when the catalog knows it,
/// the bare name otherwise.
pub fn decorate_label_name(name: &str, catalog: &[Label]) -> String {
    catalog
        .iter()
        .find(|label| label.name == name)
        .map(Label::decorated)
        .unwrap_or_else(|| name.to_owned())
}
