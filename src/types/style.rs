use std::fmt::Display;

/// Look of subtitles burned into a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleStyle {
    pub fontsize: u32,
    pub fontcolor: String,
    pub outline: u32,
    pub outlinecolor: String,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            fontsize: 24,
            fontcolor: "white".to_string(),
            outline: 2,
            outlinecolor: "black".to_string(),
        }
    }
}

impl SubtitleStyle {
    /// Build the `force_style` value of the ffmpeg `subtitles` filter
    pub fn force_style(&self) -> String {
        format!(
            "FontSize={},PrimaryColour=&H{},Outline={},OutlineColour=&H{}",
            self.fontsize,
            color_to_hex(&self.fontcolor),
            self.outline,
            color_to_hex(&self.outlinecolor),
        )
    }
}

impl Display for SubtitleStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "size {} {} with {}px {} outline",
            self.fontsize, self.fontcolor, self.outline, self.outlinecolor
        )
    }
}

/// Map a color name to its hex value, defaulting to white.
/// A 6-digit hex value is also accepted as-is.
fn color_to_hex(color: &str) -> String {
    let hex = match color.to_lowercase().as_str() {
        "white" => "ffffff",
        "black" => "000000",
        "red" => "ff0000",
        "blue" => "0000ff",
        "green" => "00ff00",
        "yellow" => "ffff00",
        other => {
            let other = other.trim_start_matches('#');
            if other.len() == 6 && other.chars().all(|c| c.is_ascii_hexdigit()) {
                return other.to_string();
            }
            "ffffff"
        }
    };
    hex.to_string()
}
