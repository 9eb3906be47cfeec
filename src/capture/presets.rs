//! Recording quality presets and resolution-aware bitrate scaling.

use serde::Serialize;

/// Resolution the preset bitrates are tuned for.
pub const REFERENCE_WIDTH: u32 = 1920;
pub const REFERENCE_HEIGHT: u32 = 1080;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityPreset {
    pub label: &'static str,
    pub video_bits_per_second: u32,
    pub audio_bits_per_second: u32,
}

/// Ordered low → high.
pub const PRESETS: [QualityPreset; 3] = [
    QualityPreset {
        label: "Low (480p)",
        video_bits_per_second: 800_000,
        audio_bits_per_second: 64_000,
    },
    QualityPreset {
        label: "Medium (720p)",
        video_bits_per_second: 1_500_000,
        audio_bits_per_second: 128_000,
    },
    QualityPreset {
        label: "High (1080p)",
        video_bits_per_second: 2_500_000,
        audio_bits_per_second: 128_000,
    },
];

pub fn default_preset() -> QualityPreset {
    PRESETS[1]
}

pub fn preset_by_label(label: &str) -> Option<QualityPreset> {
    PRESETS.iter().copied().find(|p| p.label == label)
}

impl Default for QualityPreset {
    fn default() -> Self {
        default_preset()
    }
}

impl QualityPreset {
    /// Scale the video bitrate by captured pixel count relative to 1920×1080.
    /// Never scales above the preset value.
    pub fn scaled_for(&self, width: u32, height: u32) -> QualityPreset {
        let pixels = u64::from(width) * u64::from(height);
        let reference = u64::from(REFERENCE_WIDTH) * u64::from(REFERENCE_HEIGHT);
        let factor = (pixels as f64 / reference as f64).min(1.0);
        QualityPreset {
            video_bits_per_second: (f64::from(self.video_bits_per_second) * factor).round() as u32,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medium_is_the_default() {
        assert_eq!(default_preset().video_bits_per_second, 1_500_000);
        assert_eq!(QualityPreset::default(), PRESETS[1]);
    }

    #[test]
    fn presets_are_ordered_by_bitrate() {
        assert!(PRESETS.windows(2).all(|w| w[0].video_bits_per_second < w[1].video_bits_per_second));
    }

    #[test]
    fn smaller_captures_scale_down_proportionally() {
        let scaled = PRESETS[2].scaled_for(1280, 720);
        // 1280×720 is 4/9 of 1920×1080.
        assert_eq!(scaled.video_bits_per_second, 1_111_111);
        assert_eq!(scaled.audio_bits_per_second, 128_000);
    }

    #[test]
    fn larger_captures_never_scale_up() {
        let scaled = PRESETS[1].scaled_for(3840, 2160);
        assert_eq!(scaled.video_bits_per_second, 1_500_000);
    }

    #[test]
    fn lookup_by_label() {
        assert_eq!(preset_by_label("Low (480p)"), Some(PRESETS[0]));
        assert_eq!(preset_by_label("Ultra"), None);
    }
}
