//! Moods and their pre-rendered images
//!
//! [`Mood`] is the closed set of expressions the panel can show. A
//! [`MoodLibrary`] holds one full-panel [`ImageBuffer`] per mood, so resolving
//! a mood to pixels cannot fail once the library exists.
//!
//! Assets are raw 1 bpp panel frames named `<mood>.bin`:
//!
//! ```no_run
//! use moodink::{Dimensions, Mood, MoodLibrary};
//!
//! let moods = MoodLibrary::load("assets/moods", Dimensions::default())?;
//! let happy = moods.get(Mood::Happy);
//! assert_eq!(happy.as_bytes().len(), 4736);
//! # Ok::<(), moodink::ConfigError>(())
//! ```

use core::fmt;
use core::str::FromStr;
use std::path::Path;

use log::debug;

use crate::config::Dimensions;
use crate::error::{ConfigError, Error};
use crate::frame::ImageBuffer;

/// Expression shown on the panel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mood {
    /// Resting face
    Neutral,
    /// Smiling
    Happy,
    /// Frowning
    Sad,
    /// Scowling
    Angry,
    /// Wide-eyed
    Surprised,
    /// Processing a request
    Thinking,
}

impl Mood {
    /// Every mood, in asset order
    pub const ALL: [Self; 6] = [
        Self::Neutral,
        Self::Happy,
        Self::Sad,
        Self::Angry,
        Self::Surprised,
        Self::Thinking,
    ];

    /// Lowercase identifier, also the asset file stem
    pub fn name(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Surprised => "surprised",
            Self::Thinking => "thinking",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A mood identifier that is not one of [`Mood::ALL`]
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown mood {0:?}")]
pub struct UnknownMood(pub String);

impl FromStr for Mood {
    type Err = UnknownMood;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|mood| mood.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownMood(s.to_owned()))
    }
}

/// One image per mood
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoodLibrary {
    dimensions: Dimensions,
    images: [ImageBuffer; 6],
}

impl MoodLibrary {
    /// Library where every mood shows the same image
    pub fn uniform(image: &ImageBuffer) -> Self {
        Self {
            dimensions: image.dimensions(),
            images: Mood::ALL.map(|_| image.clone()),
        }
    }

    /// Library where every mood is a blank white panel
    pub fn blank(dimensions: Dimensions) -> Self {
        Self::uniform(&ImageBuffer::white(dimensions))
    }

    /// Read `<mood>.bin` for every mood from `dir`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::AssetUnreadable` if a file cannot be read and
    /// `ConfigError::AssetSize` if one is not exactly a full panel frame.
    pub fn load(dir: impl AsRef<Path>, dimensions: Dimensions) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let [neutral, happy, sad, angry, surprised, thinking] =
            Mood::ALL.map(|mood| load_asset(dir, mood, dimensions));
        Ok(Self {
            dimensions,
            images: [neutral?, happy?, sad?, angry?, surprised?, thinking?],
        })
    }

    /// Replace the image for one mood
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the image is for a different panel size.
    pub fn set(&mut self, mood: Mood, image: ImageBuffer) -> Result<(), Error> {
        if image.dimensions() != self.dimensions {
            return Err(Error::Validation {
                expected: self.dimensions.buffer_size(),
                actual: image.as_bytes().len(),
            });
        }
        self.images[mood.index()] = image;
        Ok(())
    }

    /// Image for a mood
    pub fn get(&self, mood: Mood) -> &ImageBuffer {
        &self.images[mood.index()]
    }

    /// Panel size the images were validated against
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
}

fn load_asset(dir: &Path, mood: Mood, dimensions: Dimensions) -> Result<ImageBuffer, ConfigError> {
    let path = dir.join(format!("{}.bin", mood.name()));
    let data = std::fs::read(&path).map_err(|source| ConfigError::AssetUnreadable {
        path: path.display().to_string(),
        source,
    })?;
    let actual = data.len();
    let image = ImageBuffer::new(dimensions, data).map_err(|_| ConfigError::AssetSize {
        path: path.display().to_string(),
        expected: dimensions.buffer_size(),
        actual,
    })?;
    debug!("loaded {mood} asset from {}", path.display());
    Ok(image)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("happy".parse::<Mood>(), Ok(Mood::Happy));
        assert_eq!(" Thinking ".parse::<Mood>(), Ok(Mood::Thinking));
        assert_eq!(
            "bored".parse::<Mood>(),
            Err(UnknownMood("bored".to_owned()))
        );
    }

    #[test]
    fn test_names_round_trip() {
        for mood in Mood::ALL {
            assert_eq!(mood.to_string().parse::<Mood>(), Ok(mood));
        }
    }

    #[test]
    fn test_load_reads_every_mood() {
        let dir = tempfile::tempdir().unwrap();
        let dims = Dimensions::default();
        for (i, mood) in Mood::ALL.iter().enumerate() {
            let path = dir.path().join(format!("{mood}.bin"));
            let fill = u8::try_from(i).unwrap();
            let data = vec![fill; dims.buffer_size()];
            std::fs::write(path, data).unwrap();
        }

        let moods = MoodLibrary::load(dir.path(), dims).unwrap();
        assert_eq!(moods.get(Mood::Neutral).as_bytes()[0], 0);
        assert_eq!(moods.get(Mood::Thinking).as_bytes()[0], 5);
    }

    #[test]
    fn test_load_reports_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let result = MoodLibrary::load(dir.path(), Dimensions::default());
        assert!(matches!(result, Err(ConfigError::AssetUnreadable { .. })));
    }

    #[test]
    fn test_load_rejects_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        let dims = Dimensions::default();
        for mood in Mood::ALL {
            let len = if mood == Mood::Sad {
                100
            } else {
                dims.buffer_size()
            };
            let path = dir.path().join(format!("{mood}.bin"));
            std::fs::write(path, vec![0xFF; len]).unwrap();
        }

        let result = MoodLibrary::load(dir.path(), dims);
        assert!(matches!(
            result,
            Err(ConfigError::AssetSize {
                expected: 4736,
                actual: 100,
                ..
            })
        ));
    }

    #[test]
    fn test_set_rejects_other_panel_size() {
        let mut moods = MoodLibrary::blank(Dimensions::default());
        let small = ImageBuffer::white(Dimensions::new(8, 8).unwrap());
        assert!(moods.set(Mood::Happy, small).is_err());

        let black = ImageBuffer::filled(Dimensions::default(), 0x00);
        moods.set(Mood::Happy, black.clone()).unwrap();
        assert_eq!(moods.get(Mood::Happy), &black);
        let white = ImageBuffer::white(Dimensions::default());
        assert_eq!(moods.get(Mood::Sad), &white);
    }
}
