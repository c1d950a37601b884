/// Shared data structures for the viewer state
///
/// These structs represent the data model that flows between
/// the catalog, the fetch layer and the chart controllers.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One available step of a (run, tag) sample series
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// Training step the sample was logged at
    pub step: u64,
    /// Seconds since the Unix epoch when the sample was written
    pub wall_time: f64,
}

impl StepRecord {
    /// Wall time as a UTC timestamp, if it is representable
    pub fn logged_at(&self) -> Option<DateTime<Utc>> {
        let secs = self.wall_time.floor();
        let nanos = ((self.wall_time - secs) * 1e9) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
    }
}

/// A chart's data source: one run and one tag
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Session {
    pub run: String,
    pub tag: String,
}

impl Session {
    pub fn new(run: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            run: run.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.run, self.tag)
    }
}

/// Reference to one fetchable sample image
///
/// The wall time is part of the key so a rewritten sample never
/// reuses a stale payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageKey {
    pub run: String,
    pub tag: String,
    /// Position of the step in the session's step list
    pub index: usize,
    pub step: u64,
    pub wall_time: f64,
}

impl ImageKey {
    pub fn new(session: &Session, index: usize, record: &StepRecord) -> Self {
        Self {
            run: session.run.clone(),
            tag: session.tag.clone(),
            index,
            step: record.step,
            wall_time: record.wall_time,
        }
    }
}

/// A decoded sample, ready to be turned into a display handle
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixels, row-major
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Decode PNG/JPEG bytes into RGBA pixels
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_list_json_uses_wall_time_camel_case() {
        let json = r#"[{"step":0,"wallTime":1600000000.5},{"step":10,"wallTime":1600000010.0}]"#;
        let steps: Vec<StepRecord> = serde_json::from_str(json).unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].step, 10);
        assert!(serde_json::to_string(&steps[0]).unwrap().contains("wallTime"));
    }

    #[test]
    fn test_logged_at() {
        let record = StepRecord { step: 3, wall_time: 1_600_000_000.25 };
        let at = record.logged_at().unwrap();

        assert_eq!(at.timestamp(), 1_600_000_000);
        assert_eq!(at.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_key_changes_with_wall_time() {
        let session = Session::new("r1", "loss");
        let a = ImageKey::new(&session, 1, &StepRecord { step: 10, wall_time: 1.0 });
        let b = ImageKey::new(&session, 1, &StepRecord { step: 10, wall_time: 2.0 });

        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_png() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let decoded = DecodedImage::decode(&png).unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.pixels.len(), 3 * 2 * 4);
        assert_eq!(&decoded.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(DecodedImage::decode(b"not an image").is_err());
    }
}
