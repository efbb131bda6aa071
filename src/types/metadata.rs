use miette::{miette, Context, IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};

use crate::settings::MetadataSettings;

/// Metadata of a single video, as reported by the download backend.
///
/// Everything except the id is optional: sites and extractor versions
/// differ in what they report and a missing field must not fail a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub uploader_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,

    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,

    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub comment_count: Option<u64>,

    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl VideoInfo {
    /// Parse the JSON dump of the download backend and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let info: VideoInfo = serde_json::from_str(json)
            .into_diagnostic()
            .wrap_err("Could not parse video metadata")?;

        if info.id.trim().is_empty() {
            return Err(miette!("Video metadata has an empty id"));
        }

        Ok(info)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown_Title")
    }

    /// Name of the channel the video belongs to
    pub fn channel_name(&self) -> &str {
        self.channel
            .as_deref()
            .or(self.uploader.as_deref())
            .unwrap_or("Unknown_Channel")
    }

    /// Stable identifier of the channel the video belongs to
    pub fn channel_key(&self) -> &str {
        self.channel_id
            .as_deref()
            .or(self.uploader_id.as_deref())
            .unwrap_or("unknown_id")
    }
}

/// Flat listing of a playlist or a channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub entries: Vec<ListingEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub upload_date: Option<String>,
}

impl ListingEntry {
    /// URL to give back to the download backend for this entry
    pub fn watch_url(&self) -> String {
        match &self.url {
            Some(url) if url.starts_with("http") => url.clone(),
            _ => format!("https://www.youtube.com/watch?v={}", self.id),
        }
    }
}

impl Listing {
    /// Parse the flat JSON dump of the download backend.
    ///
    /// A URL pointing to a single video has no `entries`:
    /// the video itself is then the only entry.
    pub fn from_json(json: &str, limit: Option<usize>) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .into_diagnostic()
            .wrap_err("Could not parse listing")?;

        let has_entries = value.get("entries").is_some_and(|e| e.is_array());
        let mut listing = if has_entries {
            // Unavailable entries are reported as `null`, drop them
            let mut value = value;
            if let Some(entries) = value.get_mut("entries").and_then(|e| e.as_array_mut()) {
                entries.retain(|entry| entry.is_object());
            }
            serde_json::from_value::<Listing>(value)
                .into_diagnostic()
                .wrap_err("Unexpected listing format")?
        } else {
            let info = serde_json::from_value::<VideoInfo>(value)
                .into_diagnostic()
                .wrap_err("Unexpected video format")?;
            Listing {
                id: Some(info.id.clone()),
                title: info.title.clone(),
                uploader: info.uploader.clone(),
                channel_id: info.channel_id.clone(),
                entries: vec![ListingEntry {
                    id: info.id,
                    title: info.title,
                    url: info.webpage_url,
                    duration: info.duration,
                    upload_date: info.upload_date,
                }],
            }
        };

        if let Some(limit) = limit {
            listing.entries.truncate(limit);
        }

        Ok(listing)
    }
}

/// Metadata document exported next to the downloaded videos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataExport {
    pub basic_info: BasicInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_info: Option<TechnicalInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_metrics: Option<EngagementMetrics>,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub uploader: Option<String>,
    pub uploader_id: Option<String>,
    pub channel: Option<String>,
    pub channel_id: Option<String>,
    pub webpage_url: Option<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalInfo {
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub ext: Option<String>,
    pub format: Option<String>,
    pub filesize: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamps {
    pub upload_date: Option<String>,
    pub timestamp: Option<i64>,
    pub extracted_at: String,
}

impl MetadataExport {
    pub fn new(info: &VideoInfo, settings: &MetadataSettings, extracted_at: String) -> Self {
        let technical_info = settings.include_technical_info.then(|| TechnicalInfo {
            duration: info.duration,
            width: info.width,
            height: info.height,
            fps: info.fps,
            vcodec: info.vcodec.clone(),
            acodec: info.acodec.clone(),
            ext: info.ext.clone(),
            format: info.format.clone(),
            filesize: info.filesize,
        });

        let engagement_metrics = settings
            .include_engagement_metrics
            .then(|| EngagementMetrics {
                view_count: info.view_count,
                like_count: info.like_count,
                comment_count: info.comment_count,
            });

        Self {
            basic_info: BasicInfo {
                id: info.id.clone(),
                title: info.title.clone(),
                description: info.description.clone(),
                uploader: info.uploader.clone(),
                uploader_id: info.uploader_id.clone(),
                channel: info.channel.clone(),
                channel_id: info.channel_id.clone(),
                webpage_url: info.webpage_url.clone(),
                tags: info.tags.clone().unwrap_or_default(),
                categories: info.categories.clone().unwrap_or_default(),
            },
            technical_info,
            engagement_metrics,
            timestamps: Timestamps {
                upload_date: info.upload_date.clone(),
                timestamp: info.timestamp,
                extracted_at,
            },
        }
    }

    /// Scalar fields as `(column, value)` pairs, lists joined with `;`.
    /// Used for the single-row CSV export.
    pub fn flat_fields(&self) -> Vec<(&'static str, String)> {
        fn opt<T: ToString>(v: &Option<T>) -> String {
            v.as_ref().map(T::to_string).unwrap_or_default()
        }

        let b = &self.basic_info;
        let mut fields = vec![
            ("id", b.id.clone()),
            ("title", opt(&b.title)),
            ("description", opt(&b.description)),
            ("uploader", opt(&b.uploader)),
            ("uploader_id", opt(&b.uploader_id)),
            ("channel", opt(&b.channel)),
            ("channel_id", opt(&b.channel_id)),
            ("webpage_url", opt(&b.webpage_url)),
            ("tags", b.tags.join(";")),
            ("categories", b.categories.join(";")),
        ];

        if let Some(t) = &self.technical_info {
            fields.extend([
                ("duration", opt(&t.duration)),
                ("width", opt(&t.width)),
                ("height", opt(&t.height)),
                ("fps", opt(&t.fps)),
                ("vcodec", opt(&t.vcodec)),
                ("acodec", opt(&t.acodec)),
                ("ext", opt(&t.ext)),
                ("format", opt(&t.format)),
                ("filesize", opt(&t.filesize)),
            ]);
        }

        if let Some(e) = &self.engagement_metrics {
            fields.extend([
                ("view_count", opt(&e.view_count)),
                ("like_count", opt(&e.like_count)),
                ("comment_count", opt(&e.comment_count)),
            ]);
        }

        fields.extend([
            ("upload_date", opt(&self.timestamps.upload_date)),
            ("timestamp", opt(&self.timestamps.timestamp)),
            ("extracted_at", self.timestamps.extracted_at.clone()),
        ]);

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_JSON: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up",
        "uploader": "Rick Astley",
        "uploader_id": "@RickAstleyYT",
        "channel_id": "UCuAXFkgsw1L7xaCfnd5JJOw",
        "duration": 212,
        "width": 1920,
        "height": 1080,
        "fps": 25,
        "view_count": 1500000000,
        "tags": null,
        "upload_date": "20091025",
        "formats": [{"format_id": "18"}]
    }"#;

    #[test]
    fn parses_backend_dump_with_missing_and_null_fields() {
        let info = VideoInfo::from_json(VIDEO_JSON).unwrap();

        assert_eq!(info.id, "dQw4w9WgXcQ");
        assert_eq!(info.duration, Some(212.0));
        assert_eq!(info.tags, None);
        assert_eq!(info.like_count, None);
        assert_eq!(info.channel_name(), "Rick Astley");
        assert_eq!(info.channel_key(), "UCuAXFkgsw1L7xaCfnd5JJOw");
    }

    #[test]
    fn rejects_empty_id() {
        assert!(VideoInfo::from_json(r#"{"id": "  "}"#).is_err());
        assert!(VideoInfo::from_json(r#"{"title": "no id"}"#).is_err());
    }

    #[test]
    fn export_honors_section_toggles() {
        let info = VideoInfo::from_json(VIDEO_JSON).unwrap();
        let settings = MetadataSettings {
            include_technical_info: false,
            ..MetadataSettings::default()
        };

        let export = MetadataExport::new(&info, &settings, "2026-01-01T00:00:00Z".into());
        assert!(export.technical_info.is_none());
        assert_eq!(
            export.engagement_metrics.as_ref().unwrap().view_count,
            Some(1_500_000_000)
        );

        let json = serde_json::to_value(&export).unwrap();
        assert!(json.get("technical_info").is_none());
        assert_eq!(json["basic_info"]["tags"], serde_json::json!([]));
        assert_eq!(json["timestamps"]["upload_date"], "20091025");
    }

    #[test]
    fn listing_drops_null_entries_and_applies_limit() {
        let json = r#"{
            "id": "PL1", "title": "Mix", "_type": "playlist",
            "entries": [
                {"id": "a", "title": "A", "url": "https://www.youtube.com/watch?v=a"},
                null,
                {"id": "b", "title": "B"},
                {"id": "c"}
            ]
        }"#;

        let listing = Listing::from_json(json, Some(2)).unwrap();
        let ids: Vec<_> = listing.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(
            listing.entries[1].watch_url(),
            "https://www.youtube.com/watch?v=b"
        );
    }

    #[test]
    fn single_video_listing_has_one_entry() {
        let listing = Listing::from_json(VIDEO_JSON, None).unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].id, "dQw4w9WgXcQ");
    }
}
