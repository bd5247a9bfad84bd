//! Pure mapping from MangaDex records to the host's normalized schema, plus
//! the client-side filters that run on raw (cached) records.

use comic_talker_core::error::TalkerError;
use comic_talker_core::issue_number::canonical_issue_number;
use comic_talker_core::metadata::{MetadataOrigin, MetadataRecord, SeriesRecord};

use crate::models::{preferred_text, relationship, Chapter, Cover, Series};

/// Mapping knobs taken from talker settings; the mapped record is a pure
/// function of (chapter, series, options).
#[derive(Debug, Clone)]
pub struct MapOptions {
    pub origin: MetadataOrigin,
    pub website: String,
    pub cover_url_base: String,
    pub use_ongoing_issue_count: bool,
    pub use_series_start_as_volume: bool,
}

/// Format a search candidate. Fails with `SchemaMismatch` when the series
/// has no title at all; every other field degrades to `None`.
pub fn series_to_record(series: &Series, cover_url_base: &str) -> Result<SeriesRecord, TalkerError> {
    let attrs = &series.attributes;
    let name = preferred_text(&attrs.title)
        .ok_or_else(|| TalkerError::SchemaMismatch {
            path: "data.attributes.title".to_string(),
            detail: "no title in any language".to_string(),
        })?
        .to_string();

    let mut aliases = Vec::new();
    for alt in &attrs.alt_titles {
        for title in alt.values() {
            if *title != name && !aliases.contains(title) {
                aliases.push(title.clone());
            }
        }
    }

    // format tag doubles as the series format ("Web Comic", "Oneshot", ...)
    let format = attrs
        .tags
        .iter()
        .filter(|t| t.attributes.group == "format")
        .find_map(|t| t.name_en())
        .map(str::to_string);

    let image_url = relationship(&series.relationships, "cover_art")
        .and_then(|rel| rel.attributes.file_name.as_deref())
        .map(|file| cover_url(cover_url_base, &series.id, file));

    Ok(SeriesRecord {
        id: series.id.clone(),
        name,
        aliases,
        start_year: attrs.year.and_then(|y| u32::try_from(y).ok()),
        count_of_issues: parse_count(attrs.last_chapter.as_deref()),
        count_of_volumes: parse_count(attrs.last_volume.as_deref()),
        // publisher can only be gleaned from chapter scanlation groups
        publisher: None,
        format,
        description: preferred_text(&attrs.description).map(str::to_string),
        image_url,
    })
}

/// Map one chapter plus its series into the host record.
pub fn issue_to_metadata(
    chapter: &Chapter,
    series: &Series,
    opts: &MapOptions,
) -> Result<MetadataRecord, TalkerError> {
    let series_record = series_to_record(series, &opts.cover_url_base)?;
    let attrs = &series.attributes;
    let ch = &chapter.attributes;

    let mut md = MetadataRecord {
        origin: Some(opts.origin.clone()),
        issue_id: Some(chapter.id.clone()),
        series_id: Some(series.id.clone()),
        series: Some(series_record.name.clone()),
        issue: ch.chapter.as_deref().map(canonical_issue_number),
        manga: true,
        ..Default::default()
    };

    md.cover_image = ch.image.clone();

    // a lastChapter means completed/cancelled, which legitimizes the counts
    if attrs.last_chapter.is_some() || opts.use_ongoing_issue_count {
        md.issue_count = series_record.count_of_issues;
        md.volume_count = series_record.count_of_volumes;
    }

    md.description = series_record.description.clone();

    // tags hold genre, theme, content warning, and format
    for tag in &attrs.tags {
        let name = match tag.name_en() {
            Some(n) => n.to_string(),
            None => continue,
        };
        match tag.attributes.group.as_str() {
            "genre" => md.genres.push(name),
            "format" => {
                if name == "Web Comic" || name == "Oneshot" {
                    md.format = Some(name);
                } else {
                    md.tags.push(name);
                }
            }
            "theme" | "content" => md.tags.push(name),
            _ => {}
        }
    }

    md.title = ch.title.clone();

    for alias in &series_record.aliases {
        md.add_series_alias(alias.clone());
    }

    md.language = ch.translated_language.clone();
    md.maturity_rating = attrs.content_rating.as_deref().map(capitalize);

    // chapters have no stable page of their own; link the series
    md.web_link = Some(format!(
        "{}/title/{}",
        opts.website.trim_end_matches('/'),
        series.id
    ));

    for rel in &series.relationships {
        match rel.kind.as_str() {
            "author" => {
                if let Some(name) = &rel.attributes.name {
                    md.add_credit(name.clone(), "writer");
                }
            }
            "artist" => {
                if let Some(name) = &rel.attributes.name {
                    md.add_credit(name.clone(), "artist");
                }
            }
            _ => {}
        }
    }

    // official scanlation group stands in for the publisher; the chapter's
    // relationships carry it on feed queries, the series' on manga queries
    md.publisher = chapter
        .relationships
        .iter()
        .chain(series.relationships.iter())
        .find(|r| r.kind == "scanlation_group" && r.attributes.official == Some(true))
        .and_then(|r| r.attributes.name.clone());

    md.volume = parse_count(ch.volume.as_deref());
    if opts.use_series_start_as_volume {
        md.volume = series_record.start_year;
    }

    if let Some((y, m, d)) = ch.publish_at.as_deref().and_then(parse_iso_date) {
        md.year = Some(y);
        md.month = Some(m);
        md.day = Some(d);
    } else {
        md.year = series_record.start_year;
    }

    Ok(md)
}

/// Drop series rated erotica/pornographic or carrying any content-warning tag.
pub fn filter_adult(series: Vec<Series>) -> Vec<Series> {
    series
        .into_iter()
        .filter(|s| {
            let rating_adult = matches!(
                s.attributes.content_rating.as_deref(),
                Some("erotica") | Some("pornographic")
            );
            let content_tag = s
                .attributes
                .tags
                .iter()
                .any(|t| t.attributes.group == "content");
            !(rating_adult || content_tag)
        })
        .collect()
}

/// Drop series tagged "Doujinshi" (genre or format group).
pub fn filter_doujin(series: Vec<Series>) -> Vec<Series> {
    series
        .into_iter()
        .filter(|s| {
            !s.attributes.tags.iter().any(|t| {
                (t.attributes.group == "genre" || t.attributes.group == "format")
                    && t.name_en() == Some("Doujinshi")
            })
        })
        .collect()
}

/// A chapter number can appear once per release group; keep one entry per
/// number, preferring an official group's release.
pub fn dedupe_chapters(chapters: Vec<Chapter>) -> Vec<Chapter> {
    let mut keep: Vec<Chapter> = Vec::new();
    for chapter in chapters {
        let official = is_official(&chapter);
        let number = chapter.attributes.chapter.clone();
        match keep
            .iter()
            .position(|c| c.attributes.chapter == number)
        {
            Some(i) => {
                if official && !is_official(&keep[i]) {
                    keep[i] = chapter;
                }
            }
            None => keep.push(chapter),
        }
    }
    keep
}

fn is_official(chapter: &Chapter) -> bool {
    chapter
        .relationships
        .iter()
        .any(|r| r.kind == "scanlation_group" && r.attributes.official == Some(true))
}

/// Chapters have no covers of their own; attach the cover of the volume each
/// chapter belongs to.
pub fn assign_volume_covers(
    series_id: &str,
    chapters: &mut [Chapter],
    covers: &[Cover],
    cover_url_base: &str,
) {
    for chapter in chapters {
        let volume = match &chapter.attributes.volume {
            Some(v) => v,
            None => continue,
        };
        if let Some(cover) = covers
            .iter()
            .find(|c| c.attributes.volume.as_ref() == Some(volume))
        {
            chapter.attributes.image = Some(cover_url(
                cover_url_base,
                series_id,
                &cover.attributes.file_name,
            ));
        }
    }
}

pub fn cover_url(base: &str, series_id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), series_id, file_name)
}

/// Lenient integer parse for count-like strings the API stores as text
/// ("97", "11.0"); anything else is unknown.
fn parse_count(raw: Option<&str>) -> Option<u32> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| *v >= 0.0 && v.fract() == 0.0)
        .map(|v| v as u32)
}

/// Extract (year, month, day) from an ISO-8601 prefix like
/// "2020-01-31T12:00:00+00:00".
fn parse_iso_date(raw: &str) -> Option<(u32, u32, u32)> {
    let date = raw.get(..10)?;
    let mut parts = date.split('-');
    let y = parts.next()?.parse::<u32>().ok()?;
    let m = parts.next()?.parse::<u32>().ok()?;
    let d = parts.next()?.parse::<u32>().ok()?;
    if !(1..=12).contains(&m) || !(1..=31).contains(&d) {
        return None;
    }
    Some((y, m, d))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
