//! Provider index (`index.yml`) parsing.
//!
//! Provider manifests exist in two generations:
//! - simple entries, where a theme id maps straight to the theme file path;
//! - structured entries, where a theme id maps to an object carrying the path
//!   plus documentation, display name, category, tags and (legacy) images dir.
//!
//! Both are read from a generic YAML value tree. Key names for structured
//! entries come from the alias lists in [`aliases`]; that table is the only place
//! manifest compatibility is decided.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, error, info, warn};

use crate::error::ManifestError;

pub const INDEX_FILE_NAME: &str = "index.yml";

/// Candidate keys per field, in priority order. First non-null key wins.
pub mod aliases {
    pub const ASSET_PATH: &[&str] = &["theme_path", "theme", "path"];
    pub const DOC_PATH: &[&str] = &["markdown_path", "markdown", "readme"];
    pub const DISPLAY_NAME: &[&str] = &["name", "display_name", "title"];
    pub const CATEGORY: &[&str] = &["category", "variant"];
    pub const TAGS: &[&str] = &["theme_tags", "tags"];
    pub const IMAGES_DIR: &[&str] = &["images_dir", "images"];
}

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%m/%d/%Y", "%Y-%m-%d"];

/// Colour scheme bucket a theme is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Light,
    Dark,
    Other,
}

impl Category {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(c) if c.eq_ignore_ascii_case("light") => Category::Light,
            Some(c) if c.eq_ignore_ascii_case("dark") => Category::Dark,
            _ => Category::Other,
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Category::Light),
            "dark" => Ok(Category::Dark),
            "other" => Ok(Category::Other),
            other => Err(format!("unknown category {other:?} (expected light, dark or other)")),
        }
    }
}

/// One installable theme inside a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThemeEntry {
    /// Theme file, relative to the provider root. Entries without it cannot be installed.
    pub asset_path: Option<String>,
    /// Markdown documentation, relative to the provider root.
    pub doc_path: Option<String>,
    pub display_name: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// Legacy per-theme image directory, relative to the provider root.
    pub images_dir: Option<String>,
}

impl ThemeEntry {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            asset_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> Category {
        Category::from_raw(self.category.as_deref())
    }

    pub fn display_name_or<'a>(&'a self, theme_id: &'a str) -> &'a str {
        self.display_name.as_deref().unwrap_or(theme_id)
    }
}

/// A parsed provider index. Built fresh on every parse and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    pub provider_name: Option<String>,
    pub target_program: Option<String>,
    pub description: Option<String>,
    pub certified: bool,
    pub provider_type: Option<String>,
    pub theme_format: Option<String>,
    pub date_created: Option<String>,
    pub tags_raw: Option<String>,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub homepage: Option<String>,
    pub themes: BTreeMap<String, ThemeEntry>,
}

impl Manifest {
    pub fn is_official(&self) -> bool {
        self.provider_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("official"))
    }

    /// A manifest takes part in installation only if it names its provider.
    pub fn is_valid(&self) -> bool {
        self.provider_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }

    pub fn validate(self) -> Result<Self, ManifestError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(ManifestError::Unverified)
        }
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags_raw.as_deref().map(split_tags).unwrap_or_default()
    }

    pub fn has_nsfw_content(&self) -> bool {
        self.tags()
            .iter()
            .any(|tag| tag.to_lowercase().contains("nsfw"))
    }

    pub fn parsed_date_created(&self) -> Option<NaiveDate> {
        self.date_created.as_deref().and_then(parse_date)
    }

    /// Human readable provider name: `name`, then `theme_provider`.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.provider_name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }
}

/// Parse raw index bytes into a [`Manifest`].
///
/// Fails only when the document is not YAML, is empty, or is not a mapping.
/// Missing optional fields fall back to their defaults.
pub fn parse(raw: &[u8]) -> Result<Manifest, ManifestError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        error!("Empty index content");
        return Err(ManifestError::Malformed("empty document".into()));
    }

    let document: Value = serde_yaml::from_slice(raw).map_err(|e| {
        error!(error = %e, "Failed to parse index YAML");
        ManifestError::Malformed(e.to_string())
    })?;

    let root = match document {
        Value::Mapping(map) => map,
        Value::Null => {
            error!("Index YAML decoded to null");
            return Err(ManifestError::Malformed("empty document".into()));
        }
        other => {
            error!(kind = value_kind(&other), "Index YAML top level is not a mapping");
            return Err(ManifestError::Malformed(format!(
                "expected a mapping at top level, found {}",
                value_kind(&other)
            )));
        }
    };

    let themes = match root.get("present_themes") {
        Some(Value::Mapping(entries)) => parse_theme_entries(entries),
        Some(Value::Null) | None => BTreeMap::new(),
        Some(other) => {
            warn!(kind = value_kind(other), "present_themes is not a mapping, ignoring");
            BTreeMap::new()
        }
    };

    let manifest = Manifest {
        provider_name: string_field(&root, "theme_provider"),
        target_program: string_field(&root, "for_program"),
        description: string_field(&root, "desc"),
        certified: root.get("certified_by_ivan").is_some_and(truthy),
        provider_type: string_field(&root, "theme_provider_type"),
        theme_format: string_field(&root, "theme_format"),
        date_created: string_field(&root, "date_created"),
        tags_raw: string_field(&root, "tags"),
        name: string_field(&root, "name"),
        icon: string_field(&root, "icon"),
        homepage: string_field(&root, "homepage"),
        themes,
    };

    info!(
        provider = manifest.provider_name.as_deref().unwrap_or("<unnamed>"),
        themes = manifest.themes.len(),
        certified = manifest.certified,
        "Parsed theme index"
    );
    Ok(manifest)
}

/// Read and parse `<provider_dir>/index.yml`.
pub fn load_manifest(provider_dir: &Path) -> Result<Manifest, ManifestError> {
    let index_path = provider_dir.join(INDEX_FILE_NAME);
    if !index_path.is_file() {
        error!(path = %provider_dir.display(), "index.yml not found");
        return Err(ManifestError::Missing(provider_dir.to_path_buf()));
    }
    let raw = fs::read(&index_path).map_err(|e| {
        error!(error = ?e, path = %index_path.display(), "Failed to read index.yml");
        ManifestError::Read {
            path: index_path.clone(),
            source: e,
        }
    })?;
    parse(&raw)
}

/// True when the directory holds an index that parses and names its provider.
pub fn has_valid_index(provider_dir: &Path) -> bool {
    load_manifest(provider_dir).is_ok_and(|m| m.is_valid())
}

/// Parse free-form creation dates; anything unrecognised is "no date".
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn parse_theme_entries(entries: &Mapping) -> BTreeMap<String, ThemeEntry> {
    let mut themes = BTreeMap::new();
    for (key, value) in entries {
        let Some(theme_id) = scalar_string(key) else {
            warn!(key = ?key, "Skipping theme entry with non-scalar id");
            continue;
        };
        let entry = match value {
            Value::Mapping(fields) => structured_entry(fields),
            Value::Tagged(tagged) => match &tagged.value {
                Value::Mapping(fields) => structured_entry(fields),
                other => simple_entry(&theme_id, other),
            },
            other => simple_entry(&theme_id, other),
        };
        themes.insert(theme_id, entry);
    }
    debug!(count = themes.len(), "Parsed theme entries");
    themes
}

fn simple_entry(theme_id: &str, value: &Value) -> ThemeEntry {
    let asset_path = scalar_string(value).filter(|p| !p.trim().is_empty());
    if asset_path.is_none() {
        warn!(theme_id, kind = value_kind(value), "Theme entry has no usable path");
    }
    ThemeEntry {
        asset_path,
        ..Default::default()
    }
}

fn structured_entry(fields: &Mapping) -> ThemeEntry {
    ThemeEntry {
        asset_path: first_string(fields, aliases::ASSET_PATH),
        doc_path: first_string(fields, aliases::DOC_PATH),
        display_name: first_string(fields, aliases::DISPLAY_NAME),
        category: first_string(fields, aliases::CATEGORY),
        tags: first_value(fields, aliases::TAGS)
            .map(tag_list)
            .unwrap_or_default(),
        images_dir: first_string(fields, aliases::IMAGES_DIR),
    }
}

fn first_value<'a>(fields: &'a Mapping, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| fields.get(*key).filter(|v| !v.is_null()))
}

fn first_string(fields: &Mapping, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find_map(scalar_string)
        .filter(|s| !s.trim().is_empty())
}

fn tag_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .filter_map(scalar_string)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        other => scalar_string(other)
            .map(|s| split_tags(&s))
            .unwrap_or_default(),
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn string_field(root: &Mapping, key: &str) -> Option<String> {
    root.get(key).and_then(scalar_string)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_and_structured_entries_agree_on_asset_path() {
        let simple = parse(b"theme_provider: Acme\npresent_themes:\n  abc: themes/abc.yml\n").unwrap();
        let structured = parse(
            b"theme_provider: Acme\npresent_themes:\n  abc:\n    theme_path: themes/abc.yml\n    markdown_path: docs/abc.md\n",
        )
        .unwrap();

        assert_eq!(simple.themes["abc"].asset_path, structured.themes["abc"].asset_path);
        assert_eq!(simple.themes["abc"].doc_path, None);
        assert_eq!(structured.themes["abc"].doc_path.as_deref(), Some("docs/abc.md"));
    }

    #[test]
    fn alias_priority_prefers_earlier_keys() {
        let manifest = parse(
            br#"
theme_provider: Acme
present_themes:
  one:
    path: low.yml
    theme: mid.yml
    theme_path: high.yml
    readme: README.md
    markdown: one.md
  two:
    path: only-path.yml
    unknown_key: whatever
"#,
        )
        .unwrap();

        assert_eq!(manifest.themes["one"].asset_path.as_deref(), Some("high.yml"));
        assert_eq!(manifest.themes["one"].doc_path.as_deref(), Some("one.md"));
        assert_eq!(manifest.themes["two"].asset_path.as_deref(), Some("only-path.yml"));
    }

    #[test]
    fn structured_entry_fields_are_independent() {
        let manifest = parse(
            br#"
theme_provider: Acme
present_themes:
  neon:
    theme_path: themes/neon.yml
    name: Neon Nights
    category: Dark
    theme_tags: [retro, " neon "]
  bare:
    markdown_path: docs/bare.md
"#,
        )
        .unwrap();

        let neon = &manifest.themes["neon"];
        assert_eq!(neon.display_name_or("neon"), "Neon Nights");
        assert_eq!(neon.kind(), Category::Dark);
        assert_eq!(neon.tags, vec!["retro", "neon"]);

        let bare = &manifest.themes["bare"];
        assert_eq!(bare.asset_path, None);
        assert_eq!(bare.display_name_or("bare"), "bare");
        assert_eq!(bare.kind(), Category::Other);
        assert!(bare.tags.is_empty());
    }

    #[test]
    fn missing_or_empty_theme_section_gives_empty_map() {
        let absent = parse(b"theme_provider: Acme\n").unwrap();
        assert!(absent.themes.is_empty());

        let empty = parse(b"theme_provider: Acme\npresent_themes:\n").unwrap();
        assert!(empty.themes.is_empty());

        let empty_map = parse(b"theme_provider: Acme\npresent_themes: {}\n").unwrap();
        assert!(empty_map.themes.is_empty());
    }

    #[test]
    fn malformed_documents_are_rejected() {
        for raw in [&b""[..], b"   \n", b"~\n", b"- just\n- a list\n", b"key: [unclosed\n"] {
            let result = parse(raw);
            assert!(
                matches!(result, Err(ManifestError::Malformed(_))),
                "expected Malformed for {:?}, got {:?}",
                String::from_utf8_lossy(raw),
                result
            );
        }
    }

    #[test]
    fn manifest_without_provider_name_parses_but_is_unverified() {
        let manifest = parse(b"desc: nobody owns me\npresent_themes:\n  a: a.yml\n").unwrap();
        assert!(!manifest.is_valid());
        assert!(matches!(manifest.validate(), Err(ManifestError::Unverified)));

        let blank = parse(b"theme_provider: '  '\n").unwrap();
        assert!(!blank.is_valid());
    }

    #[test]
    fn top_level_metadata() {
        let manifest = parse(
            br#"
theme_provider: Ivan
for_program: peggle-roguelike-generator
desc: Official themes
certified_by_ivan: "TRUE"
theme_format: 2
date_created: 24/12/2023
theme_provider_type: Official
tags: "retro, nsfw-free ,, dark"
name: Ivan's Themes
icon: assets/icon.png
homepage: HOME.md
"#,
        )
        .unwrap();

        assert!(manifest.certified);
        assert!(manifest.is_official());
        assert_eq!(manifest.theme_format.as_deref(), Some("2"));
        assert_eq!(manifest.tags(), vec!["retro", "nsfw-free", "dark"]);
        assert!(manifest.has_nsfw_content());
        assert_eq!(manifest.display_name(), Some("Ivan's Themes"));
        assert_eq!(
            manifest.parsed_date_created(),
            NaiveDate::from_ymd_opt(2023, 12, 24)
        );
    }

    #[test]
    fn certified_flag_variants() {
        assert!(parse(b"certified_by_ivan: true\n").unwrap().certified);
        assert!(!parse(b"certified_by_ivan: 'yes'\n").unwrap().certified);
        assert!(!parse(b"certified_by_ivan: 1\n").unwrap().certified);
        assert!(!parse(b"desc: x\n").unwrap().certified);
    }

    #[test]
    fn date_parsing_is_opportunistic() {
        assert_eq!(parse_date("2024-03-05"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(parse_date("05/03/2024"), NaiveDate::from_ymd_opt(2024, 3, 5));
        // not a valid dd/mm date, so the mm/dd reading applies
        assert_eq!(parse_date("12/31/2024"), NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(
            parse_date("2024-03-05T10:00:00+02:00"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(parse_date("last tuesday"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn empty_tags_give_empty_list() {
        assert!(parse(b"tags: ''\n").unwrap().tags().is_empty());
        assert!(parse(b"desc: x\n").unwrap().tags().is_empty());
    }

    #[test]
    fn legacy_images_dir_is_kept() {
        let manifest = parse(
            b"theme_provider: Old\npresent_themes:\n  t:\n    theme_path: t.yml\n    images_dir: images/t\n",
        )
        .unwrap();
        assert_eq!(manifest.themes["t"].images_dir.as_deref(), Some("images/t"));
    }

    #[test]
    fn load_manifest_reports_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_manifest(dir.path()), Err(ManifestError::Missing(_))));
        assert!(!has_valid_index(dir.path()));

        std::fs::write(dir.path().join(INDEX_FILE_NAME), "theme_provider: Acme\n").unwrap();
        assert!(has_valid_index(dir.path()));
    }
}
