use theme_sync_core::manifest::{parse, Category};

struct TestCase {
    name: &'static str,
    index: &'static str,
    asset_path: Option<&'static str>,
    doc_path: Option<&'static str>,
}

#[test]
fn test_simple_and_structured_entries_agree_on_asset_path() {
    let cases = vec![
        TestCase {
            name: "simple string entry",
            index: "theme_provider: Acme\npresent_themes:\n  abc: themes/abc.yml\n",
            asset_path: Some("themes/abc.yml"),
            doc_path: None,
        },
        TestCase {
            name: "structured entry, primary keys",
            index: "theme_provider: Acme\npresent_themes:\n  abc:\n    theme_path: themes/abc.yml\n    markdown_path: docs/abc.md\n",
            asset_path: Some("themes/abc.yml"),
            doc_path: Some("docs/abc.md"),
        },
        TestCase {
            name: "structured entry, older aliases and unknown keys",
            index: "theme_provider: Acme\npresent_themes:\n  abc:\n    path: themes/abc.yml\n    readme: abc.md\n    preview_colour: '#fff'\n",
            asset_path: Some("themes/abc.yml"),
            doc_path: Some("abc.md"),
        },
        TestCase {
            name: "structured entry without a theme file",
            index: "theme_provider: Acme\npresent_themes:\n  abc:\n    markdown: abc.md\n",
            asset_path: None,
            doc_path: Some("abc.md"),
        },
    ];

    for case in cases {
        let manifest = parse(case.index.as_bytes()).unwrap_or_else(|e| panic!("{}: {e}", case.name));
        let entry = &manifest.themes["abc"];
        assert_eq!(entry.asset_path.as_deref(), case.asset_path, "{}", case.name);
        assert_eq!(entry.doc_path.as_deref(), case.doc_path, "{}", case.name);
        assert!(manifest.is_valid(), "{}", case.name);
    }
}

#[test]
fn test_provider_metadata() {
    let manifest = parse(
        br#"
theme_provider: Acme
for_program: peggle-roguelike-generator
desc: Bright and dark themes
certified_by_ivan: "true"
theme_provider_type: Official
date_created: 31/12/2023
tags: retro, , neon
present_themes:
  night:
    theme: night.yml
    category: DARK
    theme_tags: [calm, blue]
"#,
    )
    .unwrap();

    assert!(manifest.certified);
    assert!(manifest.is_official());
    assert_eq!(manifest.tags(), vec!["retro", "neon"]);
    assert_eq!(
        manifest.parsed_date_created(),
        chrono::NaiveDate::from_ymd_opt(2023, 12, 31)
    );
    let night = &manifest.themes["night"];
    assert_eq!(night.kind(), Category::Dark);
    assert_eq!(night.tags, vec!["calm", "blue"]);
}
