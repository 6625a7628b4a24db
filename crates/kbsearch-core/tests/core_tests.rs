use figment::Jail;

use kbsearch_core::config::{expand_path, resolve_with_base, Config, Settings};
use kbsearch_core::types::{LabelFilterSpec, RankedResult, SearchRequest, SourceKind};

#[test]
fn defaults_apply_without_any_config_file() {
    Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        let settings = Config::load().expect("load").settings().expect("settings");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.search.default_top_k, 10);
        assert_eq!(settings.keywords.max_keywords, 12);
        Ok(())
    });
}

#[test]
fn env_file_and_env_vars_layer_over_base_file() {
    Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        jail.create_file(
            "config.toml",
            r#"
                [search]
                default_top_k = 5
                [cache]
                ttl_secs = 60
            "#,
        )?;
        jail.create_file("config.test.toml", "[cache]\nttl_secs = 1\n")?;
        jail.set_env("APP_FUSION__VECTOR_WEIGHT", "0.7");

        let config = Config::load().expect("load");
        let settings = config.settings().expect("settings");
        assert_eq!(settings.search.default_top_k, 5);
        assert_eq!(settings.cache.ttl_secs, 1, "env-specific file wins over base file");
        assert!((settings.fusion.vector_weight - 0.7).abs() < 1e-6);
        assert!((settings.fusion.lexical_weight - 0.5).abs() < 1e-6);

        let ttl: u64 = config.get("cache.ttl_secs").expect("get");
        assert_eq!(ttl, 1);
        Ok(())
    });
}

#[test]
fn invalid_weights_are_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        jail.create_file("config.toml", "[fusion]\nvector_weight = 0.0\nlexical_weight = 0.0\n")?;
        let err = Config::load().err().expect("zero weights must fail");
        assert!(err.to_string().contains("fusion weights"), "{err}");
        Ok(())
    });
}

#[test]
fn top_k_default_must_fit_max() {
    let mut settings = Settings::default();
    settings.search.default_top_k = 500;
    assert!(settings.validate().is_err());
    settings.search.default_top_k = 0;
    assert!(settings.validate().is_err());
}

#[test]
fn request_uses_camel_case_wire_names() {
    let json = r#"{"query":"教室コピー","topK":5,"labelFilters":{"includeMeetingNotes":false},"tableName":"kb"}"#;
    let req: SearchRequest = serde_json::from_str(json).expect("parse");
    assert_eq!(req.top_k, Some(5));
    assert_eq!(req.table_name.as_deref(), Some("kb"));
    assert_eq!(req.label_filters, Some(LabelFilterSpec::excluding_meeting_notes()));

    let bare: SearchRequest = serde_json::from_str(r#"{"query":"x"}"#).expect("parse");
    assert!(bare.top_k.is_none() && bare.label_filters.is_none());
}

#[test]
fn ranked_result_serializes_source_tags_lowercase() {
    let r = RankedResult {
        page_id: 42,
        title: "t".into(),
        content: "c".into(),
        labels: vec!["faq".into()],
        url: "https://kb.example/42".into(),
        source: SourceKind::Hybrid,
        score_kind: SourceKind::Hybrid,
        score_raw: 0.25,
        score: 0.9,
        score_text: "0.9000".into(),
    };
    let v = serde_json::to_value(&r).expect("json");
    assert_eq!(v["pageId"], 42);
    assert_eq!(v["source"], "hybrid");
    assert_eq!(v["scoreKind"], "hybrid");
    assert_eq!(v["scoreText"], "0.9000");
}

#[test]
fn source_priority_order() {
    assert!(SourceKind::Hybrid < SourceKind::Vector);
    assert!(SourceKind::Vector < SourceKind::Bm25);
    assert!(SourceKind::Bm25 < SourceKind::Title);
}

#[test]
fn relative_paths_resolve_against_base() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let resolved = resolve_with_base(tmp.path(), "indexes/tantivy");
    assert_eq!(resolved, tmp.path().join("indexes/tantivy"));
    let abs = tmp.path().join("abs");
    assert_eq!(resolve_with_base(std::path::Path::new("/elsewhere"), abs.to_string_lossy()), abs);
    std::env::set_var("KBSEARCH_TEST_ROOT", "/srv/kb");
    assert_eq!(expand_path("${KBSEARCH_TEST_ROOT}/lancedb"), std::path::PathBuf::from("/srv/kb/lancedb"));
}
