// SPDX-License-Identifier: MIT OR Apache-2.0
//! File, overlay and validation working together.

use convo_config::{
    ConfigError, TranslatorConfig, apply_overrides, merge_configs, parse_toml, validate_config,
};
use convo_metadata::MetadataMode;
use convo_provider::Direction;

const BASE: &str = r#"
default_metadata_mode = "passthrough"
inference_order = ["canonical", "gemini", "anthropic", "openai", "openai_responses", "generic"]
"#;

#[test]
fn project_file_then_user_overlay() {
    let base = parse_toml(BASE).unwrap();
    let overlay = parse_toml(r#"default_direction = "output""#).unwrap();
    let cfg = merge_configs(base, overlay);
    assert_eq!(cfg.metadata_mode(), MetadataMode::Passthrough);
    assert_eq!(cfg.direction(), Direction::Output);
    assert_eq!(cfg.inference_order.as_ref().map(Vec::len), Some(6));
    assert!(validate_config(&cfg).unwrap().is_empty());
}

#[test]
fn environment_beats_file() {
    let mut cfg = parse_toml(BASE).unwrap();
    apply_overrides(&mut cfg, |var| match var {
        "CONVO_METADATA_MODE" => Some("strip".into()),
        "CONVO_INFERENCE_ORDER" => Some("openai,openai".into()),
        _ => None,
    })
    .unwrap();
    assert_eq!(cfg.metadata_mode(), MetadataMode::Strip);
    let err = validate_config(&cfg).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError { .. }));
    assert!(err.to_string().contains("more than once"));
}

#[test]
fn empty_file_is_default() {
    assert_eq!(parse_toml("").unwrap(), TranslatorConfig::default());
}
