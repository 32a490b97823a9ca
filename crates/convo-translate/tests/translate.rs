// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end behaviour of the translator over the built-in registry.

use std::sync::{Arc, Mutex};

use convo_error::{ConvoErrorDto, ErrorCategory, ErrorCode};
use convo_ir::role;
use convo_metadata::{METADATA_FIELD, MetadataMode};
use convo_provider::{Direction, RawInput};
use convo_providers::default_registry;
use convo_translate::{TranslateOptions, Translation, Translator, translate};
use proptest::prelude::*;
use serde_json::{Value, json};
use tracing_subscriber::fmt::MakeWriter;

fn canonical(role: &str, text: &str) -> Value {
    json!({"role": role, "parts": [{"type": "text", "content": text}]})
}

fn to(target: &str) -> TranslateOptions {
    TranslateOptions::new().to_format(target)
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[test]
fn bare_string_input() {
    let out = translate("Hello, world!", &TranslateOptions::new().direction(Direction::Input)).unwrap();
    insta::assert_json_snapshot!(out, @r#"
    {
      "messages": [
        {
          "role": "user",
          "parts": [
            {
              "type": "text",
              "content": "Hello, world!"
            }
          ]
        }
      ]
    }
    "#);
}

#[test]
fn system_moves_to_separate_channel() {
    let raw = vec![canonical("system", "Be helpful"), canonical("user", "Hi")];
    let out = translate(raw, &to("anthropic")).unwrap();
    assert_eq!(out.format(), "anthropic");
    let out = out.into_output().unwrap();
    assert_eq!(out.messages, vec![json!({"role": "user", "content": "Hi"})]);
    assert_eq!(out.system, Some(json!([{"type": "text", "text": "Be helpful"}])));
}

#[test]
fn interleaved_system_keeps_its_positions() {
    let raw = vec![canonical("system", "A"), canonical("user", "Hi"), canonical("system", "B")];
    let out = translate(raw, &to("openai")).unwrap().into_output().unwrap();
    let roles: Vec<_> = out.messages.iter().map(|m| m["role"].clone()).collect();
    assert_eq!(roles, vec![json!("system"), json!("user"), json!("system")]);
    let contents: Vec<_> = out.messages.iter().map(|m| m["content"].clone()).collect();
    assert_eq!(contents, vec![json!("A"), json!("Hi"), json!("B")]);
}

#[test]
fn canonical_payload_is_inferred_as_canonical() {
    let translator = Translator::new(default_registry());
    let got = translator.infer(&RawInput::from(vec![canonical("user", "Hi")]), None);
    assert_eq!(got.provider, "canonical");
}

// ── Cross-provider ──────────────────────────────────────────────────────

#[test]
fn gemini_to_openai_lifts_system_instruction() {
    let raw = vec![
        json!({"role": "user", "parts": [{"text": "Weather?"}]}),
        json!({"role": "model", "parts": [{"functionCall": {"name": "weather", "args": {"city": "Oslo"}}}]}),
    ];
    let opts = to("openai").system(json!({"parts": [{"text": "Be brief"}]}));
    let out = translate(raw, &opts).unwrap().into_output().unwrap();
    assert_eq!(out.system, None);
    assert_eq!(out.messages[0], json!({"role": "system", "content": "Be brief"}));
    assert_eq!(out.messages[1]["content"], json!("Weather?"));
    let call = &out.messages[2]["tool_calls"][0]["function"];
    assert_eq!(call["name"], json!("weather"));
    assert_eq!(call["arguments"], json!("{\"city\":\"Oslo\"}"));
}

#[test]
fn anthropic_to_gemini_keeps_tool_names() {
    let raw = vec![
        json!({"role": "assistant", "content": [
            {"type": "tool_use", "id": "t1", "name": "search", "input": {"q": "rust"}}
        ]}),
        json!({"role": "user", "content": [
            {"type": "tool_result", "tool_use_id": "t1", "content": "found"}
        ]}),
    ];
    let opts = to("gemini").from_format("anthropic").system(json!("Be helpful"));
    let out = translate(raw, &opts).unwrap().into_output().unwrap();
    assert_eq!(out.system, Some(json!({"parts": [{"text": "Be helpful"}]})));
    assert_eq!(out.messages[0]["role"], json!("model"));
    assert_eq!(out.messages[0]["parts"][0]["functionCall"]["name"], json!("search"));
    assert_eq!(out.messages[1]["parts"][0]["functionResponse"]["name"], json!("search"));
}

#[test]
fn responses_items_reach_anthropic() {
    let raw = vec![
        json!({"role": "user", "content": [{"type": "input_text", "text": "Hi"}]}),
        json!({"type": "function_call", "call_id": "c1", "name": "ls", "arguments": "{}"}),
        json!({"type": "function_call_output", "call_id": "c1", "output": "a.txt"}),
    ];
    let out = translate(raw, &to("anthropic").from_format("openai_responses"))
        .unwrap()
        .into_output()
        .unwrap();
    assert_eq!(out.messages.len(), 3);
    assert_eq!(out.messages[1]["content"][0]["type"], json!("tool_use"));
    assert_eq!(out.messages[2]["role"], json!("user"));
    assert_eq!(out.messages[2]["content"][0]["tool_use_id"], json!("c1"));
}

#[test]
fn translating_to_canonical_and_back_is_stable() {
    let raw = vec![
        json!({"role": "system", "content": "Be brief"}),
        json!({"role": "user", "content": "Hi"}),
        json!({"role": "assistant", "content": "Hello"}),
    ];
    let conv = translate(raw.clone(), &TranslateOptions::new())
        .unwrap()
        .into_conversation()
        .unwrap();
    let wire: Vec<Value> = conv.messages.iter().map(|m| serde_json::to_value(m).unwrap()).collect();
    let back = translate(wire, &to("openai").from_format("canonical"))
        .unwrap()
        .into_output()
        .unwrap();
    assert_eq!(back.messages, raw);
}

fn preserve(from: &str, target: &str) -> TranslateOptions {
    to(target).from_format(from).metadata_mode(MetadataMode::Preserve)
}

/// Out to a split-channel format in preserve mode, then back to openai with
/// extras written inline.
fn split_channel_round_trip(raw: &[Value], via: &str) -> (Option<Value>, Vec<Value>) {
    let out = translate(raw.to_vec(), &preserve("openai", via))
        .unwrap()
        .into_output()
        .unwrap();
    let system = out.system.clone();
    let mut back = to("openai").from_format(via).metadata_mode(MetadataMode::Passthrough);
    if let Some(system) = out.system {
        back = back.system(system);
    }
    let back = translate(out.messages, &back).unwrap().into_output().unwrap();
    assert_eq!(back.system, None);
    (system, back.messages)
}

fn interleaved_openai() -> Vec<Value> {
    vec![
        json!({"role": "system", "content": "A"}),
        json!({"role": "user", "content": "Hi"}),
        json!({"role": "system", "content": "B"}),
    ]
}

#[test]
fn interleaved_system_survives_anthropic_in_preserve_mode() {
    let raw = interleaved_openai();
    let (system, back) = split_channel_round_trip(&raw, "anthropic");
    let system = system.unwrap();
    assert_eq!(system[0]["text"], json!("A"));
    assert_eq!(system[1][METADATA_FIELD]["anthropic"]["_known_fields"]["message_index"], json!(2));
    assert_eq!(back, raw);
}

#[test]
fn interleaved_system_survives_gemini_in_preserve_mode() {
    let raw = interleaved_openai();
    let (system, back) = split_channel_round_trip(&raw, "gemini");
    let parts = &system.unwrap()["parts"];
    assert_eq!(parts[0][METADATA_FIELD]["gemini"]["_known_fields"]["message_index"], json!(0));
    assert_eq!(parts[1][METADATA_FIELD]["gemini"]["_known_fields"]["message_index"], json!(2));
    assert_eq!(back, raw);
}

#[test]
fn system_extras_survive_split_channels_in_preserve_mode() {
    let raw = vec![
        json!({"role": "user", "content": "Hi"}),
        json!({"role": "system", "content": "B", "name": "policy", "x_tag": "t1"}),
        json!({"role": "assistant", "content": "Hello"}),
    ];
    for via in ["anthropic", "gemini"] {
        let (_, back) = split_channel_round_trip(&raw, via);
        assert_eq!(back, raw, "{via}");
    }
}

#[test]
fn strip_mode_gathers_system_at_the_front() {
    let strip = to("anthropic").from_format("openai").metadata_mode(MetadataMode::Strip);
    let out = translate(interleaved_openai(), &strip)
        .unwrap()
        .into_output()
        .unwrap();
    let back = to("openai")
        .from_format("anthropic")
        .metadata_mode(MetadataMode::Strip)
        .system(out.system.unwrap());
    let back = translate(out.messages, &back).unwrap().into_output().unwrap();
    let roles: Vec<_> = back.messages.iter().map(|m| m["role"].clone()).collect();
    assert_eq!(roles, vec![json!("system"), json!("user")]);
}

// ── Metadata modes ──────────────────────────────────────────────────────

fn tagged_openai() -> Vec<Value> {
    vec![json!({"role": "user", "content": "Hi", "x_trace": "t1"})]
}

fn emit_with(mode: MetadataMode) -> Value {
    let opts = to("anthropic").from_format("openai").metadata_mode(mode);
    let out = translate(tagged_openai(), &opts).unwrap().into_output().unwrap();
    out.messages[0].clone()
}

#[test]
fn strip_drops_unknown_fields() {
    let msg = emit_with(MetadataMode::Strip);
    assert_eq!(msg, json!({"role": "user", "content": "Hi"}));
}

#[test]
fn passthrough_copies_unknown_fields() {
    let msg = emit_with(MetadataMode::Passthrough);
    assert_eq!(msg["x_trace"], json!("t1"));
    assert!(msg.get(METADATA_FIELD).is_none());
}

#[test]
fn preserve_keeps_the_bag() {
    let msg = emit_with(MetadataMode::Preserve);
    assert_eq!(msg[METADATA_FIELD], json!({"openai": {"x_trace": "t1"}}));
    assert!(msg.get("x_trace").is_none());
}

#[test]
fn preserved_bag_survives_a_second_hop() {
    let first = translate(tagged_openai(), &to("gemini").from_format("openai").metadata_mode(MetadataMode::Preserve))
        .unwrap()
        .into_output()
        .unwrap();
    let opts = to("openai").from_format("gemini").metadata_mode(MetadataMode::Passthrough);
    let second = translate(first.messages, &opts).unwrap().into_output().unwrap();
    assert_eq!(second.messages[0]["x_trace"], json!("t1"));
}

#[test]
fn translator_default_mode_applies_when_call_sets_none() {
    let translator = Translator::new(default_registry()).with_metadata_mode(MetadataMode::Preserve);
    let out = translator
        .translate(&RawInput::from(tagged_openai()), &to("anthropic").from_format("openai"))
        .unwrap()
        .into_output()
        .unwrap();
    assert!(out.messages[0].get(METADATA_FIELD).is_some());

    let out = translator
        .translate(
            &RawInput::from(tagged_openai()),
            &to("anthropic").from_format("openai").metadata_mode(MetadataMode::Strip),
        )
        .unwrap()
        .into_output()
        .unwrap();
    assert!(out.messages[0].get(METADATA_FIELD).is_none());
}

// ── Errors ──────────────────────────────────────────────────────────────

#[test]
fn schema_mismatch_carries_context() {
    let raw = vec![json!({"role": "narrator", "content": "Once"})];
    let err = translate(raw, &TranslateOptions::new().from_format("anthropic")).unwrap_err();
    assert_eq!(err.code, ErrorCode::SchemaMismatch);
    assert_eq!(err.code.category(), ErrorCategory::Schema);
    assert_eq!(err.context["provider"], json!("anthropic"));
    assert!(err.to_string().contains("anthropic"));
}

#[test]
fn canonical_part_without_content_is_a_schema_mismatch() {
    let raw = vec![json!({"role": "user", "parts": [{"type": "text"}]})];
    let err = translate(raw.clone(), &TranslateOptions::new().from_format("canonical")).unwrap_err();
    assert_eq!(err.code, ErrorCode::SchemaMismatch);
    assert_eq!(err.context["provider"], json!("canonical"));

    let translator = Translator::new(default_registry());
    assert_ne!(translator.infer(&RawInput::from(raw), None).provider, "canonical");
}

#[test]
fn target_errors_win_over_source_errors() {
    let raw = vec![json!({"role": "narrator"})];
    let opts = TranslateOptions::new().from_format("anthropic").to_format("openai_responses");
    let err = translate(raw, &opts).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsupportedTarget);
}

#[test]
fn error_serialises_with_stable_code() {
    let err = translate("Hi", &to("cohere")).unwrap_err();
    let v = serde_json::to_value(ConvoErrorDto::from(&err)).unwrap();
    assert_eq!(v["code"], json!("UNKNOWN_PROVIDER"));
}

// ── Serialization ───────────────────────────────────────────────────────

#[test]
fn provider_result_serialises_as_payload() {
    let out = translate(vec![canonical("system", "S"), canonical("user", "Hi")], &to("gemini")).unwrap();
    assert!(matches!(out, Translation::Provider { format: "gemini", .. }));
    insta::assert_json_snapshot!(out.to_value().unwrap(), @r#"
    {
      "messages": [
        {
          "role": "user",
          "parts": [
            {
              "text": "Hi"
            }
          ]
        }
      ],
      "system": {
        "parts": [
          {
            "text": "S"
          }
        ]
      }
    }
    "#);
}

// ── Logging ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;
    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

#[test]
fn translation_is_logged() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        let raw = vec![
            json!({"role": "system", "content": "Be brief"}),
            json!({"role": "user", "content": "Hi"}),
        ];
        translate(raw, &to("gemini")).unwrap();
    });
    let text = logs.contents();
    assert!(text.contains("translated"), "{text}");
    assert!(text.contains("from=\"openai\"") || text.contains("from=openai"), "{text}");
    assert!(text.contains("mode=strip"), "{text}");
}

// ── Properties ──────────────────────────────────────────────────────────

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,24}"
}

fn arb_role() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(role::USER), Just(role::ASSISTANT)]
}

proptest! {
    #[test]
    fn text_conversations_survive_every_target(
        turns in prop::collection::vec((arb_role(), arb_text()), 1..6),
        target in prop_oneof![Just("canonical"), Just("openai"), Just("anthropic"), Just("gemini")],
    ) {
        let raw: Vec<Value> = turns.iter().map(|(r, t)| canonical(r, t)).collect();
        let out = translate(raw, &to(target)).unwrap();
        prop_assert_eq!(out.len(), turns.len());

        if target == "canonical" {
            return Ok(());
        }
        let output = out.into_output().unwrap();
        let back = translate(output.messages, &TranslateOptions::new().from_format(target)).unwrap();
        let conv = back.into_conversation().unwrap();
        for (msg, (r, t)) in conv.messages.iter().zip(&turns) {
            prop_assert_eq!(msg.role.as_str(), *r);
            prop_assert_eq!(msg.text_content(), t.clone());
        }
    }

    #[test]
    fn arbitrary_json_arrays_never_panic(
        items in prop::collection::vec(
            prop_oneof![
                Just(json!(null)),
                any::<i64>().prop_map(|n| json!(n)),
                arb_text().prop_map(|s| json!({"role": "user", "content": s})),
                arb_text().prop_map(|s| json!({"text": s})),
            ],
            0..5,
        )
    ) {
        for target in ["openai", "canonical"] {
            if let Ok(out) = translate(items.clone(), &to(target)) {
                prop_assert!(out.to_value().is_ok());
            }
        }
    }
}
