use super::*;

#[test]
fn test_defaults_match_documented_values() {
    let cfg = Config::default();
    assert_eq!(cfg.buffer.debounce_secs, 15);
    assert_eq!(cfg.media.audio_chunk_threshold_secs, 59);
    assert_eq!(cfg.media.audio_chunk_secs, 50);
    assert_eq!(cfg.classifier.confidence_threshold, 70);
    assert_eq!(cfg.classifier.max_retries, 2);
    assert_eq!(cfg.memory.dedup_window_secs, 300);
    assert_eq!(cfg.funnel.early_history_limit, 3);
    assert_eq!(cfg.classifier.cascade.len(), 3);
}

#[test]
fn test_parse_partial_toml() {
    let toml = r#"
        [buffer]
        debounce_secs = 5

        [classifier]
        max_retries = 1

        [[classifier.cascade]]
        provider = "anthropic"
        model = "claude-3-5-haiku-latest"
    "#;
    let cfg: Config = toml::from_str(toml).unwrap();
    assert_eq!(cfg.buffer.debounce_secs, 5);
    assert_eq!(cfg.classifier.max_retries, 1);
    assert_eq!(cfg.classifier.cascade.len(), 1);
    assert_eq!(cfg.classifier.cascade[0].provider, "anthropic");
    // Untouched sections keep their defaults.
    assert_eq!(cfg.memory.dedup_window_secs, 300);
    assert_eq!(cfg.classifier.confidence_threshold, 70);
}

#[test]
fn test_empty_toml_is_all_defaults() {
    let cfg: Config = toml::from_str("").unwrap();
    assert_eq!(cfg.forma.name, "forma");
    assert!(cfg.channel.webhook.enabled);
    assert_eq!(cfg.channel.webhook.port, 8090);
}

#[test]
fn test_shellexpand() {
    assert_eq!(shellexpand("/tmp/x"), "/tmp/x");
    if std::env::var_os("HOME").is_some() {
        assert!(!shellexpand("~/data").starts_with('~'));
    }
}

#[test]
fn test_prompts_wordings_are_distinct() {
    let prompts = Prompts::default();
    // Calorie tracking must read differently from the food-analysis ask.
    assert_ne!(prompts.ask_food_photo, prompts.ask_calorie_photo);
    assert!(!prompts.onboarding_trigger.is_empty());
}
