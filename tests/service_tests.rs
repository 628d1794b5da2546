use std::time::Duration;

use undertone::config::Config;
use undertone::kernel::context::ContextSummary;
use undertone::kernel::prefs::{Preferences, VocalsGender};
use undertone::services::vision::extract_json_block;
use undertone::services::MusicService;

fn test_config() -> Config {
    Config {
        anthropic_api_key: "test-key".to_string(),
        anthropic_model: "test-model".to_string(),
        music_api_key: "test-key".to_string(),
        music_base_url: "http://localhost:0".to_string(),
        sample_interval: Duration::from_millis(2000),
    }
}

fn context() -> ContextSummary {
    ContextSummary {
        tag: "vscode-coding".to_string(),
        details: "Editing Rust source in an IDE.".to_string(),
    }
}

#[test]
fn json_block_is_extracted_from_fenced_output() {
    let raw = "```json\n{\"tag\": \"vscode-coding\", \"details\": \"Editing.\"}\n```";
    let block = extract_json_block(raw).unwrap();
    let parsed: ContextSummary = serde_json::from_str(&block).unwrap();
    assert_eq!(parsed.tag, "vscode-coding");
}

#[test]
fn json_block_is_extracted_from_prose() {
    let raw = "Sure! Here is the classification: {\"tag\": \"t\", \"details\": \"d\"} Hope that helps.";
    assert_eq!(
        extract_json_block(raw).unwrap(),
        "{\"tag\": \"t\", \"details\": \"d\"}"
    );
}

#[test]
fn no_json_block_yields_none() {
    assert!(extract_json_block("no structured data here").is_none());
}

#[test]
fn instrumental_overrides_vocals_preference() {
    let service = MusicService::new(&test_config());
    let mut prefs = Preferences::default();
    prefs.instrumental = true;
    prefs.vocals_gender = Some(VocalsGender::Female);

    let request = service.build_request(&context(), &prefs);

    assert!(request.make_instrumental);
    assert!(request.tags.contains("instrumental"));
    assert!(
        !request.tags.contains("vocals"),
        "vocals preference is ignored for instrumental tracks"
    );
}

#[test]
fn vocals_preference_lands_in_tags_when_not_instrumental() {
    let service = MusicService::new(&test_config());
    let mut prefs = Preferences::default();
    prefs.instrumental = false;
    prefs.vocals_gender = Some(VocalsGender::Male);

    let request = service.build_request(&context(), &prefs);

    assert!(!request.make_instrumental);
    assert!(request.tags.contains("male vocals"));
}

#[test]
fn pinned_genres_lead_the_tags() {
    let service = MusicService::new(&test_config());
    let mut prefs = Preferences::default();
    prefs.genres.insert("jazz".to_string());

    let request = service.build_request(&context(), &prefs);

    assert!(request.tags.starts_with("jazz"));
}

#[test]
fn unpinned_genre_rotates_away_from_recent() {
    let service = MusicService::new(&test_config());
    let prefs = Preferences::default();

    let first = service.build_request(&context(), &prefs);
    let first_genre = first.tags.split(',').next().unwrap().trim().to_string();
    service.note_genre(&first.tags);

    let second = service.build_request(&context(), &prefs);
    let second_genre = second.tags.split(',').next().unwrap().trim().to_string();

    assert_ne!(first_genre, second_genre, "consecutive unpinned tracks vary");
}

#[test]
fn topic_mentions_the_context() {
    let service = MusicService::new(&test_config());
    let request = service.build_request(&context(), &Preferences::default());
    assert!(request.topic.contains("vscode-coding"));
}

#[test]
fn silly_mode_shifts_the_register() {
    let service = MusicService::new(&test_config());
    let mut prefs = Preferences::default();
    prefs.silly_mode = true;

    let request = service.build_request(&context(), &prefs);
    assert!(request.topic.contains("playful"));
}

#[test]
fn tags_respect_the_backend_limit() {
    let service = MusicService::new(&test_config());
    let mut prefs = Preferences::default();
    for i in 0..40 {
        prefs.genres.insert(format!("extremely-long-genre-name-{i}"));
    }

    let request = service.build_request(&context(), &prefs);
    assert!(request.tags.chars().count() <= 100);
}
