use chrono::{Duration, TimeZone, Utc};
use serde_json::{Map, json};
use types::{
    ChatReply, ChatRequest, Emotion, FeedbackType, ResponseSource, RuntimeError, SessionRecord,
    SessionStatus, StoreError, Urgency, ValidationError, clamp_unit, cosine_similarity,
    format_timestamp, init_tracing, parse_timestamp,
};

#[test]
fn chat_wire_types_use_snake_case_labels() {
    let mut slots = Map::new();
    slots.insert("category".to_owned(), json!("greeting"));
    let reply = ChatReply {
        session_id: "s-1".to_owned(),
        reply_text: "Hi there!".to_owned(),
        intent: ResponseSource::Casual,
        confidence: 0.9,
        slots,
        need_human: false,
        turn_count: 1,
        emotion: Emotion::Neutral,
        urgency: Urgency::Low,
    };

    let value = serde_json::to_value(&reply).expect("reply should serialize");
    assert_eq!(value["intent"], "casual");
    assert_eq!(value["emotion"], "neutral");
    assert_eq!(value["urgency"], "low");
    assert_eq!(value["slots"]["category"], "greeting");

    let request: ChatRequest =
        serde_json::from_value(json!({ "user_text": "hello" })).expect("request should parse");
    assert_eq!(request.session_id, None);
    assert_eq!(
        serde_json::to_value(FeedbackType::NotHelpful).expect("feedback type"),
        json!("not_helpful")
    );
}

#[test]
fn labels_parse_from_their_stored_form() {
    for status in [
        SessionStatus::Active,
        SessionStatus::Expired,
        SessionStatus::Closed,
    ] {
        assert_eq!(status.as_str().parse::<SessionStatus>(), Ok(status));
    }
    assert_eq!("high".parse::<Urgency>(), Ok(Urgency::High));
    assert_eq!("negative".parse::<Emotion>(), Ok(Emotion::Negative));
    assert!("angry".parse::<Emotion>().is_err());
}

#[test]
fn session_expiry_is_strictly_after_ttl() {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let record = SessionRecord::new("s-1", start);
    let ttl = Duration::minutes(30);
    assert!(!record.is_expired_at(start + ttl, ttl));
    assert!(record.is_expired_at(start + ttl + Duration::seconds(1), ttl));
}

#[test]
fn timestamps_round_trip_with_microsecond_precision() {
    let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        + Duration::microseconds(123_456);
    let formatted = format_timestamp(instant);
    assert_eq!(formatted, "2024-05-01T12:00:00.123456Z");
    assert_eq!(parse_timestamp(&formatted), Ok(instant));
}

#[test]
fn clamp_unit_bounds_scores() {
    assert_eq!(clamp_unit(-0.2), 0.0);
    assert_eq!(clamp_unit(1.5), 1.0);
    assert_eq!(clamp_unit(0.42), 0.42);
    assert_eq!(clamp_unit(f64::NAN), 0.0);
}

#[test]
fn cosine_similarity_handles_zero_vectors() {
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-9);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
}

#[test]
fn runtime_error_composes_store_and_validation_errors() {
    let from_store: RuntimeError = StoreError::Query {
        message: "disk I/O error".to_owned(),
    }
    .into();
    assert!(matches!(from_store, RuntimeError::Store(_)));

    let from_validation: RuntimeError = ValidationError::EmptyInput.into();
    assert!(matches!(
        from_validation,
        RuntimeError::Validation(ValidationError::EmptyInput)
    ));
}

#[test]
fn tracing_subscriber_initializes_and_emits() {
    init_tracing();
    init_tracing();
    let span = tracing::info_span!("helpdesk_tracing_smoke");
    let _guard = span.enter();
    tracing::info!("helpdesk tracing smoke");
}
