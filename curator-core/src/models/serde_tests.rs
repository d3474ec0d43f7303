//! Serde serialization/deserialization tests for core types.
//!
//! These tests pin the JSON shapes that cross process boundaries: queue
//! messages, persisted tokens and persisted members.

use chrono::{Duration, TimeZone, Utc};

use crate::{
    Bound, CurationSelectors, FetchPublicationMessage, Member, MemberAvailability,
    PublicationId, PublicationKind, PublishersList, Token, TokenKind, Whisperer,
};

// ============================================================================
// FetchPublicationMessage Serde Tests
// ============================================================================

#[test]
fn test_message_minimal_json() {
    let message: FetchPublicationMessage =
        serde_json::from_str(r#"{"screen_name":"pierrec"}"#).unwrap();

    assert_eq!(message.screen_name, "pierrec");
    assert_eq!(message.list_id, None);
    assert!(!message.fetch_likes);
    assert!(!message.include_owner);
    assert!(!message.ignore_whisperers);
}

#[test]
fn test_message_full_json_roundtrip() {
    let before = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
    let selectors = CurationSelectors::new("pierrec")
        .with_list(42)
        .with_before(before)
        .with_cursor("1234")
        .with_likes(true)
        .with_include_owner(true);

    let json = serde_json::to_string(&FetchPublicationMessage::from(&selectors)).unwrap();
    assert!(json.contains(r#""list_id":42"#));
    assert!(json.contains(r#""before":"2021-03-01T12:00:00Z""#));

    let parsed: FetchPublicationMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(CurationSelectors::from(parsed), selectors);
}

#[test]
fn test_message_omits_absent_options() {
    let message = FetchPublicationMessage::from(&CurationSelectors::new("pierrec"));
    let json = serde_json::to_string(&message).unwrap();
    assert!(!json.contains("list_id"));
    assert!(!json.contains("before"));
    assert!(!json.contains("cursor"));
}

// ============================================================================
// Token Serde Tests
// ============================================================================

#[test]
fn test_token_roundtrip_preserves_freeze() {
    let until = Utc::now() + Duration::minutes(15);
    let token = Token::new("1234567890", "secret")
        .with_consumer("key", "consumer-secret")
        .with_frozen_until(Some(until));

    let json = serde_json::to_string(&token).unwrap();
    let parsed: Token = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed, token);
    assert!(parsed.is_frozen());
}

#[test]
fn test_token_defaults_kind_to_user() {
    let json = r#"{"access_token":"a","access_token_secret":"s","created_at":"2020-01-01T00:00:00Z","updated_at":"2020-01-01T00:00:00Z"}"#;
    let token: Token = serde_json::from_str(json).unwrap();
    assert_eq!(token.kind, TokenKind::User);
    assert_eq!(token.frozen_until, None);
}

#[test]
fn test_token_kind_lowercase() {
    assert_eq!(
        serde_json::to_string(&TokenKind::Application).unwrap(),
        r#""application""#
    );
}

// ============================================================================
// Member Serde Tests
// ============================================================================

#[test]
fn test_member_roundtrip_with_extremum() {
    let mut member = Member::placeholder("pierrec");
    member
        .extremum
        .window_mut(PublicationKind::Statuses)
        .widen(Bound::Min, &PublicationId::from(100));
    member
        .extremum
        .window_mut(PublicationKind::Likes)
        .widen(Bound::Max, &PublicationId::parse("1405555555555555555").unwrap());
    member.availability = MemberAvailability::Protected;

    let json = serde_json::to_string(&member).unwrap();
    assert!(json.contains(r#""min":"100""#));
    assert!(json.contains(r#""availability":"protected""#));

    let parsed: Member = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, member);
}

#[test]
fn test_member_minimal_json() {
    let member: Member = serde_json::from_str(r#"{"screen_name":"pierrec"}"#).unwrap();
    assert!(member.availability.is_available());
    assert!(!member.placeholder);
    assert_eq!(member.extremum.statuses.min, None);
}

#[test]
fn test_whisperer_and_list_roundtrip() {
    let whisperer = Whisperer::new("quiet", 10, 10);
    let json = serde_json::to_string(&whisperer).unwrap();
    assert_eq!(serde_json::from_str::<Whisperer>(&json).unwrap(), whisperer);

    let list = PublishersList::new(1, "press")
        .with_owner("owner")
        .with_members(["a", "b"]);
    let json = serde_json::to_string(&list).unwrap();
    assert_eq!(serde_json::from_str::<PublishersList>(&json).unwrap(), list);
}
