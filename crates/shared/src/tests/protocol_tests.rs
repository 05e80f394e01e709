use super::*;

#[test]
fn parses_open_form_with_field_specs() {
    let event = parse_inbound(
        r#"{"type":"open_form","payload":{"fields":[{"name":"email","label":"Email","type":"email"}]}}"#,
    )
    .expect("open_form");

    assert_eq!(
        event,
        InboundEvent::OpenForm {
            fields: vec![FieldSpec::new("email", "Email", "email")],
        }
    );
}

#[test]
fn parses_update_field() {
    let event = parse_inbound(
        r#"{"type":"update_field","payload":{"field_name":"email","field_value":"a@b.com"}}"#,
    )
    .expect("update_field");

    assert_eq!(event, InboundEvent::update_field("email", "a@b.com"));
}

#[test]
fn submit_form_accepts_empty_null_or_missing_payload() {
    for text in [
        r#"{"type":"submit_form","payload":{}}"#,
        r#"{"type":"submit_form","payload":null}"#,
        r#"{"type":"submit_form"}"#,
    ] {
        let event = parse_inbound(text).expect(text);
        assert_eq!(event, InboundEvent::SubmitForm {});
    }
}

#[test]
fn unknown_type_is_forward_compatible() {
    let err = parse_inbound(r#"{"type":"bot_ready","payload":{"version":"1.0"}}"#)
        .expect_err("unknown type");

    assert!(matches!(&err, MessageError::UnknownType(kind) if kind == "bot_ready"));
    assert!(err.is_forward_compatible());
}

#[test]
fn missing_payload_fields_are_malformed() {
    let err = parse_inbound(r#"{"type":"update_field","payload":{"field_name":"email"}}"#)
        .expect_err("missing field_value");

    assert!(matches!(&err, MessageError::InvalidPayload { kind, .. } if kind == UPDATE_FIELD));
    assert!(!err.is_forward_compatible());
}

#[test]
fn non_envelope_text_is_rejected() {
    assert!(matches!(
        parse_inbound("not json"),
        Err(MessageError::InvalidEnvelope(_))
    ));
    assert!(matches!(
        parse_inbound(r#"{"payload":{}}"#),
        Err(MessageError::InvalidEnvelope(_))
    ));
}

#[test]
fn serializes_with_type_and_payload_keys() {
    let value: serde_json::Value =
        serde_json::from_str(&InboundEvent::SubmitForm {}.to_text().expect("json")).expect("value");
    assert_eq!(value, serde_json::json!({ "type": "submit_form", "payload": {} }));

    let open = InboundEvent::OpenForm {
        fields: vec![FieldSpec::new("phone_number", "Phone number", "tel")],
    };
    let reparsed = parse_inbound(&open.to_text().expect("json")).expect("reparse");
    assert_eq!(reparsed.kind(), OPEN_FORM);
    assert_eq!(reparsed, open);
}
