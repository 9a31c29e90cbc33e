//! Dispatcher and session behavior against an in-memory document store.

use quill_core::{
    DispatchError, DispatchOutcome, DocumentSession, DocumentStore, MemoryStore,
    RecordingNotifier, RestoreError,
};
use quill_doc::{Document, DocumentStatus};
use quill_wire::Instruction;
use serde_json::json;

fn invoice_document() -> Document {
    Document::draft(
        json!({
            "clientName": "Acme",
            "paid": false,
            "items": [
                {"qty": 2, "unitPrice": 10, "amount": 20},
                {"qty": 1, "unitPrice": 5, "amount": 5},
            ],
            "totalAmount": 25,
        })
        .as_object()
        .cloned()
        .unwrap(),
    )
}

fn session_with(document: Document) -> DocumentSession<MemoryStore, RecordingNotifier> {
    DocumentSession::new(
        MemoryStore::with_active(document),
        RecordingNotifier::default(),
    )
}

fn update(field_path: &str, new_value: &str) -> Instruction {
    Instruction {
        id: "call-0".to_string(),
        name: "update_document_field".to_string(),
        arguments: json!({"field_path": field_path, "new_value": new_value})
            .as_object()
            .cloned()
            .unwrap(),
    }
}

fn generate(template_key: &str, preset: &str) -> Instruction {
    Instruction {
        id: "call-0".to_string(),
        name: "generate_document".to_string(),
        arguments: json!({"template_key": template_key, "preset": preset})
            .as_object()
            .cloned()
            .unwrap(),
    }
}

#[test]
fn update_applies_patch_and_reports_before_value() {
    let mut session = session_with(invoice_document());

    let results = session.dispatch(&[update("clientName", "Globex")]);

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].outcome,
        Ok(DispatchOutcome::FieldUpdated {
            before_value: Some("Acme".to_string()),
        })
    );
    let document = session.store().active().unwrap();
    assert_eq!(document.fields.get("clientName"), Some(&json!("Globex")));
}

#[test]
fn update_snapshots_prior_state() {
    let mut session = session_with(invoice_document());
    let id = session.store().active().unwrap().id;

    session.dispatch(&[update("clientName", "Globex")]);

    let versions = session.versions().versions(id);
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version, "1.0");
    assert_eq!(versions[0].fields.get("clientName"), Some(&json!("Acme")));
}

#[test]
fn item_updates_in_one_batch_apply_in_order() {
    let mut session = session_with(invoice_document());

    let results = session.dispatch(&[
        update("items[0].qty", "5"),
        update("items[1].unitPrice", "8"),
    ]);
    assert!(results.iter().all(quill_core::DispatchResult::is_success));

    let fields = &session.store().active().unwrap().fields;
    assert_eq!(
        fields.get("items"),
        Some(&json!([
            {"qty": 5, "unitPrice": 10, "amount": 50},
            {"qty": 1, "unitPrice": 8, "amount": 8},
        ]))
    );
    // The second patch read the list the first one had just rewritten.
    assert_eq!(fields.get("totalAmount"), Some(&json!(58)));
}

#[test]
fn broadcast_update_touches_every_item() {
    let mut session = session_with(invoice_document());

    session.dispatch(&[update("all_items.qty", "3")]);

    let fields = &session.store().active().unwrap().fields;
    assert_eq!(
        fields.get("items"),
        Some(&json!([
            {"qty": 3, "unitPrice": 10, "amount": 30},
            {"qty": 3, "unitPrice": 5, "amount": 15},
        ]))
    );
    assert_eq!(fields.get("totalAmount"), Some(&json!(45)));
}

#[test]
fn boolean_field_converts_by_existing_type() {
    let mut session = session_with(invoice_document());
    session.dispatch(&[update("paid", "true")]);
    assert_eq!(
        session.store().active().unwrap().fields.get("paid"),
        Some(&json!(true))
    );
}

#[test]
fn no_active_document_is_rejected() {
    let mut session = DocumentSession::new(MemoryStore::new(), RecordingNotifier::default());

    let results = session.dispatch(&[update("clientName", "Globex")]);

    assert_eq!(results[0].outcome, Err(DispatchError::NoActiveDocument));
}

#[test]
fn final_document_is_left_byte_for_byte_unchanged() {
    let mut document = invoice_document();
    document.status = DocumentStatus::Final;
    let id = document.id;
    let before = serde_json::to_string(&document.fields).unwrap();
    let mut session = session_with(document);

    let results = session.dispatch(&[update("clientName", "Globex")]);

    assert_eq!(results[0].outcome, Err(DispatchError::DocumentLocked));
    let after = serde_json::to_string(&session.store().active().unwrap().fields).unwrap();
    assert_eq!(before, after);
    assert!(session.versions().versions(id).is_empty());
}

#[test]
fn missing_argument_is_rejected_without_aborting_the_batch() {
    let mut session = session_with(invoice_document());
    let mut incomplete = update("clientName", "ignored");
    incomplete.arguments.remove("new_value");

    let results = session.dispatch(&[incomplete, update("clientName", "Globex")]);

    assert_eq!(
        results[0].outcome,
        Err(DispatchError::MissingArgument("new_value"))
    );
    assert!(results[1].is_success());
    assert_eq!(
        session.store().active().unwrap().fields.get("clientName"),
        Some(&json!("Globex"))
    );
}

#[test]
fn unknown_instruction_is_rejected() {
    let mut session = session_with(invoice_document());
    let unknown = Instruction {
        id: "call-9".to_string(),
        name: "delete_document".to_string(),
        arguments: serde_json::Map::new(),
    };

    let results = session.dispatch(&[unknown]);

    assert_eq!(
        results[0].outcome,
        Err(DispatchError::UnknownInstruction("delete_document".to_string()))
    );
}

#[test]
fn generate_document_creates_and_activates() {
    let mut session = DocumentSession::new(
        MemoryStore::new().with_templates(&["invoice"]),
        RecordingNotifier::default(),
    );

    let results = session.dispatch(&[generate("invoice", "standard")]);

    let Ok(DispatchOutcome::DocumentCreated { document_id }) = &results[0].outcome else {
        panic!("expected creation, got {:?}", results[0].outcome);
    };
    let active = session.store().active().unwrap();
    assert_eq!(active.id, *document_id);
    assert_eq!(active.fields.get("templateKey"), Some(&json!("invoice")));
    assert_eq!(session.store().created, vec![("invoice".to_string(), "standard".to_string())]);
}

#[test]
fn generate_with_unknown_template_fails() {
    let mut session = DocumentSession::new(
        MemoryStore::new().with_templates(&["invoice"]),
        RecordingNotifier::default(),
    );

    let results = session.dispatch(&[generate("quote", "standard")]);

    assert!(matches!(
        results[0].outcome,
        Err(DispatchError::TemplateFailed(_))
    ));
    assert!(session.store().active().is_none());
}

#[test]
fn generate_with_missing_preset_fails() {
    let mut session = DocumentSession::new(MemoryStore::new(), RecordingNotifier::default());
    let mut incomplete = generate("invoice", "ignored");
    incomplete.arguments.remove("preset");

    let results = session.dispatch(&[incomplete]);

    assert_eq!(
        results[0].outcome,
        Err(DispatchError::MissingArgument("preset"))
    );
}

#[test]
fn every_instruction_produces_a_notification() {
    let mut session = session_with(invoice_document());
    let mut incomplete = update("clientName", "ignored");
    incomplete.arguments.remove("new_value");

    session.dispatch(&[update("clientName", "Globex"), incomplete]);

    // Both the success and the failure surfaced as messages.
    let messages = &session.notifier().messages;
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("clientName"));
    assert!(messages[1].contains("missing required argument"));
}

#[test]
fn restore_round_trip_through_session() {
    let mut session = session_with(invoice_document());
    let id = session.store().active().unwrap().id;

    session.dispatch(&[update("clientName", "Globex")]);
    let snapshot_id = session.versions().versions(id)[0].id;

    session.restore_version(snapshot_id).unwrap();

    assert_eq!(
        session.store().active().unwrap().fields.get("clientName"),
        Some(&json!("Acme"))
    );
    // Original snapshot plus the pre-restore backup.
    assert_eq!(session.versions().versions(id).len(), 2);
}

#[test]
fn restore_on_final_document_is_rejected() {
    let mut session = session_with(invoice_document());
    let snapshot = session.snapshot_active("manual").unwrap();

    session.store_mut().active_document().unwrap().status = DocumentStatus::Final;

    assert_eq!(
        session.restore_version(snapshot.id),
        Err(RestoreError::DocumentLocked)
    );
}
