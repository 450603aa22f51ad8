//! Integration tests for header decoding, MIME parsing and categorization
//! against the `.eml` fixtures.

use std::path::{Path, PathBuf};

use pecbox::categorize::{categorize, Categorizer, Field, Rule};
use pecbox::error::PecError;
use pecbox::model::category::Category;
use pecbox::parser::header::decode_header;
use pecbox::parser::mime::{attachment_files, parse_message, ParseLimits};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn parse_fixture(name: &str) -> pecbox::parser::mime::ParsedMessage {
    let raw = std::fs::read(fixture(name)).unwrap();
    parse_message(&raw, &ParseLimits::default()).unwrap()
}

// ─── Header decoding ────────────────────────────────────────────────

#[test]
fn test_decode_none_is_empty() {
    assert_eq!(decode_header(None), "");
}

#[test]
fn test_decode_never_fails_on_malformed_words() {
    let inputs = [
        "=?",
        "=?UTF-8?",
        "=?UTF-8?B?",
        "=?UTF-8?B?!!!notbase64?=",
        "=?UTF-8?X?abc?=",
        "=?no-such-charset?Q?caf=E9?=",
        "=?UTF-8?Q?=ZZ=?=",
        "=??Q?x?=",
        "\u{0}\u{1}=?utf-8?q?",
    ];
    for input in inputs {
        // Must return, whatever it returns.
        let _ = decode_header(Some(input));
    }
}

#[test]
fn test_decode_mixed_charsets() {
    let decoded = decode_header(Some(
        "=?UTF-8?B?Q2Fmw6k=?= =?ISO-8859-1?Q?_e_t=E8?= finito",
    ));
    assert_eq!(decoded, "Café e tè finito");
}

// ─── Message parsing ────────────────────────────────────────────────

#[test]
fn test_invoice_fixture() {
    let parsed = parse_fixture("01_fattura.eml");
    assert_eq!(parsed.subject, "Fattura n. 2025/001");
    assert_eq!(parsed.sender, "Fornitore SRL <fatture@fornitore.example.it>");
    assert_eq!(parsed.date, "Mon, 3 Mar 2025 09:15:00 +0100");
    assert_eq!(parsed.attachments, vec!["fattura.pdf"]);
}

#[test]
fn test_certified_envelope_includes_nested_attachments() {
    let parsed = parse_fixture("02_pec_protocollo.eml");
    assert_eq!(
        parsed.subject,
        "POSTA CERTIFICATA: Prot. 1234 \u{2013} Richiesta documenti"
    );
    assert_eq!(
        parsed.attachments,
        vec!["daticert.xml", "postacert.eml", "richiesta.pdf"]
    );
}

#[test]
fn test_latin1_subject_non_multipart() {
    let parsed = parse_fixture("03_urgente.eml");
    assert_eq!(parsed.subject, "Comunicazione importante: scadenza lunedì");
    assert!(parsed.attachments.is_empty());
}

#[test]
fn test_inline_parts_are_not_attachments() {
    let parsed = parse_fixture("05_newsletter.eml");
    assert_eq!(parsed.attachments, vec!["doc.pdf"]);
}

#[test]
fn test_blank_fixture_is_parse_error() {
    let raw = std::fs::read(fixture("07_vuoto.eml")).unwrap();
    let err = parse_message(&raw, &ParseLimits::default()).unwrap_err();
    assert!(matches!(err, PecError::MessageParse { .. }));
}

#[test]
fn test_mbox_separator_and_bom_are_skipped() {
    let mut raw = b"\xEF\xBB\xBFFrom MAILER-DAEMON Mon Mar  3 09:15:00 2025\n".to_vec();
    raw.extend(std::fs::read(fixture("01_fattura.eml")).unwrap());
    let parsed = parse_message(&raw, &ParseLimits::default()).unwrap();
    assert_eq!(parsed.subject, "Fattura n. 2025/001");
    assert_eq!(parsed.attachments.len(), 1);
}

#[test]
fn test_attachment_payloads_match_names() {
    let raw = std::fs::read(fixture("02_pec_protocollo.eml")).unwrap();
    let limits = ParseLimits::default();
    let names = parse_message(&raw, &limits).unwrap().attachments;
    let files = attachment_files(&raw, &limits).unwrap();

    let file_names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(file_names, names);
    assert_eq!(files[2].data, b"%PDF-1.4 richiesta");
    assert!(String::from_utf8_lossy(&files[1].data).contains("Prot. 1234 - Richiesta documenti"));
}

#[test]
fn test_tight_depth_limit_rejects_nested_envelope() {
    let raw = std::fs::read(fixture("02_pec_protocollo.eml")).unwrap();
    let limits = ParseLimits {
        max_depth: 1,
        ..ParseLimits::default()
    };
    assert!(matches!(
        parse_message(&raw, &limits),
        Err(PecError::MessageParse { .. })
    ));
}

// ─── Categorization ─────────────────────────────────────────────────

#[test]
fn test_category_priority() {
    assert_eq!(categorize("Fattura urgente", ""), Category::Invoices);
    assert_eq!(categorize("", "mittente@pec.it"), Category::OfficialCertifiedMail);
    assert_eq!(categorize("newsletter", "random@mail.com"), Category::General);
    assert_eq!(categorize("NOTIFICA esito", "x@y.it"), Category::Notifications);
}

#[test]
fn test_loose_base64_subject_still_categorized() {
    let subject = decode_header(Some("=?UTF-8?B?RmF0dHVyYR==?= n. 12"));
    assert_eq!(subject, "Fattura n. 12");
    assert_eq!(categorize(&subject, ""), Category::Invoices);
}

#[test]
fn test_fixture_categories() {
    let expected = [
        ("01_fattura.eml", Category::Invoices),
        ("02_pec_protocollo.eml", Category::Protocol),
        ("03_urgente.eml", Category::Urgent),
        ("04_notifica.eml", Category::Notifications),
        ("05_newsletter.eml", Category::General),
        ("06_legalmail.eml", Category::OfficialCertifiedMail),
    ];
    for (name, category) in expected {
        let parsed = parse_fixture(name);
        assert_eq!(
            categorize(&parsed.subject, &parsed.sender),
            category,
            "{name}: subject={:?} sender={:?}",
            parsed.subject,
            parsed.sender
        );
    }
}

#[test]
fn test_replace_defaults_keeps_general_fallback() {
    let categorizer = Categorizer::with_rules(vec![Rule::new(
        Category::Urgent,
        Field::Sender,
        &["tribunale"],
    )]);
    assert_eq!(
        categorizer.categorize("Fattura", "noreply@tribunale.example.it"),
        Category::Urgent
    );
    assert_eq!(categorizer.categorize("Fattura", "a@b.it"), Category::General);
}
