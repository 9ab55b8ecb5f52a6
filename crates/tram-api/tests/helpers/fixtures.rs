use serde_json::{json, Value};

pub const TECHNIQUES: &[(&str, &str)] = &[
    ("T1003", "OS Credential Dumping"),
    ("T1059", "Command and Scripting Interpreter"),
    ("T1566", "Phishing"),
];

/// Minimal bytes that start like a PDF; nothing parses them.
pub fn pdf_bytes() -> Vec<u8> {
    let mut data = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec();
    data.extend_from_slice(&[0, 1, 2, 3, 255, 254]);
    data.extend_from_slice(b"\n%%EOF\n");
    data
}

pub fn acme_report() -> Value {
    json!({
        "name": "Acme Report",
        "text": "The actor sent spearphishing emails. It then dumped credentials.",
        "ml_model": "logreg",
        "sentences": [
            {
                "text": "The actor sent spearphishing emails.",
                "order": 0,
                "disposition": "accept",
                "mappings": [
                    {"attack_id": "T1566", "confidence": 97.5, "source": "analyst"}
                ]
            },
            {
                "text": "It then dumped credentials.",
                "order": 1,
                "disposition": null,
                "mappings": [
                    {"attack_id": "T1003", "confidence": 88},
                    {"attack_id": "T1059", "confidence": 12.25}
                ]
            }
        ]
    })
}
