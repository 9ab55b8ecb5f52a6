//! DOCX rendering
//!
//! Builds a minimal WordprocessingML package in memory: a title, a summary
//! table of mapped techniques and the report's sentences with their mappings.
//! Entry order and timestamps are fixed, so the same export always renders to
//! the same bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Write};

use tram_core::models::AttackObject;
use tram_core::AppError;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::export::ReportExport;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:pPr><w:spacing w:after="120"/></w:pPr><w:rPr><w:sz w:val="22"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:spacing w:after="240"/></w:pPr><w:rPr><w:b/><w:sz w:val="48"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/><w:basedOn w:val="Normal"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr></w:style></w:styles>"#;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{field} contains character U+{code:04X}, which is not allowed in a document")]
    InvalidCharacter { field: String, code: u32 },

    #[error("Failed to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Failed to write archive: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        AppError::Render(err.to_string())
    }
}

/// One row of the technique summary table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueRow {
    pub attack_id: String,
    pub name: String,
    pub sentence_count: usize,
}

/// Techniques mapped in the export with the number of sentences mapped to
/// each, ordered by attack id. Names come from the reference data.
pub fn technique_summary(
    export: &ReportExport,
    techniques: &[AttackObject],
) -> Vec<TechniqueRow> {
    let mut sentences_by_technique: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();
    for (index, sentence) in export.sentences.iter().enumerate() {
        for mapping in &sentence.mappings {
            sentences_by_technique
                .entry(mapping.attack_id.as_str())
                .or_default()
                .insert(index);
        }
    }

    sentences_by_technique
        .into_iter()
        .map(|(attack_id, sentences)| TechniqueRow {
            attack_id: attack_id.to_string(),
            name: techniques
                .iter()
                .find(|t| t.attack_id == attack_id)
                .map(|t| t.name.clone())
                .unwrap_or_default(),
            sentence_count: sentences.len(),
        })
        .collect()
}

/// Render the export as a `.docx` file.
pub fn render_docx(
    export: &ReportExport,
    techniques: &[AttackObject],
) -> Result<Vec<u8>, RenderError> {
    let document_xml = document_xml(export, &technique_summary(export, techniques))?;

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        let entries: [(&str, &[u8]); 5] = [
            ("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes()),
            ("_rels/.rels", ROOT_RELS_XML.as_bytes()),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML.as_bytes()),
            ("word/document.xml", document_xml.as_bytes()),
            ("word/styles.xml", STYLES_XML.as_bytes()),
        ];
        for (name, data) in entries {
            zip.start_file(name, options)?;
            zip.write_all(data)?;
        }

        zip.finish()?;
    }

    tracing::debug!(
        report = %export.name,
        sentences = export.sentences.len(),
        size_bytes = buffer.len(),
        "Rendered DOCX"
    );

    Ok(buffer)
}

fn document_xml(export: &ReportExport, rows: &[TechniqueRow]) -> Result<String, RenderError> {
    let mut body = String::new();

    body.push_str(&styled_paragraph("Title", &text_run(&export.name, "name")?));

    body.push_str(&styled_paragraph("Heading1", &text_run("Techniques", "heading")?));
    body.push_str(r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/></w:tblPr>"#);
    body.push_str(r#"<w:tblGrid><w:gridCol w:w="1800"/><w:gridCol w:w="5400"/><w:gridCol w:w="1800"/></w:tblGrid>"#);
    body.push_str(&table_row(&[
        bold_run("ATT&CK ID"),
        bold_run("Technique"),
        bold_run("Sentences"),
    ]));
    for (i, row) in rows.iter().enumerate() {
        let field = format!("techniques[{}]", i);
        body.push_str(&table_row(&[
            text_run(&row.attack_id, &field)?,
            text_run(&row.name, &field)?,
            text_run(&row.sentence_count.to_string(), &field)?,
        ]));
    }
    body.push_str("</w:tbl>");

    body.push_str(&styled_paragraph("Heading1", &text_run("Sentences", "heading")?));
    for (i, sentence) in export.sentences.iter().enumerate() {
        body.push_str(&plain_paragraph(&text_run(
            &sentence.text,
            &format!("sentences[{}].text", i),
        )?));
        for (j, mapping) in sentence.mappings.iter().enumerate() {
            let name = rows
                .iter()
                .find(|r| r.attack_id == mapping.attack_id)
                .map(|r| r.name.as_str())
                .unwrap_or("");
            let line = if name.is_empty() {
                format!("{} ({}%)", mapping.attack_id, mapping.confidence.normalize())
            } else {
                format!(
                    "{} {} ({}%)",
                    mapping.attack_id,
                    name,
                    mapping.confidence.normalize()
                )
            };
            body.push_str(&styled_paragraph(
                "ListBullet",
                &text_run(&line, &format!("sentences[{}].mappings[{}]", i, j))?,
            ));
        }
    }

    Ok(format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{}"><w:body>{}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
        W_NS, body
    ))
}

fn styled_paragraph(style: &str, runs: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr>{}</w:p>"#,
        style, runs
    )
}

fn plain_paragraph(runs: &str) -> String {
    format!("<w:p>{}</w:p>", runs)
}

fn table_row(cells: &[String]) -> String {
    let mut row = String::from("<w:tr>");
    for cell in cells {
        row.push_str("<w:tc>");
        row.push_str(&plain_paragraph(cell));
        row.push_str("</w:tc>");
    }
    row.push_str("</w:tr>");
    row
}

fn bold_run(text: &str) -> String {
    format!(
        r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#,
        escape_xml(text)
    )
}

/// A run for arbitrary text; line breaks become `<w:br/>`.
fn text_run(text: &str, field: &str) -> Result<String, RenderError> {
    check_xml_chars(text, field)?;

    let mut run = String::from("<w:r>");
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            run.push_str("<w:br/>");
        }
        run.push_str(r#"<w:t xml:space="preserve">"#);
        run.push_str(&escape_xml(line.trim_end_matches('\r')));
        run.push_str("</w:t>");
    }
    run.push_str("</w:r>");
    Ok(run)
}

/// XML 1.0 allows tab, newline, carriage return and everything from U+0020
/// except U+FFFE and U+FFFF.
fn check_xml_chars(text: &str, field: &str) -> Result<(), RenderError> {
    match text.chars().find(|&c| !is_xml_char(c)) {
        Some(c) => Err(RenderError::InvalidCharacter {
            field: field.to_string(),
            code: c as u32,
        }),
        None => Ok(()),
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= '\u{20}' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{MappingExport, SentenceExport};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::Map;
    use std::io::Read;

    fn technique(id: i64, attack_id: &str, name: &str) -> AttackObject {
        AttackObject {
            id,
            name: name.to_string(),
            stix_id: format!("attack-pattern--{}", id),
            attack_id: attack_id.to_string(),
            attack_url: None,
            attack_type: None,
            matrix: None,
            created_on: Utc::now(),
            updated_on: Utc::now(),
        }
    }

    fn mapping(attack_id: &str, confidence: Decimal) -> MappingExport {
        MappingExport {
            attack_id: attack_id.to_string(),
            confidence,
            provenance: Map::new(),
        }
    }

    fn export() -> ReportExport {
        ReportExport {
            name: "Acme <Q3> & Co".to_string(),
            text: String::new(),
            ml_model: String::new(),
            created_on: None,
            updated_on: None,
            sentences: vec![
                SentenceExport {
                    text: "The actor used PowerShell.".to_string(),
                    order: 0,
                    disposition: None,
                    mappings: vec![
                        mapping("T1059", Decimal::new(9550, 2)),
                        mapping("T1003", Decimal::new(40, 0)),
                    ],
                },
                SentenceExport {
                    text: "Then dumped credentials.\nTwice.".to_string(),
                    order: 1,
                    disposition: None,
                    mappings: vec![mapping("T1003", Decimal::new(80, 0))],
                },
            ],
        }
    }

    fn read_entry(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        contents
    }

    #[test]
    fn test_package_has_required_parts() {
        let bytes = render_docx(&export(), &[]).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/_rels/document.xml.rels",
            "word/document.xml",
            "word/styles.xml",
        ] {
            assert!(names.contains(&part), "missing {}", part);
        }
    }

    #[test]
    fn test_document_contains_title_table_and_sentences() {
        let techniques = vec![
            technique(1, "T1003", "OS Credential Dumping"),
            technique(2, "T1059", "Command and Scripting Interpreter"),
        ];
        let bytes = render_docx(&export(), &techniques).unwrap();
        let xml = read_entry(&bytes, "word/document.xml");

        assert!(xml.contains("Acme &lt;Q3&gt; &amp; Co"));
        assert!(xml.contains("OS Credential Dumping"));
        assert!(xml.contains("The actor used PowerShell."));
        assert!(xml.contains("Then dumped credentials.</w:t><w:br/>"));
        assert!(xml.contains("T1059 Command and Scripting Interpreter (95.5%)"));
        // Table rows come ordered by attack id
        assert!(xml.find("T1003").unwrap() < xml.find("T1059").unwrap());
    }

    #[test]
    fn test_render_is_deterministic() {
        let a = render_docx(&export(), &[]).unwrap();
        let b = render_docx(&export(), &[]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_technique_summary_counts_distinct_sentences() {
        let techniques = vec![technique(1, "T1003", "OS Credential Dumping")];
        let rows = technique_summary(&export(), &techniques);
        assert_eq!(
            rows,
            vec![
                TechniqueRow {
                    attack_id: "T1003".to_string(),
                    name: "OS Credential Dumping".to_string(),
                    sentence_count: 2,
                },
                TechniqueRow {
                    attack_id: "T1059".to_string(),
                    name: String::new(),
                    sentence_count: 1,
                },
            ]
        );
    }

    #[test]
    fn test_control_characters_are_rejected() {
        let mut export = export();
        export.sentences[1].text = "bad\u{0007}bell".to_string();
        let err = render_docx(&export, &[]).unwrap_err();
        match err {
            RenderError::InvalidCharacter { field, code } => {
                assert_eq!(field, "sentences[1].text");
                assert_eq!(code, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_report_still_renders() {
        let mut export = export();
        export.sentences.clear();
        let bytes = render_docx(&export, &[]).unwrap();
        let xml = read_entry(&bytes, "word/document.xml");
        assert!(xml.contains("<w:tbl>"));
        assert!(xml.contains("Sentences"));
    }
}
