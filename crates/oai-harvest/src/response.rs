//! Parsing of OAI-PMH response documents.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use stacks_core::error::{Result, StacksError};

/// One `<record>` from a ListRecords page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OaiRecord {
    pub identifier: String,
    pub datestamp: Option<String>,
    pub set_specs: Vec<String>,
    pub deleted: bool,
    /// Serialized payload element from `<metadata>`, if any.
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OaiSet {
    pub spec: String,
    pub name: String,
}

/// The parts of a response the harvester uses. Which fields are filled
/// depends on the verb.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OaiResponse {
    pub records: Vec<OaiRecord>,
    pub sets: Vec<OaiSet>,
    /// From `Identify`.
    pub granularity: Option<String>,
    /// `None` on the last page.
    pub resumption_token: Option<String>,
}

#[derive(Default)]
struct RecordBuilder {
    record: OaiRecord,
    has_header: bool,
}

#[derive(Default)]
struct SetBuilder {
    spec: String,
    name: String,
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.to_string())
}

/// `xmlns` / `xmlns:*` declarations on an element.
fn namespace_declarations(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .filter_map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_string();
            if key == "xmlns" || key.starts_with("xmlns:") {
                let value = a.unescape_value().ok()?.to_string();
                Some((key, value))
            } else {
                None
            }
        })
        .collect()
}

fn malformed(e: impl std::fmt::Display) -> StacksError {
    StacksError::Harvest(format!("malformed OAI-PMH response: {e}"))
}

/// Parse a response body. An `<error>` element becomes [`StacksError::Oai`].
pub fn parse(xml: &str) -> Result<OaiResponse> {
    let mut reader = Reader::from_str(xml);
    let mut response = OaiResponse::default();
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut saw_root = false;

    let mut error_code: Option<String> = None;
    let mut record: Option<RecordBuilder> = None;
    let mut set: Option<SetBuilder> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => {
                saw_root = true;
                let name = local_name(&e);
                text.clear();
                match name.as_str() {
                    "error" => error_code = Some(attribute(&e, "code").unwrap_or_default()),
                    "record" => record = Some(RecordBuilder::default()),
                    "set" => set = Some(SetBuilder::default()),
                    "header" => {
                        if let Some(builder) = record.as_mut() {
                            builder.has_header = true;
                            builder.record.deleted =
                                attribute(&e, "status").is_some_and(|s| s == "deleted");
                        }
                    }
                    "metadata" if record.is_some() => {
                        let payload = capture_payload(&mut reader, namespace_declarations(&e))?;
                        if let Some(builder) = record.as_mut() {
                            builder.record.metadata = payload;
                        }
                        // capture_payload consumed the closing </metadata>
                        continue;
                    }
                    _ => {}
                }
                path.push(name);
            }
            Event::Empty(e) => {
                saw_root = true;
                let name = local_name(&e);
                match name.as_str() {
                    "header" => {
                        if let Some(builder) = record.as_mut() {
                            builder.has_header = true;
                            builder.record.deleted =
                                attribute(&e, "status").is_some_and(|s| s == "deleted");
                        }
                    }
                    "error" => {
                        return Err(StacksError::Oai {
                            code: attribute(&e, "code").unwrap_or_default(),
                            message: String::new(),
                        })
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                text.push_str(&e.unescape().map_err(malformed)?);
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                let parent = path.last().map(String::as_str).unwrap_or_default();
                let value = text.trim().to_string();
                text.clear();

                match (name.as_str(), parent) {
                    ("error", _) => {
                        return Err(StacksError::Oai {
                            code: error_code.take().unwrap_or_default(),
                            message: value,
                        })
                    }
                    ("identifier", "header") => {
                        if let Some(builder) = record.as_mut() {
                            builder.record.identifier = value;
                        }
                    }
                    ("datestamp", "header") => {
                        if let Some(builder) = record.as_mut() {
                            builder.record.datestamp = Some(value);
                        }
                    }
                    ("setSpec", "header") => {
                        if let Some(builder) = record.as_mut() {
                            builder.record.set_specs.push(value);
                        }
                    }
                    ("setSpec", "set") => {
                        if let Some(builder) = set.as_mut() {
                            builder.spec = value;
                        }
                    }
                    ("setName", "set") => {
                        if let Some(builder) = set.as_mut() {
                            builder.name = value;
                        }
                    }
                    ("set", _) => {
                        if let Some(builder) = set.take() {
                            response.sets.push(OaiSet {
                                spec: builder.spec,
                                name: builder.name,
                            });
                        }
                    }
                    ("record", _) => {
                        if let Some(builder) = record.take() {
                            if !builder.has_header {
                                return Err(StacksError::Harvest(
                                    "record without a header in OAI-PMH response".into(),
                                ));
                            }
                            response.records.push(builder.record);
                        }
                    }
                    ("granularity", "Identify") => response.granularity = Some(value),
                    ("resumptionToken", _) => {
                        response.resumption_token = Some(value).filter(|t| !t.is_empty());
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(StacksError::Harvest("empty OAI-PMH response".into()));
    }
    Ok(response)
}

/// Copy everything inside `<metadata>` up to its end tag. Namespace
/// declarations made on `<metadata>` are added to the payload root unless it
/// declares the same prefix itself.
fn capture_payload(
    reader: &mut Reader<&[u8]>,
    namespaces: Vec<(String, String)>,
) -> Result<Option<String>> {
    let mut writer = Writer::new(Vec::new());
    let mut depth = 0usize;
    let mut root_seen = false;

    loop {
        let event = reader.read_event().map_err(malformed)?;
        let event = match event {
            Event::Start(e) if !root_seen => {
                root_seen = true;
                Event::Start(with_namespaces(e, &namespaces))
            }
            Event::Empty(e) if !root_seen => {
                root_seen = true;
                Event::Empty(with_namespaces(e, &namespaces))
            }
            other => other,
        };
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => break,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(malformed("unterminated <metadata> element")),
            _ => {}
        }
        writer.write_event(event).map_err(malformed)?;
    }

    let payload = String::from_utf8(writer.into_inner()).map_err(malformed)?;
    let payload = payload.trim();
    Ok(if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    })
}

/// Insert `(tag, text)` elements as the first children of the payload root.
///
/// A self-closing root is expanded into a start/end pair. Anything before
/// the root (comments, processing instructions) is copied unchanged.
pub fn inject_elements(payload: &str, elements: &[(String, String)]) -> Result<String> {
    if elements.is_empty() {
        return Ok(payload.to_string());
    }

    let mut reader = Reader::from_str(payload);
    let mut writer = Writer::new(Vec::new());
    let mut injected = false;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Eof => break,
            Event::Start(e) if !injected => {
                injected = true;
                writer.write_event(Event::Start(e)).map_err(malformed)?;
                write_elements(&mut writer, elements)?;
            }
            Event::Empty(e) if !injected => {
                injected = true;
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                writer.write_event(Event::Start(e)).map_err(malformed)?;
                write_elements(&mut writer, elements)?;
                writer
                    .write_event(Event::End(BytesEnd::new(name)))
                    .map_err(malformed)?;
            }
            event => writer.write_event(event).map_err(malformed)?,
        }
    }

    if !injected {
        return Err(StacksError::Harvest(
            "metadata payload has no root element".into(),
        ));
    }
    String::from_utf8(writer.into_inner()).map_err(malformed)
}

fn write_elements(writer: &mut Writer<Vec<u8>>, elements: &[(String, String)]) -> Result<()> {
    for (tag, value) in elements {
        writer
            .write_event(Event::Start(BytesStart::new(tag.as_str())))
            .map_err(malformed)?;
        writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(malformed)?;
        writer
            .write_event(Event::End(BytesEnd::new(tag.as_str())))
            .map_err(malformed)?;
    }
    Ok(())
}

fn with_namespaces(root: BytesStart<'_>, namespaces: &[(String, String)]) -> BytesStart<'static> {
    let declared = namespace_declarations(&root);
    let mut root = root.into_owned();
    for (key, value) in namespaces {
        if !declared.iter().any(|(k, _)| k == key) {
            root.push_attribute((key.as_str(), value.as_str()));
        }
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_RECORDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2024-01-03T00:00:00Z</responseDate>
  <request verb="ListRecords">https://repo.example.org/oai</request>
  <ListRecords>
    <record>
      <header>
        <identifier>oai:repo.example.org:1</identifier>
        <datestamp>2024-01-02T10:00:00Z</datestamp>
        <setSpec>theses</setSpec>
        <setSpec>open</setSpec>
      </header>
      <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
        <oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/"><dc:title>Rivers &amp; Lakes</dc:title></oai_dc:dc>
      </metadata>
    </record>
    <record>
      <header status="deleted">
        <identifier>oai:repo.example.org:2</identifier>
        <datestamp>2024-01-01T08:00:00Z</datestamp>
      </header>
    </record>
    <resumptionToken cursor="0" completeListSize="3">page-2</resumptionToken>
  </ListRecords>
</OAI-PMH>"#;

    #[test]
    fn parses_records_and_token() {
        let response = parse(LIST_RECORDS).unwrap();
        assert_eq!(response.records.len(), 2);
        assert_eq!(response.resumption_token.as_deref(), Some("page-2"));

        let first = &response.records[0];
        assert_eq!(first.identifier, "oai:repo.example.org:1");
        assert_eq!(first.datestamp.as_deref(), Some("2024-01-02T10:00:00Z"));
        assert_eq!(first.set_specs, vec!["theses", "open"]);
        assert!(!first.deleted);

        let second = &response.records[1];
        assert!(second.deleted);
        assert!(second.metadata.is_none());
    }

    #[test]
    fn payload_keeps_markup_and_gains_namespaces() {
        let response = parse(LIST_RECORDS).unwrap();
        let payload = response.records[0].metadata.as_deref().unwrap();
        assert!(payload.starts_with("<oai_dc:dc "));
        assert!(payload.contains(r#"xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/""#));
        assert!(payload.contains(r#"xmlns:dc="http://purl.org/dc/elements/1.1/""#));
        assert!(payload.contains("<dc:title>Rivers &amp; Lakes</dc:title>"));
        assert!(payload.ends_with("</oai_dc:dc>"));
    }

    #[test]
    fn empty_token_means_last_page() {
        let xml = r#"<OAI-PMH><ListRecords><resumptionToken completeListSize="3"/></ListRecords></OAI-PMH>"#;
        assert!(parse(xml).unwrap().resumption_token.is_none());

        let xml = r#"<OAI-PMH><ListRecords><resumptionToken></resumptionToken></ListRecords></OAI-PMH>"#;
        assert!(parse(xml).unwrap().resumption_token.is_none());
    }

    #[test]
    fn error_element_becomes_oai_error() {
        let xml = r#"<OAI-PMH><error code="badArgument">Illegal argument 'foo'</error></OAI-PMH>"#;
        match parse(xml).unwrap_err() {
            StacksError::Oai { code, message } => {
                assert_eq!(code, "badArgument");
                assert_eq!(message, "Illegal argument 'foo'");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn record_without_header_is_fatal() {
        let xml = r#"<OAI-PMH><ListRecords><record><metadata><x/></metadata></record></ListRecords></OAI-PMH>"#;
        assert!(matches!(parse(xml).unwrap_err(), StacksError::Harvest(_)));
    }

    #[test]
    fn malformed_xml_is_harvest_error() {
        assert!(matches!(
            parse("<OAI-PMH><ListRecords></OAI-PMH>").unwrap_err(),
            StacksError::Harvest(_)
        ));
        assert!(matches!(parse("").unwrap_err(), StacksError::Harvest(_)));
    }

    #[test]
    fn parses_sets_and_granularity() {
        let xml = r#"<OAI-PMH>
          <ListSets>
            <set><setSpec>theses</setSpec><setName>Theses &amp; Dissertations</setName></set>
            <set><setSpec>open</setSpec><setName>Open Access</setName></set>
          </ListSets>
        </OAI-PMH>"#;
        let response = parse(xml).unwrap();
        assert_eq!(
            response.sets,
            vec![
                OaiSet {
                    spec: "theses".into(),
                    name: "Theses & Dissertations".into()
                },
                OaiSet {
                    spec: "open".into(),
                    name: "Open Access".into()
                },
            ]
        );

        let xml = "<OAI-PMH><Identify><granularity>YYYY-MM-DD</granularity></Identify></OAI-PMH>";
        assert_eq!(parse(xml).unwrap().granularity.as_deref(), Some("YYYY-MM-DD"));
    }

    fn identifier() -> Vec<(String, String)> {
        vec![("identifier".to_string(), "a&b".to_string())]
    }

    #[test]
    fn injects_after_root_start() {
        let payload = r#"<rec id="1"><title>T</title></rec>"#;
        assert_eq!(
            inject_elements(payload, &identifier()).unwrap(),
            r#"<rec id="1"><identifier>a&amp;b</identifier><title>T</title></rec>"#
        );
    }

    #[test]
    fn self_closing_root_is_expanded() {
        assert_eq!(
            inject_elements(r#"<rec id="1"/>"#, &identifier()).unwrap(),
            r#"<rec id="1"><identifier>a&amp;b</identifier></rec>"#
        );
    }

    #[test]
    fn leading_comment_and_angle_in_attribute() {
        let payload = r#"<!-- exported --><rec note="a > b"><title>T</title></rec>"#;
        assert_eq!(
            inject_elements(payload, &identifier()).unwrap(),
            r#"<!-- exported --><rec note="a > b"><identifier>a&amp;b</identifier><title>T</title></rec>"#
        );
    }

    #[test]
    fn payload_without_root_is_rejected() {
        assert!(matches!(
            inject_elements("just text", &identifier()).unwrap_err(),
            StacksError::Harvest(_)
        ));
    }
}
