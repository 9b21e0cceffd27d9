// SPDX-License-Identifier: AGPL-3.0-or-later
//! WebDAV multistatus parsing
//!
//! Event-driven over quick-xml. Elements are matched on their local name
//! only, so `<D:href>`, `<d:href>` and `<lp1:href>` are all the same thing.

use chrono::{DateTime, NaiveDateTime, Utc};
use pfk_core::{PfkError, PfkResult, RemoteResource};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Property whose text is being collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Href,
    ContentType,
    LastModified,
    ContentLength,
    Etag,
}

impl Field {
    fn from_local_name(name: &str) -> Option<Self> {
        if name.ends_with("href") {
            Some(Field::Href)
        } else if name.ends_with("getcontenttype") {
            Some(Field::ContentType)
        } else if name.ends_with("getlastmodified") {
            Some(Field::LastModified)
        } else if name.ends_with("getcontentlength") {
            Some(Field::ContentLength)
        } else if name.ends_with("getetag") {
            Some(Field::Etag)
        } else {
            None
        }
    }
}

#[derive(Default)]
struct ParseState {
    current: RemoteResource,
    field: Option<Field>,
    text: String,
    resources: Vec<RemoteResource>,
    finished: bool,
}

impl ParseState {
    fn open(&mut self, name: &str) {
        if name.ends_with("response") {
            self.current = RemoteResource::default();
            self.field = None;
        } else if name == "collection" {
            self.current.is_collection = true;
        } else if let Some(field) = Field::from_local_name(name) {
            self.field = Some(field);
            self.text.clear();
        }
    }

    fn close(&mut self, name: &str) {
        if name.ends_with("multistatus") {
            self.finished = true;
        } else if name.ends_with("response") {
            let resource = std::mem::take(&mut self.current);
            if !resource.href.is_empty() {
                self.resources.push(resource);
            }
        } else if let Some(field) = self.field.filter(|f| Some(*f) == Field::from_local_name(name)) {
            let text = std::mem::take(&mut self.text);
            let text = text.trim();
            match field {
                Field::Href => self.current.href = text.to_string(),
                Field::ContentType => self.current.content_type = text.to_string(),
                Field::LastModified => self.current.last_modified = parse_http_date(text),
                Field::ContentLength => self.current.content_length = text.parse().ok(),
                Field::Etag => {
                    let etag = text.trim_start_matches("W/").trim_matches('"');
                    self.current.etag = (!etag.is_empty()).then(|| etag.to_string());
                }
            }
            self.field = None;
        }
    }
}

/// Parse a PROPFIND multistatus body.
///
/// `<response>` elements without an href are skipped. A body that is not
/// well-formed, or never closes `<multistatus>`, is an error rather than a
/// partial list.
pub fn parse_multistatus(xml: &str) -> PfkResult<Vec<RemoteResource>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut state = ParseState::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(e.local_name().as_ref());
                state.open(&name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(e.local_name().as_ref());
                state.open(&name);
                state.close(&name);
            }
            Ok(Event::Text(e)) => {
                if state.field.is_some() {
                    let text = e
                        .unescape()
                        .map_err(|e| PfkError::MalformedResponse(e.to_string()))?;
                    state.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if state.field.is_some() {
                    state.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.local_name().as_ref());
                state.close(&name);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PfkError::MalformedResponse(format!(
                    "XML error at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if !state.finished {
        return Err(PfkError::MalformedResponse(
            "missing multistatus element".into(),
        ));
    }

    Ok(state.resources)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

/// Parse an RFC 1123 date (`Mon, 15 Jan 2024 10:30:00 GMT`). Anything else
/// yields `None`; one bad date never fails the whole listing.
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(s, "%a, %d %b %Y %H:%M:%S GMT")
        .ok()
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}
