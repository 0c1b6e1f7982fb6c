//! Synchronization descriptor transcoding.
//!
//! Converts the XML image/timecode mapping shipped in rich-media packages
//! into the JSON list served next to the published media:
//!
//! ```xml
//! <player>
//!   <synchro id="slide_00000.jpeg" timecode="0"/>
//!   <synchro id="slide_00001.jpeg" timecode="1200"/>
//! </player>
//! ```
//!
//! becomes `[{"timecode":0,"image":"slide_00000.jpeg"},{"timecode":1200,"image":"slide_00001.jpeg"}]`.
//! Fields may be given as attributes or as child elements.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::{PublishError, Result};

const ROOT_ELEMENT: &[u8] = b"player";
const ENTRY_ELEMENT: &[u8] = b"synchro";
const IMAGE_FIELD: &[u8] = b"id";
const TIMECODE_FIELD: &[u8] = b"timecode";

/// One image displayed from `timecode` milliseconds onwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timecode {
    pub timecode: i64,
    pub image: String,
}

#[derive(Default)]
struct RawEntry {
    image: Option<String>,
    timecode: Option<String>,
}

impl RawEntry {
    fn set(&mut self, field: &[u8], value: String) {
        // First occurrence wins, attributes before child elements
        match field {
            IMAGE_FIELD if self.image.is_none() => self.image = Some(value),
            TIMECODE_FIELD if self.timecode.is_none() => self.timecode = Some(value),
            _ => {}
        }
    }

    fn into_timecode(self) -> Result<Option<Timecode>> {
        match (self.image, self.timecode) {
            (Some(image), Some(timecode)) => Ok(Some(Timecode {
                timecode: parse_timecode(&timecode)?,
                image,
            })),
            _ => Ok(None),
        }
    }
}

/// Transcode a synchronization descriptor.
///
/// Entries keep their document order. Entries lacking an image or a timecode
/// are dropped; a timecode that is not a base-10 integer is an error, and so
/// is a document ending before all its elements are closed. A document whose
/// root is not `<player>` yields no entries.
pub fn transcode(xml: &str) -> Result<Vec<Timecode>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut timecodes = Vec::new();
    let mut depth = 0usize;
    let mut root_matches = false;
    let mut current: Option<RawEntry> = None;
    let mut current_field: Option<Vec<u8>> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(element) => {
                depth += 1;
                let name = element.name();
                match depth {
                    1 => root_matches = name.as_ref() == ROOT_ELEMENT,
                    2 if root_matches && name.as_ref() == ENTRY_ELEMENT => {
                        current = Some(entry_from_attributes(&element)?);
                    }
                    3 if current.is_some() => current_field = Some(name.as_ref().to_vec()),
                    _ => {}
                }
            }
            Event::Empty(element) => {
                if depth == 1 && root_matches && element.name().as_ref() == ENTRY_ELEMENT {
                    if let Some(timecode) = entry_from_attributes(&element)?.into_timecode()? {
                        timecodes.push(timecode);
                    }
                }
            }
            Event::Text(text) => {
                if let (Some(entry), Some(field)) = (current.as_mut(), current_field.as_deref()) {
                    let value = text.unescape().map_err(xml_error)?.to_string();
                    entry.set(field, value);
                }
            }
            Event::End(_) => {
                match depth {
                    3 => current_field = None,
                    2 => {
                        if let Some(entry) = current.take() {
                            if let Some(timecode) = entry.into_timecode()? {
                                timecodes.push(timecode);
                            }
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof if depth > 0 => {
                return Err(PublishError::Xml(format!(
                    "document ends with {} unclosed element(s)",
                    depth
                )));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(timecodes)
}

/// Serialize timecodes to the persisted JSON form
pub fn to_json(timecodes: &[Timecode]) -> Result<String> {
    Ok(serde_json::to_string(timecodes)?)
}

fn entry_from_attributes(element: &BytesStart<'_>) -> Result<RawEntry> {
    let mut entry = RawEntry::default();
    for attribute in element.attributes() {
        let attribute = attribute.map_err(xml_error)?;
        let value = attribute.unescape_value().map_err(xml_error)?.to_string();
        entry.set(attribute.key.as_ref(), value);
    }
    Ok(entry)
}

/// Parse the leading base-10 integer of a timecode, ignoring trailing text
fn parse_timecode(value: &str) -> Result<i64> {
    let trimmed = value.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return Err(PublishError::Timecode(format!("invalid timecode '{}'", value)));
    }

    digits[..end]
        .parse::<i64>()
        .map(|number| sign * number)
        .map_err(|e| PublishError::Timecode(format!("invalid timecode '{}': {}", value, e)))
}

fn xml_error<E: std::fmt::Display>(error: E) -> PublishError {
    PublishError::Xml(error.to_string())
}
