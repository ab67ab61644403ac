//! SIP2 message encoding and response parsing.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};
use stacks_core::error::{Result, StacksError};

/// SC status request.
pub const SC_STATUS: &str = "99";
/// ACS status response.
pub const ACS_STATUS: &str = "98";
pub const PATRON_STATUS_REQUEST: &str = "23";
pub const PATRON_STATUS_RESPONSE: &str = "24";
/// ACS asks the SC to send its last message again.
pub const REQUEST_SC_RESEND: &str = "96";

const PROTOCOL_VERSION: &str = "2.00";
const MAX_PRINT_WIDTH: &str = "080";
/// English, per the SIP2 language table.
const LANGUAGE: &str = "001";

/// Length of the fixed-position part that follows the command code.
fn fixed_length(command: &str) -> usize {
    match command {
        // online, checkin, checkout, renewal policy, status update, offline,
        // timeout(3), retries(3), date/time(18), protocol version(4)
        ACS_STATUS => 34,
        // patron status(14), language(3), date/time(18)
        PATRON_STATUS_RESPONSE => 35,
        // patron status(14), language(3), date/time(18), six item counts(4 each)
        "64" => 59,
        // end session flag, date/time(18)
        "36" => 19,
        // login ok flag
        "94" => 1,
        _ => 0,
    }
}

/// SIP2 transaction date: `YYYYMMDD`, four spaces for the local time zone, `HHMMSS`.
pub fn datestamp(at: NaiveDateTime) -> String {
    at.format("%Y%m%d    %H%M%S").to_string()
}

/// Two's complement of the byte sum, as four upper-case hex digits.
pub fn checksum(data: &str) -> String {
    let sum = data
        .bytes()
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(b)));
    format!("{:04X}", (!sum).wrapping_add(1))
}

/// An outgoing SIP2 message without its error-detection trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sip2Request {
    body: String,
}

impl Sip2Request {
    pub fn sc_status() -> Self {
        Self {
            body: format!("{SC_STATUS}0{MAX_PRINT_WIDTH}{PROTOCOL_VERSION}"),
        }
    }

    pub fn patron_status(
        institution: &str,
        patron: &str,
        terminal_password: &str,
        patron_password: &str,
    ) -> Self {
        Self::patron_status_at(
            Local::now().naive_local(),
            institution,
            patron,
            terminal_password,
            patron_password,
        )
    }

    pub fn patron_status_at(
        at: NaiveDateTime,
        institution: &str,
        patron: &str,
        terminal_password: &str,
        patron_password: &str,
    ) -> Self {
        Self {
            body: format!(
                "{PATRON_STATUS_REQUEST}{LANGUAGE}{}AO{institution}|AA{patron}|AC{terminal_password}|AD{patron_password}|",
                datestamp(at)
            ),
        }
    }

    pub fn command(&self) -> &str {
        &self.body[..2]
    }

    /// Wire form of the message. With a sequence number the `AY`/`AZ`
    /// error-detection fields are appended.
    pub fn encode(&self, sequence: Option<u8>) -> String {
        match sequence {
            None => self.body.clone(),
            Some(seq) => {
                let mut message = format!("{}AY{}AZ", self.body, seq % 10);
                let sum = checksum(&message);
                message.push_str(&sum);
                message
            }
        }
    }
}

/// A parsed ACS response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sip2Response {
    command: String,
    fields: BTreeMap<String, Vec<String>>,
    sequence: Option<u8>,
    /// `None` when the message carried no checksum.
    checksum_ok: Option<bool>,
}

impl Sip2Response {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim_matches(|c| c == '\r' || c == '\n');
        let command = raw
            .get(..2)
            .ok_or_else(|| StacksError::Backend(format!("SIP2 response too short: {raw:?}")))?;
        let fixed_end = 2 + fixed_length(command);
        if raw.get(2..fixed_end).is_none() {
            return Err(StacksError::Backend(format!(
                "truncated SIP2 {command} response: {raw:?}"
            )));
        }

        let (content, trailer) = split_trailer(raw);
        let (sequence, checksum_ok) = match trailer {
            Some(Trailer { sequence, checksum: sum }) => {
                let signed = &raw[..raw.len() - 4];
                (sequence, Some(checksum(signed).eq_ignore_ascii_case(sum)))
            }
            None => (None, None),
        };

        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let variable = content.get(fixed_end..).unwrap_or_default();
        for segment in variable.split('|') {
            if segment.len() < 2 || !segment.is_char_boundary(2) {
                continue;
            }
            let (code, value) = segment.split_at(2);
            fields
                .entry(code.to_string())
                .or_default()
                .push(value.to_string());
        }

        Ok(Self {
            command: command.to_string(),
            fields,
            sequence,
            checksum_ok,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// First value of a variable field.
    pub fn field(&self, code: &str) -> Option<&str> {
        self.fields
            .get(code)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of a repeatable variable field, in message order.
    pub fn fields(&self, code: &str) -> &[String] {
        self.fields.get(code).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn sequence(&self) -> Option<u8> {
        self.sequence
    }

    pub fn has_checksum(&self) -> bool {
        self.checksum_ok.is_some()
    }

    /// Messages without a checksum are accepted.
    pub fn checksum_valid(&self) -> bool {
        self.checksum_ok.unwrap_or(true)
    }
}

struct Trailer<'a> {
    sequence: Option<u8>,
    checksum: &'a str,
}

/// Split `...AY<n>AZ<xxxx>` (or a bare `AZ<xxxx>`) off the end of a message.
fn split_trailer(raw: &str) -> (&str, Option<Trailer<'_>>) {
    let bytes = raw.as_bytes();
    let len = bytes.len();
    if len < 6 {
        return (raw, None);
    }
    let sum = &bytes[len - 4..];
    if &bytes[len - 6..len - 4] != b"AZ" || !sum.iter().all(u8::is_ascii_hexdigit) {
        return (raw, None);
    }
    let checksum = &raw[len - 4..];

    if len >= 9 && &bytes[len - 9..len - 7] == b"AY" && bytes[len - 7].is_ascii_digit() {
        let sequence = Some(bytes[len - 7] - b'0');
        return (&raw[..len - 9], Some(Trailer { sequence, checksum }));
    }
    (
        &raw[..len - 6],
        Some(Trailer {
            sequence: None,
            checksum,
        }),
    )
}
