/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Minimal RFC 5322 header/body splitting — just enough structure for
//! ARC signing and verification, not a general mail parser.

/// One unfolded-at-the-seam header: `name` is exactly as written on the
/// wire (case preserved); `value` is everything after the first `:`,
/// including any internal `\r\n` folding, with the leading space after
/// the colon stripped and the trailing CRLF before the next header
/// removed.
#[derive(Debug, Clone)]
pub struct RawHeader {
    pub name: String,
    pub value: String,
}

impl RawHeader {
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Splits `message` into its headers (in wire order) and body at the
/// first `\r\n\r\n` boundary (spec §4.3 "Message bytes are split into
/// headers and body using the first `\r\n\r\n` boundary").
pub fn split_message(message: &[u8]) -> (Vec<RawHeader>, &[u8]) {
    let boundary = find_boundary(message);
    let (header_block, body) = match boundary {
        Some(idx) => (&message[..idx], &message[idx + 4..]),
        None => (message, &[][..]),
    };
    (parse_headers(header_block), body)
}

fn find_boundary(message: &[u8]) -> Option<usize> {
    message
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
}

fn parse_headers(block: &[u8]) -> Vec<RawHeader> {
    let text = String::from_utf8_lossy(block);
    let mut headers = Vec::new();
    for line in text.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        let is_continuation = line.starts_with(' ') || line.starts_with('\t');
        if is_continuation {
            if let Some(last) = headers.last_mut() {
                let last: &mut RawHeader = last;
                last.value.push_str("\r\n");
                last.value.push_str(line);
                continue;
            }
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push(RawHeader {
                name: name.to_string(),
                value: value.strip_prefix(' ').unwrap_or(value).to_string(),
            });
        }
    }
    headers
}

/// Returns all headers named `name` (case-insensitive), in wire order.
pub fn headers_named<'a>(headers: &'a [RawHeader], name: &str) -> Vec<&'a RawHeader> {
    headers.iter().filter(|h| h.name_matches(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_headers_and_body_at_first_blank_line() {
        let msg = b"From: a@x.com\r\nSubject: hi\r\n\r\nHello.\r\n";
        let (headers, body) = split_message(msg);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].name, "From");
        assert_eq!(headers[0].value, "a@x.com");
        assert_eq!(body, b"Hello.\r\n");
    }

    #[test]
    fn unfolds_continuation_lines_into_raw_value() {
        let msg = b"To: a@x.com,\r\n b@x.com\r\n\r\nBody\r\n";
        let (headers, _) = split_message(msg);
        assert_eq!(headers[0].value, "a@x.com,\r\n b@x.com");
    }

    #[test]
    fn message_with_no_blank_line_has_empty_body() {
        let msg = b"From: a@x.com\r\n";
        let (headers, body) = split_message(msg);
        assert_eq!(headers.len(), 1);
        assert!(body.is_empty());
    }

    #[test]
    fn headers_named_is_case_insensitive() {
        let msg = b"ARC-Seal: i=1\r\narc-seal: i=2\r\n\r\n";
        let (headers, _) = split_message(msg);
        assert_eq!(headers_named(&headers, "arc-seal").len(), 2);
    }
}
