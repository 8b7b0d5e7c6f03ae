/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! RFC 6376 §3.4 header and body canonicalization, reused by ARC (RFC 8617
//! §4) exactly as DKIM defines it.

/// Which canonicalization algorithm applies to a header or body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Canonicalization {
    Simple,
    Relaxed,
}

impl Canonicalization {
    pub fn as_str(self) -> &'static str {
        match self {
            Canonicalization::Simple => "simple",
            Canonicalization::Relaxed => "relaxed",
        }
    }
}

/// Canonicalizes one header's `name: value` pair (RFC 6376 §3.4.1/3.4.2).
///
/// `relaxed` lowercases the header name, unfolds continuation lines to a
/// single space, collapses internal whitespace runs to one space, and
/// trims the value's leading/trailing whitespace. `simple` reproduces the
/// header exactly as given (no trailing CRLF — the caller appends one).
pub fn canonicalize_header(canon: Canonicalization, name: &str, value: &str) -> String {
    match canon {
        Canonicalization::Simple => format!("{name}:{value}"),
        Canonicalization::Relaxed => {
            let unfolded = value.replace("\r\n", "").replace(['\t', '\n'], " ");
            let collapsed = collapse_whitespace(&unfolded);
            format!("{}:{}", name.to_ascii_lowercase(), collapsed.trim())
        }
    }
}

fn collapse_whitespace(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_was_space = false;
    for ch in value.chars() {
        if ch == ' ' {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out
}

/// Canonicalizes a message body (RFC 6376 §3.4.3/3.4.4).
///
/// `simple` strips trailing empty lines, leaving at most a single CRLF if
/// the body was non-empty, and ensures the body ends with CRLF. `relaxed`
/// additionally reduces whitespace within each line to single spaces,
/// strips trailing whitespace per line, and removes trailing empty lines
/// the same way.
pub fn canonicalize_body(canon: Canonicalization, body: &[u8]) -> Vec<u8> {
    let body = normalize_to_crlf(body);
    match canon {
        Canonicalization::Simple => {
            let trimmed = strip_trailing_empty_lines(&body);
            if trimmed.is_empty() {
                b"\r\n".to_vec()
            } else {
                let mut out = trimmed;
                out.extend_from_slice(b"\r\n");
                out
            }
        }
        Canonicalization::Relaxed => {
            let mut lines: Vec<String> = body
                .split(|&b| b == b'\n')
                .map(|line| {
                    let line = line.strip_suffix(b"\r").unwrap_or(line);
                    let text = String::from_utf8_lossy(line);
                    collapse_whitespace(text.trim_end_matches([' ', '\t']))
                })
                .collect();
            while lines.last().is_some_and(|l| l.is_empty()) {
                lines.pop();
            }
            if lines.is_empty() {
                return Vec::new();
            }
            let mut out = lines.join("\r\n").into_bytes();
            out.extend_from_slice(b"\r\n");
            out
        }
    }
}

fn normalize_to_crlf(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        if body[i] == b'\n' && (i == 0 || body[i - 1] != b'\r') {
            out.push(b'\r');
        }
        out.push(body[i]);
        i += 1;
    }
    out
}

fn strip_trailing_empty_lines(body: &[u8]) -> Vec<u8> {
    let mut end = body.len();
    while end >= 2 && &body[end - 2..end] == b"\r\n" {
        end -= 2;
    }
    body[..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relaxed_header_lowercases_name_and_collapses_whitespace() {
        let out = canonicalize_header(Canonicalization::Relaxed, "Subject", "  hello   world  ");
        assert_eq!(out, "subject:hello world");
    }

    #[test]
    fn relaxed_header_unfolds_continuation() {
        let out = canonicalize_header(Canonicalization::Relaxed, "To", "a@x.com,\r\n b@x.com");
        assert_eq!(out, "to:a@x.com, b@x.com");
    }

    #[test]
    fn simple_header_is_unchanged() {
        let out = canonicalize_header(Canonicalization::Simple, "Subject", "  hi  ");
        assert_eq!(out, "Subject:  hi  ");
    }

    #[test]
    fn simple_body_strips_trailing_blank_lines() {
        let body = b"Hello.\r\n\r\n\r\n";
        assert_eq!(canonicalize_body(Canonicalization::Simple, body), b"Hello.\r\n");
    }

    #[test]
    fn simple_empty_body_becomes_single_crlf() {
        assert_eq!(canonicalize_body(Canonicalization::Simple, b""), b"\r\n");
    }

    #[test]
    fn relaxed_body_collapses_whitespace_per_line() {
        let body = b"Hello   world  \r\n\r\n";
        assert_eq!(
            canonicalize_body(Canonicalization::Relaxed, body),
            b"Hello world\r\n"
        );
    }

    #[test]
    fn relaxed_fully_empty_body_is_empty() {
        assert_eq!(canonicalize_body(Canonicalization::Relaxed, b"\r\n\r\n"), b"");
    }
}
