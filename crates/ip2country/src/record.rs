//! Positional rewriting of `|`-delimited records.
//!
//! Records are handled as raw bytes so that input which is not valid UTF-8 is
//! still passed through; only the address field has to be text for a lookup
//! to succeed.

use crate::{
    config::{DELIMITER, UNKNOWN_COUNTRY},
    error::RecordError,
    lookup::CountryLookup,
};

/// Outcome of a successful rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    /// The address was replaced with a country code.
    Resolved,
    /// The address was replaced with [`UNKNOWN_COUNTRY`].
    Unresolved,
}

/// Splits a line into its body and its terminator (`\n`, `\r\n` or nothing).
pub fn split_terminator(line: &[u8]) -> (&[u8], &[u8]) {
    let body_len = match line {
        [.., b'\r', b'\n'] => line.len() - 2,
        [.., b'\n'] => line.len() - 1,
        _ => line.len(),
    };
    line.split_at(body_len)
}

/// Returns the `index`-th field of a record body, or an error naming how many
/// fields the record actually has.
pub fn field(body: &[u8], index: usize) -> Result<&[u8], RecordError> {
    fields(body)
        .nth(index)
        .ok_or_else(|| RecordError::FieldOutOfRange {
            index,
            fields: fields(body).count(),
        })
}

/// Rewrites `line` with the field at `field_index` replaced by its country
/// code, appending the result to `out`.
///
/// The field count and the line terminator are preserved exactly. Unknown
/// addresses, empty codes and non-UTF-8 fields become [`UNKNOWN_COUNTRY`].
///
/// # Errors
///
/// Returns [`RecordError::FieldOutOfRange`] if the record has too few fields.
/// Nothing is written to `out` in that case.
pub fn rewrite_line<L>(
    line: &[u8],
    field_index: usize,
    lookup: &L,
    out: &mut Vec<u8>,
) -> Result<Rewrite, RecordError>
where
    L: CountryLookup + ?Sized,
{
    let (body, terminator) = split_terminator(line);
    let key = field(body, field_index)?;

    let (replacement, outcome) = match core::str::from_utf8(key)
        .ok()
        .and_then(|key| lookup.country(key))
        .filter(|code| !code.is_empty())
    {
        Some(code) => (code, Rewrite::Resolved),
        None => (UNKNOWN_COUNTRY, Rewrite::Unresolved),
    };

    out.reserve(line.len() + replacement.len());
    for (i, value) in fields(body).enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        if i == field_index {
            out.extend_from_slice(replacement.as_bytes());
        } else {
            out.extend_from_slice(value);
        }
    }
    out.extend_from_slice(terminator);

    Ok(outcome)
}

fn fields(body: &[u8]) -> impl Iterator<Item = &[u8]> {
    body.split(|&b| b == DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup() -> HashMap<String, String> {
        HashMap::from([
            ("1.2.3.4".to_owned(), "US".to_owned()),
            ("5.6.7.8".to_owned(), "DE".to_owned()),
            ("0.0.0.0".to_owned(), String::new()),
        ])
    }

    fn rewrite(line: &str, index: usize) -> (Result<Rewrite, RecordError>, String) {
        let mut out = Vec::new();
        let outcome = rewrite_line(line.as_bytes(), index, &lookup(), &mut out);
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn replaces_known_address() {
        let (outcome, out) = rewrite("alpha|1.2.3.4|x\n", 1);
        assert_eq!(outcome, Ok(Rewrite::Resolved));
        assert_eq!(out, "alpha|US|x\n");
    }

    #[test]
    fn unknown_address_becomes_sentinel() {
        let (outcome, out) = rewrite("alpha|9.9.9.9|x\n", 1);
        assert_eq!(outcome, Ok(Rewrite::Unresolved));
        assert_eq!(out, "alpha|--|x\n");

        let (outcome, out) = rewrite("alpha|0.0.0.0|x\n", 1);
        assert_eq!(outcome, Ok(Rewrite::Unresolved));
        assert_eq!(out, "alpha|--|x\n");
    }

    #[test]
    fn last_field_lookup_ignores_terminator() {
        let (outcome, out) = rewrite("a|b|5.6.7.8\r\n", 2);
        assert_eq!(outcome, Ok(Rewrite::Resolved));
        assert_eq!(out, "a|b|DE\r\n");

        let (_, out) = rewrite("1.2.3.4", 0);
        assert_eq!(out, "US");
    }

    #[test]
    fn field_count_is_preserved() {
        for line in ["|||\n", "a||1.2.3.4||\n", "x|y|z|w\n", "|\n"] {
            let (body, _) = split_terminator(line.as_bytes());
            let before = fields(body).count();
            let mut out = Vec::new();
            rewrite_line(line.as_bytes(), 1, &lookup(), &mut out).unwrap();
            let (body, terminator) = split_terminator(&out);
            assert_eq!(fields(body).count(), before, "{line:?}");
            assert_eq!(terminator, b"\n");
        }
    }

    #[test]
    fn out_of_range_field_writes_nothing() {
        let (outcome, out) = rewrite("alpha|1.2.3.4\n", 2);
        assert_eq!(
            outcome,
            Err(RecordError::FieldOutOfRange {
                index: 2,
                fields: 2
            })
        );
        assert!(out.is_empty());
    }

    #[test]
    fn non_utf8_key_is_a_miss() {
        let mut out = Vec::new();
        let outcome = rewrite_line(b"\xff\xfe|\xc3\x28|z\n", 1, &lookup(), &mut out);
        assert_eq!(outcome, Ok(Rewrite::Unresolved));
        assert_eq!(out, b"\xff\xfe|--|z\n");
    }

    #[test]
    fn split_terminator_variants() {
        assert_eq!(split_terminator(b"a|b\n"), (&b"a|b"[..], &b"\n"[..]));
        assert_eq!(split_terminator(b"a|b\r\n"), (&b"a|b"[..], &b"\r\n"[..]));
        assert_eq!(split_terminator(b"a|b"), (&b"a|b"[..], &b""[..]));
        assert_eq!(split_terminator(b""), (&b""[..], &b""[..]));
    }
}
