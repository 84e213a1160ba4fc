// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ESC/POS encoder.
//
// Turns rendered receipt text into the byte stream the printer executes:
// initialise, select character set, barcodes, text, feed, cut. Barcode
// markers (`*PAYLOAD*` lines) are lifted out of the text and printed as
// CODE39 right after the header block, which is where thermal firmware
// renders them reliably.

use std::borrow::Cow;

use parkdesk_core::types::{
    CoverStatus, CutterStatus, Locale, PaperStatus, ProbeReport, TemperatureStatus, TextEncoding,
};

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;
pub const FS: u8 = 0x1C;
pub const DLE: u8 = 0x10;
pub const EOT: u8 = 0x04;
pub const LF: u8 = 0x0A;

/// ESC @: reset the printer to power-on defaults.
pub const INIT: [u8; 2] = [ESC, b'@'];
/// GS V 0: full cut.
pub const CUT_FULL: [u8; 3] = [GS, b'V', 0x00];
/// GS k 69: CODE39 barcode, length-prefixed form.
pub const BARCODE_CODE39: [u8; 3] = [GS, b'k', 69];

/// Blank lines fed before the cut so the last line clears the cutter.
pub const FEED_LINES: usize = 4;

/// Largest barcode the length byte can describe.
const MAX_BARCODE_LEN: usize = 255;

/// How text is turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeOptions {
    pub locale: Locale,
    pub encoding: TextEncoding,
}

/// Encode rendered receipt text as a complete ESC/POS job.
pub fn encode(content: &str, opts: &EncodeOptions) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 64);

    out.extend_from_slice(&INIT);
    select_character_set(&mut out, opts);

    let (barcodes, body) = extract_barcodes(content);

    match header_boundary(&body) {
        Some(boundary) if !barcodes.is_empty() => {
            write_lines(&mut out, &body[..=boundary], opts.encoding);
            for payload in &barcodes {
                write_barcode(&mut out, payload);
            }
            write_lines(&mut out, &body[boundary + 1..], opts.encoding);
        }
        _ => {
            // No blank line after the header: barcodes go first.
            for payload in &barcodes {
                write_barcode(&mut out, payload);
            }
            write_lines(&mut out, &body, opts.encoding);
        }
    }

    out.extend(std::iter::repeat_n(LF, FEED_LINES));
    out.extend_from_slice(&CUT_FULL);
    out
}

/// International character set (`ESC R`) plus code table for the encoding.
fn select_character_set(out: &mut Vec<u8>, opts: &EncodeOptions) {
    let charset = match opts.locale {
        Locale::EsMx => 12, // Latin America
        Locale::EnUs => 0,  // U.S.A.
    };
    out.extend_from_slice(&[ESC, b'R', charset]);

    match opts.encoding {
        // FS ( C pL pH fn=48 m=2: UTF-8 encoding system
        TextEncoding::Utf8 => out.extend_from_slice(&[FS, b'(', b'C', 0x02, 0x00, 0x30, 0x02]),
        // ESC t 16: WPC1252
        TextEncoding::Windows1252 => out.extend_from_slice(&[ESC, b't', 16]),
        // FS & + FS C 1: double-byte mode, GBK
        TextEncoding::Gbk => out.extend_from_slice(&[FS, b'&', FS, b'C', 0x01]),
    }
}

/// Split out barcode marker lines. Returns the payloads in document order and
/// the remaining lines.
pub fn extract_barcodes(content: &str) -> (Vec<String>, Vec<&str>) {
    let mut barcodes = Vec::new();
    let mut body = Vec::new();

    for line in content.lines() {
        match barcode_marker(line) {
            Some(payload) => barcodes.push(payload.to_string()),
            None => body.push(line),
        }
    }

    (barcodes, body)
}

/// `*PAYLOAD*` on a line of its own (surrounding padding allowed) whose
/// payload CODE39 can carry. Anything else stays text.
pub(crate) fn barcode_marker(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let payload = trimmed.strip_prefix('*')?.strip_suffix('*')?;
    let valid = !payload.is_empty()
        && trimmed.len() <= MAX_BARCODE_LEN
        && payload.chars().all(is_code39);
    valid.then_some(payload)
}

/// Characters in the CODE39 set, start/stop `*` excluded.
fn is_code39(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | '-' | '.' | '$' | '/' | '+' | '%' | ' ')
}

/// Index of the blank line that closes the header block.
fn header_boundary(lines: &[&str]) -> Option<usize> {
    lines.iter().position(|line| line.trim().is_empty())
}

/// GS k 69 n *payload* LF, then the payload as readable text.
fn write_barcode(out: &mut Vec<u8>, payload: &str) {
    let delimited = format!("*{payload}*");
    out.extend_from_slice(&BARCODE_CODE39);
    out.push(delimited.len() as u8);
    out.extend_from_slice(delimited.as_bytes());
    out.push(LF);
    out.extend_from_slice(payload.as_bytes());
    out.push(LF);
}

fn write_lines(out: &mut Vec<u8>, lines: &[&str], encoding: TextEncoding) {
    for line in lines {
        out.extend_from_slice(&encode_text(line, encoding));
        out.push(LF);
    }
}

/// Encode text for the selected code table. Characters the table cannot
/// represent become `?`.
pub fn encode_text(text: &str, encoding: TextEncoding) -> Cow<'_, [u8]> {
    let table = match encoding {
        TextEncoding::Utf8 => return Cow::Borrowed(text.as_bytes()),
        TextEncoding::Windows1252 => encoding_rs::WINDOWS_1252,
        TextEncoding::Gbk => encoding_rs::GBK,
    };

    let (bytes, _, had_errors) = table.encode(text);
    if !had_errors {
        return bytes;
    }

    let mut out = Vec::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let (bytes, _, unmappable) = table.encode(c.encode_utf8(&mut buf));
        if unmappable {
            out.push(b'?');
        } else {
            out.extend_from_slice(&bytes);
        }
    }
    Cow::Owned(out)
}

// ---------------------------------------------------------------------------
// Real-time status (DLE EOT n)
// ---------------------------------------------------------------------------

/// DLE EOT n request for status byte `n` (1..=4).
pub fn status_request(n: u8) -> [u8; 3] {
    [DLE, EOT, n]
}

/// Status bytes always have bit 1 and bit 4 set, bit 0 and bit 7 clear.
fn is_status_byte(b: u8) -> bool {
    b & 0x93 == 0x12
}

/// Decode replies to DLE EOT 1 (printer), 2 (offline cause), 3 (error cause)
/// and 4 (paper roll). Missing or malformed replies leave the sensor unknown.
pub fn decode_status(replies: [Option<u8>; 4]) -> ProbeReport {
    let [printer, offline, error, paper] = replies.map(|r| r.filter(|b| is_status_byte(*b)));
    let mut report = ProbeReport::alive();

    if let Some(b) = printer {
        report.online = b & 0x08 == 0;
    }
    if let Some(b) = offline {
        report.cover = if b & 0x04 != 0 {
            CoverStatus::Open
        } else {
            CoverStatus::Closed
        };
        if b & 0x20 != 0 {
            report.paper = PaperStatus::Empty;
        }
    }
    if let Some(b) = error {
        report.cutter = if b & 0x08 != 0 {
            CutterStatus::Error
        } else {
            CutterStatus::Ok
        };
        report.temperature = if b & 0x40 != 0 {
            TemperatureStatus::High
        } else {
            TemperatureStatus::Normal
        };
    }
    if let Some(b) = paper {
        report.paper = if b & 0x60 != 0 {
            PaperStatus::Empty
        } else if b & 0x0C != 0 {
            PaperStatus::NearEnd
        } else if report.paper == PaperStatus::Empty {
            PaperStatus::Empty
        } else {
            PaperStatus::Ok
        };
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
        haystack
            .windows(needle.len())
            .enumerate()
            .filter(|(_, w)| *w == needle)
            .map(|(i, _)| i)
            .collect()
    }

    const RECEIPT: &str = "================\n   ESTACIONAMIENTO\n================\n\n    *T-001*\nFolio: T-001\nPlaca: ABC123\n";

    #[test]
    fn starts_with_init_and_ends_with_cut() {
        let bytes = encode("hola", &EncodeOptions::default());
        assert!(bytes.starts_with(&INIT));
        assert!(bytes.ends_with(&CUT_FULL));
        let feed = [LF; FEED_LINES];
        assert!(bytes[..bytes.len() - CUT_FULL.len()].ends_with(&feed));
    }

    #[test]
    fn selects_latin_america_and_utf8() {
        let bytes = encode("", &EncodeOptions::default());
        assert_eq!(&bytes[2..5], &[ESC, b'R', 12]);
        assert_eq!(&bytes[5..12], &[FS, b'(', b'C', 0x02, 0x00, 0x30, 0x02]);
    }

    #[test]
    fn barcode_hoisted_after_header() {
        let bytes = encode(RECEIPT, &EncodeOptions::default());

        let blocks = find(&bytes, &BARCODE_CODE39);
        assert_eq!(blocks.len(), 1);
        let at = blocks[0];
        assert_eq!(bytes[at + 3], 7);
        assert_eq!(&bytes[at + 4..at + 11], b"*T-001*");
        assert_eq!(&bytes[at + 11..at + 18], b"\nT-001\n");

        // Header text precedes the barcode, the body follows it.
        let header = find(&bytes, b"ESTACIONAMIENTO")[0];
        let body = find(&bytes, b"Placa: ABC123")[0];
        assert!(header < at && at < body);

        // The marker itself is gone.
        assert!(find(&bytes, b"    *T-001*").is_empty());
    }

    #[test]
    fn barcode_prepended_without_blank_line() {
        let bytes = encode("TITLE\n*X1*\nbody", &EncodeOptions::default());
        let at = find(&bytes, &BARCODE_CODE39)[0];
        let title = find(&bytes, b"TITLE")[0];
        assert!(at < title);
    }

    #[test]
    fn multiple_markers_keep_document_order() {
        let (codes, body) = extract_barcodes("head\n\n*A1*\ntext\n*B2*");
        assert_eq!(codes, vec!["A1", "B2"]);
        assert_eq!(body, vec!["head", "", "text"]);
    }

    #[test]
    fn decorations_are_not_markers() {
        let (codes, body) = extract_barcodes("****\n**\n* spaced *\n*OK*");
        assert_eq!(codes, vec!["OK"]);
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn payload_outside_code39_stays_text() {
        let (codes, body) = extract_barcodes("*t-001*\n*A_1*\n*T-001 $5.00*");
        assert_eq!(codes, vec!["T-001 $5.00"]);
        assert_eq!(body, vec!["*t-001*", "*A_1*"]);
    }

    #[test]
    fn rendered_entry_ticket_gets_one_barcode_after_header() {
        use crate::templates::{self, ReceiptStyle};
        use chrono::NaiveDateTime;
        use parkdesk_core::config::PrinterConfig;
        use parkdesk_core::receipts::EntryTicket;

        let ticket = EntryTicket {
            ticket_number: "T-001".into(),
            plate: "ABC123".into(),
            entry_time: NaiveDateTime::parse_from_str("2026-05-01 08:15", "%Y-%m-%d %H:%M")
                .expect("datetime"),
            vehicle_type: None,
            barcode: "T-001".into(),
        };
        let style = ReceiptStyle::from_config(&PrinterConfig::default());
        let bytes = encode(
            &templates::entry_ticket(&style, &ticket),
            &EncodeOptions::default(),
        );

        let blocks = find(&bytes, &BARCODE_CODE39);
        assert_eq!(blocks.len(), 1);
        let at = blocks[0];
        assert_eq!(bytes[at + 3], 7);
        assert_eq!(&bytes[at + 4..at + 11], b"*T-001*");
        assert_eq!(&bytes[at + 11..at + 18], b"\nT-001\n");

        let title = find(&bytes, b"BOLETO DE ENTRADA")[0];
        let plate = find(&bytes, b"Placa:")[0];
        assert!(title < at && at < plate);
    }

    #[test]
    fn oversized_marker_stays_text() {
        let long = format!("*{}*", "9".repeat(300));
        let (codes, body) = extract_barcodes(&long);
        assert!(codes.is_empty());
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn windows_1252_replaces_unmappable() {
        let bytes = encode_text("Año 中", TextEncoding::Windows1252);
        assert_eq!(bytes.as_ref(), &[b'A', 0xF1, b'o', b' ', b'?']);
    }

    #[test]
    fn utf8_is_passthrough() {
        let bytes = encode_text("Pensión", TextEncoding::Utf8);
        assert_eq!(bytes.as_ref(), "Pensión".as_bytes());
    }

    #[test]
    fn decode_healthy_printer() {
        let report = decode_status([Some(0x12), Some(0x12), Some(0x12), Some(0x12)]);
        assert!(report.online);
        assert_eq!(report.paper, PaperStatus::Ok);
        assert_eq!(report.cover, CoverStatus::Closed);
        assert_eq!(report.cutter, CutterStatus::Ok);
        assert_eq!(report.temperature, TemperatureStatus::Normal);
    }

    #[test]
    fn decode_cover_open_and_paper_out() {
        let report = decode_status([Some(0x1A), Some(0x16), None, Some(0x72)]);
        assert!(!report.online);
        assert_eq!(report.cover, CoverStatus::Open);
        assert_eq!(report.paper, PaperStatus::Empty);
        assert_eq!(report.cutter, CutterStatus::Unknown);
    }

    #[test]
    fn decode_ignores_garbage() {
        let report = decode_status([Some(0xFF), None, None, Some(0x00)]);
        assert!(report.online);
        assert_eq!(report.paper, PaperStatus::Unknown);
    }
}
