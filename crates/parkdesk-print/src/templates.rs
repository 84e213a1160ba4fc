// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Receipt templates.
//
// One pure function per receipt kind, producing the text that is queued and
// later handed to the ESC/POS encoder. Every line is centered to the paper
// width; lines wider than the paper are kept whole.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use parkdesk_core::config::{Branding, PrinterConfig};
use parkdesk_core::receipts::{
    EntryTicket, LostTicketReceipt, PartnerTicket, PaymentReceipt, PensionReceipt,
};
use parkdesk_core::types::Locale;

use crate::escpos;

/// Layout parameters shared by every template.
#[derive(Debug, Clone)]
pub struct ReceiptStyle {
    pub columns: usize,
    pub locale: Locale,
    pub branding: Branding,
}

impl ReceiptStyle {
    pub fn from_config(config: &PrinterConfig) -> Self {
        Self {
            columns: config.columns,
            locale: config.locale,
            branding: config.branding.clone(),
        }
    }

    fn labels(&self) -> &'static Labels {
        match self.locale {
            Locale::EsMx => &ES_MX,
            Locale::EnUs => &EN_US,
        }
    }
}

struct Labels {
    entry_title: &'static str,
    payment_title: &'static str,
    lost_title: &'static str,
    pension_title: &'static str,
    partner_title: &'static str,
    test_title: &'static str,
    folio: &'static str,
    plate: &'static str,
    vehicle: &'static str,
    entry: &'static str,
    exit: &'static str,
    duration: &'static str,
    total: &'static str,
    paid: &'static str,
    change: &'static str,
    method: &'static str,
    operator: &'static str,
    customer: &'static str,
    period: &'static str,
    fee: &'static str,
    penalty: &'static str,
    issued: &'static str,
    benefit: &'static str,
    printed: &'static str,
    transport: &'static str,
    columns: &'static str,
    unknown: &'static str,
    keep_ticket: &'static str,
    thanks: &'static str,
    test_ok: &'static str,
}

const ES_MX: Labels = Labels {
    entry_title: "BOLETO DE ENTRADA",
    payment_title: "RECIBO DE PAGO",
    lost_title: "BOLETO EXTRAVIADO",
    pension_title: "RECIBO DE PENSION",
    partner_title: "BOLETO CONVENIO",
    test_title: "PAGINA DE PRUEBA",
    folio: "Folio",
    plate: "Placa",
    vehicle: "Vehiculo",
    entry: "Entrada",
    exit: "Salida",
    duration: "Tiempo",
    total: "Total",
    paid: "Pago",
    change: "Cambio",
    method: "Forma de pago",
    operator: "Atendio",
    customer: "Cliente",
    period: "Periodo",
    fee: "Estancia",
    penalty: "Cargo por extravio",
    issued: "Emitido",
    benefit: "Beneficio",
    printed: "Impreso",
    transport: "Conexion",
    columns: "Columnas",
    unknown: "No registrada",
    keep_ticket: "Conserve su boleto",
    thanks: "Gracias por su visita",
    test_ok: "Impresora funcionando correctamente",
};

const EN_US: Labels = Labels {
    entry_title: "ENTRY TICKET",
    payment_title: "PAYMENT RECEIPT",
    lost_title: "LOST TICKET",
    pension_title: "MONTHLY PASS RECEIPT",
    partner_title: "PARTNER TICKET",
    test_title: "TEST PAGE",
    folio: "Ticket",
    plate: "Plate",
    vehicle: "Vehicle",
    entry: "Entry",
    exit: "Exit",
    duration: "Duration",
    total: "Total",
    paid: "Paid",
    change: "Change",
    method: "Payment method",
    operator: "Cashier",
    customer: "Customer",
    period: "Period",
    fee: "Parking fee",
    penalty: "Lost ticket fee",
    issued: "Issued",
    benefit: "Benefit",
    printed: "Printed",
    transport: "Connection",
    columns: "Columns",
    unknown: "Not recorded",
    keep_ticket: "Keep this ticket",
    thanks: "Thank you for your visit",
    test_ok: "Printer is working correctly",
};

/// Accumulates centered lines.
struct Receipt<'a> {
    style: &'a ReceiptStyle,
    lines: Vec<String>,
}

impl<'a> Receipt<'a> {
    /// Bordered header; ends with the blank line the encoder uses as the
    /// header boundary.
    fn with_header(style: &'a ReceiptStyle, title: &str) -> Self {
        let mut receipt = Self {
            style,
            lines: Vec::new(),
        };
        receipt.border('=');
        receipt.text(&style.branding.business_name);
        if let Some(address) = &style.branding.address {
            receipt.text(address);
        }
        receipt.line(title);
        receipt.border('=');
        receipt.lines.push(String::new());
        receipt
    }

    fn line(&mut self, text: &str) -> &mut Self {
        self.lines.push(center(text, self.style.columns));
        self
    }

    /// Caller-supplied text on a line of its own. Blank values are skipped
    /// so they cannot end the header early.
    fn text(&mut self, text: &str) -> &mut Self {
        let text = plain(text.trim());
        if !text.is_empty() {
            self.line(text);
        }
        self
    }

    fn field(&mut self, label: &str, value: &str) -> &mut Self {
        self.line(&format!("{label}: {value}"))
    }

    fn border(&mut self, c: char) -> &mut Self {
        self.lines
            .push(std::iter::repeat_n(c, self.style.columns).collect());
        self
    }

    fn barcode(&mut self, payload: &str) -> &mut Self {
        self.line(&format!("*{payload}*"))
    }

    fn footer(mut self, closing: &str) -> String {
        self.border('-');
        self.line(closing);
        for extra in &self.style.branding.footer {
            self.lines.push(center(plain(extra), self.style.columns));
        }
        self.lines.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

pub fn entry_ticket(style: &ReceiptStyle, data: &EntryTicket) -> String {
    let l = style.labels();
    let mut r = Receipt::with_header(style, l.entry_title);
    r.barcode(&data.barcode)
        .field(l.folio, &data.ticket_number)
        .field(l.plate, &data.plate);
    if let Some(vehicle) = &data.vehicle_type {
        r.field(l.vehicle, vehicle);
    }
    r.field(l.entry, &format_datetime(data.entry_time, style.locale));
    r.footer(l.keep_ticket)
}

pub fn payment_receipt(style: &ReceiptStyle, data: &PaymentReceipt) -> String {
    let l = style.labels();
    let loc = style.locale;
    let mut r = Receipt::with_header(style, l.payment_title);
    r.field(l.folio, &data.ticket_number)
        .field(l.plate, &data.plate)
        .field(l.entry, &format_datetime(data.entry_time, loc))
        .field(l.exit, &format_datetime(data.exit_time, loc))
        .field(l.duration, &format_duration(data.entry_time, data.exit_time))
        .border('-')
        .field(l.total, &format_money(data.amount))
        .field(l.paid, &format_money(data.amount_paid))
        .field(l.change, &format_money(data.change()));
    if let Some(method) = &data.payment_method {
        r.field(l.method, method);
    }
    if let Some(operator) = &data.operator {
        r.field(l.operator, operator);
    }
    r.footer(l.thanks)
}

pub fn lost_ticket_receipt(style: &ReceiptStyle, data: &LostTicketReceipt) -> String {
    let l = style.labels();
    let loc = style.locale;
    let mut r = Receipt::with_header(style, l.lost_title);
    r.field(l.plate, &data.plate);
    if let Some(customer) = &data.customer_name {
        r.field(l.customer, customer);
    }
    match data.entry_time {
        Some(entry) => {
            r.field(l.entry, &format_datetime(entry, loc))
                .field(l.duration, &format_duration(entry, data.issued_at));
        }
        None => {
            r.field(l.entry, l.unknown);
        }
    }
    r.field(l.issued, &format_datetime(data.issued_at, loc))
        .border('-')
        .field(l.fee, &format_money(data.parking_fee))
        .field(l.penalty, &format_money(data.penalty))
        .field(l.total, &format_money(data.total()));
    r.footer(l.thanks)
}

pub fn pension_receipt(style: &ReceiptStyle, data: &PensionReceipt) -> String {
    let l = style.labels();
    let loc = style.locale;
    let period = format!(
        "{} - {}",
        format_date(data.period_start, loc),
        format_date(data.period_end, loc)
    );
    let mut r = Receipt::with_header(style, l.pension_title);
    r.barcode(&data.barcode)
        .field(l.folio, &data.folio)
        .field(l.customer, &data.customer_name)
        .field(l.plate, &data.plate)
        .field(l.period, &period)
        .field(l.paid, &format_datetime(data.paid_at, loc))
        .border('-')
        .field(l.total, &format_money(data.amount));
    r.footer(l.thanks)
}

pub fn partner_ticket(style: &ReceiptStyle, data: &PartnerTicket) -> String {
    let l = style.labels();
    let mut r = Receipt::with_header(style, l.partner_title);
    r.barcode(&data.barcode)
        .text(&data.partner_name)
        .field(l.folio, &data.ticket_number)
        .field(l.plate, &data.plate)
        .field(l.entry, &format_datetime(data.entry_time, style.locale));
    if let Some(benefit) = &data.benefit {
        r.field(l.benefit, benefit);
    }
    r.footer(l.keep_ticket)
}

/// Self-test page showing the active connection and layout.
pub fn test_receipt(style: &ReceiptStyle, printed_at: NaiveDateTime, transport: &str) -> String {
    let l = style.labels();
    let mut r = Receipt::with_header(style, l.test_title);
    r.line(l.test_ok)
        .field(l.printed, &format_datetime(printed_at, style.locale))
        .field(l.transport, transport)
        .field(l.columns, &style.columns.to_string())
        .line("0123456789 ABCDEFGHIJ áéíóú ñ");
    r.footer(l.thanks)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Free text that would be read as a barcode marker loses its asterisks.
fn plain(text: &str) -> &str {
    if escpos::barcode_marker(text).is_some() {
        text.trim().trim_matches('*')
    } else {
        text
    }
}

/// Left-pad `text` so it sits in the middle of a `columns`-wide line.
pub fn center(text: &str, columns: usize) -> String {
    let width = text.chars().count();
    if width >= columns {
        return text.to_string();
    }
    let pad = (columns - width) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

/// Currency with thousands separators, e.g. `$1,234.50`. Pesos and dollars
/// share the same layout.
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{sign}${grouped}.{frac_part}")
}

pub fn format_datetime(at: NaiveDateTime, locale: Locale) -> String {
    match locale {
        Locale::EsMx => at.format("%d/%m/%Y %H:%M").to_string(),
        Locale::EnUs => at.format("%m/%d/%Y %I:%M %p").to_string(),
    }
}

pub fn format_date(date: NaiveDate, locale: Locale) -> String {
    match locale {
        Locale::EsMx => date.format("%d/%m/%Y").to_string(),
        Locale::EnUs => date.format("%m/%d/%Y").to_string(),
    }
}

/// Elapsed time as `1 d 2 h 05 min`; negative spans count as zero.
pub fn format_duration(from: NaiveDateTime, to: NaiveDateTime) -> String {
    let minutes = (to - from).num_minutes().max(0);
    let (days, hours, mins) = (minutes / 1440, (minutes % 1440) / 60, minutes % 60);
    if days > 0 {
        format!("{days} d {hours} h {mins:02} min")
    } else if hours > 0 {
        format!("{hours} h {mins:02} min")
    } else {
        format!("{mins} min")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("datetime")
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("decimal")
    }

    fn style() -> ReceiptStyle {
        ReceiptStyle::from_config(&PrinterConfig::default())
    }

    fn entry() -> EntryTicket {
        EntryTicket {
            ticket_number: "T-001".into(),
            plate: "ABC123".into(),
            entry_time: at("2026-05-01 08:15"),
            vehicle_type: Some("Auto".into()),
            barcode: "T-001".into(),
        }
    }

    #[test]
    fn center_pads_left_only() {
        assert_eq!(center("abcd", 10), "   abcd");
        assert_eq!(center("ñandú", 9), "  ñandú");
    }

    #[test]
    fn center_never_truncates() {
        let long = "x".repeat(40);
        assert_eq!(center(&long, 32), long);
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(dec("1234.5")), "$1,234.50");
        assert_eq!(format_money(dec("0")), "$0.00");
        assert_eq!(format_money(dec("999")), "$999.00");
        assert_eq!(format_money(dec("1234567.891")), "$1,234,567.89");
        assert_eq!(format_money(dec("-20")), "-$20.00");
    }

    #[test]
    fn datetime_by_locale() {
        let t = at("2026-05-01 14:05");
        assert_eq!(format_datetime(t, Locale::EsMx), "01/05/2026 14:05");
        assert_eq!(format_datetime(t, Locale::EnUs), "05/01/2026 02:05 PM");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(at("2026-05-01 08:00"), at("2026-05-01 08:45")), "45 min");
        assert_eq!(format_duration(at("2026-05-01 08:00"), at("2026-05-01 10:05")), "2 h 05 min");
        assert_eq!(format_duration(at("2026-05-01 08:00"), at("2026-05-02 09:30")), "1 d 1 h 30 min");
        assert_eq!(format_duration(at("2026-05-01 10:00"), at("2026-05-01 08:00")), "0 min");
    }

    #[test]
    fn entry_ticket_layout() {
        let text = entry_ticket(&style(), &entry());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "=".repeat(32));
        assert_eq!(lines[1].trim(), "ESTACIONAMIENTO");
        assert_eq!(lines[2].trim(), "BOLETO DE ENTRADA");
        assert_eq!(lines[3], "=".repeat(32));
        assert_eq!(lines[4], "");
        assert_eq!(lines[5].trim(), "*T-001*");
        assert!(text.contains("Placa: ABC123"));
        assert!(text.contains("Entrada: 01/05/2026 08:15"));
        assert!(text.contains("Vehiculo: Auto"));
        assert!(lines.last().is_some_and(|l| l.contains("Conserve su boleto")));
    }

    #[test]
    fn payment_receipt_amounts() {
        let data = PaymentReceipt {
            ticket_number: "T-002".into(),
            plate: "XYZ987".into(),
            entry_time: at("2026-05-01 08:00"),
            exit_time: at("2026-05-01 10:30"),
            amount: dec("45"),
            amount_paid: dec("100"),
            payment_method: Some("Efectivo".into()),
            operator: None,
        };
        let text = payment_receipt(&style(), &data);
        assert!(text.contains("Tiempo: 2 h 30 min"));
        assert!(text.contains("Total: $45.00"));
        assert!(text.contains("Cambio: $55.00"));
        assert!(text.contains("Forma de pago: Efectivo"));
        assert!(!text.contains("Atendio"));
        assert!(!text.contains('*'));
    }

    #[test]
    fn lost_ticket_without_entry_time() {
        let data = LostTicketReceipt {
            plate: "JKL456".into(),
            customer_name: Some("Ana López".into()),
            entry_time: None,
            issued_at: at("2026-05-01 19:00"),
            parking_fee: dec("80"),
            penalty: dec("150"),
        };
        let text = lost_ticket_receipt(&style(), &data);
        assert!(text.contains("Entrada: No registrada"));
        assert!(text.contains("Cliente: Ana López"));
        assert!(text.contains("Total: $230.00"));
    }

    #[test]
    fn pension_and_partner_carry_barcodes() {
        let pension = PensionReceipt {
            folio: "P-77".into(),
            customer_name: "Luis Pérez".into(),
            plate: "MNO321".into(),
            period_start: NaiveDate::from_ymd_opt(2026, 5, 1).expect("date"),
            period_end: NaiveDate::from_ymd_opt(2026, 5, 31).expect("date"),
            amount: dec("1500"),
            paid_at: at("2026-05-01 09:00"),
            barcode: "P-77".into(),
        };
        let text = pension_receipt(&style(), &pension);
        assert!(text.contains("*P-77*"));
        assert!(text.contains("Periodo: 01/05/2026 - 31/05/2026"));
        assert!(text.contains("Total: $1,500.00"));

        let partner = PartnerTicket {
            partner_name: "Cafe Central".into(),
            ticket_number: "C-9".into(),
            plate: "QRS111".into(),
            entry_time: at("2026-05-01 12:00"),
            benefit: Some("2 horas gratis".into()),
            barcode: "C-9".into(),
        };
        let text = partner_ticket(&style(), &partner);
        assert!(text.contains("*C-9*"));
        assert!(text.contains("Cafe Central"));
        assert!(text.contains("Beneficio: 2 horas gratis"));
    }

    #[test]
    fn blank_address_does_not_end_header() {
        let mut style = style();
        style.branding.address = Some("  ".into());
        let text = entry_ticket(&style, &entry());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[2].trim(), "BOLETO DE ENTRADA");
        let first_blank = lines.iter().position(|l| l.trim().is_empty());
        assert_eq!(first_blank, Some(4));
    }

    #[test]
    fn free_text_is_never_a_barcode() {
        let mut style = style();
        style.branding.footer = vec!["*PROMO10*".into()];
        let partner = PartnerTicket {
            partner_name: "*VIP*".into(),
            ticket_number: "C-9".into(),
            plate: "QRS111".into(),
            entry_time: at("2026-05-01 12:00"),
            benefit: None,
            barcode: "C-9".into(),
        };
        let text = partner_ticket(&style, &partner);
        let (codes, _) = escpos::extract_barcodes(&text);
        assert_eq!(codes, vec!["C-9"]);
        assert!(text.lines().any(|l| l.trim() == "VIP"));
        assert!(text.lines().any(|l| l.trim() == "PROMO10"));
    }

    #[test]
    fn english_labels_and_branding() {
        let mut config = PrinterConfig {
            locale: Locale::EnUs,
            columns: 48,
            ..Default::default()
        };
        config.branding.business_name = "DOWNTOWN PARKING".into();
        config.branding.address = Some("12 Main St".into());
        config.branding.footer = vec!["Open 24h".into()];

        let text = entry_ticket(&ReceiptStyle::from_config(&config), &entry());
        assert!(text.contains("ENTRY TICKET"));
        assert!(text.contains("12 Main St"));
        assert!(text.contains("Plate: ABC123"));
        assert!(text.ends_with("Open 24h"));
        assert_eq!(text.lines().next(), Some("=".repeat(48).as_str()));
    }

    #[test]
    fn test_page_mentions_transport() {
        let text = test_receipt(&style(), at("2026-05-01 07:00"), "tcp:10.0.0.5:9100");
        assert!(text.contains("PAGINA DE PRUEBA"));
        assert!(text.contains("Conexion: tcp:10.0.0.5:9100"));
        assert!(text.contains("Columnas: 32"));
    }
}
