// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Receipt payloads handed to the driver by the business layer.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ticket issued when a vehicle enters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryTicket {
    pub ticket_number: String,
    pub plate: String,
    pub entry_time: NaiveDateTime,
    pub vehicle_type: Option<String>,
    /// Printed as a CODE39 barcode.
    pub barcode: String,
}

/// Receipt for a paid stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub ticket_number: String,
    pub plate: String,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub amount: Decimal,
    pub amount_paid: Decimal,
    pub payment_method: Option<String>,
    pub operator: Option<String>,
}

impl PaymentReceipt {
    /// Change handed back; never negative.
    pub fn change(&self) -> Decimal {
        (self.amount_paid - self.amount).max(Decimal::ZERO)
    }
}

/// Receipt for a stay whose entry ticket was lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LostTicketReceipt {
    pub plate: String,
    pub customer_name: Option<String>,
    /// Entry time if it could be recovered from the entry log.
    pub entry_time: Option<NaiveDateTime>,
    pub issued_at: NaiveDateTime,
    pub parking_fee: Decimal,
    pub penalty: Decimal,
}

impl LostTicketReceipt {
    pub fn total(&self) -> Decimal {
        self.parking_fee + self.penalty
    }
}

/// Receipt for a monthly ("pensión") parking payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PensionReceipt {
    pub folio: String,
    pub customer_name: String,
    pub plate: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub amount: Decimal,
    pub paid_at: NaiveDateTime,
    pub barcode: String,
}

/// Ticket issued to a customer of a partner business with a parking agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerTicket {
    pub partner_name: String,
    pub ticket_number: String,
    pub plate: String,
    pub entry_time: NaiveDateTime,
    /// Agreement shown to the customer, e.g. "2 horas gratis".
    pub benefit: Option<String>,
    pub barcode: String,
}
