// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parkdesk Print: thermal receipt printer driver.  Renders receipts, encodes
// them as ESC/POS, queues them while the printer is away and delivers them
// over a USB character device, raw TCP or the OS print spooler.

pub mod connection;
pub mod driver;
pub mod escpos;
pub mod health;
pub mod locator;
pub mod queue;
pub mod retry;
pub mod spooler;
pub mod templates;
pub mod transport;

#[cfg(test)]
mod mock;

pub use driver::PrinterDriver;
pub use locator::TransportTarget;
pub use queue::PrintQueue;
pub use transport::{SystemTransport, Transport};
