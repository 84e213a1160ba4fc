// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for booth attendants.
//
// Every error code maps to a short message and a concrete suggestion in the
// attendant's language. The technical cause travels separately in
// `ErrorReport::cause`.

use crate::types::{ErrorCode, Locale};

/// Operator-facing text for one error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanError {
    /// Plain-language summary.
    pub message: &'static str,
    /// What the attendant should try.
    pub suggestion: &'static str,
}

/// Look up the message for `code` in `locale`.
pub fn humanize(code: ErrorCode, locale: Locale) -> HumanError {
    match locale {
        Locale::EsMx => spanish(code),
        Locale::EnUs => english(code),
    }
}

fn spanish(code: ErrorCode) -> HumanError {
    match code {
        ErrorCode::DeviceNotFound => HumanError {
            message: "No se encontró la impresora.",
            suggestion: "Revise que esté encendida y que el cable USB esté conectado.",
        },
        ErrorCode::ConnectionFailed => HumanError {
            message: "No fue posible conectar con la impresora.",
            suggestion: "Se reintentará automáticamente. Si persiste, apague y encienda la impresora.",
        },
        ErrorCode::ConnectionLost => HumanError {
            message: "Se perdió la conexión con la impresora.",
            suggestion: "Los boletos quedan en espera y se imprimirán al reconectar.",
        },
        ErrorCode::WriteFailed => HumanError {
            message: "La impresora no pudo imprimir el boleto.",
            suggestion: "Revise el papel, la tapa y que no haya atascos.",
        },
        ErrorCode::QueueFull => HumanError {
            message: "Hay demasiados boletos en espera de impresión.",
            suggestion: "Reconecte la impresora o vacíe la cola antes de continuar.",
        },
        ErrorCode::InvalidConfig => HumanError {
            message: "La configuración de la impresora no es válida.",
            suggestion: "Revise el tipo de conexión, el puerto y el nombre de la cola.",
        },
    }
}

fn english(code: ErrorCode) -> HumanError {
    match code {
        ErrorCode::DeviceNotFound => HumanError {
            message: "The printer could not be found.",
            suggestion: "Make sure it is switched on and the USB cable is plugged in.",
        },
        ErrorCode::ConnectionFailed => HumanError {
            message: "Could not connect to the printer.",
            suggestion: "We'll keep retrying. If this continues, power-cycle the printer.",
        },
        ErrorCode::ConnectionLost => HumanError {
            message: "The connection to the printer was lost.",
            suggestion: "Tickets are held and will print once the printer is back.",
        },
        ErrorCode::WriteFailed => HumanError {
            message: "The printer could not print the ticket.",
            suggestion: "Check the paper roll, close the cover and clear any jam.",
        },
        ErrorCode::QueueFull => HumanError {
            message: "Too many tickets are waiting to print.",
            suggestion: "Reconnect the printer or clear the queue before continuing.",
        },
        ErrorCode::InvalidConfig => HumanError {
            message: "The printer settings are not valid.",
            suggestion: "Check the connection type, port and spooler queue name.",
        },
    }
}
