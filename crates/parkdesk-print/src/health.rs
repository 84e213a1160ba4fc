// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer health monitor.
//
// A receipt printer gives no notice when it is switched off, unplugged or
// runs out of paper mid-shift. Every interval the monitor probes the open
// session through the connection manager. When the probe fails the monitor
// alone marks the driver disconnected, closes the session and arms the
// reconnect timer; draining stops until a new session is open.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use parkdesk_core::types::{DriverEvent, ErrorClass, ErrorCode, ProbeReport};

use crate::connection::ConnectionState;
use crate::driver::Inner;
use crate::transport::Transport;

/// Time between liveness probes.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Start the probe loop. It ends when the driver is dropped or the handle is
/// aborted.
pub(crate) fn spawn_monitor<T: Transport>(inner: &Arc<Inner<T>>) -> JoinHandle<()> {
    let weak: Weak<Inner<T>> = Arc::downgrade(inner);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.check_health().await;
        }
    })
}

impl<T: Transport> Inner<T> {
    /// One probe. Does nothing unless a session is open.
    pub(crate) async fn check_health(self: &Arc<Self>) {
        if self.lock_state().connection != ConnectionState::Connected {
            return;
        }

        let probe = {
            let mut conn = self.conn.lock().await;
            let probe = match conn.probe().await {
                Ok(report) if report.online => Ok(report),
                Ok(_) => Err("printer reports offline".to_string()),
                Err(e) => Err(e.to_string()),
            };
            if probe.is_err() {
                conn.close().await;
            }
            probe
        };

        let update = {
            let mut st = self.lock_state();
            if st.destroyed || st.connection != ConnectionState::Connected {
                return;
            }
            match &probe {
                Ok(report) => st.status.apply_probe(report),
                Err(cause) => {
                    st.connection = ConnectionState::Error;
                    st.status.apply_probe(&ProbeReport::offline());
                    st.status.connected = false;
                    st.status.last_error = Some(cause.clone());
                }
            }
            st.status.clone()
        };

        match probe {
            Ok(report) => {
                debug!(?report, "printer healthy");
                self.emit(DriverEvent::StatusUpdate(update));
            }
            Err(cause) => {
                warn!(%cause, "printer stopped responding");
                self.emit(DriverEvent::Disconnected);
                self.report(ErrorClass::Connection, ErrorCode::ConnectionLost, cause);
                self.emit(DriverEvent::StatusUpdate(update));
                self.schedule_reconnect();
            }
        }
    }
}
