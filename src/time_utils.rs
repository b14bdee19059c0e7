// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Timestamp rendering for log lines and outgoing email.

use chrono::{DateTime, SecondsFormat, Utc};

/// Machine-readable timestamp for structured logs, e.g. `2026-10-16T09:30:00Z`.
pub fn log_timestamp(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Reader-facing date and time for email bodies, e.g. `October 23, 2026 at 09:30 UTC`.
pub fn email_timestamp(date: DateTime<Utc>) -> String {
    date.format("%B %-d, %Y at %H:%M UTC").to_string()
}
