use tracing::{info, warn};

use crate::activity::ActivityKind;
use crate::grouping::ActivityIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

/// Where user-facing notices go. Callers inject an implementation rather
/// than reaching for a global.
pub trait Notifier {
    fn notify(&self, notice: Notice);
}

/// Sends notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Info => info!("{}", notice.message),
            Severity::Warning => warn!("{}", notice.message),
        }
    }
}

/// Emits one warning per activity kind that had items left off the
/// calendar. Returns how many notices were sent.
pub fn report_skipped(index: &ActivityIndex, notifier: &dyn Notifier) -> usize {
    let mut sent = 0;
    for kind in ActivityKind::ALL {
        let tally = index.skipped(kind);
        if tally.total() == 0 {
            continue;
        }
        notifier.notify(Notice {
            severity: Severity::Warning,
            message: format!(
                "{} {} not shown: {} without {}, {} with an unreadable {}",
                tally.total(),
                kind.plural(),
                tally.missing,
                kind.timestamp_field(),
                tally.unparseable,
                kind.timestamp_field()
            ),
        });
        sent += 1;
    }
    sent
}
