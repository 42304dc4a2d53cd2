//! Bounds every D-Bus call this crate makes with an explicit deadline, and gives each kind of
//! operation its own default so a slow characteristic read doesn't borrow the patience budgeted
//! for, say, a pairing dialog.

use std::fmt::{self, Display, Formatter};
use std::future::Future;
use std::time::Duration;

use crate::BluetoothError;

/// The category of operation being bounded, used to pick a default deadline.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimeoutCategory {
    Connect,
    Disconnect,
    Pair,
    GetProperty,
    SetProperty,
    Read,
    Write,
    StartNotify,
    StopNotify,
    Default,
}

impl Display for TimeoutCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TimeoutCategory {
    /// The default deadline for this category, per the timeout table.
    pub fn default_duration(&self) -> Duration {
        match self {
            Self::Connect => Duration::from_secs(15),
            Self::Disconnect => Duration::from_secs(5),
            Self::Pair => Duration::from_secs(30),
            Self::GetProperty | Self::SetProperty => Duration::from_secs(5),
            Self::Read | Self::Write => Duration::from_secs(10),
            Self::StartNotify | Self::StopNotify => Duration::from_secs(5),
            Self::Default => Duration::from_secs(10),
        }
    }
}

/// Per-category timeout overrides; falls back to [`TimeoutCategory::default_duration`] for any
/// category not explicitly set.
#[derive(Clone, Debug, Default)]
pub struct TimeoutTable {
    overrides: std::collections::HashMap<&'static str, Duration>,
}

impl TimeoutTable {
    pub fn set(&mut self, category: TimeoutCategory, duration: Duration) {
        self.overrides.insert(category_key(category), duration);
    }

    pub fn get(&self, category: TimeoutCategory) -> Duration {
        self.overrides
            .get(category_key(category))
            .copied()
            .unwrap_or_else(|| category.default_duration())
    }
}

fn category_key(category: TimeoutCategory) -> &'static str {
    match category {
        TimeoutCategory::Connect => "connect",
        TimeoutCategory::Disconnect => "disconnect",
        TimeoutCategory::Pair => "pair",
        TimeoutCategory::GetProperty => "get_property",
        TimeoutCategory::SetProperty => "set_property",
        TimeoutCategory::Read => "read",
        TimeoutCategory::Write => "write",
        TimeoutCategory::StartNotify => "start_notify",
        TimeoutCategory::StopNotify => "stop_notify",
        TimeoutCategory::Default => "default",
    }
}

/// Run `fut` to completion, failing with [`BluetoothError::Timeout`] if it doesn't finish within
/// `table`'s deadline for `category`.
pub async fn with_timeout<T, F>(
    table: &TimeoutTable,
    category: TimeoutCategory,
    fut: F,
) -> Result<T, BluetoothError>
where
    F: Future<Output = Result<T, BluetoothError>>,
{
    match tokio::time::timeout(table.get(category), fut).await {
        Ok(result) => result,
        Err(_) => Err(BluetoothError::Timeout {
            category: category.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_durations() {
        assert_eq!(
            TimeoutCategory::Connect.default_duration(),
            Duration::from_secs(15)
        );
        assert_eq!(
            TimeoutCategory::Read.default_duration(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn override_wins_over_default() {
        let mut table = TimeoutTable::default();
        table.set(TimeoutCategory::Connect, Duration::from_secs(1));
        assert_eq!(table.get(TimeoutCategory::Connect), Duration::from_secs(1));
        assert_eq!(
            table.get(TimeoutCategory::Disconnect),
            TimeoutCategory::Disconnect.default_duration()
        );
    }

    #[tokio::test]
    async fn timeout_fires() {
        let table = TimeoutTable::default();
        let mut table = table;
        table.set(TimeoutCategory::Read, Duration::from_millis(10));
        let result: Result<(), BluetoothError> = with_timeout(&table, TimeoutCategory::Read, async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(BluetoothError::Timeout { .. })));
    }
}
