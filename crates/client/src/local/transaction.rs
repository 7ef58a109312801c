/// How a local-table transaction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome<T> {
    Committed(T),
    /// Rolled back; nothing to report.
    Aborted,
    /// Rolled back because the operation cannot be answered offline.
    RequiresOnline,
}

impl<T> TransactionOutcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    pub fn committed(self) -> Option<T> {
        match self {
            Self::Committed(value) => Some(value),
            Self::Aborted | Self::RequiresOnline => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TransactionOutcome<U> {
        match self {
            Self::Committed(value) => TransactionOutcome::Committed(f(value)),
            Self::Aborted => TransactionOutcome::Aborted,
            Self::RequiresOnline => TransactionOutcome::RequiresOnline,
        }
    }
}
