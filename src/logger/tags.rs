/// Log tags for every PaperBot subsystem
///
/// Each tag maps to a --debug-<module> flag via `to_debug_key()`.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Ledger,
    Trading,
    Pending,
    Monkey,
    Commands,
    Market,
    Archive,
    Test,
    Other(String),
}

impl LogTag {
    /// Key used for --debug-<key> flag matching and file output
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Ledger => "ledger".to_string(),
            LogTag::Trading => "trading".to_string(),
            LogTag::Pending => "pending".to_string(),
            LogTag::Monkey => "monkey".to_string(),
            LogTag::Commands => "commands".to_string(),
            LogTag::Market => "market".to_string(),
            LogTag::Archive => "archive".to_string(),
            LogTag::Test => "test".to_string(),
            LogTag::Other(s) => s.to_lowercase(),
        }
    }

    /// Plain uppercase name for file logging (no ANSI codes)
    pub fn to_plain_string(&self) -> String {
        self.to_debug_key().to_uppercase()
    }
}
