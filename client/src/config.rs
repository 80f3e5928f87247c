pub const DEFAULT_SPAM_MAX: usize = 1000;

/// Upper bound on the number of log lines one `spam` command may publish.
pub fn spam_max() -> usize {
    std::env::var("PERIL_SPAM_MAX")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SPAM_MAX)
}
