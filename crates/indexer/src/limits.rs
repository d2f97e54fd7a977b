const MAX_INGEST_CONCURRENCY: usize = 32;

/// Environment override for the number of units parsed at once
pub const INGEST_CONCURRENCY_ENV: &str = "COBOL_LENS_INGEST_CONCURRENCY";

fn default_ingest_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_INGEST_CONCURRENCY)
}

fn parse_ingest_concurrency(raw: Option<&str>, default_value: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, MAX_INGEST_CONCURRENCY)
}

/// Units ingested in parallel: the env override, else one per CPU
pub fn ingest_concurrency() -> usize {
    let raw = std::env::var(INGEST_CONCURRENCY_ENV).ok();
    parse_ingest_concurrency(raw.as_deref(), default_ingest_concurrency())
}

/// Clamp a caller-supplied limit into the supported range
pub(crate) fn clamp_concurrency(limit: usize) -> usize {
    limit.clamp(1, MAX_INGEST_CONCURRENCY)
}
