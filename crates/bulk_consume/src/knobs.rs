//! Env-tunable constants, grounded on the `LazyLock` + `env_config` pattern
//! in the teacher's `common::knobs`. `env_config` itself is `cmd_util`'s, not
//! `common`'s, and `cmd_util` is already a direct dependency of this crate.

use std::{
    sync::LazyLock,
    time::Duration,
};

use cmd_util::env::env_config;

use crate::model::IndexTime;

/// Per-chunk discovery budget for the Range Finder (`spec.md` §4.5 item 4).
pub static CONSUME_BULK_BINARY_SEARCH_TIMEOUT: LazyLock<Duration> =
    LazyLock::new(|| Duration::from_millis(env_config("CONSUME_BULK_BINARY_SEARCH_TIMEOUT_MS", 3_000)));

/// The seed probe's pagination offset (`spec.md` §4.1).
pub static SEED_PROBE_OFFSET: LazyLock<u32> = LazyLock::new(|| env_config("CONSUME_BULK_SEED_PROBE_OFFSET", 1_000));

/// The floor added to `from` when the seed probe's first record collides
/// with `from` itself (`spec.md` §4.2.1 / E6).
pub static SEED_FLOOR_MS: LazyLock<IndexTime> = LazyLock::new(|| env_config("CONSUME_BULK_SEED_FLOOR_MS", 1_729));

/// Used as `chunkSizeHint` when a brand-new session omits `length-hint`.
pub static DEFAULT_CHUNK_SIZE_HINT: LazyLock<u32> =
    LazyLock::new(|| env_config("CONSUME_BULK_DEFAULT_CHUNK_SIZE_HINT", 1_000));

/// Safety margin subtracted from wall-clock `now` so in-flight, not-yet-
/// settled writes near the index's write frontier are never assumed final
/// (`spec.md` §4.2).
pub static INDEX_SETTLE_MARGIN_MS: LazyLock<i64> =
    LazyLock::new(|| env_config("CONSUME_BULK_INDEX_SETTLE_MARGIN_MS", 30_000));

/// Wall-clock milliseconds since the epoch, minus [`INDEX_SETTLE_MARGIN_MS`].
pub fn now_with_settle_margin() -> IndexTime {
    chrono::Utc::now().timestamp_millis() - *INDEX_SETTLE_MARGIN_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_config_falls_back_to_default() {
        assert_eq!(env_config::<u32>("CONSUME_BULK_DOES_NOT_EXIST", 42), 42);
    }
}
