//! Decides which side of a file wins a synchronization.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStrategy {
    /// Any concurrent change on both sides is a conflict.
    #[default]
    LastRemoteModificationWins,
    /// The newer side wins outright.
    LastModificationWins,
}

impl SyncStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "last-remote" | "last-remote-modification" => {
                Some(SyncStrategy::LastRemoteModificationWins)
            }
            "last-modification" => Some(SyncStrategy::LastModificationWins),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncResolution {
    /// Upload the local copy.
    Local,
    /// Download the remote copy.
    Remote,
    Equal,
    Conflict,
}

/// Compare modification instants (epoch millis) of the local copy, the
/// last remote state both sides agreed on and the current remote copy.
///
/// Total over every combination of present and absent inputs.
pub fn resolve(
    local: Option<i64>,
    last_remote: Option<i64>,
    remote: Option<i64>,
    strategy: SyncStrategy,
) -> SyncResolution {
    let (local_changed, remote_changed) = match (local, remote, last_remote) {
        // Nothing agreed on yet: the two sides are compared directly.
        (Some(l), Some(r), None) => (l > r, r > l),
        (l, r, base) => (
            l.is_some_and(|l| base.map_or(true, |b| l > b)),
            r.is_some_and(|r| base.map_or(true, |b| r != b)),
        ),
    };

    match (local_changed, remote_changed) {
        (false, false) => SyncResolution::Equal,
        (true, false) => SyncResolution::Local,
        (false, true) => SyncResolution::Remote,
        (true, true) => match strategy {
            SyncStrategy::LastRemoteModificationWins => SyncResolution::Conflict,
            SyncStrategy::LastModificationWins => newer_side(local, remote),
        },
    }
}

fn newer_side(local: Option<i64>, remote: Option<i64>) -> SyncResolution {
    match (local, remote) {
        (Some(l), Some(r)) if l > r => SyncResolution::Local,
        (Some(l), Some(r)) if r > l => SyncResolution::Remote,
        (Some(_), None) => SyncResolution::Local,
        (None, Some(_)) => SyncResolution::Remote,
        _ => SyncResolution::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SyncResolution::*;
    use SyncStrategy::*;

    #[test]
    fn reference_orderings() {
        // (local, last confirmed remote, current remote)
        assert_eq!(resolve(Some(100), Some(50), Some(50), LastRemoteModificationWins), Local);
        assert_eq!(resolve(Some(50), Some(50), Some(100), LastRemoteModificationWins), Remote);
        assert_eq!(resolve(Some(100), Some(50), Some(100), LastRemoteModificationWins), Conflict);
        assert_eq!(resolve(Some(50), Some(50), Some(50), LastRemoteModificationWins), Equal);
    }

    #[test]
    fn only_local_changed_uploads() {
        assert_eq!(resolve(Some(200), Some(100), Some(100), LastRemoteModificationWins), Local);
    }

    #[test]
    fn only_remote_changed_downloads() {
        assert_eq!(resolve(Some(100), Some(100), Some(150), LastRemoteModificationWins), Remote);
    }

    #[test]
    fn both_changed_is_conflict_under_last_remote() {
        assert_eq!(
            resolve(Some(200), Some(100), Some(150), LastRemoteModificationWins),
            Conflict
        );
    }

    #[test]
    fn both_changed_newer_wins_under_last_modification() {
        assert_eq!(resolve(Some(200), Some(100), Some(150), LastModificationWins), Local);
        assert_eq!(resolve(Some(120), Some(100), Some(150), LastModificationWins), Remote);
        assert_eq!(resolve(Some(150), Some(100), Some(150), LastModificationWins), Equal);
    }

    #[test]
    fn untouched_file_is_equal() {
        assert_eq!(resolve(Some(100), Some(100), Some(100), LastRemoteModificationWins), Equal);
    }

    #[test]
    fn no_common_base_compares_sides() {
        assert_eq!(resolve(Some(300), None, Some(100), LastRemoteModificationWins), Local);
        assert_eq!(resolve(Some(100), None, Some(300), LastRemoteModificationWins), Remote);
        assert_eq!(resolve(Some(100), None, Some(100), LastRemoteModificationWins), Equal);
    }

    #[test]
    fn missing_sides() {
        assert_eq!(resolve(None, None, Some(100), LastRemoteModificationWins), Remote);
        assert_eq!(resolve(Some(100), None, None, LastRemoteModificationWins), Local);
        assert_eq!(resolve(None, None, None, LastRemoteModificationWins), Equal);
        assert_eq!(resolve(None, Some(5), None, LastRemoteModificationWins), Equal);
        assert_eq!(resolve(None, Some(5), Some(9), LastRemoteModificationWins), Remote);
    }

    #[test]
    fn every_combination_resolves() {
        let values = [None, Some(1), Some(2), Some(3)];
        for strategy in [LastRemoteModificationWins, LastModificationWins] {
            for local in values {
                for remote in values {
                    for base in values {
                        let resolution = resolve(local, base, remote, strategy);
                        if strategy == LastModificationWins {
                            assert_ne!(resolution, Conflict);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn parse_strategy_names() {
        assert_eq!(SyncStrategy::parse("last-remote"), Some(LastRemoteModificationWins));
        assert_eq!(SyncStrategy::parse("last-modification"), Some(LastModificationWins));
        assert_eq!(SyncStrategy::parse("newest"), None);
    }
}
