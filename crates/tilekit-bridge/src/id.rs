use std::fmt;
use std::str::FromStr;

/// Whether a registered callable runs synchronously on the dispatching
/// thread or on a separate task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallMode {
    Blocking,
    NonBlocking,
}

/// Session-scoped callback identifier.
///
/// The epoch ties an identifier to the bridge that minted it; a dispatch
/// compares epochs instead of relying on object identity, so stubs held by
/// a superseded session fail fast. Sequence numbers are never reused
/// within an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId {
    pub epoch: u64,
    pub mode: CallMode,
    pub seq: u64,
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            CallMode::Blocking => "blocking",
            CallMode::NonBlocking => "nonblocking",
        };
        write!(f, "{mode}_{}_{}", self.epoch, self.seq)
    }
}

impl FromStr for CallbackId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mode, rest) = if let Some(rest) = s.strip_prefix("blocking_") {
            (CallMode::Blocking, rest)
        } else if let Some(rest) = s.strip_prefix("nonblocking_") {
            (CallMode::NonBlocking, rest)
        } else {
            return Err(());
        };
        let (epoch, seq) = rest.split_once('_').ok_or(())?;
        Ok(CallbackId {
            epoch: epoch.parse().map_err(|_| ())?,
            mode,
            seq: seq.parse().map_err(|_| ())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_round_trip() {
        let id = CallbackId {
            epoch: 3,
            mode: CallMode::NonBlocking,
            seq: 17,
        };
        let text = id.to_string();
        assert_eq!(text, "nonblocking_3_17");
        assert_eq!(text.parse::<CallbackId>().unwrap(), id);
    }

    #[test]
    fn malformed_identifiers_fail_to_parse() {
        assert!("".parse::<CallbackId>().is_err());
        assert!("blocking_".parse::<CallbackId>().is_err());
        assert!("blocking_1".parse::<CallbackId>().is_err());
        assert!("sync_1_2".parse::<CallbackId>().is_err());
        assert!("blocking_x_2".parse::<CallbackId>().is_err());
    }
}
