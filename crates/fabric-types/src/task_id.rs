//! The structured task identifier.
//!
//! The wire format is the colon-separated grammar from the spec:
//!
//! ```text
//! [!:]F:<client-local-id>:S<serverId>:<universeSerial>:U<universeSerial>
//!      [:P<spaceId>:<spaceSerial>][:C<computerId>][:W<workerId>]
//! ```
//!
//! Everything after parsing works against the typed `TaskId` record; the
//! string form is only produced at an RPC or checkpoint boundary.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskIdParseError {
    #[error("empty task id")]
    Empty,
    #[error("missing client tag 'F'")]
    MissingClientTag,
    #[error("malformed segment: {0}")]
    MalformedSegment(String),
    #[error("missing required segment: {0}")]
    MissingSegment(&'static str),
}

/// A fully- or partially-routed task identifier.
///
/// `space`/`computer_id`/`worker_id` are `None` until the corresponding tier
/// has routed the task; appending a tier's marker is idempotent (calling
/// `with_space` on an id that already carries a `:P` segment is a no-op).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TaskId {
    pub successor: bool,
    pub client_task_id: u64,
    pub server_id: u32,
    pub universe_seq: u64,
    pub space: Option<(u32, u64)>,
    pub computer_id: Option<u32>,
    pub worker_id: Option<u32>,
}

impl TaskId {
    /// Construct the id the moment a raw client task is accepted into the
    /// Universe ready queue — the Server Proxy's send-task responsibility.
    pub fn assign_universe(client_task_id: u64, server_id: u32, universe_seq: u64) -> Self {
        Self {
            successor: false,
            client_task_id,
            server_id,
            universe_seq,
            space: None,
            computer_id: None,
            worker_id: None,
        }
    }

    pub fn has_space(&self) -> bool {
        self.space.is_some()
    }

    pub fn has_computer(&self) -> bool {
        self.computer_id.is_some()
    }

    /// Idempotent: a no-op if this id already carries a `:P` segment.
    #[must_use]
    pub fn with_space(&self, space_id: u32, space_seq: u64) -> Self {
        let mut next = self.clone();
        if next.space.is_none() {
            next.space = Some((space_id, space_seq));
        }
        next
    }

    /// Idempotent: a no-op if this id already carries a `:C` segment.
    #[must_use]
    pub fn with_computer(&self, computer_id: u32) -> Self {
        let mut next = self.clone();
        if next.computer_id.is_none() {
            next.computer_id = Some(computer_id);
        }
        next
    }

    #[must_use]
    pub fn with_worker(&self, worker_id: u32) -> Self {
        let mut next = self.clone();
        next.worker_id = Some(worker_id);
        next
    }

    /// Strip the `:C…` (and `:W…`) suffix so the Space sees the
    /// pre-assignment form of the id, per the Computer Proxy's forwarding
    /// contract.
    #[must_use]
    pub fn strip_computer(&self) -> Self {
        let mut next = self.clone();
        next.computer_id = None;
        next.worker_id = None;
        next
    }

    #[must_use]
    pub fn as_successor(&self) -> Self {
        let mut next = self.clone();
        next.successor = true;
        next
    }

    pub fn owning_server_id(&self) -> u32 {
        self.server_id
    }

    pub fn owning_computer_id(&self) -> Option<u32> {
        self.computer_id
    }

    pub fn owning_space_id(&self) -> Option<u32> {
        self.space.map(|(id, _)| id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.successor {
            write!(f, "!:")?;
        }
        write!(
            f,
            "F:{}:S{}:{}:U{}",
            self.client_task_id, self.server_id, self.universe_seq, self.universe_seq
        )?;
        if let Some((space_id, space_seq)) = self.space {
            write!(f, ":P{}:{}", space_id, space_seq)?;
        }
        if let Some(computer_id) = self.computer_id {
            write!(f, ":C{}", computer_id)?;
        }
        if let Some(worker_id) = self.worker_id {
            write!(f, ":W{}", worker_id)?;
        }
        Ok(())
    }
}

impl FromStr for TaskId {
    type Err = TaskIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(TaskIdParseError::Empty);
        }
        let mut tokens = s.split(':').peekable();

        let successor = if tokens.peek() == Some(&"!") {
            tokens.next();
            true
        } else {
            false
        };

        if tokens.next() != Some("F") {
            return Err(TaskIdParseError::MissingClientTag);
        }

        let client_task_id = tokens
            .next()
            .ok_or(TaskIdParseError::MissingSegment("client-local-id"))?
            .parse()
            .map_err(|_| TaskIdParseError::MalformedSegment("client-local-id".into()))?;

        let server_id = parse_tagged(
            tokens
                .next()
                .ok_or(TaskIdParseError::MissingSegment("S<n>"))?,
            'S',
        )?;

        // The universe serial is written twice on the wire (bare, then
        // `U`-tagged); both carry the same value, so only the tagged one is
        // kept in the typed record.
        let _bare_universe_seq: u64 = tokens
            .next()
            .ok_or(TaskIdParseError::MissingSegment("<universeSerial>"))?
            .parse()
            .map_err(|_| TaskIdParseError::MalformedSegment("universeSerial".into()))?;

        let universe_seq = parse_tagged(
            tokens
                .next()
                .ok_or(TaskIdParseError::MissingSegment("U<n>"))?,
            'U',
        )?;

        let mut id = TaskId {
            successor,
            client_task_id,
            server_id: server_id as u32,
            universe_seq,
            space: None,
            computer_id: None,
            worker_id: None,
        };

        // Remaining optional segments: P<id> then a bare seq, C<id>, W<id>.
        let mut rest: Vec<&str> = tokens.collect();
        let mut i = 0;
        if i < rest.len() && rest[i].starts_with('P') {
            let space_id = parse_tagged(rest[i], 'P')? as u32;
            i += 1;
            let space_seq: u64 = rest
                .get(i)
                .ok_or(TaskIdParseError::MissingSegment("<spaceSerial>"))?
                .parse()
                .map_err(|_| TaskIdParseError::MalformedSegment("spaceSerial".into()))?;
            i += 1;
            id.space = Some((space_id, space_seq));
        }
        if i < rest.len() && rest[i].starts_with('C') {
            id.computer_id = Some(parse_tagged(rest[i], 'C')? as u32);
            i += 1;
        }
        if i < rest.len() && rest[i].starts_with('W') {
            id.worker_id = Some(parse_tagged(rest[i], 'W')? as u32);
            i += 1;
        }
        rest.drain(..i);
        if !rest.is_empty() {
            return Err(TaskIdParseError::MalformedSegment(rest.join(":")));
        }

        Ok(id)
    }
}

fn parse_tagged(segment: &str, tag: char) -> Result<u64, TaskIdParseError> {
    let stripped = segment
        .strip_prefix(tag)
        .ok_or_else(|| TaskIdParseError::MalformedSegment(segment.to_string()))?;
    stripped
        .parse()
        .map_err(|_| TaskIdParseError::MalformedSegment(segment.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_minimal_form() {
        let id = TaskId::assign_universe(1, 0, 1);
        let s = id.to_string();
        assert_eq!(s, "F:1:S0:1:U1");
        assert_eq!(s.parse::<TaskId>().unwrap(), id);
    }

    #[test]
    fn round_trips_fully_routed_successor_form() {
        let s = "!:F:1:S0:1:U1:P0:5:C2:W1";
        let id: TaskId = s.parse().unwrap();
        assert!(id.successor);
        assert_eq!(id.space, Some((0, 5)));
        assert_eq!(id.computer_id, Some(2));
        assert_eq!(id.worker_id, Some(1));
        assert_eq!(id.to_string(), s);
    }

    #[test]
    fn with_space_is_idempotent() {
        let id = TaskId::assign_universe(1, 0, 1).with_space(3, 9);
        let same = id.with_space(99, 99);
        assert_eq!(same.space, Some((3, 9)));
    }

    #[test]
    fn strip_computer_clears_c_and_w() {
        let id = TaskId::assign_universe(1, 0, 1)
            .with_space(0, 0)
            .with_computer(4)
            .with_worker(2);
        let stripped = id.strip_computer();
        assert!(stripped.computer_id.is_none());
        assert!(stripped.worker_id.is_none());
        assert!(stripped.has_space());
    }

    #[test]
    fn rejects_missing_client_tag() {
        assert_eq!(
            "X:1:S0:1:U1".parse::<TaskId>().unwrap_err(),
            TaskIdParseError::MissingClientTag
        );
    }

    proptest::proptest! {
        #[test]
        fn roundtrip_is_lossless(
            client_task_id in 0u64..1_000_000,
            server_id in 0u32..1000,
            universe_seq in 0u64..1_000_000,
            has_space in proptest::bool::ANY,
            space_id in 0u32..100,
            space_seq in 0u64..1_000_000,
            has_computer in proptest::bool::ANY,
            computer_id in 0u32..100,
            successor in proptest::bool::ANY,
        ) {
            let mut id = TaskId::assign_universe(client_task_id, server_id, universe_seq);
            if has_space {
                id = id.with_space(space_id, space_seq);
            }
            if has_computer {
                id = id.with_computer(computer_id);
            }
            if successor {
                id = id.as_successor();
            }
            let rendered = id.to_string();
            let parsed: TaskId = rendered.parse().unwrap();
            prop_assert_eq!(parsed, id);
        }
    }
}
