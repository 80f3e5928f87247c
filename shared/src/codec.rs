//! Wire encodings for event payloads.
//!
//! `Json` is the structured text format used for gameplay and control
//! events. `Binary` is a bincode body followed by a big-endian CRC32 of that
//! body, used for the high-volume game log stream.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Json,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value could not be turned into bytes.
    Serialize(String),
    /// The bytes do not hold a valid payload of the expected type.
    MalformedPayload(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Serialize(reason) => write!(f, "failed to serialize payload: {reason}"),
            CodecError::MalformedPayload(reason) => write!(f, "malformed payload: {reason}"),
        }
    }
}

impl std::error::Error for CodecError {}

impl Encoding {
    pub const fn content_type(self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::Binary => "application/x-peril-bincode",
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        [Encoding::Json, Encoding::Binary]
            .into_iter()
            .find(|encoding| encoding.content_type() == content_type)
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Encoding::Json => {
                serde_json::to_vec(value).map_err(|e| CodecError::Serialize(e.to_string()))
            }
            Encoding::Binary => {
                let mut frame =
                    bincode::serialize(value).map_err(|e| CodecError::Serialize(e.to_string()))?;
                let checksum = crc32fast::hash(&frame);
                frame.extend_from_slice(&checksum.to_be_bytes());
                Ok(frame)
            }
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Encoding::Json => serde_json::from_slice(bytes)
                .map_err(|e| CodecError::MalformedPayload(e.to_string())),
            Encoding::Binary => {
                let Some(body_len) = bytes.len().checked_sub(CHECKSUM_LEN) else {
                    return Err(CodecError::MalformedPayload(format!(
                        "binary frame of {} bytes is shorter than its checksum",
                        bytes.len()
                    )));
                };
                let (body, trailer) = bytes.split_at(body_len);
                let mut expected = [0u8; CHECKSUM_LEN];
                expected.copy_from_slice(trailer);
                let expected = u32::from_be_bytes(expected);
                let actual = crc32fast::hash(body);
                if actual != expected {
                    return Err(CodecError::MalformedPayload(format!(
                        "checksum mismatch: frame says {expected:#010x}, body hashes to {actual:#010x}"
                    )));
                }
                bincode::deserialize(body).map_err(|e| CodecError::MalformedPayload(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use serde::Serialize;
    use serde::de::DeserializeOwned;

    use super::{CodecError, Encoding};
    use crate::model::{
        ArmyMove, GameLog, Player, PlayingState, RecognitionOfWar, Territory, UnitRank,
    };

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + Debug,
    {
        for encoding in [Encoding::Json, Encoding::Binary] {
            let bytes = encoding.encode(value).expect("payload should encode");
            let decoded: T = encoding.decode(&bytes).expect("payload should decode");
            assert_eq!(&decoded, value, "{encoding:?} round trip changed the value");
        }
    }

    fn player(username: &str, territory: &str, units: &[UnitRank]) -> Player {
        let mut player = Player::new(username);
        player.reinforce(territory, units);
        player
    }

    #[test]
    fn event_payloads_survive_both_encodings() {
        let alice = player("alice", "europe", &[UnitRank::Cavalry, UnitRank::Infantry]);
        let bob = player("bob", "asia", &[UnitRank::Artillery]);

        assert_round_trip(&ArmyMove {
            player: alice.clone(),
            territory: Territory::new("asia", [UnitRank::Cavalry]),
        });
        assert_round_trip(&RecognitionOfWar {
            attacker: alice,
            defender: bob,
            territory: "asia".to_string(),
        });
        assert_round_trip(&PlayingState { is_paused: true });
        assert_round_trip(&GameLog::new("alice", "alice won a war against bob"));
    }

    #[test]
    fn json_uses_camel_case_pause_field() {
        let bytes = Encoding::Json
            .encode(&PlayingState { is_paused: false })
            .expect("pause should encode");
        assert_eq!(bytes, br#"{"isPaused":false}"#);
    }

    #[test]
    fn binary_rejects_corrupted_body() {
        let mut bytes = Encoding::Binary
            .encode(&GameLog::new("alice", "hello"))
            .expect("log should encode");
        bytes[0] ^= 0xff;

        let err = Encoding::Binary
            .decode::<GameLog>(&bytes)
            .expect_err("corruption should be detected");
        assert!(matches!(err, CodecError::MalformedPayload(_)));
    }

    #[test]
    fn binary_rejects_truncated_frame() {
        let err = Encoding::Binary
            .decode::<GameLog>(&[1, 2])
            .expect_err("short frame should fail");
        assert!(matches!(err, CodecError::MalformedPayload(_)));
    }

    #[test]
    fn json_rejects_payload_of_the_wrong_shape() {
        let err = Encoding::Json
            .decode::<ArmyMove>(br#"{"isPaused":true}"#)
            .expect_err("pause payload is not a move");
        assert!(matches!(err, CodecError::MalformedPayload(_)));
    }

    #[test]
    fn content_types_map_back_to_encodings() {
        for encoding in [Encoding::Json, Encoding::Binary] {
            assert_eq!(
                Encoding::from_content_type(encoding.content_type()),
                Some(encoding)
            );
        }
        assert_eq!(Encoding::from_content_type("text/plain"), None);
    }
}
