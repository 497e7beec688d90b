pub mod comment;
pub mod post;

mod text;

use crate::{
    model::{
        comment::InvalidCommentTextError,
        post::{InvalidCaptionError, InvalidImageKeyError},
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt::Display, marker::PhantomData, num::ParseIntError, str::FromStr};
use thiserror::Error;
use time::{OffsetDateTime, macros::datetime};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    ImageKey(#[from] InvalidImageKeyError),
    #[error(transparent)]
    Caption(#[from] InvalidCaptionError),
    #[error(transparent)]
    CommentText(#[from] InvalidCommentTextError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct SnapfeedEpoch;
impl Epoch for SnapfeedEpoch {
    const EPOCH_TIME: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);
}

pub type SnapfeedSnowflake = Snowflake<SnapfeedEpoch>;
pub type SnapfeedSnowflakeGenerator = SnowflakeGenerator<SnapfeedEpoch>;

/// A typed snowflake id.
///
/// Crosses the JSON boundary as a decimal string so clients without 64 bit
/// integers keep full precision.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Id<Marker>(SnapfeedSnowflake, PhantomData<Marker>);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum InvalidIdError {
    #[error("Malformed id {input:?}: {source}")]
    NotANumber { input: String, source: ParseIntError },
    /// Input with a sign or leading zeros.
    #[error("Id {input:?} is not written in canonical decimal form")]
    NonCanonical { input: String },
}

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: SnapfeedSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> SnapfeedSnowflake {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let snowflake =
            SnapfeedSnowflake::from_str(s).map_err(|source| InvalidIdError::NotANumber {
                input: s.to_owned(),
                source,
            })?;

        if snowflake.to_string() != s {
            return Err(InvalidIdError::NonCanonical {
                input: s.to_owned(),
            });
        }

        Ok(Self::new(snowflake))
    }
}

impl<Marker> From<SnapfeedSnowflake> for Id<Marker> {
    fn from(value: SnapfeedSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(SnapfeedSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

impl<Marker> Serialize for Id<Marker> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de, Marker> Deserialize<'de> for Id<Marker> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        inner.parse().map_err(serde::de::Error::custom)
    }
}
