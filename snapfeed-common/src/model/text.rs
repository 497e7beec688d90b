/// Declares a trimmed, non-empty, length-limited string newtype together with
/// its validation error.
///
/// Length is counted in `char`s. Deserialization goes through the same
/// validation as `new`.
macro_rules! validated_text {
    (
        $(#[$meta:meta])*
        $name:ident, $error:ident, max_len = $max_len:path,
        missing = $missing:literal, too_long = $too_long:literal $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, ::thiserror::Error)]
        pub enum $error {
            #[error($missing)]
            Missing,
            #[error($too_long)]
            TooLong,
        }

        impl $name {
            pub fn new(raw: &str) -> Result<Self, $error> {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Err($error::Missing)
                } else if trimmed.chars().count() > $max_len {
                    Err($error::TooLong)
                } else {
                    Ok(Self(trimmed.to_owned()))
                }
            }

            #[must_use]
            pub fn get(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = $error;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(&value)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let inner = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                Self::new(&inner).map_err(::serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use validated_text;
