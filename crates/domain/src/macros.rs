//! Macro for implementing Display and FromStr for configuration enums
//!
//! Configuration enums are written in files as snake_case strings and may be
//! overridden from environment variables, so both directions share one
//! mapping table.
//!
//! # Example
//!
//! ```rust
//! use authkeep_domain::impl_config_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Transport {
//!     Loopback,
//!     CustomScheme,
//! }
//!
//! impl_config_enum_conversions!(Transport {
//!     Loopback => "loopback",
//!     CustomScheme => "custom_scheme",
//! });
//!
//! assert_eq!("LOOPBACK".parse::<Transport>(), Ok(Transport::Loopback));
//! assert_eq!(Transport::CustomScheme.to_string(), "custom_scheme");
//! ```

/// Implements Display and FromStr for a fieldless configuration enum
///
/// * Display writes the mapped string
/// * FromStr trims surrounding whitespace and matches case-insensitively,
///   accepting `-` in place of `_`
#[macro_export]
macro_rules! impl_config_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                let normalized = s.trim().to_lowercase().replace('-', "_");
                match normalized.as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!(
                        "Invalid {}: '{}' (expected one of: {})",
                        stringify!($enum_name),
                        s,
                        [$($str),+].join(", ")
                    )),
                }
            }
        }
    };
}
