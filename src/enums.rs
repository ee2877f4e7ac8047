//! 文字列値を持つ列挙型
//!
//! サービスの列挙値は JSON 上では文字列で、将来追加される値もある。
//! 既知の値はバリアントに、未知の値は `Unknown(String)` にそのまま保持する。

/// 文字列値の列挙型を宣言する
///
/// ```
/// awsjson_client::string_enum!(
///     /// 色
///     Color {
///         Red => "RED",
///         Blue => "BLUE",
///     }
/// );
///
/// assert_eq!(Color::from("RED"), Color::Red);
/// assert_eq!(Color::from("GREEN").as_str(), "GREEN");
/// assert_eq!(serde_json::to_string(&Color::Blue).unwrap(), r#""BLUE""#);
/// ```
#[macro_export]
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
            /// 未知の値
            Unknown(String),
        }

        impl $name {
            /// 既知の値の一覧
            pub const VALUES: &'static [&'static str] = &[$($value),*];

            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $value,)*
                    $name::Unknown(value) => value.as_str(),
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                match value {
                    $($value => $name::$variant,)*
                    other => $name::Unknown(other.to_string()),
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($name::from(s))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $crate::__serde::Serialize for $name {
            fn serialize<S: $crate::__serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(self.as_str())
            }
        }

        impl<'de> $crate::__serde::Deserialize<'de> for $name {
            fn deserialize<D: $crate::__serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let value = <String as $crate::__serde::Deserialize>::deserialize(d)?;
                Ok($name::from(value.as_str()))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    crate::string_enum!(Mode {
        Fast => "FAST",
        Slow => "SLOW",
    });

    #[test]
    fn test_known_and_unknown_values() {
        assert_eq!(Mode::from("FAST"), Mode::Fast);
        assert_eq!(Mode::from("fast"), Mode::Unknown("fast".to_string()));
        assert_eq!(Mode::Slow.to_string(), "SLOW");
        assert_eq!(Mode::VALUES, &["FAST", "SLOW"]);
    }

    #[test]
    fn test_unknown_value_survives_json() {
        let parsed: Vec<Mode> = serde_json::from_str(r#"["SLOW","TURBO"]"#).unwrap();
        assert_eq!(parsed, vec![Mode::Slow, Mode::Unknown("TURBO".to_string())]);
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"["SLOW","TURBO"]"#
        );
    }
}
