/// Generates an enum of wire-format names together with its parse-error type.
///
/// Expands to the enum with `as_str()` (const), `Display`, `AsRef<str>` and a
/// case-insensitive `FromStr`, plus a tuple-struct error carrying the
/// unrecognized input.
///
/// # Example
///
/// ```ignore
/// wire_name_enum! {
///     /// Doc comment for the enum.
///     pub enum MyName {
///         Foo => "Foo-Wire",
///         Bar => "Bar-Wire",
///     }
///     /// Doc comment for the error.
///     pub error ParseMyNameError = "unknown name";
/// }
/// ```
macro_rules! wire_name_enum {
    (
        $(#[$enum_meta:meta])*
        $vis:vis enum $Name:ident {
            $(
                $(#[$var_meta:meta])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
        $(#[$err_meta:meta])*
        $err_vis:vis error $Err:ident = $unknown:literal;
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        $vis enum $Name {
            $(
                $(#[$var_meta])*
                $variant,
            )+
        }

        impl $Name {
            /// Wire-format name string.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( $Name::$variant => $wire, )+
                }
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::str::FromStr for $Name {
            type Err = $Err;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( _ if s.eq_ignore_ascii_case($wire) => Ok($Name::$variant), )+
                    _ => Err($Err(s.to_string())),
                }
            }
        }

        $(#[$err_meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        $err_vis struct $Err(pub String);

        impl std::fmt::Display for $Err {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($unknown, ": {}"), self.0)
            }
        }

        impl std::error::Error for $Err {}
    };
}
