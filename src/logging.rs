//! Logging front end
//!
//! Log lines go to `defmt` on the watch and to `log` on the host. Without either feature the
//! macros still evaluate their arguments but print nothing.

cfg_if::cfg_if! {
    if #[cfg(feature = "defmt")] {
        pub(crate) use defmt::{debug, info, trace, warn};
    } else if #[cfg(feature = "log")] {
        pub(crate) use log::{debug, info, trace, warn};
    } else {
        macro_rules! discard {
            ($fmt:literal $(, $arg:expr)* $(,)?) => {{
                $( let _ = &$arg; )*
            }};
        }

        // `warn` is also a built-in attribute, so none of these are defined under their own name
        macro_rules! trace_ {
            ($($arg:tt)*) => { $crate::logging::discard!($($arg)*) };
        }
        macro_rules! debug_ {
            ($($arg:tt)*) => { $crate::logging::discard!($($arg)*) };
        }
        macro_rules! info_ {
            ($($arg:tt)*) => { $crate::logging::discard!($($arg)*) };
        }
        macro_rules! warn_ {
            ($($arg:tt)*) => { $crate::logging::discard!($($arg)*) };
        }

        pub(crate) use discard;
        pub(crate) use {debug_ as debug, info_ as info, trace_ as trace, warn_ as warn};
    }
}
