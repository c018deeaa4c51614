//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `relayctl_core::defaults`.

use relayctl_core::defaults;

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_string_fns! {
    default_listen      => DEFAULT_PUBLIC_BIND,
    default_log_path    => LOG_DISABLED,
    default_schema      => SCHEMA_VERSION,
}

pub(crate) fn default_log_level() -> String {
    "warning".to_string()
}

pub(crate) fn default_rule_type() -> String {
    "field".to_string()
}

pub(crate) fn default_domain_strategy() -> String {
    "IPIfNonMatch".to_string()
}
