use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Returns an `InvalidArgument` error named `$name` from the enclosing function
/// unless `$cond` holds.
#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $cond:expr) => {
        if !($cond) {
            return Err($crate::result::arg_violation($name, stringify!($cond)));
        }
    };
}

/// Returns an `InvalidFormat` error for the element `$element` from the enclosing
/// function unless `$cond` holds. Used where decoded bytes must satisfy a bound
/// before they are sliced.
#[macro_export]
macro_rules! verify_data {
    ($element:expr, $cond:expr) => {
        if !($cond) {
            return Err($crate::result::format_violation($element, stringify!($cond)));
        }
    };
}

#[cold]
pub fn arg_violation(name: &str, condition: &str) -> Error {
    Error::invalid_arg(name, format!("expected {condition}"))
}

#[cold]
pub fn format_violation(element: &str, condition: &str) -> Error {
    Error::invalid_format_msg(element, format!("expected {condition}"))
}
