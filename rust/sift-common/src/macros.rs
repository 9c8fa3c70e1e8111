/// Macro for handling `Result<T, E>` in functions that return `Option<Result<T, E>>`.
///
/// - If `expr` evaluates to `Ok(t)`, the macro yields `t`.
/// - If `expr` evaluates to `Err(e)`, the macro causes the enclosing function to
///   return `Some(Err(e))`.
///
/// Used by the record and leaf-scan iterators (`Iterator<Item = Result<T>>`) when
/// they call helpers that return `Result<T>`.
#[macro_export]
macro_rules! try_or_ret_some_err {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => {
                return Some(Err(err.into()));
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{Result, error::Error};

    fn parse_all(items: &[&str]) -> Option<Result<u32>> {
        let mut sum = 0u32;
        for item in items {
            let value: u32 = try_or_ret_some_err!(
                item.parse::<u32>()
                    .map_err(|e| Error::invalid_arg("item", e.to_string()))
            );
            sum += value;
        }
        Some(Ok(sum))
    }

    #[test]
    fn test_try_or_ret_some_err() {
        assert_eq!(parse_all(&["1", "2", "3"]).unwrap().unwrap(), 6);
        assert!(parse_all(&["1", "x"]).unwrap().is_err());
    }
}
