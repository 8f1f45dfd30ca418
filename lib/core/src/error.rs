//! Error handling foundation for gatehouse.
//!
//! Only the `Result` alias lives here. Each crate defines its own error
//! types and wraps them in a rootcause `Report` where a layer needs to
//! attach context.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_alias_holds_values() {
        let ok: Result<u8> = Ok(7);
        assert_eq!(ok.expect("should be ok"), 7);
    }
}
