//! `%`-placeholder string formatting.
//!
//! Each `%` in the template is replaced by the next argument's [`Display`] output:
//!
//! ```
//! use glcx_format::format_string;
//!
//! assert_eq!(format_string!("% x % pixels", 1920, 1080), "1920 x 1080 pixels");
//! ```
//!
//! There is no escape for a literal `%`. Once the arguments run out, the rest of the
//! template (including any further `%`) is copied verbatim. Arguments left over when
//! the template ends are reported inline with a `Format-Warning` line rather than
//! failing.

use std::fmt::{self, Display, Write as _};

/// Format `text`, substituting each `%` with the next entry of `args`.
pub fn format_string(text: &str, args: &[&dyn Display]) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a `String` cannot fail.
    let _ = write_format(&mut out, text, args);
    out
}

/// Streaming form of [`format_string`].
pub fn write_format<W: fmt::Write>(out: &mut W, text: &str, args: &[&dyn Display]) -> fmt::Result {
    let mut rest = text;
    let mut args = args.iter();

    while let Some(arg) = args.as_slice().first() {
        let Some(pos) = rest.find('%') else {
            break;
        };
        out.write_str(&rest[..pos])?;
        write!(out, "{arg}")?;
        rest = &rest[pos + 1..];
        args.next();
    }
    out.write_str(rest)?;

    let unused = args.len();
    if unused > 0 {
        write!(out, "\nFormat-Warning: There are {unused} args unused.")?;
    }
    Ok(())
}

/// Variadic front end for [`format_string`].
///
/// With no arguments at all the result is an empty string.
#[macro_export]
macro_rules! format_string {
    () => {
        ::std::string::String::new()
    };
    ($text:expr $(, $arg:expr)* $(,)?) => {
        $crate::format_string($text, &[$(&$arg as &dyn ::std::fmt::Display),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_in_order() {
        assert_eq!(format_string!("a=% b=%", 1, "two"), "a=1 b=two");
    }

    #[test]
    fn placeholder_at_edges() {
        assert_eq!(format_string!("%", 3.5), "3.5");
        assert_eq!(format_string!("%%", 'x', 'y'), "xy");
        assert_eq!(format_string!("[%]", ""), "[]");
    }

    #[test]
    fn template_without_args_is_copied() {
        assert_eq!(format_string!("100% done"), "100% done");
    }

    #[test]
    fn empty_invocation_is_empty() {
        assert_eq!(format_string!(), "");
    }

    #[test]
    fn missing_args_leave_placeholders() {
        assert_eq!(format_string!("% and % and %", 1), "1 and % and %");
    }

    #[test]
    fn unused_args_are_reported() {
        assert_eq!(
            format_string!("only %", 1, 2, 3),
            "only 1\nFormat-Warning: There are 2 args unused."
        );
        assert_eq!(
            format_string!("none", "x"),
            "none\nFormat-Warning: There are 1 args unused."
        );
    }

    #[test]
    fn multibyte_text_around_placeholders() {
        assert_eq!(format_string!("é%ü%ß", "→", 7), "é→ü7ß");
    }

    #[test]
    fn writes_into_any_fmt_writer() {
        let mut out = String::from("> ");
        write_format(&mut out, "%/%", &[&4, &2]).unwrap();
        assert_eq!(out, "> 4/2");
    }
}
