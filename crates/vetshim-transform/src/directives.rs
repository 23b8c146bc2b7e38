//! Directive prologue stripping

use once_cell::sync::Lazy;
use regex::Regex;

static DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*['"]use (?:client|strict|server)['"][ \t]*;?[ \t]*\r?$"#)
        .expect("static directive pattern")
});

/// Blank out `'use client'`, `'use strict'` and `'use server'` lines
///
/// Line terminators are kept, so line numbers do not move.
#[must_use]
pub fn strip_directives(text: &str) -> String {
    DIRECTIVE.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_directives_keeping_lines() {
        let text = "'use client';\n\"use strict\"\nconst a = 1;\n  'use server'  \n";
        let stripped = strip_directives(text);
        assert_eq!(stripped, "\n\nconst a = 1;\n\n");
    }

    #[test]
    fn leaves_other_strings_alone() {
        let text = "const s = 'use client';\n'use memo';\n";
        assert_eq!(strip_directives(text), text);
    }
}
