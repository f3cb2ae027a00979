//! Test fixtures - style-sheet snippets

use indoc::indoc;

/// Entry sheet importing `vars` and `mixins`
pub fn site_scss() -> &'static str {
    indoc! {r#"
        @import "vars";
        @import "mixins";

        body {
          color: $text;
        }
    "#}
}

pub fn vars_scss() -> &'static str {
    indoc! {r#"
        $text: #333;
    "#}
}

/// Partial that imports `vars` again, for diamond-shaped graphs
pub fn mixins_scss() -> &'static str {
    indoc! {r#"
        @import "vars";

        @mixin rounded {
          border-radius: 4px;
        }
    "#}
}

pub fn plain_scss() -> &'static str {
    indoc! {r#"
        a {
          color: red;
        }
    "#}
}

/// Imports a file that does not exist on line 2
pub fn broken_scss() -> &'static str {
    indoc! {r#"
        a { color: red; }
        @import "nope";
    "#}
}

/// Indented-syntax sheet importing `vars`
pub fn indented_sass() -> &'static str {
    indoc! {r#"
        @import "vars"

        body
          color: $text
    "#}
}
