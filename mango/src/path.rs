//! Dotted field paths
//!
//! A Mango field such as `address.city` names a nested member. A backslash
//! escapes the next character, so `a\.b` is the single key `a.b`.

use nom::{
    branch::alt,
    character::complete::{anychar, char, none_of},
    combinator::all_consuming,
    multi::{fold_many0, separated_list1},
    sequence::preceded,
    IResult,
};

/// Split a field into its component keys. `"foo.bar"` becomes
/// `["foo", "bar"]`, while `"foo\\.bar"` stays `["foo.bar"]`.
pub fn split_keys(field: &str) -> Vec<String> {
    match all_consuming(segments)(field) {
        Ok((_, keys)) => keys,
        Err(_) => vec![field.to_string()],
    }
}

/// Convert a Mango field name to a JSON path expression in dot-quoted
/// notation, e.g. `$."address"."city"`. Double quotes and backslashes inside
/// a segment are escaped with a backslash.
pub fn field_to_json_path(field: &str) -> String {
    let mut out = String::from("$");
    for segment in split_keys(field) {
        out.push_str(".\"");
        for ch in segment.chars() {
            if ch == '"' || ch == '\\' {
                out.push('\\');
            }
            out.push(ch);
        }
        out.push('"');
    }
    out
}

fn segments(input: &str) -> IResult<&str, Vec<String>> {
    separated_list1(char('.'), segment)(input)
}

fn segment(input: &str) -> IResult<&str, String> {
    fold_many0(segment_char, String::new, |mut acc, ch| {
        acc.push(ch);
        acc
    })(input)
}

fn segment_char(input: &str) -> IResult<&str, char> {
    alt((
        preceded(char('\\'), anychar),
        // a trailing backslash has nothing to escape and is kept as-is
        char('\\'),
        none_of(".\\"),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain() {
        assert_eq!(split_keys("foo"), vec!["foo"]);
        assert_eq!(split_keys("foo.bar.baz"), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn test_split_escapes() {
        assert_eq!(split_keys(r"foo\.bar"), vec!["foo.bar"]);
        assert_eq!(split_keys(r"foo\\.bar"), vec![r"foo\", "bar"]);
        assert_eq!(split_keys(r"foo\"), vec![r"foo\"]);
    }

    #[test]
    fn test_split_empty_segments() {
        assert_eq!(split_keys(""), vec![""]);
        assert_eq!(split_keys("a..b"), vec!["a", "", "b"]);
        assert_eq!(split_keys("a."), vec!["a", ""]);
    }

    #[test]
    fn test_split_unicode() {
        assert_eq!(split_keys("café.naïve"), vec!["café", "naïve"]);
    }

    #[test]
    fn test_json_path() {
        assert_eq!(field_to_json_path("name"), r#"$."name""#);
        assert_eq!(field_to_json_path("address.city"), r#"$."address"."city""#);
        assert_eq!(field_to_json_path(r#"say"hi"#), r#"$."say\"hi""#);
        assert_eq!(field_to_json_path(r"a\.b"), r#"$."a.b""#);
    }
}
