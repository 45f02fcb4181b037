//! URI template expansion (RFC 6570, levels 1-3).

use std::collections::BTreeMap;

use url::form_urlencoded;

/// Values substituted into a templated link.
pub type TemplateParams = BTreeMap<String, String>;

/// Expands a templated link into a concrete URI.
pub trait TemplateExpander: Send + Sync {
    fn expand(&self, template: &str, params: &TemplateParams) -> String;
}

/// Default [`TemplateExpander`].
///
/// Supports simple `{var}`, reserved `{+var}`, fragment `{#var}`, label
/// `{.var}`, path `{/var}`, path-parameter `{;var}`, query `{?a,b}` and
/// continuation `{&a}` expressions. Prefix and explode modifiers are
/// accepted and ignored. Undefined variables are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc6570Expander;

struct Operator {
    first: &'static str,
    separator: &'static str,
    named: bool,
    empty_suffix: &'static str,
    reserved: bool,
}

impl Operator {
    fn parse(c: Option<char>) -> (Operator, bool) {
        let op = |first, separator, named, empty_suffix, reserved| Operator {
            first,
            separator,
            named,
            empty_suffix,
            reserved,
        };
        match c {
            Some('+') => (op("", ",", false, "", true), true),
            Some('#') => (op("#", ",", false, "", true), true),
            Some('.') => (op(".", ".", false, "", false), true),
            Some('/') => (op("/", "/", false, "", false), true),
            Some(';') => (op(";", ";", true, "", false), true),
            Some('?') => (op("?", "&", true, "=", false), true),
            Some('&') => (op("&", "&", true, "=", false), true),
            _ => (op("", ",", false, "", false), false),
        }
    }
}

impl TemplateExpander for Rfc6570Expander {
    fn expand(&self, template: &str, params: &TemplateParams) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let Some(len) = rest[start..].find('}') else {
                // unterminated expression: copy verbatim
                out.push_str(&rest[start..]);
                return out;
            };
            let expression = &rest[start + 1..start + len];
            out.push_str(&expand_expression(expression, params));
            rest = &rest[start + len + 1..];
        }
        out.push_str(rest);
        out
    }
}

fn expand_expression(expression: &str, params: &TemplateParams) -> String {
    let (op, has_operator) = Operator::parse(expression.chars().next());
    let names = if has_operator {
        &expression[1..]
    } else {
        expression
    };

    let parts: Vec<String> = names
        .split(',')
        .map(|name| name.trim_end_matches('*'))
        .map(|name| name.split(':').next().unwrap_or(name))
        .filter_map(|name| params.get(name).map(|value| (name, value)))
        .map(|(name, value)| {
            let encoded = encode(value, op.reserved);
            if !op.named {
                encoded
            } else if value.is_empty() {
                format!("{name}{}", op.empty_suffix)
            } else {
                format!("{name}={encoded}")
            }
        })
        .collect();

    if parts.is_empty() {
        return String::new();
    }
    format!("{}{}", op.first, parts.join(op.separator))
}

const RESERVED: &str = ":/?#[]@!$&'()*+,;=";

fn encode(value: &str, allow_reserved: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() || "-._~".contains(c) || (allow_reserved && RESERVED.contains(c))
        {
            out.push(c);
        } else if c == ' ' {
            out.push_str("%20");
        } else {
            let mut buf = [0u8; 4];
            out.extend(form_urlencoded::byte_serialize(c.encode_utf8(&mut buf).as_bytes()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> TemplateParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn expand(template: &str, pairs: &[(&str, &str)]) -> String {
        Rfc6570Expander.expand(template, &params(pairs))
    }

    #[test]
    fn simple_expansion_encodes_reserved() {
        assert_eq!(expand("/books/{id}", &[("id", "a/b c")]), "/books/a%2Fb%20c");
    }

    #[test]
    fn reserved_expansion_keeps_slashes() {
        assert_eq!(expand("{+base}/books", &[("base", "/api/v1")]), "/api/v1/books");
    }

    #[test]
    fn query_expansion_skips_undefined() {
        assert_eq!(
            expand("/books{?page,size,sort}", &[("page", "2"), ("sort", "title")]),
            "/books?page=2&sort=title"
        );
    }

    #[test]
    fn query_expansion_with_nothing_defined_is_empty() {
        assert_eq!(expand("/books{?page}", &[]), "/books");
    }

    #[test]
    fn continuation_and_path_segments() {
        assert_eq!(
            expand("/books{/id}?a=1{&page}", &[("id", "7"), ("page", "3")]),
            "/books/7?a=1&page=3"
        );
    }

    #[test]
    fn fragment_and_label() {
        assert_eq!(expand("/x{#frag}", &[("frag", "a/b")]), "/x#a/b");
        assert_eq!(expand("/file{.ext}", &[("ext", "json")]), "/file.json");
    }

    #[test]
    fn path_parameter_with_empty_value() {
        assert_eq!(expand("/m{;x,y}", &[("x", "1"), ("y", "")]), "/m;x=1;y");
    }

    #[test]
    fn modifiers_are_ignored() {
        assert_eq!(expand("/s/{term:3}", &[("term", "abc")]), "/s/abc");
        assert_eq!(expand("/s{?list*}", &[("list", "a")]), "/s?list=a");
    }

    #[test]
    fn unterminated_expression_is_copied() {
        assert_eq!(expand("/books/{id", &[("id", "1")]), "/books/{id");
    }
}
