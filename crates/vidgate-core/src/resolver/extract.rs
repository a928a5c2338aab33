//! Direct-link extraction from Streamtape page markup
//!
//! Two patterns are tried in order:
//!
//! 1. A script assignment `document.getElementById('...').innerHTML = <expr>`
//!    whose expression, once the string literals are concatenated and any
//!    `.substring(n)` / `.substr(n)` calls applied, yields a protocol-relative
//!    URL.
//! 2. Any `get_video?` query string embedded in the markup, which is joined
//!    onto `https://streamtape.com/`.

use regex::Regex;
use std::sync::LazyLock;

static INNER_HTML_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"getElementById\(\s*['"][A-Za-z0-9_-]+['"]\s*\)\.innerHTML\s*="#).unwrap()
});

static GET_VIDEO_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"get_video\?([^"'<>\s\\]+)"#).unwrap());

/// Extract the first direct media link from page HTML
pub fn extract_direct_link(html: &str) -> Option<String> {
    from_script_assignment(html).or_else(|| from_get_video_query(html))
}

fn from_script_assignment(html: &str) -> Option<String> {
    INNER_HTML_ASSIGNMENT
        .find_iter(html)
        .filter_map(|m| {
            let rest = &html[m.end()..];
            let script_end = rest.find("</script>").unwrap_or(rest.len());
            evaluate_statement(&rest[..script_end])
        })
        .find_map(|text| normalize(&text))
}

fn from_get_video_query(html: &str) -> Option<String> {
    GET_VIDEO_QUERY
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|query| query.contains("id="))
        .map(|query| format!("https://streamtape.com/get_video?{}", query))
}

/// Make protocol-relative (and single-slash host-relative) links absolute
fn normalize(text: &str) -> Option<String> {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("//") {
        Some(format!("https://{}", rest))
    } else if text.starts_with("https://") || text.starts_with("http://") {
        Some(text.to_string())
    } else if let Some(rest) = text.strip_prefix('/') {
        // `'/' + '/streamtape.com/...'` style splits sometimes leave one slash
        rest.contains("streamtape")
            .then(|| format!("https://{}", rest))
    } else {
        None
    }
}

/// Evaluate the right-hand side of an assignment: string literals joined by
/// `+`, with substring calls. The expression must be followed by `;`, a line
/// break or the end of the script.
fn evaluate_statement(source: &str) -> Option<String> {
    let mut parser = ExprParser {
        chars: source.chars().collect(),
        pos: 0,
    };
    let value = parser.concatenation()?;
    parser.statement_end().then_some(value)
}

struct ExprParser {
    chars: Vec<char>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn statement_end(&mut self) -> bool {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => self.pos += 1,
                ';' | '\n' => return true,
                _ => return false,
            }
        }
        true
    }

    /// Consume `expected` after optional whitespace; on a miss the position
    /// is left untouched
    fn eat(&mut self, expected: char) -> bool {
        let start = self.pos;
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            self.pos = start;
            false
        }
    }

    fn concatenation(&mut self) -> Option<String> {
        let mut value = self.term()?;
        while self.eat('+') {
            value.push_str(&self.term()?);
        }
        Some(value)
    }

    fn term(&mut self) -> Option<String> {
        self.skip_whitespace();
        let mut value = match self.peek()? {
            '(' => {
                self.pos += 1;
                let inner = self.concatenation()?;
                if !self.eat(')') {
                    return None;
                }
                inner
            }
            quote @ ('\'' | '"') => self.literal(quote)?,
            _ => return None,
        };

        while self.eat('.') {
            let method = self.identifier();
            if !self.eat('(') {
                return None;
            }
            let start = self.number()?;
            let end = if self.eat(',') { Some(self.number()?) } else { None };
            if !self.eat(')') {
                return None;
            }
            value = match method.as_str() {
                "substring" => substring(&value, start, end),
                "substr" => substr(&value, start, end),
                _ => return None,
            };
        }
        Some(value)
    }

    fn literal(&mut self, quote: char) -> Option<String> {
        self.pos += 1;
        let mut value = String::new();
        loop {
            let c = self.peek()?;
            self.pos += 1;
            match c {
                '\\' => {
                    value.push(self.peek()?);
                    self.pos += 1;
                }
                c if c == quote => return Some(value),
                c => value.push(c),
            }
        }
    }

    fn identifier(&mut self) -> String {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn number(&mut self) -> Option<usize> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .ok()
    }
}

/// JavaScript `String.prototype.substring`: bounds clamp and swap
fn substring(value: &str, start: usize, end: Option<usize>) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    let a = start.min(len);
    let b = end.unwrap_or(len).min(len);
    let (from, to) = if a <= b { (a, b) } else { (b, a) };
    chars[from..to].iter().collect()
}

/// JavaScript `String.prototype.substr`: start and length
fn substr(value: &str, start: usize, length: Option<usize>) -> String {
    value
        .chars()
        .skip(start)
        .take(length.unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div id="ideoolink" style="display:none;">/streamtape.com/get_video?id=stale&expires=1</div>
<script>
document.getElementById('ideoolink').innerHTML = "/streamtape.com/get_v"+ ''+ ('xcdideo?id=AbCd123&expires=1700000000&ip=F0&token=tok-9').substring(2).substring(1);
document.getElementById('robotlink').innerHTML = '//streamtape.com/get_video?id=AbCd123&expires=1700000000&ip=F0&token=' + ('xyzatok-9').substring(4);
</script>"#;

    #[test]
    fn test_concatenation_with_substring() {
        let link = extract_direct_link(PAGE).unwrap();
        assert_eq!(
            link,
            "https://streamtape.com/get_video?id=AbCd123&expires=1700000000&ip=F0&token=tok-9"
        );
    }

    #[test]
    fn test_protocol_relative_assignment() {
        let html = r#"<script>document.getElementById("norobotlink").innerHTML = '//streamtape.com/get_video?id=Q' + '&token=z';</script>"#;
        assert_eq!(
            extract_direct_link(html).unwrap(),
            "https://streamtape.com/get_video?id=Q&token=z"
        );
    }

    #[test]
    fn test_semicolon_inside_literal() {
        let html = r#"<script>
document.getElementById('robotlink').innerHTML = '//streamtape.com/get_video?id=Q;v=2&token=' + ('abcz').substring(3);
</script>"#;
        assert_eq!(
            extract_direct_link(html).unwrap(),
            "https://streamtape.com/get_video?id=Q;v=2&token=z"
        );
    }

    #[test]
    fn test_statement_ended_by_line_break() {
        let html = "<script>\ndocument.getElementById('robotlink').innerHTML = '//streamtape.com/get_video?id=R' + '&token=t'\nvar other = 1;\n</script>";
        assert_eq!(
            extract_direct_link(html).unwrap(),
            "https://streamtape.com/get_video?id=R&token=t"
        );
    }

    #[test]
    fn test_fallback_to_get_video_query() {
        let html = r#"<a href="/get_video?id=zzz&expires=5&token=abc">direct</a>"#;
        assert_eq!(
            extract_direct_link(html).unwrap(),
            "https://streamtape.com/get_video?id=zzz&expires=5&token=abc"
        );
    }

    #[test]
    fn test_no_link() {
        assert_eq!(extract_direct_link("<html><body>Video not found</body></html>"), None);
        assert_eq!(extract_direct_link(""), None);
    }

    #[test]
    fn test_unparseable_expression_is_skipped() {
        let html = r#"<script>document.getElementById('a').innerHTML = someVar + '//x';</script>
<p>get_video?id=ok&token=1</p>"#;
        assert_eq!(
            extract_direct_link(html).unwrap(),
            "https://streamtape.com/get_video?id=ok&token=1"
        );
    }

    #[test]
    fn test_js_string_semantics() {
        assert_eq!(substring("abcdef", 4, Some(1)), "bcd");
        assert_eq!(substring("abc", 10, None), "");
        assert_eq!(substr("abcdef", 1, Some(3)), "bcd");
        assert_eq!(evaluate_statement("('ab' + \"cd\").substr(1)").unwrap(), "bcd");
        assert_eq!(evaluate_statement("'a' + 'b' c"), None);
    }
}
