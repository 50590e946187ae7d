//! `Content-Disposition` file names.
//!
//! Download portals send every variant in the wild: RFC 5987 `filename*=`
//! (sometimes quoted), plain `filename=` with percent-encoded UTF-8, and
//! parameter names in any case.

/// One `key=value` parameter, with quotes removed from the value.
fn parameters(header: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    let mut flush = |segment: &mut String| {
        if let Some((key, value)) = segment.split_once('=') {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            params.push((key.trim().to_ascii_lowercase(), value.to_string()));
        }
        segment.clear();
    };

    for c in header.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ';' if !quoted => flush(&mut current),
            _ => current.push(c),
        }
    }
    flush(&mut current);
    params
}

/// Decode `charset'lang'value`; only the value part is percent-decoded.
fn decode_extended(value: &str) -> Option<String> {
    let encoded = match value.splitn(3, '\'').collect::<Vec<_>>()[..] {
        [_charset, _lang, encoded] => encoded,
        _ => value,
    };
    urlencoding::decode(encoded).ok().map(|d| d.into_owned())
}

/// File name carried by a `Content-Disposition` header.
///
/// `filename*=` wins over `filename=`. Plain names that contain percent
/// escapes are decoded when they decode to valid UTF-8.
pub fn parse_content_disposition_filename(header: &str) -> Option<String> {
    let params = parameters(header);

    let extended = params
        .iter()
        .filter(|(key, _)| key == "filename*")
        .find_map(|(_, value)| decode_extended(value));
    let plain = params
        .iter()
        .find(|(key, _)| key == "filename")
        .map(|(_, value)| {
            if value.contains('%') {
                urlencoding::decode(value)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| value.clone())
            } else {
                value.clone()
            }
        });

    extended
        .into_iter()
        .chain(plain)
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_and_bare_names() {
        assert_eq!(
            parse_content_disposition_filename(r#"attachment; filename="tender notice.pdf""#).as_deref(),
            Some("tender notice.pdf")
        );
        assert_eq!(
            parse_content_disposition_filename("attachment;filename=a.rar").as_deref(),
            Some("a.rar")
        );
    }

    #[test]
    fn test_extended_name_wins_even_when_quoted() {
        let header = r#"attachment; filename="fallback.pdf"; FILENAME*="UTF-8''%E9%99%84%E4%BB%B6.pdf""#;
        assert_eq!(
            parse_content_disposition_filename(header).as_deref(),
            Some("附件.pdf")
        );
    }

    #[test]
    fn test_percent_encoded_plain_name() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=%E5%85%AC%E5%91%8A.docx").as_deref(),
            Some("公告.docx")
        );
    }

    #[test]
    fn test_semicolon_inside_quotes() {
        assert_eq!(
            parse_content_disposition_filename(r#"attachment; filename="a;b.pdf"; size=10"#).as_deref(),
            Some("a;b.pdf")
        );
    }

    #[test]
    fn test_no_name() {
        assert_eq!(parse_content_disposition_filename("attachment"), None);
        assert_eq!(parse_content_disposition_filename(r#"inline; filename="""#), None);
    }
}
