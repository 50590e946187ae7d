//! JavaScript evaluated in the main window.
//!
//! Every script returns a JSON string so `null` results survive the trip
//! through `Runtime.evaluate`.

/// Attribute stamped on queried elements so clicks can find them again.
pub const REF_ATTRIBUTE: &str = "data-attachd-ref";

/// Wait for the page to reach a ready state.
pub const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

pub const ENUMERATE_FRAMES_SCRIPT: &str = r#"
    JSON.stringify(Array.from(document.querySelectorAll('iframe')).map((f, i) => ({
        index: i,
        src: f.getAttribute('src')
    })))
"#;

/// Expression for the document of the given context; `null` when a frame's
/// document is cross-origin or gone.
pub fn root_expr(frame: Option<usize>) -> String {
    match frame {
        None => "document".to_string(),
        Some(i) => format!(
            "(() => {{ const f = document.querySelectorAll('iframe')[{}]; \
             try {{ return f ? f.contentDocument : null; }} catch (e) {{ return null; }} }})()",
            i
        ),
    }
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

pub fn frame_accessible(frame: usize) -> String {
    format!("JSON.stringify({} !== null)", root_expr(Some(frame)))
}

pub fn page_source(frame: Option<usize>) -> String {
    format!(
        "JSON.stringify((() => {{ const root = {}; \
         return root && root.documentElement ? root.documentElement.outerHTML : null; }})())",
        root_expr(frame)
    )
}

pub fn query(frame: Option<usize>, selector: &str) -> String {
    format!(
        r#"JSON.stringify((() => {{
            const root = {root};
            if (!root) return null;
            return Array.from(root.querySelectorAll({selector})).map((el) => {{
                let id = el.getAttribute('{attr}');
                if (!id) {{
                    window.__attachdRef = (window.__attachdRef || 0) + 1;
                    id = 'r' + window.__attachdRef;
                    el.setAttribute('{attr}', id);
                }}
                return {{
                    id: id,
                    text: (el.innerText || el.textContent || '').trim(),
                    href: el.hasAttribute('href')
                        ? (typeof el.href === 'string' && el.href ? el.href : el.getAttribute('href'))
                        : null,
                    title: el.getAttribute('title'),
                    onclick: el.getAttribute('onclick')
                }};
            }});
        }})())"#,
        root = root_expr(frame),
        selector = js_string(selector),
        attr = REF_ATTRIBUTE,
    )
}

/// Returns `"ok"`, `"frame"` or `"detached"`.
pub fn click(frame: Option<usize>, id: &str) -> String {
    format!(
        r#"JSON.stringify((() => {{
            const root = {root};
            if (!root) return 'frame';
            const el = root.querySelector('[{attr}=' + JSON.stringify({id}) + ']');
            if (!el) return 'detached';
            try {{ el.scrollIntoView({{ block: 'center' }}); }} catch (e) {{}}
            el.click();
            return 'ok';
        }})())"#,
        root = root_expr(frame),
        attr = REF_ATTRIBUTE,
        id = js_string(id),
    )
}

/// Looks in the current context first, then the top document.
pub fn container_html(frame: Option<usize>, container_id: &str) -> String {
    format!(
        r#"JSON.stringify((() => {{
            for (const root of [{root}, document]) {{
                if (!root) continue;
                const el = root.getElementById({id});
                if (el) return el.innerHTML;
            }}
            return null;
        }})())"#,
        root = root_expr(frame),
        id = js_string(container_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_quoted() {
        let script = query(Some(1), r#"a[onclick*="GetValidateCode"]"#);
        assert!(script.contains(r#""a[onclick*=\"GetValidateCode\"]""#));
        assert!(script.contains("querySelectorAll('iframe')[1]"));
    }

    #[test]
    fn test_query_reports_resolved_href() {
        let script = query(Some(0), "a");
        assert!(script.contains("el.href"));
        assert!(script.contains("el.hasAttribute('href')"));
    }

    #[test]
    fn test_top_document_root() {
        assert_eq!(root_expr(None), "document");
        assert!(click(None, "r3").contains("const root = document;"));
    }
}
