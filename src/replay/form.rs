// src/replay/form.rs
//! Auto-submitting replay form
//!
//! Renders a minimal HTML document whose form re-submits the captured
//! URL-encoded body to the replay target as soon as the page loads. Fields
//! are the percent-decoded key/value pairs of the captured body: pairs split
//! on `&`, key from value on the first `=`, a pair without `=` becoming a
//! field with an empty value.

use http::Method;
use std::fmt::Write;

/// Render the self-submitting form document for `body`.
pub fn render_auto_submit_form(target_url: &str, method: &Method, body: &[u8]) -> String {
    let mut form = format!(
        "<html><head></head><body onload=\"document.postform.submit()\">\
         <form name=\"postform\" method=\"{}\" action=\"{}\">",
        method, target_url
    );

    for pair in body.split(|&b| b == b'&').filter(|p| !p.is_empty()) {
        let (name, value) = match pair.iter().position(|&b| b == b'=') {
            Some(pos) => (&pair[..pos], &pair[pos + 1..]),
            None => (pair, &[][..]),
        };

        let name = urlencoding::decode_binary(name);
        let value = urlencoding::decode_binary(value);

        let _ = write!(
            form,
            "<input type=\"hidden\" name=\"{}\" value=\"{}\"/>",
            String::from_utf8_lossy(&name),
            String::from_utf8_lossy(&value)
        );
    }

    form.push_str("</form></body></html>");
    form
}
