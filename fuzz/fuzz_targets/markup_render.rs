#![no_main]

use libfuzzer_sys::fuzz_target;
use planebot_core::html_markup::{html_to_markdown_v2, html_to_plain_text, plain_text_to_html};
use planebot_core::{escape_markdown_v2, unescape_markdown_v2};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    assert_eq!(unescape_markdown_v2(&escape_markdown_v2(&raw)), raw);
    let _ = html_to_markdown_v2(&raw);
    let _ = html_to_plain_text(&plain_text_to_html(&raw));
});
