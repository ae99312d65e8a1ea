// tests/ingest_normalize.rs
use blog_automation::ingest::{normalize_body, normalize_text};

#[test]
fn empty_is_ok() {
    assert_eq!(normalize_text(""), "");
    assert_eq!(normalize_body(""), "");
}

#[test]
fn strips_html_and_unescapes() {
    let s = "<p>Hello&nbsp;<b>world</b> &ldquo;ok&rdquo;</p>";
    let n = normalize_text(s);
    assert_eq!(n, r#"Hello world "ok""#);
}

#[test]
fn folds_whitespace_and_nbsp() {
    let s = "A\u{00A0}\n\tB   C";
    assert_eq!(normalize_text(s), "A B C");
}

#[test]
fn body_breaks_on_block_tags_and_br() {
    let s = "<h2>Intro</h2>Line one<br/>Line two</p><p>Tail &amp; end</p>";
    assert_eq!(normalize_body(s), "Intro\n\nLine one\n\nLine two\n\nTail & end");
}

#[test]
fn length_caps_apply() {
    let s = "x".repeat(20_000);
    assert!(normalize_text(&s).chars().count() <= 1_500);
    assert!(normalize_body(&s).chars().count() <= 10_000);
}
